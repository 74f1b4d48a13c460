//! Server side of the EVM `exact` scheme.

use t402_types::proto::SupportedPaymentKind;
use t402_types::proto::v2::PaymentRequirements;
use t402_types::scheme::{EXACT_SCHEME, SchemeId, SchemeServer, merge_extra};

use crate::types::{EIP155_NAMESPACE, domain_name_version};

/// Prices resources in the network's default stablecoin and fills in the
/// EIP-712 domain clients need to sign.
#[derive(Debug, Clone, Copy, Default)]
pub struct Eip155ExactServer;

impl SchemeId for Eip155ExactServer {
    fn namespace(&self) -> &str {
        EIP155_NAMESPACE
    }

    fn scheme(&self) -> &str {
        EXACT_SCHEME
    }
}

impl SchemeServer for Eip155ExactServer {
    fn enhance_requirements(
        &self,
        requirements: PaymentRequirements,
        kind: &SupportedPaymentKind,
    ) -> PaymentRequirements {
        let (name, version) = domain_name_version(&requirements);
        let domain = serde_json::json!({ "name": name, "version": version });
        let requirements = merge_extra(requirements, Some(&domain));
        merge_extra(requirements, kind.extra.as_ref())
    }
}
