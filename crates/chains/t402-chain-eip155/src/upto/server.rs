//! Server side of the EVM `upto` scheme.

use t402_types::proto::SupportedPaymentKind;
use t402_types::proto::v2::PaymentRequirements;
use t402_types::scheme::{SchemeId, SchemeServer, merge_extra};
use t402_types::util::TokenAmount;

use super::types::UPTO_SCHEME;
use crate::types::{EIP155_NAMESPACE, domain_name_version};

/// Smallest amount settled when the server does not pick one, in base units.
pub const DEFAULT_MIN_AMOUNT: u64 = 1000;

/// Prices the maximum a request may cost. The facilitator's `routerAddress`
/// becomes the permit spender.
#[derive(Debug, Clone, Copy)]
pub struct Eip155UptoServer {
    min_amount: TokenAmount,
}

impl Default for Eip155UptoServer {
    fn default() -> Self {
        Self {
            min_amount: TokenAmount::from(DEFAULT_MIN_AMOUNT),
        }
    }
}

impl Eip155UptoServer {
    pub fn with_min_amount(min_amount: TokenAmount) -> Self {
        Self { min_amount }
    }
}

impl SchemeId for Eip155UptoServer {
    fn namespace(&self) -> &str {
        EIP155_NAMESPACE
    }

    fn scheme(&self) -> &str {
        UPTO_SCHEME
    }
}

impl SchemeServer for Eip155UptoServer {
    fn enhance_requirements(
        &self,
        requirements: PaymentRequirements,
        kind: &SupportedPaymentKind,
    ) -> PaymentRequirements {
        let (name, version) = domain_name_version(&requirements);
        let min_amount = self.min_amount.min(requirements.amount);
        let defaults = serde_json::json!({
            "name": name,
            "version": version,
            "minAmount": min_amount.to_string(),
        });
        let requirements = merge_extra(requirements, Some(&defaults));
        merge_extra(requirements, kind.extra.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use t402_types::chain::ChainId;

    #[test]
    fn test_requirements_carry_router_and_minimum() {
        let server = Eip155UptoServer::default();
        let network = ChainId::new("eip155", "8453");
        let requirements = server
            .price_requirements("$5", &network, "0x209693Bc6afc0C5328bA36FaF03C514EF312287C", 300)
            .unwrap();
        assert_eq!(requirements.scheme, "upto");
        assert_eq!(requirements.amount, TokenAmount::from(5_000_000u64));

        let kind = SupportedPaymentKind {
            t402_version: 2,
            scheme: "upto".into(),
            network: network.to_string(),
            extra: Some(serde_json::json!({ "routerAddress": "0x1111111111111111111111111111111111111111" })),
        };
        let enhanced = server.enhance_requirements(requirements, &kind);
        assert_eq!(enhanced.extra_str("minAmount"), Some("1000"));
        assert_eq!(
            enhanced.extra_str("routerAddress"),
            Some("0x1111111111111111111111111111111111111111")
        );
        assert!(enhanced.extra_str("name").is_some());
    }

    #[test]
    fn test_minimum_never_exceeds_maximum() {
        let server = Eip155UptoServer::with_min_amount(TokenAmount::from(50_000u64));
        let network = ChainId::new("eip155", "8453");
        let requirements = server
            .price_requirements("$0.01", &network, "0x209693Bc6afc0C5328bA36FaF03C514EF312287C", 300)
            .unwrap();
        let kind = SupportedPaymentKind {
            t402_version: 2,
            scheme: "upto".into(),
            network: network.to_string(),
            extra: None,
        };
        let enhanced = server.enhance_requirements(requirements, &kind);
        assert_eq!(enhanced.extra_str("minAmount"), Some("10000"));
    }
}
