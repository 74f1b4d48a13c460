//! Client side of the EVM `exact` scheme: signs EIP-3009 authorizations.
//!
//! ```ignore
//! use alloy_signer_local::PrivateKeySigner;
//! use t402_chain_eip155::Eip155ExactClient;
//!
//! let client = Eip155ExactClient::new(PrivateKeySigner::random());
//! let payload = client.create_payment_payload(&requirements).await?;
//! ```

use alloy_primitives::{Address, B256, Signature};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolStruct;
use async_trait::async_trait;
use rand::{Rng, rng};
use std::sync::Arc;
use t402_types::proto::v2::PaymentRequirements;
use t402_types::scheme::{ClientError, EXACT_SCHEME, SchemeClient, SchemeId};
use t402_types::timestamp::UnixTimestamp;

use crate::types::{
    EIP155_NAMESPACE, ExactEvmAuthorization, ExactEvmPayload, domain_name_version, eip712_domain,
    evm_chain_id, is_valid_address, parse_address,
};

/// `validAfter` is backdated by this much so small clock skew does not matter.
const VALID_AFTER_SKEW_SECS: u64 = 10 * 60;

/// Anything that can sign a 32-byte hash for an EVM address.
#[async_trait]
pub trait SignerLike {
    fn address(&self) -> Address;

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error>;
}

#[async_trait]
impl SignerLike for PrivateKeySigner {
    fn address(&self) -> Address {
        PrivateKeySigner::address(self)
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error> {
        alloy_signer::Signer::sign_hash(self, hash).await
    }
}

#[async_trait]
impl<T: SignerLike + Send + Sync> SignerLike for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error> {
        (**self).sign_hash(hash).await
    }
}

#[derive(Debug, Clone)]
pub struct Eip155ExactClient<S> {
    signer: S,
}

impl<S> Eip155ExactClient<S> {
    pub fn new(signer: S) -> Self {
        Self { signer }
    }
}

impl<S> SchemeId for Eip155ExactClient<S> {
    fn namespace(&self) -> &str {
        EIP155_NAMESPACE
    }

    fn scheme(&self) -> &str {
        EXACT_SCHEME
    }
}

#[async_trait]
impl<S> SchemeClient for Eip155ExactClient<S>
where
    S: SignerLike + Send + Sync,
{
    fn is_valid_address(&self, address: &str) -> bool {
        is_valid_address(address)
    }

    async fn sign_authorization(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<serde_json::Value, ClientError> {
        let chain_id = evm_chain_id(&requirements.network)
            .ok_or_else(|| ClientError::validation("network", "is not a numeric eip155 chain"))?;
        let asset = parse_address(&requirements.asset)
            .ok_or_else(|| ClientError::validation("asset", "is not an EVM address"))?;
        let pay_to = parse_address(&requirements.pay_to)
            .ok_or_else(|| ClientError::validation("payTo", "is not an EVM address"))?;

        let now = UnixTimestamp::now();
        let nonce: [u8; 32] = rng().random();
        let authorization = ExactEvmAuthorization {
            from: self.signer.address(),
            to: pay_to,
            value: requirements.amount,
            valid_after: UnixTimestamp::from_secs(now.as_secs().saturating_sub(VALID_AFTER_SKEW_SECS)),
            valid_before: (now + requirements.max_timeout_seconds).ceil_secs(),
            nonce: B256::from(nonce),
        };

        let (name, version) = domain_name_version(requirements);
        let domain = eip712_domain(name, version, chain_id, asset);
        let hash = authorization.typed_message().eip712_signing_hash(&domain);
        let signature = self
            .signer
            .sign_hash(&hash)
            .await
            .map_err(|e| ClientError::Signing(format!("{e:?}")))?;

        let payload = ExactEvmPayload {
            signature: signature.as_bytes().into(),
            authorization,
        };
        Ok(serde_json::to_value(payload)?)
    }
}
