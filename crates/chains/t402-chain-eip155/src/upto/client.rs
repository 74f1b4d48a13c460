//! Client side of the EVM `upto` scheme: signs EIP-2612 permits for the maximum.

use alloy_primitives::{Address, B256};
use alloy_sol_types::SolStruct;
use async_trait::async_trait;
use rand::{Rng, rng};
use t402_types::proto::v2::PaymentRequirements;
use t402_types::scheme::{ClientError, SchemeClient, SchemeId};
use t402_types::timestamp::UnixTimestamp;

use super::types::{PermitAuthorization, PermitSignature, UPTO_SCHEME, UptoEvmPayload, router_address};
use crate::client::SignerLike;
use crate::types::{
    EIP155_NAMESPACE, domain_name_version, eip712_domain, evm_chain_id, is_valid_address,
    parse_address,
};

/// Where the client learns the token's current `nonces(owner)`.
#[async_trait]
pub trait PermitNonceSource {
    async fn permit_nonce(&self, chain_id: u64, asset: Address, owner: Address)
    -> Result<u64, ClientError>;
}

/// A fixed nonce, for owners that never signed a permit on this token.
#[async_trait]
impl PermitNonceSource for u64 {
    async fn permit_nonce(&self, _chain_id: u64, _asset: Address, _owner: Address) -> Result<u64, ClientError> {
        Ok(*self)
    }
}

#[derive(Debug, Clone)]
pub struct Eip155UptoClient<S, N = u64> {
    signer: S,
    nonces: N,
}

impl<S> Eip155UptoClient<S> {
    /// Signs with permit nonce 0.
    pub fn new(signer: S) -> Self {
        Self { signer, nonces: 0 }
    }
}

impl<S, N> Eip155UptoClient<S, N> {
    pub fn with_nonce_source<M>(self, nonces: M) -> Eip155UptoClient<S, M> {
        Eip155UptoClient {
            signer: self.signer,
            nonces,
        }
    }
}

impl<S, N> SchemeId for Eip155UptoClient<S, N> {
    fn namespace(&self) -> &str {
        EIP155_NAMESPACE
    }

    fn scheme(&self) -> &str {
        UPTO_SCHEME
    }
}

#[async_trait]
impl<S, N> SchemeClient for Eip155UptoClient<S, N>
where
    S: SignerLike + Send + Sync,
    N: PermitNonceSource + Send + Sync,
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
        let spender = router_address(requirements)
            .and_then(parse_address)
            .ok_or_else(|| ClientError::validation("extra", "routerAddress is missing or not an EVM address"))?;

        let owner = self.signer.address();
        let nonce = self.nonces.permit_nonce(chain_id, asset, owner).await?;
        let authorization = PermitAuthorization {
            owner,
            spender,
            value: requirements.amount,
            deadline: (UnixTimestamp::now() + requirements.max_timeout_seconds).ceil_secs(),
            nonce,
        };

        let (name, version) = domain_name_version(requirements);
        let domain = eip712_domain(name, version, chain_id, asset);
        let hash = authorization.typed_message().eip712_signing_hash(&domain);
        let signature = self
            .signer
            .sign_hash(&hash)
            .await
            .map_err(|e| ClientError::Signing(format!("{e:?}")))?;

        let payment_nonce: [u8; 32] = rng().random();
        let payload = UptoEvmPayload {
            signature: PermitSignature::from_signature(&signature),
            authorization,
            payment_nonce: B256::from(payment_nonce),
        };
        Ok(serde_json::to_value(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_signer_local::PrivateKeySigner;
    use t402_types::chain::ChainId;
    use t402_types::util::TokenAmount;

    const ROUTER: &str = "0x1111111111111111111111111111111111111111";

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "upto".into(),
            network: ChainId::new("eip155", "8453"),
            asset: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".into(),
            amount: TokenAmount::from(5_000_000u64),
            pay_to: "0x209693Bc6afc0C5328bA36FaF03C514EF312287C".into(),
            max_timeout_seconds: 300,
            extra: Some(serde_json::json!({ "routerAddress": ROUTER, "minAmount": "1000" })),
        }
    }

    #[tokio::test]
    async fn test_permit_names_router_as_spender() {
        let signer = PrivateKeySigner::random();
        let client = Eip155UptoClient::new(signer.clone()).with_nonce_source(7u64);
        let payment = client.create_payment_payload(&requirements()).await.unwrap();
        assert_eq!(payment.accepted.scheme, "upto");
        let payload: UptoEvmPayload = serde_json::from_value(payment.payload).unwrap();
        assert_eq!(payload.authorization.owner, signer.address());
        assert_eq!(payload.authorization.spender, parse_address(ROUTER).unwrap());
        assert_eq!(payload.authorization.value, TokenAmount::from(5_000_000u64));
        assert_eq!(payload.authorization.nonce, 7);
        assert!(matches!(payload.signature, PermitSignature::Split { v: 27 | 28, .. }));
    }

    #[tokio::test]
    async fn test_requires_router_address() {
        let client = Eip155UptoClient::new(PrivateKeySigner::random());
        let mut requirements = requirements();
        requirements.extra = None;
        let err = client.create_payment_payload(&requirements).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation { field: "extra", .. }));
    }

    #[cfg(feature = "facilitator")]
    mod verified_by_facilitator {
        use super::*;
        use crate::upto::facilitator::Eip155UptoFacilitator;
        use std::time::Duration;
        use t402_types::chain::{
            ChainProviderOps, ChainRegistry, ChainRpc, ChainRpcError, ConfirmationStatus,
            SequenceInfo, SequenceQuery, SignedPayload, TransactionRef,
        };
        use t402_types::proto::v2::{Settlement, VerifyRequest};
        use t402_types::scheme::{SchemeFacilitator, Verification};

        struct OpenNode;

        impl ChainProviderOps for OpenNode {
            fn signer_addresses(&self) -> Vec<String> {
                vec![ROUTER.into()]
            }

            fn chain_id(&self) -> ChainId {
                ChainId::new("eip155", "8453")
            }
        }

        impl ChainRpc for OpenNode {
            async fn get_sequence_or_block_info(
                &self,
                _query: &SequenceQuery,
            ) -> Result<SequenceInfo, ChainRpcError> {
                Ok(SequenceInfo::Seqno(0))
            }

            async fn broadcast(&self, _signed: &SignedPayload) -> Result<TransactionRef, ChainRpcError> {
                Ok(TransactionRef("0xabc".into()))
            }

            async fn wait_for_confirmation(
                &self,
                _tx: &TransactionRef,
                _timeout: Duration,
            ) -> Result<ConfirmationStatus, ChainRpcError> {
                Ok(ConfirmationStatus::Confirmed)
            }

            async fn get_balance(&self, _account: &str, _asset: &str) -> Result<TokenAmount, ChainRpcError> {
                Ok(TokenAmount::from(u64::MAX))
            }

            async fn is_account_ready(&self, _account: &str) -> Result<bool, ChainRpcError> {
                Ok(true)
            }
        }

        #[tokio::test]
        async fn test_client_permit_verifies_for_partial_settlement() {
            let client = Eip155UptoClient::new(PrivateKeySigner::random());
            let facilitator = Eip155UptoFacilitator::new(ChainRegistry::from_providers([OpenNode]));
            for timeout in [31, 300] {
                let mut requirements = requirements();
                requirements.max_timeout_seconds = timeout;
                let payment = client.create_payment_payload(&requirements).await.unwrap();
                let request = VerifyRequest::new(payment, requirements).with_settlement(Settlement {
                    settle_amount: TokenAmount::from(42_000u64),
                    usage_details: Some(serde_json::json!({ "unitsConsumed": 42, "unitType": "request" })),
                });
                let verification = facilitator.verify(&request).await.unwrap();
                assert!(
                    matches!(verification, Verification::Valid { .. }),
                    "timeout {timeout}: {verification:?}"
                );
            }
        }
    }
}
