//! Facilitator side of the EVM `upto` scheme.
//!
//! The payer signs an EIP-2612 permit for the maximum, naming a facilitator
//! signer as spender. Settlement relays `permit(...)` and then
//! `transferFrom(owner, payTo, settleAmount)` from the same signer, so the
//! account nonce keeps them in order. The amount comes from the request's
//! `settlement`, defaulting to the full maximum.

use alloy_primitives::{Address, Bytes, U256, hex};
use alloy_sol_types::{SolCall, SolStruct};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use t402_types::chain::{
    ChainId, ChainRegistry, ChainRpc, ChainRpcError, ConfirmationStatus, SequenceInfo,
    SequenceQuery, SignedPayload, TransactionRef,
};
use t402_types::proto::v2::{PaymentRequirements, Settlement, VerifyRequest};
use t402_types::proto::{PaymentVerificationError, SupportedPaymentKind};
use t402_types::scheme::{EXPIRY_GRACE_SECS, SchemeFacilitator, SchemeId, Verification};
use t402_types::timestamp::UnixTimestamp;
use t402_types::util::TokenAmount;

use super::types::{
    SettlementCalls, UPTO_SCHEME, UptoEvmPayload, min_amount, permitCall, transferFromCall,
};
use crate::types::{EIP155_NAMESPACE, domain_name_version, eip712_domain, evm_chain_id, parse_address};

enum Rejection {
    Invalid(PaymentVerificationError),
    Rpc(ChainRpcError),
}

impl From<PaymentVerificationError> for Rejection {
    fn from(value: PaymentVerificationError) -> Self {
        Rejection::Invalid(value)
    }
}

impl From<ChainRpcError> for Rejection {
    fn from(value: ChainRpcError) -> Self {
        Rejection::Rpc(value)
    }
}

fn invalid_format(message: String) -> Rejection {
    PaymentVerificationError::InvalidFormat(message).into()
}

/// `upto` facilitator over the configured EVM chains.
pub struct Eip155UptoFacilitator<P> {
    providers: ChainRegistry<P>,
    now: fn() -> UnixTimestamp,
}

impl<P> Eip155UptoFacilitator<P> {
    pub fn new(providers: ChainRegistry<P>) -> Self {
        Self {
            providers,
            now: UnixTimestamp::now,
        }
    }

    /// Replaces the clock used for the permit deadline.
    pub fn with_clock(mut self, now: fn() -> UnixTimestamp) -> Self {
        self.now = now;
        self
    }

    pub fn providers(&self) -> &ChainRegistry<P> {
        &self.providers
    }
}

/// The amount to charge: the requested settlement, or the full maximum.
fn settle_amount(
    requirements: &PaymentRequirements,
    settlement: Option<&Settlement>,
) -> Result<TokenAmount, PaymentVerificationError> {
    let maximum = requirements.amount;
    let amount = settlement.map_or(maximum, |s| s.settle_amount);
    if amount.is_zero() {
        return Err(PaymentVerificationError::InvalidSettlementAmount(
            "nothing to settle".into(),
        ));
    }
    if amount > maximum {
        return Err(PaymentVerificationError::InvalidSettlementAmount(format!(
            "{amount} exceeds the authorized maximum {maximum}"
        )));
    }
    let minimum =
        min_amount(requirements).map_err(|e| PaymentVerificationError::InvalidFormat(e.to_string()))?;
    if let Some(minimum) = minimum
        && amount < minimum
    {
        return Err(PaymentVerificationError::InvalidSettlementAmount(format!(
            "{amount} is below the minimum {minimum}"
        )));
    }
    Ok(amount)
}

impl<P: ChainRpc> Eip155UptoFacilitator<P> {
    fn provider(&self, network: &ChainId) -> Result<&P, ChainRpcError> {
        self.providers
            .by_chain_id(network)
            .ok_or_else(|| ChainRpcError::Unavailable(format!("no provider for {network}")))
    }

    async fn check(
        &self,
        provider: &P,
        payload: &UptoEvmPayload,
        requirements: &PaymentRequirements,
        settlement: Option<&Settlement>,
    ) -> Result<SignedPayload, Rejection> {
        let authorization = &payload.authorization;
        let chain_id = evm_chain_id(&requirements.network)
            .ok_or(PaymentVerificationError::UnsupportedNetwork)?;
        let asset = parse_address(&requirements.asset)
            .ok_or_else(|| invalid_format(format!("asset {} is not an EVM address", requirements.asset)))?;
        let pay_to = parse_address(&requirements.pay_to)
            .ok_or_else(|| invalid_format(format!("payTo {} is not an EVM address", requirements.pay_to)))?;

        if authorization.value < requirements.amount {
            return Err(PaymentVerificationError::InsufficientAmount.into());
        }
        let amount = settle_amount(requirements, settlement)?;

        let signers = provider.signer_addresses();
        let spender_is_signer = signers
            .iter()
            .any(|signer| parse_address(signer) == Some(authorization.spender));
        if !spender_is_signer {
            return Err(PaymentVerificationError::InvalidSignature(format!(
                "permit spender {} is not a facilitator signer",
                authorization.spender
            ))
            .into());
        }

        let (name, version) = domain_name_version(requirements);
        let domain = eip712_domain(name, version, chain_id, asset);
        let hash = authorization.typed_message().eip712_signing_hash(&domain);
        let signature = payload
            .signature
            .to_signature()
            .map_err(|e| PaymentVerificationError::InvalidSignature(e.to_string()))?;
        let recovered = signature
            .recover_address_from_prehash(&hash)
            .map_err(|e| PaymentVerificationError::InvalidSignature(e.to_string()))?;
        if recovered != authorization.owner {
            return Err(PaymentVerificationError::InvalidSignature(format!(
                "recovered signer {recovered} is not {}",
                authorization.owner
            ))
            .into());
        }

        if authorization.deadline <= (self.now)() + EXPIRY_GRACE_SECS {
            return Err(PaymentVerificationError::Expired.into());
        }

        let owner = authorization.owner.to_checksum(None);
        let query = SequenceQuery::PermitNonce {
            owner: owner.clone(),
            asset: asset.to_checksum(None),
        };
        match provider.get_sequence_or_block_info(&query).await? {
            SequenceInfo::Seqno(expected) if authorization.nonce < expected => {
                return Err(PaymentVerificationError::NonceAlreadyUsed.into());
            }
            SequenceInfo::Seqno(expected) if authorization.nonce > expected => {
                return Err(PaymentVerificationError::InvalidSignature(format!(
                    "permit nonce {} is ahead of the token nonce {expected}",
                    authorization.nonce
                ))
                .into());
            }
            SequenceInfo::Seqno(_) => {}
            other => {
                return Err(ChainRpcError::Unavailable(format!(
                    "unexpected sequence info: {other:?}"
                ))
                .into());
            }
        }

        match provider.get_balance(&owner, &requirements.asset).await {
            Ok(balance) if balance < amount => {
                return Err(PaymentVerificationError::InsufficientFunds.into());
            }
            Ok(_) => {}
            #[cfg_attr(not(feature = "telemetry"), allow(unused_variables))]
            Err(error) => {
                #[cfg(feature = "telemetry")]
                tracing::warn!(payer = %owner, network = %requirements.network, %error, "Balance check failed, continuing verification");
            }
        }

        let permit = permitCall {
            owner: authorization.owner,
            spender: authorization.spender,
            value: authorization.value.0,
            deadline: U256::from(authorization.deadline.as_secs()),
            v: 27 + u8::from(signature.v()),
            r: signature.r().into(),
            s: signature.s().into(),
        };
        let transfer = transferFromCall {
            from: authorization.owner,
            to: pay_to,
            amount: amount.0,
        };
        let calls = SettlementCalls {
            permit: Bytes::from(permit.abi_encode()),
            transfer: Bytes::from(transfer.abi_encode()),
        };
        #[cfg(feature = "telemetry")]
        tracing::debug!(payer = %owner, %amount, maximum = %requirements.amount, "Prepared upto settlement calls");
        Ok(SignedPayload {
            payer: owner,
            target: Some(asset.to_checksum(None)),
            body: calls.encode(),
        })
    }
}

impl<P> SchemeId for Eip155UptoFacilitator<P> {
    fn namespace(&self) -> &str {
        EIP155_NAMESPACE
    }

    fn scheme(&self) -> &str {
        UPTO_SCHEME
    }
}

#[async_trait]
impl<P: ChainRpc> SchemeFacilitator for Eip155UptoFacilitator<P> {
    async fn verify(&self, request: &VerifyRequest) -> Result<Verification, ChainRpcError> {
        let requirements = &request.payment_requirements;
        let accepted = &request.payment_payload.accepted;
        let invalid = |error: PaymentVerificationError| -> Result<Verification, ChainRpcError> {
            Ok(Verification::Invalid { payer: None, error })
        };

        if accepted.scheme != requirements.scheme || requirements.scheme != UPTO_SCHEME {
            return invalid(PaymentVerificationError::UnsupportedScheme);
        }
        if accepted.network != requirements.network {
            return invalid(PaymentVerificationError::NetworkMismatch);
        }
        if requirements.network.namespace != EIP155_NAMESPACE {
            return invalid(PaymentVerificationError::UnsupportedNetwork);
        }
        let Some(provider) = self.providers.by_chain_id(&requirements.network) else {
            return invalid(PaymentVerificationError::UnsupportedNetwork);
        };
        let payload: UptoEvmPayload =
            match serde_json::from_value(request.payment_payload.payload.clone()) {
                Ok(payload) => payload,
                Err(error) => return invalid(error.into()),
            };

        let payer = payload.authorization.owner.to_checksum(None);
        match self
            .check(provider, &payload, requirements, request.settlement.as_ref())
            .await
        {
            Ok(signed) => Ok(Verification::Valid { payer, signed }),
            Err(Rejection::Invalid(error)) => Ok(Verification::Invalid {
                payer: Some(payer),
                error,
            }),
            Err(Rejection::Rpc(error)) => Err(error),
        }
    }

    /// Relays the permit, then the transfer. A permit the node already knows is
    /// not an error; the transfer's reference is returned.
    async fn broadcast(
        &self,
        network: &ChainId,
        signed: &SignedPayload,
    ) -> Result<TransactionRef, ChainRpcError> {
        let provider = self.provider(network)?;
        let calls = SettlementCalls::decode(&signed.body)
            .map_err(|e| ChainRpcError::Rejected(e.to_string()))?;
        let call = |body: &Bytes| SignedPayload {
            payer: signed.payer.clone(),
            target: signed.target.clone(),
            body: hex::encode_prefixed(body),
        };
        match provider.broadcast(&call(&calls.permit)).await {
            Ok(_) | Err(ChainRpcError::Duplicate(_)) => {}
            Err(error) => return Err(error),
        }
        provider.broadcast(&call(&calls.transfer)).await
    }

    async fn wait_for_confirmation(
        &self,
        network: &ChainId,
        tx: &TransactionRef,
        timeout: Duration,
    ) -> Result<ConfirmationStatus, ChainRpcError> {
        self.provider(network)?
            .wait_for_confirmation(tx, timeout)
            .await
    }

    /// Advertises the first signer as `routerAddress`, the spender clients approve.
    fn kinds(&self) -> Vec<SupportedPaymentKind> {
        let mut kinds: Vec<SupportedPaymentKind> = self
            .providers
            .iter()
            .map(|(chain_id, provider)| SupportedPaymentKind {
                t402_version: self.t402_version(),
                scheme: UPTO_SCHEME.to_string(),
                network: chain_id.to_string(),
                extra: provider
                    .signer_addresses()
                    .first()
                    .and_then(|signer| parse_address(signer))
                    .map(|router: Address| {
                        serde_json::json!({ "routerAddress": router.to_checksum(None) })
                    }),
            })
            .collect();
        kinds.sort_by(|a, b| a.network.cmp(&b.network));
        kinds
    }

    fn signers(&self) -> HashMap<String, Vec<String>> {
        self.providers
            .iter()
            .map(|(chain_id, provider)| (chain_id.to_string(), provider.signer_addresses()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upto::types::{PermitAuthorization, PermitSignature};
    use alloy_primitives::B256;
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;
    use crate::facilitator::{Eip155ExactFacilitator, Eip155ExactFamily};
    use std::sync::{Arc, Mutex};
    use t402_types::chain::{ChainIdPattern, ChainProviderOps};
    use t402_types::scheme::{SchemeBundle, Schemes};
    use t402_types::proto::v2::{Accepted, PaymentPayload, T402Version2};
    use t402_types::proto::{AsPaymentProblem, ErrorReason};

    const NOW: u64 = 1_700_000_000;
    const ASSET: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";
    const PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";
    const ROUTER: &str = "0x1111111111111111111111111111111111111111";

    fn fixed_now() -> UnixTimestamp {
        UnixTimestamp::from_secs(NOW)
    }

    struct EvmRpc {
        permit_nonce: u64,
        balance: u64,
        broadcasts: Mutex<Vec<SignedPayload>>,
    }

    impl Default for EvmRpc {
        fn default() -> Self {
            Self {
                permit_nonce: 0,
                balance: 10_000_000,
                broadcasts: Mutex::new(Vec::new()),
            }
        }
    }

    impl ChainProviderOps for EvmRpc {
        fn signer_addresses(&self) -> Vec<String> {
            vec![ROUTER.into()]
        }

        fn chain_id(&self) -> ChainId {
            ChainId::new("eip155", "8453")
        }
    }

    impl ChainRpc for EvmRpc {
        async fn get_sequence_or_block_info(
            &self,
            query: &SequenceQuery,
        ) -> Result<SequenceInfo, ChainRpcError> {
            match query {
                SequenceQuery::PermitNonce { .. } => Ok(SequenceInfo::Seqno(self.permit_nonce)),
                _ => Err(ChainRpcError::Unavailable("unsupported query".into())),
            }
        }

        async fn broadcast(&self, signed: &SignedPayload) -> Result<TransactionRef, ChainRpcError> {
            let mut broadcasts = self.broadcasts.lock().unwrap();
            broadcasts.push(signed.clone());
            Ok(TransactionRef(format!("0x{:064x}", broadcasts.len())))
        }

        async fn wait_for_confirmation(
            &self,
            _tx: &TransactionRef,
            _timeout: Duration,
        ) -> Result<ConfirmationStatus, ChainRpcError> {
            Ok(ConfirmationStatus::Confirmed)
        }

        async fn get_balance(&self, _account: &str, _asset: &str) -> Result<TokenAmount, ChainRpcError> {
            Ok(TokenAmount::from(self.balance))
        }

        async fn is_account_ready(&self, _account: &str) -> Result<bool, ChainRpcError> {
            Ok(true)
        }
    }

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: UPTO_SCHEME.into(),
            network: ChainId::new("eip155", "8453"),
            asset: ASSET.into(),
            amount: TokenAmount::from(5_000_000u64),
            pay_to: PAY_TO.into(),
            max_timeout_seconds: 300,
            extra: Some(serde_json::json!({ "minAmount": "1000", "routerAddress": ROUTER })),
        }
    }

    fn signed_payload(
        signer: &PrivateKeySigner,
        edit: impl FnOnce(&mut PermitAuthorization),
    ) -> UptoEvmPayload {
        let mut authorization = PermitAuthorization {
            owner: signer.address(),
            spender: parse_address(ROUTER).unwrap(),
            value: TokenAmount::from(5_000_000u64),
            deadline: UnixTimestamp::from_secs(NOW + 300),
            nonce: 0,
        };
        edit(&mut authorization);
        let requirements = requirements();
        let (name, version) = domain_name_version(&requirements);
        let domain = eip712_domain(name, version, 8453, parse_address(ASSET).unwrap());
        let hash = authorization.typed_message().eip712_signing_hash(&domain);
        let signature = signer.sign_hash_sync(&hash).unwrap();
        UptoEvmPayload {
            signature: PermitSignature::from_signature(&signature),
            authorization,
            payment_nonce: B256::repeat_byte(9),
        }
    }

    fn request(payload: &UptoEvmPayload, settle: Option<u64>) -> VerifyRequest {
        let requirements = requirements();
        let request = VerifyRequest::new(
            PaymentPayload {
                t402_version: T402Version2,
                accepted: Accepted::from(&requirements),
                payload: serde_json::to_value(payload).unwrap(),
                resource: None,
            },
            requirements,
        );
        match settle {
            Some(amount) => request.with_settlement(Settlement {
                settle_amount: TokenAmount::from(amount),
                usage_details: None,
            }),
            None => request,
        }
    }

    fn facilitator(rpc: EvmRpc) -> Eip155UptoFacilitator<EvmRpc> {
        Eip155UptoFacilitator::new(ChainRegistry::from_providers([rpc])).with_clock(fixed_now)
    }

    fn reason(verification: &Verification) -> Option<ErrorReason> {
        match verification {
            Verification::Valid { .. } => None,
            Verification::Invalid { error, .. } => Some(error.as_payment_problem().reason()),
        }
    }

    #[tokio::test]
    async fn test_settles_actual_usage_below_maximum() {
        let signer = PrivateKeySigner::random();
        let payload = signed_payload(&signer, |_| {});
        let facilitator = facilitator(EvmRpc::default());
        let verification = facilitator.verify(&request(&payload, Some(1_250_000))).await.unwrap();
        let Verification::Valid { payer, signed } = verification else {
            panic!("expected valid");
        };
        assert_eq!(payer, signer.address().to_checksum(None));

        let calls = SettlementCalls::decode(&signed.body).unwrap();
        let permit = permitCall::abi_decode(&calls.permit).unwrap();
        assert_eq!(permit.value, U256::from(5_000_000u64));
        assert_eq!(permit.spender, parse_address(ROUTER).unwrap());
        let transfer = transferFromCall::abi_decode(&calls.transfer).unwrap();
        assert_eq!(transfer.from, signer.address());
        assert_eq!(transfer.to, parse_address(PAY_TO).unwrap());
        assert_eq!(transfer.amount, U256::from(1_250_000u64));
    }

    #[tokio::test]
    async fn test_missing_settlement_charges_maximum() {
        let signer = PrivateKeySigner::random();
        let payload = signed_payload(&signer, |_| {});
        let facilitator = facilitator(EvmRpc::default());
        let verification = facilitator.verify(&request(&payload, None)).await.unwrap();
        let Verification::Valid { signed, .. } = verification else {
            panic!("expected valid");
        };
        let calls = SettlementCalls::decode(&signed.body).unwrap();
        let transfer = transferFromCall::abi_decode(&calls.transfer).unwrap();
        assert_eq!(transfer.amount, U256::from(5_000_000u64));
    }

    #[tokio::test]
    async fn test_settlement_amount_bounds() {
        let signer = PrivateKeySigner::random();
        let payload = signed_payload(&signer, |_| {});
        let facilitator = facilitator(EvmRpc::default());

        for amount in [5_000_001, 999, 0] {
            let verification = facilitator.verify(&request(&payload, Some(amount))).await.unwrap();
            assert_eq!(
                reason(&verification),
                Some(ErrorReason::InvalidSettlementAmount),
                "amount {amount}"
            );
            assert_eq!(verification.payer(), Some(signer.address().to_checksum(None).as_str()));
        }
        for amount in [1000, 5_000_000] {
            let verification = facilitator.verify(&request(&payload, Some(amount))).await.unwrap();
            assert!(verification.is_valid(), "amount {amount}");
        }
    }

    #[tokio::test]
    async fn test_permit_below_maximum_is_insufficient() {
        let signer = PrivateKeySigner::random();
        let payload = signed_payload(&signer, |a| a.value = TokenAmount::from(4_999_999u64));
        let verification = facilitator(EvmRpc::default())
            .verify(&request(&payload, Some(1000)))
            .await
            .unwrap();
        assert_eq!(reason(&verification), Some(ErrorReason::InsufficientAmount));
    }

    #[tokio::test]
    async fn test_spender_must_be_facilitator_signer() {
        let signer = PrivateKeySigner::random();
        let payload = signed_payload(&signer, |a| a.spender = parse_address(PAY_TO).unwrap());
        let verification = facilitator(EvmRpc::default())
            .verify(&request(&payload, None))
            .await
            .unwrap();
        assert_eq!(reason(&verification), Some(ErrorReason::InvalidSignature));
    }

    #[tokio::test]
    async fn test_tampered_permit_fails_recovery() {
        let signer = PrivateKeySigner::random();
        let mut payload = signed_payload(&signer, |_| {});
        payload.authorization.value = TokenAmount::from(50_000_000u64);
        let verification = facilitator(EvmRpc::default())
            .verify(&request(&payload, None))
            .await
            .unwrap();
        assert_eq!(reason(&verification), Some(ErrorReason::InvalidSignature));
    }

    #[tokio::test]
    async fn test_deadline_and_permit_nonce() {
        let signer = PrivateKeySigner::random();
        let close = signed_payload(&signer, |a| a.deadline = UnixTimestamp::from_secs(NOW + 30));
        let verification = facilitator(EvmRpc::default())
            .verify(&request(&close, None))
            .await
            .unwrap();
        assert_eq!(reason(&verification), Some(ErrorReason::AuthorizationExpired));

        let stale = signed_payload(&signer, |a| a.nonce = 2);
        let verification = facilitator(EvmRpc {
            permit_nonce: 3,
            ..Default::default()
        })
        .verify(&request(&stale, None))
        .await
        .unwrap();
        assert_eq!(reason(&verification), Some(ErrorReason::NonceAlreadyUsed));

        let ahead = signed_payload(&signer, |a| a.nonce = 4);
        let verification = facilitator(EvmRpc {
            permit_nonce: 3,
            ..Default::default()
        })
        .verify(&request(&ahead, None))
        .await
        .unwrap();
        assert_eq!(reason(&verification), Some(ErrorReason::InvalidSignature));
    }

    #[tokio::test]
    async fn test_balance_covers_settled_amount_only() {
        let signer = PrivateKeySigner::random();
        let payload = signed_payload(&signer, |_| {});
        let facilitator = facilitator(EvmRpc {
            balance: 2_000_000,
            ..Default::default()
        });
        let verification = facilitator.verify(&request(&payload, Some(2_000_000))).await.unwrap();
        assert!(verification.is_valid());
        let verification = facilitator.verify(&request(&payload, None)).await.unwrap();
        assert_eq!(reason(&verification), Some(ErrorReason::InsufficientFunds));
    }

    #[tokio::test]
    async fn test_exact_payload_is_unsupported_scheme() {
        let signer = PrivateKeySigner::random();
        let payload = signed_payload(&signer, |_| {});
        let mut exact = request(&payload, None);
        exact.payment_requirements.scheme = "exact".into();
        exact.payment_payload.accepted.scheme = "exact".into();
        let verification = facilitator(EvmRpc::default()).verify(&exact).await.unwrap();
        assert_eq!(reason(&verification), Some(ErrorReason::UnsupportedScheme));
    }

    #[tokio::test]
    async fn test_broadcast_relays_permit_then_transfer() {
        let signer = PrivateKeySigner::random();
        let payload = signed_payload(&signer, |_| {});
        let facilitator = facilitator(EvmRpc::default());
        let network = ChainId::new("eip155", "8453");
        let Verification::Valid { signed, .. } = facilitator
            .verify(&request(&payload, Some(10_000)))
            .await
            .unwrap()
        else {
            panic!("expected valid");
        };

        let tx = facilitator.broadcast(&network, &signed).await.unwrap();
        assert_eq!(tx, TransactionRef(format!("0x{:064x}", 2)));

        let (_, rpc) = facilitator.providers().iter().next().unwrap();
        let broadcasts = rpc.broadcasts.lock().unwrap();
        assert_eq!(broadcasts.len(), 2);
        let first = hex::decode(&broadcasts[0].body).unwrap();
        let second = hex::decode(&broadcasts[1].body).unwrap();
        assert_eq!(&first[..4], permitCall::SELECTOR.as_slice());
        assert_eq!(&second[..4], transferFromCall::SELECTOR.as_slice());
        assert_eq!(broadcasts[1].target.as_deref(), Some(ASSET));
    }

    #[test]
    fn test_registered_beside_exact() {
        let rpc = Arc::new(EvmRpc::default());
        let exact = Eip155ExactFacilitator::new(Eip155ExactFamily, ChainRegistry::from_providers([rpc.clone()]));
        let upto = Eip155UptoFacilitator::new(ChainRegistry::from_providers([rpc]));
        let schemes = Schemes::default()
            .and_register_bundle(SchemeBundle {
                scheme: "exact".into(),
                pattern: ChainIdPattern::wildcard("eip155"),
                client: None,
                server: None,
                facilitator: Some(Arc::new(exact)),
            })
            .and_register_bundle(SchemeBundle {
                scheme: UPTO_SCHEME.into(),
                pattern: ChainIdPattern::wildcard("eip155"),
                client: None,
                server: None,
                facilitator: Some(Arc::new(upto)),
            });
        let base = ChainId::new("eip155", "8453");
        let handler = schemes.facilitators.resolve("upto", &base).unwrap();
        assert_eq!(handler.id(), "v2-eip155-upto");
        let handler = schemes.facilitators.resolve("exact", &base).unwrap();
        assert_eq!(handler.id(), "v2-eip155-exact");
    }

    #[test]
    fn test_kinds_advertise_router() {
        let facilitator = facilitator(EvmRpc::default());
        let kinds = facilitator.kinds();
        assert_eq!(kinds.len(), 1);
        assert_eq!(kinds[0].scheme, "upto");
        assert_eq!(kinds[0].network, "eip155:8453");
        assert_eq!(
            kinds[0].extra.as_ref().unwrap()["routerAddress"],
            serde_json::json!(ROUTER)
        );
        assert_eq!(facilitator.id(), "v2-eip155-upto");
    }
}
