//! Facilitator side of the TRON `exact` scheme.
//!
//! The payer hands over a fully signed TRC-20 `transfer` transaction. The
//! facilitator checks that it moves the authorized amount to `payTo` and relays
//! it unchanged. TRON rejects a transaction past its expiration or with a stale
//! reference block, so there is no separate nonce to track.

use t402_types::chain::{ChainId, SignedPayload};
use t402_types::proto::PaymentVerificationError;
use t402_types::proto::v2::PaymentRequirements;
use t402_types::scheme::{
    Authorization, ExactChainFamily, ExactFacilitator, ReplayToken, VerifyContext,
};
use t402_types::timestamp::UnixTimestamp;

use crate::address::{TronAddress, addresses_equal};
use crate::types::{ExactTronPayload, SignedTransaction, TRON_NAMESPACE, TransactionError};

#[derive(Debug, Clone, Copy, Default)]
pub struct TronExactFamily;

pub type TronExactFacilitator<P> = ExactFacilitator<TronExactFamily, P>;

fn parse_address(field: &str, value: &str) -> Result<TronAddress, PaymentVerificationError> {
    value
        .parse()
        .map_err(|e| PaymentVerificationError::InvalidFormat(format!("{field}: {e}")))
}

impl ExactChainFamily for TronExactFamily {
    type Payload = ExactTronPayload;

    fn namespace(&self) -> &'static str {
        TRON_NAMESPACE
    }

    fn authorization(
        &self,
        payload: &ExactTronPayload,
        _requirements: &PaymentRequirements,
    ) -> Result<Authorization, PaymentVerificationError> {
        let authorization = &payload.authorization;
        parse_address("from", &authorization.from)?;
        parse_address("to", &authorization.to)?;
        parse_address("contractAddress", &authorization.contract_address)?;
        if let Err(TransactionError::Hex) = SignedTransaction::decode(&payload.signed_transaction) {
            return Err(PaymentVerificationError::InvalidFormat(
                TransactionError::Hex.to_string(),
            ));
        }
        if authorization.timestamp > authorization.expiration {
            return Err(PaymentVerificationError::InvalidFormat(
                "transaction timestamp is after its expiration".into(),
            ));
        }
        Ok(Authorization {
            payer: authorization.from.clone(),
            recipient: authorization.to.clone(),
            asset: authorization.contract_address.clone(),
            amount: authorization.amount,
            valid_after: None,
            valid_before: Some(UnixTimestamp::from_millis(authorization.expiration)),
            replay: ReplayToken::ChainEnforced,
        })
    }

    fn same_address(&self, a: &str, b: &str) -> bool {
        addresses_equal(a, b)
    }

    fn verify_signature(
        &self,
        payload: &ExactTronPayload,
        authorization: &Authorization,
        _ctx: &VerifyContext<'_>,
    ) -> Result<(), PaymentVerificationError> {
        let tx = SignedTransaction::decode(&payload.signed_transaction)
            .map_err(|e| PaymentVerificationError::InvalidSignature(e.to_string()))?;
        if !tx.is_signed() {
            return Err(PaymentVerificationError::InvalidSignature(
                "transaction signature is empty".into(),
            ));
        }
        let to = parse_address("to", &authorization.recipient)?;
        if !tx.carries_transfer(&to, authorization.amount) {
            return Err(PaymentVerificationError::InvalidSignature(
                "signed transaction does not carry the authorized transfer".into(),
            ));
        }
        Ok(())
    }

    fn signed_payload(
        &self,
        payload: &ExactTronPayload,
        authorization: &Authorization,
    ) -> Result<SignedPayload, PaymentVerificationError> {
        Ok(SignedPayload {
            payer: authorization.payer.clone(),
            target: Some(authorization.asset.clone()),
            body: payload.signed_transaction.trim().to_string(),
        })
    }

    fn not_ready_reason(&self) -> Option<PaymentVerificationError> {
        Some(PaymentVerificationError::AccountNotActivated)
    }

    fn kind_extra(&self, chain_id: &ChainId, _signers: &[String]) -> Option<serde_json::Value> {
        let asset = t402_types::networks::default_stablecoin(chain_id)?;
        Some(serde_json::json!({
            "defaultAsset": asset.address,
            "symbol": asset.symbol,
            "decimals": asset.decimals,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExactTronAuthorization, SIGNATURE_LEN, trc20_transfer_call};
    use std::time::Duration;
    use t402_types::chain::{
        ChainProviderOps, ChainRegistry, ChainRpc, ChainRpcError, ConfirmationStatus,
        SequenceInfo, SequenceQuery, TransactionRef,
    };
    use t402_types::proto::v2::{Accepted, PaymentPayload, T402Version2, VerifyRequest};
    use t402_types::proto::{AsPaymentProblem, ErrorReason};
    use t402_types::scheme::{SchemeFacilitator, Verification};
    use t402_types::util::TokenAmount;

    const NOW: u64 = 1_700_000_000;
    const USDT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

    fn fixed_now() -> UnixTimestamp {
        UnixTimestamp::from_secs(NOW)
    }

    fn account(byte: u8) -> String {
        TronAddress::from_account_id([byte; 20]).to_string()
    }

    struct TronRpc {
        balance: u64,
        activated: bool,
        sequence_calls: std::sync::atomic::AtomicUsize,
    }

    impl Default for TronRpc {
        fn default() -> Self {
            Self {
                balance: 10_000_000,
                activated: true,
                sequence_calls: Default::default(),
            }
        }
    }

    impl ChainProviderOps for TronRpc {
        fn signer_addresses(&self) -> Vec<String> {
            vec![account(9)]
        }

        fn chain_id(&self) -> ChainId {
            ChainId::new("tron", "mainnet")
        }
    }

    impl ChainRpc for TronRpc {
        async fn get_sequence_or_block_info(
            &self,
            _query: &SequenceQuery,
        ) -> Result<SequenceInfo, ChainRpcError> {
            self.sequence_calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(ChainRpcError::Unavailable("not used on tron".into()))
        }

        async fn broadcast(&self, _signed: &SignedPayload) -> Result<TransactionRef, ChainRpcError> {
            Ok(TransactionRef("txid".into()))
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
            Ok(self.activated)
        }
    }

    fn signed_transaction(to: &str, amount: u64, signature: u8) -> String {
        let to: TronAddress = to.parse().unwrap();
        let mut bytes = vec![0x0a, 0x02, 0xab, 0x12];
        bytes.extend_from_slice(&trc20_transfer_call(&to, TokenAmount::from(amount)));
        bytes.extend_from_slice(&[signature; SIGNATURE_LEN]);
        hex::encode(bytes)
    }

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: ChainId::new("tron", "mainnet"),
            asset: USDT.into(),
            amount: TokenAmount::from(1_000_000u64),
            pay_to: account(2),
            max_timeout_seconds: 300,
            extra: None,
        }
    }

    fn request(edit: impl FnOnce(&mut ExactTronPayload)) -> VerifyRequest {
        let mut payload = ExactTronPayload {
            signed_transaction: signed_transaction(&account(2), 1_000_000, 0x11),
            authorization: ExactTronAuthorization {
                from: account(1),
                to: account(2),
                contract_address: USDT.into(),
                amount: TokenAmount::from(1_000_000u64),
                expiration: (NOW + 60) * 1000,
                ref_block_bytes: "ab12".into(),
                ref_block_hash: "0011223344556677".into(),
                timestamp: NOW * 1000,
            },
        };
        edit(&mut payload);
        let requirements = requirements();
        VerifyRequest::new(
            PaymentPayload {
                t402_version: T402Version2,
                accepted: Accepted::from(&requirements),
                payload: serde_json::to_value(payload).unwrap(),
                resource: None,
            },
            requirements,
        )
    }

    fn facilitator(rpc: TronRpc) -> TronExactFacilitator<TronRpc> {
        ExactFacilitator::new(TronExactFamily, ChainRegistry::from_providers([rpc])).with_clock(fixed_now)
    }

    fn reason(verification: &Verification) -> Option<ErrorReason> {
        match verification {
            Verification::Valid { .. } => None,
            Verification::Invalid { error, .. } => Some(error.as_payment_problem().reason()),
        }
    }

    #[tokio::test]
    async fn test_valid_transfer_skips_replay_query() {
        let facilitator = facilitator(TronRpc::default());
        let verification = facilitator.verify(&request(|_| {})).await.unwrap();
        match &verification {
            Verification::Valid { payer, signed } => {
                assert_eq!(payer, &account(1));
                assert_eq!(signed.target.as_deref(), Some(USDT));
            }
            other => panic!("expected valid, got {other:?}"),
        }
        let (_, rpc) = facilitator.providers().iter().next().unwrap();
        assert_eq!(rpc.sequence_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_transaction_must_match_authorization() {
        let facilitator = facilitator(TronRpc::default());

        let unsigned = request(|p| p.signed_transaction = signed_transaction(&account(2), 1_000_000, 0));
        let verification = facilitator.verify(&unsigned).await.unwrap();
        assert_eq!(reason(&verification), Some(ErrorReason::InvalidSignature));

        let other_amount = request(|p| p.signed_transaction = signed_transaction(&account(2), 1, 0x11));
        let verification = facilitator.verify(&other_amount).await.unwrap();
        assert_eq!(reason(&verification), Some(ErrorReason::InvalidSignature));

        let truncated = request(|p| p.signed_transaction = "0a02".into());
        let verification = facilitator.verify(&truncated).await.unwrap();
        assert_eq!(reason(&verification), Some(ErrorReason::InvalidSignature));

        let not_hex = request(|p| p.signed_transaction = "not-hex".into());
        let verification = facilitator.verify(&not_hex).await.unwrap();
        assert_eq!(reason(&verification), Some(ErrorReason::InvalidFormat));
    }

    #[tokio::test]
    async fn test_expiration_is_milliseconds() {
        let facilitator = facilitator(TronRpc::default());
        let close = request(|p| p.authorization.expiration = (NOW + 30) * 1000);
        let verification = facilitator.verify(&close).await.unwrap();
        assert_eq!(reason(&verification), Some(ErrorReason::AuthorizationExpired));

        let ok = request(|p| p.authorization.expiration = (NOW + 31) * 1000);
        let verification = facilitator.verify(&ok).await.unwrap();
        assert!(verification.is_valid());
    }

    fn mid_second_now() -> UnixTimestamp {
        UnixTimestamp::from_millis(NOW * 1000 + 500)
    }

    #[tokio::test]
    async fn test_expiration_grace_has_millisecond_precision() {
        let now_ms = NOW * 1000 + 500;
        let facilitator = facilitator(TronRpc::default()).with_clock(mid_second_now);

        let at_grace = request(|p| p.authorization.expiration = now_ms + 30_000);
        let verification = facilitator.verify(&at_grace).await.unwrap();
        assert_eq!(reason(&verification), Some(ErrorReason::AuthorizationExpired));

        let past_grace = request(|p| p.authorization.expiration = now_ms + 30_001);
        let verification = facilitator.verify(&past_grace).await.unwrap();
        assert!(verification.is_valid());
    }

    #[tokio::test]
    async fn test_balance_and_activation() {
        let poor = facilitator(TronRpc {
            balance: 999_999,
            ..Default::default()
        });
        let verification = poor.verify(&request(|_| {})).await.unwrap();
        assert_eq!(reason(&verification), Some(ErrorReason::InsufficientFunds));

        let inactive = facilitator(TronRpc {
            activated: false,
            ..Default::default()
        });
        let verification = inactive.verify(&request(|_| {})).await.unwrap();
        assert_eq!(reason(&verification), Some(ErrorReason::AccountNotActivated));
    }

    #[tokio::test]
    async fn test_malformed_addresses() {
        let facilitator = facilitator(TronRpc::default());
        let evm_sender = request(|p| p.authorization.from = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C".into());
        let verification = facilitator.verify(&evm_sender).await.unwrap();
        assert_eq!(reason(&verification), Some(ErrorReason::InvalidFormat));
        assert_eq!(verification.payer(), None);
    }

    #[test]
    fn test_kind_extra_names_default_asset() {
        let kinds = facilitator(TronRpc::default()).kinds();
        let extra = kinds[0].extra.as_ref().unwrap();
        assert_eq!(extra["defaultAsset"], USDT);
        assert_eq!(extra["decimals"], 6);
    }
}
