//! Facilitator side of the Solana `exact` scheme.
//!
//! The payer signs a transaction whose fee payer is one of the facilitator's
//! accounts, leaving that signature slot empty. Verification reads the
//! `TransferChecked` instruction and makes sure the facilitator is only paying
//! fees. When a fee-payer signer is attached, the adapter fills in its slot
//! before the transaction leaves verification; otherwise the chain provider is
//! expected to co-sign on broadcast.

use solana_pubkey::Pubkey;
use solana_signer::Signer;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use t402_types::chain::{ChainId, SignedPayload};
use t402_types::proto::PaymentVerificationError;
use t402_types::proto::v2::PaymentRequirements;
use t402_types::scheme::{
    Authorization, ExactChainFamily, ExactFacilitator, ReplayToken, VerifyContext,
};
use t402_types::util::TokenAmount;

use crate::types::{ExactSolanaPayload, SOLANA_NAMESPACE, TransactionInt, associated_token_address};

#[derive(Clone, Default)]
pub struct SolanaExactFamily {
    fee_payer: Option<Arc<dyn Signer + Send + Sync>>,
}

impl fmt::Debug for SolanaExactFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolanaExactFamily")
            .field("fee_payer", &self.fee_payer.as_ref().map(|s| s.pubkey()))
            .finish()
    }
}

impl SolanaExactFamily {
    pub fn new() -> Self {
        Self::default()
    }

    /// Co-signs verified transactions whose fee payer is `signer`.
    pub fn with_fee_payer<S: Signer + Send + Sync + 'static>(signer: S) -> Self {
        let signer: Arc<dyn Signer + Send + Sync> = Arc::new(signer);
        Self {
            fee_payer: Some(signer),
        }
    }
}

pub type SolanaExactFacilitator<P> = ExactFacilitator<SolanaExactFamily, P>;

fn decode(payload: &ExactSolanaPayload) -> Result<TransactionInt, PaymentVerificationError> {
    Ok(TransactionInt::from_base64(&payload.transaction)?)
}

fn invalid_signature(reason: &str) -> PaymentVerificationError {
    PaymentVerificationError::InvalidSignature(reason.to_string())
}

impl ExactChainFamily for SolanaExactFamily {
    type Payload = ExactSolanaPayload;

    fn namespace(&self) -> &'static str {
        SOLANA_NAMESPACE
    }

    fn authorization(
        &self,
        payload: &ExactSolanaPayload,
        requirements: &PaymentRequirements,
    ) -> Result<Authorization, PaymentVerificationError> {
        let tx = decode(payload)?;
        let transfer = tx.transfer_checked()?;
        // The instruction names a token account; it counts as paying `payTo` when it
        // is that owner's associated account for the mint.
        let recipient = Pubkey::from_str(&requirements.pay_to)
            .ok()
            .filter(|owner| {
                associated_token_address(owner, &transfer.token_program, &transfer.mint)
                    == transfer.destination
            })
            .map(|_| requirements.pay_to.clone())
            .unwrap_or_else(|| transfer.destination.to_string());
        Ok(Authorization {
            payer: transfer.authority.to_string(),
            recipient,
            asset: transfer.mint.to_string(),
            amount: TokenAmount::from(transfer.amount),
            valid_after: None,
            valid_before: None,
            replay: ReplayToken::ChainEnforced,
        })
    }

    fn verify_signature(
        &self,
        payload: &ExactSolanaPayload,
        authorization: &Authorization,
        ctx: &VerifyContext<'_>,
    ) -> Result<(), PaymentVerificationError> {
        let tx = decode(payload)?;
        let fee_payer = tx
            .fee_payer()
            .ok_or_else(|| invalid_signature("transaction has no fee payer"))?
            .to_string();
        if !ctx.signers.iter().any(|signer| *signer == fee_payer) {
            return Err(invalid_signature("fee payer is not a facilitator signer"));
        }
        if let Some(expected) = ctx.requirements.extra_str("feePayer")
            && expected != fee_payer
        {
            return Err(invalid_signature("fee payer differs from the advertised one"));
        }
        if authorization.payer == fee_payer {
            return Err(invalid_signature("fee payer must not authorize the transfer"));
        }
        let fee_payer_key = tx
            .fee_payer()
            .copied()
            .ok_or_else(|| invalid_signature("transaction has no fee payer"))?;
        if tx.references_account(&fee_payer_key) {
            return Err(invalid_signature("fee payer is used by an instruction"));
        }
        let authority = Pubkey::from_str(&authorization.payer)
            .map_err(|e| PaymentVerificationError::InvalidFormat(e.to_string()))?;
        if !tx.is_signed_by(&authority) {
            return Err(invalid_signature("transfer authority did not sign the transaction"));
        }
        Ok(())
    }

    fn signed_payload(
        &self,
        payload: &ExactSolanaPayload,
        authorization: &Authorization,
    ) -> Result<SignedPayload, PaymentVerificationError> {
        let tx = decode(payload)?;
        let body = match &self.fee_payer {
            Some(signer) if tx.fee_payer() == Some(&signer.pubkey()) => {
                tx.sign_with(signer.as_ref())?.as_base64()?
            }
            _ => payload.transaction.trim().to_string(),
        };
        Ok(SignedPayload {
            payer: authorization.payer.clone(),
            target: None,
            body,
        })
    }

    fn kind_extra(&self, _chain_id: &ChainId, signers: &[String]) -> Option<serde_json::Value> {
        let fee_payer = signers.first()?;
        Some(serde_json::json!({ "feePayer": fee_payer }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::transfer_transaction;
    use solana_keypair::Keypair;
    use std::time::Duration;
    use t402_types::chain::{
        ChainProviderOps, ChainRegistry, ChainRpc, ChainRpcError, ConfirmationStatus,
        SequenceInfo, SequenceQuery, TransactionRef,
    };
    use t402_types::proto::v2::{Accepted, PaymentPayload, T402Version2, VerifyRequest};
    use t402_types::proto::{AsPaymentProblem, ErrorReason};
    use t402_types::scheme::{SchemeFacilitator, Verification};

    const MINT: Pubkey = Pubkey::new_from_array([3; 32]);
    const PAY_TO: Pubkey = Pubkey::new_from_array([2; 32]);

    struct SolanaRpc {
        fee_payer: Pubkey,
        balance: u64,
    }

    impl ChainProviderOps for SolanaRpc {
        fn signer_addresses(&self) -> Vec<String> {
            vec![self.fee_payer.to_string()]
        }

        fn chain_id(&self) -> ChainId {
            ChainId::new("solana", "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp")
        }
    }

    impl ChainRpc for SolanaRpc {
        async fn get_sequence_or_block_info(
            &self,
            _query: &SequenceQuery,
        ) -> Result<SequenceInfo, ChainRpcError> {
            Err(ChainRpcError::Unavailable("not used on solana".into()))
        }

        async fn broadcast(&self, _signed: &SignedPayload) -> Result<TransactionRef, ChainRpcError> {
            Ok(TransactionRef("sig".into()))
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

    fn requirements(fee_payer: &Pubkey) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: ChainId::new("solana", "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp"),
            asset: MINT.to_string(),
            amount: TokenAmount::from(10_000u64),
            pay_to: PAY_TO.to_string(),
            max_timeout_seconds: 60,
            extra: Some(serde_json::json!({ "feePayer": fee_payer.to_string() })),
        }
    }

    fn request(tx: &TransactionInt, fee_payer: &Pubkey) -> VerifyRequest {
        let requirements = requirements(fee_payer);
        let payload = ExactSolanaPayload {
            transaction: tx.as_base64().unwrap(),
        };
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

    fn facilitator(family: SolanaExactFamily, fee_payer: Pubkey) -> SolanaExactFacilitator<SolanaRpc> {
        let rpc = SolanaRpc {
            fee_payer,
            balance: 1_000_000,
        };
        ExactFacilitator::new(family, ChainRegistry::from_providers([rpc]))
    }

    fn reason(verification: &Verification) -> Option<ErrorReason> {
        match verification {
            Verification::Valid { .. } => None,
            Verification::Invalid { error, .. } => Some(error.as_payment_problem().reason()),
        }
    }

    #[tokio::test]
    async fn test_valid_transfer_is_co_signed() {
        let payer = Keypair::new();
        let fee_payer = Keypair::new();
        let fee_payer_key = fee_payer.pubkey();
        let tx = transfer_transaction(&payer, &fee_payer_key, &PAY_TO, &MINT, 10_000);
        let facilitator = facilitator(SolanaExactFamily::with_fee_payer(fee_payer), fee_payer_key);

        let verification = facilitator.verify(&request(&tx, &fee_payer_key)).await.unwrap();
        let Verification::Valid { payer: who, signed } = verification else {
            panic!("expected valid");
        };
        assert_eq!(who, payer.pubkey().to_string());
        let relayed = TransactionInt::from_base64(&signed.body).unwrap();
        assert!(relayed.is_signed_by(&fee_payer_key));
        assert!(relayed.is_signed_by(&payer.pubkey()));
    }

    #[tokio::test]
    async fn test_without_co_signer_body_is_relayed_as_is() {
        let payer = Keypair::new();
        let fee_payer = Pubkey::new_from_array([9; 32]);
        let tx = transfer_transaction(&payer, &fee_payer, &PAY_TO, &MINT, 10_000);
        let facilitator = facilitator(SolanaExactFamily::new(), fee_payer);
        let verification = facilitator.verify(&request(&tx, &fee_payer)).await.unwrap();
        let Verification::Valid { signed, .. } = verification else {
            panic!("expected valid");
        };
        assert_eq!(signed.body, tx.as_base64().unwrap());
    }

    #[tokio::test]
    async fn test_wrong_destination_is_recipient_mismatch() {
        let payer = Keypair::new();
        let fee_payer = Pubkey::new_from_array([9; 32]);
        let elsewhere = Pubkey::new_from_array([4; 32]);
        let tx = transfer_transaction(&payer, &fee_payer, &elsewhere, &MINT, 10_000);
        let verification = facilitator(SolanaExactFamily::new(), fee_payer)
            .verify(&request(&tx, &fee_payer))
            .await
            .unwrap();
        assert_eq!(reason(&verification), Some(ErrorReason::RecipientMismatch));
    }

    #[tokio::test]
    async fn test_amount_and_mint() {
        let payer = Keypair::new();
        let fee_payer = Pubkey::new_from_array([9; 32]);
        let facilitator = facilitator(SolanaExactFamily::new(), fee_payer);

        let short = transfer_transaction(&payer, &fee_payer, &PAY_TO, &MINT, 9_999);
        let verification = facilitator.verify(&request(&short, &fee_payer)).await.unwrap();
        assert_eq!(reason(&verification), Some(ErrorReason::InsufficientAmount));

        let other_mint = Pubkey::new_from_array([5; 32]);
        let wrong = transfer_transaction(&payer, &fee_payer, &PAY_TO, &other_mint, 10_000);
        let verification = facilitator.verify(&request(&wrong, &fee_payer)).await.unwrap();
        // The destination ATA depends on the mint too.
        assert_eq!(reason(&verification), Some(ErrorReason::RecipientMismatch));
    }

    #[tokio::test]
    async fn test_fee_payer_rules() {
        let payer = Keypair::new();
        let ours = Pubkey::new_from_array([9; 32]);
        let facilitator = facilitator(SolanaExactFamily::new(), ours);

        let foreign = Pubkey::new_from_array([8; 32]);
        let tx = transfer_transaction(&payer, &foreign, &PAY_TO, &MINT, 10_000);
        let verification = facilitator.verify(&request(&tx, &foreign)).await.unwrap();
        assert_eq!(reason(&verification), Some(ErrorReason::InvalidSignature));

        // Fee payer draining its own tokens through the transfer.
        let self_paying = Keypair::new();
        let facilitator = self::facilitator(SolanaExactFamily::new(), self_paying.pubkey());
        let tx = transfer_transaction(&self_paying, &self_paying.pubkey(), &PAY_TO, &MINT, 10_000);
        let verification = facilitator
            .verify(&request(&tx, &self_paying.pubkey()))
            .await
            .unwrap();
        assert_eq!(reason(&verification), Some(ErrorReason::InvalidSignature));
    }

    #[tokio::test]
    async fn test_payer_signature_required() {
        let payer = Keypair::new();
        let fee_payer = Pubkey::new_from_array([9; 32]);
        let tx = transfer_transaction(&payer, &fee_payer, &PAY_TO, &MINT, 10_000);
        let mut raw = tx.inner().clone();
        raw.signatures[1] = solana_signature::Signature::default();
        let verification = facilitator(SolanaExactFamily::new(), fee_payer)
            .verify(&request(&TransactionInt::new(raw), &fee_payer))
            .await
            .unwrap();
        assert_eq!(reason(&verification), Some(ErrorReason::InvalidSignature));
    }

    #[test]
    fn test_kind_extra_advertises_fee_payer() {
        let fee_payer = Pubkey::new_from_array([9; 32]);
        let kinds = facilitator(SolanaExactFamily::new(), fee_payer).kinds();
        assert_eq!(kinds[0].extra.as_ref().unwrap()["feePayer"], fee_payer.to_string());
    }
}
