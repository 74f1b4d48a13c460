//! Wire format for t402 messages.
//!
//! All messages are JSON with camelCase field names. Only protocol version 2 is
//! spoken; see [`v2`] for payloads, requirements and the verify/settle envelopes.
//!
//! - [`SupportedPaymentKind`] / [`SupportedResponse`] - facilitator capabilities
//! - [`PaymentVerificationError`] - why a payment was rejected
//! - [`ErrorReason`] - the machine-readable reason sent back to callers

use serde::{Deserialize, Serialize};
use serde_with::{VecSkipError, serde_as};
use std::collections::HashMap;

use crate::chain::ChainId;

pub mod v2;

/// One payment method a facilitator can verify and settle.
///
/// ```json
/// { "t402Version": 2, "scheme": "exact", "network": "ton:mainnet" }
/// ```
///
/// Immutable once published.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedPaymentKind {
    pub t402_version: u8,
    pub scheme: String,
    pub network: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// Body of the facilitator's `supported` answer.
///
/// `signers` is keyed by network or family wildcard (`eip155:*`); use
/// [`SupportedResponse::signers_for`] to resolve a concrete network.
#[serde_as]
#[derive(Clone, Default, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedResponse {
    #[serde_as(as = "VecSkipError<_>")]
    pub kinds: Vec<SupportedPaymentKind>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub signers: HashMap<String, Vec<String>>,
}

impl SupportedResponse {
    /// Signer addresses for a network: the exact key first, then `family:*`.
    pub fn signers_for(&self, chain_id: &ChainId) -> Option<&[String]> {
        self.signers
            .get(&chain_id.to_string())
            .or_else(|| self.signers.get(&chain_id.wildcard_key()))
            .map(Vec::as_slice)
    }

    /// Kinds advertised for a scheme on a network.
    pub fn kind_for(&self, scheme: &str, chain_id: &ChainId) -> Option<&SupportedPaymentKind> {
        let network = chain_id.to_string();
        self.kinds
            .iter()
            .find(|kind| kind.scheme == scheme && kind.network == network)
            .or_else(|| {
                let wildcard = chain_id.wildcard_key();
                self.kinds
                    .iter()
                    .find(|kind| kind.scheme == scheme && kind.network == wildcard)
            })
    }
}

/// Why a payment was judged invalid.
///
/// These are expected outcomes of verification, reported with `isValid=false`.
/// Infrastructure failures are not represented here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentVerificationError {
    #[error("Unsupported scheme")]
    UnsupportedScheme,
    #[error("Unsupported network")]
    UnsupportedNetwork,
    #[error("Accepted network does not match the payment requirements")]
    NetworkMismatch,
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Authorized amount is below the required amount")]
    InsufficientAmount,
    /// The amount to settle is outside what the authorization and requirements allow.
    #[error("Invalid settlement amount: {0}")]
    InvalidSettlementAmount(String),
    #[error("Payment recipient does not match the payment requirements")]
    RecipientMismatch,
    #[error("Payment asset does not match the payment requirements")]
    AssetMismatch,
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Payment authorization is not yet valid")]
    NotYetValid,
    #[error("Payment authorization is expired")]
    Expired,
    #[error("Authorization nonce was already used")]
    NonceAlreadyUsed,
    #[error("Seqno {got} was already used, wallet is at {expected}")]
    SeqnoAlreadyUsed { expected: u64, got: u64 },
    #[error("Seqno {got} is ahead of wallet seqno {expected}")]
    SeqnoTooHigh { expected: u64, got: u64 },
    #[error("Onchain balance is not enough to cover the payment amount")]
    InsufficientFunds,
    #[error("Jetton balance is not enough to cover the payment amount")]
    InsufficientJettonBalance,
    #[error("Wallet contract is not deployed")]
    WalletNotDeployed,
    #[error("Account is not activated")]
    AccountNotActivated,
}

impl AsPaymentProblem for PaymentVerificationError {
    fn as_payment_problem(&self) -> PaymentProblem {
        let reason = match self {
            PaymentVerificationError::UnsupportedScheme => ErrorReason::UnsupportedScheme,
            PaymentVerificationError::UnsupportedNetwork => ErrorReason::UnsupportedNetwork,
            PaymentVerificationError::NetworkMismatch => ErrorReason::NetworkMismatch,
            PaymentVerificationError::InvalidFormat(_) => ErrorReason::InvalidFormat,
            PaymentVerificationError::InsufficientAmount => ErrorReason::InsufficientAmount,
            PaymentVerificationError::InvalidSettlementAmount(_) => {
                ErrorReason::InvalidSettlementAmount
            }
            PaymentVerificationError::RecipientMismatch => ErrorReason::RecipientMismatch,
            PaymentVerificationError::AssetMismatch => ErrorReason::AssetMismatch,
            PaymentVerificationError::InvalidSignature(_) => ErrorReason::InvalidSignature,
            PaymentVerificationError::NotYetValid => ErrorReason::AuthorizationNotYetValid,
            PaymentVerificationError::Expired => ErrorReason::AuthorizationExpired,
            PaymentVerificationError::NonceAlreadyUsed => ErrorReason::NonceAlreadyUsed,
            PaymentVerificationError::SeqnoAlreadyUsed { .. } => ErrorReason::SeqnoAlreadyUsed,
            PaymentVerificationError::SeqnoTooHigh { .. } => ErrorReason::SeqnoTooHigh,
            PaymentVerificationError::InsufficientFunds => ErrorReason::InsufficientFunds,
            PaymentVerificationError::InsufficientJettonBalance => {
                ErrorReason::InsufficientJettonBalance
            }
            PaymentVerificationError::WalletNotDeployed => ErrorReason::WalletNotDeployed,
            PaymentVerificationError::AccountNotActivated => ErrorReason::AccountNotActivated,
        };
        PaymentProblem::new(reason, self.to_string())
    }
}

impl From<serde_json::Error> for PaymentVerificationError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidFormat(value.to_string())
    }
}

/// Machine-readable failure reasons, snake_case on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    UnsupportedScheme,
    UnsupportedNetwork,
    NetworkMismatch,
    InvalidFormat,
    InsufficientAmount,
    InvalidSettlementAmount,
    RecipientMismatch,
    AssetMismatch,
    InvalidSignature,
    AuthorizationNotYetValid,
    AuthorizationExpired,
    NonceAlreadyUsed,
    SeqnoAlreadyUsed,
    SeqnoTooHigh,
    InsufficientFunds,
    InsufficientJettonBalance,
    WalletNotDeployed,
    AccountNotActivated,
    /// Rejected by the local replay cache.
    DuplicateSettlement,
    /// Rejected by the node as already known.
    DuplicateTransaction,
    TransactionFailed,
    SettlementTimeout,
    SettlementCancelled,
    UnexpectedError,
}

impl ErrorReason {
    /// Reasons that say the authorization itself was already consumed.
    pub fn is_replay(&self) -> bool {
        matches!(
            self,
            ErrorReason::NonceAlreadyUsed
                | ErrorReason::SeqnoAlreadyUsed
                | ErrorReason::DuplicateSettlement
                | ErrorReason::DuplicateTransaction
        )
    }
}

/// Converts an error into a reason plus human-readable details.
pub trait AsPaymentProblem {
    fn as_payment_problem(&self) -> PaymentProblem;
}

pub struct PaymentProblem {
    reason: ErrorReason,
    details: String,
}

impl PaymentProblem {
    pub fn new(reason: ErrorReason, details: String) -> Self {
        Self { reason, details }
    }

    pub fn reason(&self) -> ErrorReason {
        self.reason
    }

    pub fn details(&self) -> &str {
        &self.details
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_reason_snake_case() {
        let json = serde_json::to_string(&ErrorReason::InsufficientJettonBalance).unwrap();
        assert_eq!(json, "\"insufficient_jetton_balance\"");
        let json = serde_json::to_string(&ErrorReason::AuthorizationExpired).unwrap();
        assert_eq!(json, "\"authorization_expired\"");
        let json = serde_json::to_string(&ErrorReason::InvalidSettlementAmount).unwrap();
        assert_eq!(json, "\"invalid_settlement_amount\"");
    }

    #[test]
    fn test_seqno_errors_map_to_distinct_reasons() {
        let low = PaymentVerificationError::SeqnoAlreadyUsed {
            expected: 5,
            got: 4,
        };
        let high = PaymentVerificationError::SeqnoTooHigh {
            expected: 5,
            got: 6,
        };
        assert_eq!(low.as_payment_problem().reason(), ErrorReason::SeqnoAlreadyUsed);
        assert_eq!(high.as_payment_problem().reason(), ErrorReason::SeqnoTooHigh);
    }

    #[test]
    fn test_signers_for_prefers_exact_key() {
        let mut response = SupportedResponse::default();
        response
            .signers
            .insert("eip155:*".into(), vec!["0xWildcard".into()]);
        response
            .signers
            .insert("eip155:8453".into(), vec!["0xExact".into()]);

        let base = ChainId::new("eip155", "8453");
        let arbitrum = ChainId::new("eip155", "42161");
        assert_eq!(response.signers_for(&base).unwrap(), ["0xExact".to_string()]);
        assert_eq!(
            response.signers_for(&arbitrum).unwrap(),
            ["0xWildcard".to_string()]
        );
        assert!(response.signers_for(&ChainId::new("ton", "mainnet")).is_none());
    }

    #[test]
    fn test_supported_skips_malformed_kinds() {
        let json = r#"{
            "kinds": [
                {"t402Version": 2, "scheme": "exact", "network": "ton:mainnet"},
                {"scheme": 7}
            ],
            "signers": {}
        }"#;
        let response: SupportedResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.kinds.len(), 1);
        assert!(response.extensions.is_empty());
    }
}
