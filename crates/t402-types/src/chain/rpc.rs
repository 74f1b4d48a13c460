use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::chain::ChainProviderOps;
use crate::errors::T402ErrorCode;
use crate::util::TokenAmount;

/// What to ask the chain about replay state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceQuery {
    /// Current sequence number of an account (TON wallet seqno).
    AccountSeqno { account: String },
    /// Whether an EIP-3009 style authorization nonce was already consumed.
    AuthorizationNonce {
        authorizer: String,
        asset: String,
        nonce: String,
    },
    /// Current EIP-2612 permit nonce of `owner` on the token contract, answered
    /// with [`SequenceInfo::Seqno`].
    PermitNonce { owner: String, asset: String },
    /// Latest block, for families that reference recent blocks.
    LatestBlock,
}

/// Answer to a [`SequenceQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceInfo {
    Seqno(u64),
    NonceUsed(bool),
    Block { number: u64, hash: String },
}

/// An already-signed payload ready to be relayed.
///
/// `body` is family-encoded (calldata hex, BOC base64, transaction hex or base64).
/// `target` is the contract or account the body is addressed to, when the family
/// needs one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPayload {
    pub payer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub body: String,
}

/// Chain-native reference to a broadcast transaction (hash, signature, message hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionRef(pub String);

impl TransactionRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TransactionRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Confirmed,
    Failed(String),
    /// Still not final when the wait elapsed.
    Pending,
}

/// Failures of the injected chain capability.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainRpcError {
    /// Node unreachable or returned a transport-level error.
    #[error("RPC unavailable: {0}")]
    Unavailable(String),
    #[error("RPC call timed out")]
    Timeout,
    /// The node refused the transaction.
    #[error("Transaction rejected: {0}")]
    Rejected(String),
    /// The node already knows this transaction.
    #[error("Duplicate transaction {0}")]
    Duplicate(TransactionRef),
}

impl ChainRpcError {
    pub fn code(&self) -> T402ErrorCode {
        match self {
            ChainRpcError::Unavailable(_) | ChainRpcError::Timeout => T402ErrorCode::RpcUnavailable,
            ChainRpcError::Rejected(_) => T402ErrorCode::TransactionFailed,
            ChainRpcError::Duplicate(_) => T402ErrorCode::DuplicatePayment,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

/// Per-chain capability injected into the facilitator.
///
/// Adapters for concrete node APIs live outside this workspace. Every method maps
/// to a single chain interaction; none of them retries internally.
pub trait ChainRpc: ChainProviderOps + Send + Sync {
    fn get_sequence_or_block_info(
        &self,
        query: &SequenceQuery,
    ) -> impl Future<Output = Result<SequenceInfo, ChainRpcError>> + Send;

    fn broadcast(
        &self,
        signed: &SignedPayload,
    ) -> impl Future<Output = Result<TransactionRef, ChainRpcError>> + Send;

    fn wait_for_confirmation(
        &self,
        tx: &TransactionRef,
        timeout: Duration,
    ) -> impl Future<Output = Result<ConfirmationStatus, ChainRpcError>> + Send;

    fn get_balance(
        &self,
        account: &str,
        asset: &str,
    ) -> impl Future<Output = Result<TokenAmount, ChainRpcError>> + Send;

    fn is_account_ready(
        &self,
        account: &str,
    ) -> impl Future<Output = Result<bool, ChainRpcError>> + Send;
}

impl<T: ChainRpc> ChainRpc for Arc<T> {
    fn get_sequence_or_block_info(
        &self,
        query: &SequenceQuery,
    ) -> impl Future<Output = Result<SequenceInfo, ChainRpcError>> + Send {
        (**self).get_sequence_or_block_info(query)
    }

    fn broadcast(
        &self,
        signed: &SignedPayload,
    ) -> impl Future<Output = Result<TransactionRef, ChainRpcError>> + Send {
        (**self).broadcast(signed)
    }

    fn wait_for_confirmation(
        &self,
        tx: &TransactionRef,
        timeout: Duration,
    ) -> impl Future<Output = Result<ConfirmationStatus, ChainRpcError>> + Send {
        (**self).wait_for_confirmation(tx, timeout)
    }

    fn get_balance(
        &self,
        account: &str,
        asset: &str,
    ) -> impl Future<Output = Result<TokenAmount, ChainRpcError>> + Send {
        (**self).get_balance(account, asset)
    }

    fn is_account_ready(
        &self,
        account: &str,
    ) -> impl Future<Output = Result<bool, ChainRpcError>> + Send {
        (**self).is_account_ready(account)
    }
}
