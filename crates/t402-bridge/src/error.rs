use alloy_primitives::{B256, U256};
use std::time::Duration;
use t402_types::chain::{ChainId, ChainRpcError, TransactionRef};
use t402_types::errors::T402ErrorCode;

use crate::chains::BridgeChain;

/// Reasons a quote request is refused before any network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuoteValidationError {
    #[error("Bridge on {bridge} can not quote transfers from {from}")]
    SourceMismatch { bridge: BridgeChain, from: ChainId },
    #[error("Source chain {0} does not support USDT0 bridging")]
    UnsupportedSource(ChainId),
    #[error("Destination chain {0} does not support USDT0 bridging")]
    UnsupportedDestination(ChainId),
    #[error("Source and destination are both {0}")]
    SameChain(ChainId),
    #[error("Bridge amount must be greater than zero")]
    ZeroAmount,
}

impl QuoteValidationError {
    pub fn code(&self) -> T402ErrorCode {
        match self {
            QuoteValidationError::ZeroAmount => T402ErrorCode::InvalidAmount,
            _ => T402ErrorCode::UnsupportedRoute,
        }
    }

    pub fn is_retryable(&self) -> bool {
        false
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Validation(#[from] QuoteValidationError),
    #[error("No bridge configured for {0}")]
    NotConfigured(BridgeChain),
    #[error("Quote failed on {chain}: {source}")]
    QuoteFailed {
        chain: BridgeChain,
        #[source]
        source: ChainRpcError,
    },
    #[error("RPC error on {chain}: {source}")]
    Rpc {
        chain: BridgeChain,
        #[source]
        source: ChainRpcError,
    },
    #[error("Can not decode {call} result on {chain}: {source}")]
    Decode {
        chain: BridgeChain,
        call: &'static str,
        #[source]
        source: alloy_sol_types::Error,
    },
    #[error("Bridge transfer failed: {reason}")]
    TransferFailed {
        transaction: Option<TransactionRef>,
        reason: String,
    },
    #[error("No available route to {to} for amount {amount}")]
    NoRoute { to: BridgeChain, amount: U256 },
    /// The message is still in flight; poll again by GUID, do not resend.
    #[error("Message {guid} not delivered within {timeout:?}")]
    DeliveryTimeout { guid: B256, timeout: Duration },
    #[error("Message status lookup failed: {0}")]
    Lookup(String),
}

impl BridgeError {
    pub fn code(&self) -> T402ErrorCode {
        match self {
            BridgeError::Validation(e) => e.code(),
            BridgeError::NotConfigured(_) | BridgeError::Lookup(_) => T402ErrorCode::BridgeUnavailable,
            BridgeError::QuoteFailed { .. } => T402ErrorCode::BridgeQuoteFailed,
            BridgeError::Rpc { source, .. } if source.is_retryable() => T402ErrorCode::BridgeUnavailable,
            BridgeError::Rpc { .. } | BridgeError::Decode { .. } => T402ErrorCode::BridgeTransferFailed,
            BridgeError::TransferFailed { .. } => T402ErrorCode::BridgeTransferFailed,
            BridgeError::NoRoute { .. } => T402ErrorCode::UnsupportedRoute,
            BridgeError::DeliveryTimeout { .. } => T402ErrorCode::BridgeTimeout,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_retry_hints() {
        let quote = BridgeError::QuoteFailed {
            chain: BridgeChain::Arbitrum,
            source: ChainRpcError::Timeout,
        };
        assert_eq!(quote.code().as_str(), "T402-5002");
        assert!(quote.is_retryable());

        let timeout = BridgeError::DeliveryTimeout {
            guid: B256::ZERO,
            timeout: Duration::from_secs(600),
        };
        assert_eq!(timeout.code().as_str(), "T402-5004");
        assert!(!timeout.is_retryable());

        let same = BridgeError::from(QuoteValidationError::SameChain(BridgeChain::Ink.chain_id()));
        assert_eq!(same.code().as_str(), "T402-5005");
        assert!(!same.is_retryable());

        let reverted = BridgeError::Rpc {
            chain: BridgeChain::Ethereum,
            source: ChainRpcError::Rejected("execution reverted".into()),
        };
        assert_eq!(reverted.code(), T402ErrorCode::BridgeTransferFailed);
    }
}
