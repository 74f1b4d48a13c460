//! Stable error codes shared by every t402 component.
//!
//! Codes read `T402-<category><seq>`:
//!
//! | Category | Range | Meaning |
//! |---|---|---|
//! | 1 | `T402-1xxx` | client input |
//! | 2 | `T402-2xxx` | server infrastructure |
//! | 3 | `T402-3xxx` | facilitator verify/settle |
//! | 4 | `T402-4xxx` | on-chain |
//! | 5 | `T402-5xxx` | bridge |
//!
//! Each code carries a retry hint. Business-level verification failures are not
//! errors; they travel as `isValid=false` / `success=false` with an
//! [`ErrorReason`](crate::proto::ErrorReason).

use serde::{Serialize, Serializer};
use std::fmt;

/// Every code the t402 components can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum T402ErrorCode {
    // Client
    InvalidRequest,
    MissingPayload,
    MissingRequirements,
    InvalidPayload,
    InvalidRequirements,
    InvalidSignature,
    InvalidNetwork,
    InvalidScheme,
    InvalidAmount,
    InvalidAddress,
    ExpiredPayment,
    InvalidNonce,
    // Server
    Internal,
    DatabaseUnavailable,
    CacheUnavailable,
    RpcUnavailable,
    RateLimited,
    ServiceUnavailable,
    // Facilitator
    VerificationFailed,
    SettlementFailed,
    InsufficientBalance,
    AllowanceInsufficient,
    PaymentMismatch,
    DuplicatePayment,
    SettlementPending,
    SettlementTimeout,
    // Chain
    ChainUnavailable,
    TransactionFailed,
    TransactionReverted,
    GasEstimationFailed,
    NonceConflict,
    ChainCongested,
    ContractError,
    // Bridge
    BridgeUnavailable,
    BridgeQuoteFailed,
    BridgeTransferFailed,
    BridgeTimeout,
    UnsupportedRoute,
}

impl T402ErrorCode {
    pub fn as_str(&self) -> &'static str {
        use T402ErrorCode::*;
        match self {
            InvalidRequest => "T402-1001",
            MissingPayload => "T402-1002",
            MissingRequirements => "T402-1003",
            InvalidPayload => "T402-1004",
            InvalidRequirements => "T402-1005",
            InvalidSignature => "T402-1006",
            InvalidNetwork => "T402-1007",
            InvalidScheme => "T402-1008",
            InvalidAmount => "T402-1009",
            InvalidAddress => "T402-1010",
            ExpiredPayment => "T402-1011",
            InvalidNonce => "T402-1012",
            Internal => "T402-2001",
            DatabaseUnavailable => "T402-2002",
            CacheUnavailable => "T402-2003",
            RpcUnavailable => "T402-2004",
            RateLimited => "T402-2005",
            ServiceUnavailable => "T402-2006",
            VerificationFailed => "T402-3001",
            SettlementFailed => "T402-3002",
            InsufficientBalance => "T402-3003",
            AllowanceInsufficient => "T402-3004",
            PaymentMismatch => "T402-3005",
            DuplicatePayment => "T402-3006",
            SettlementPending => "T402-3007",
            SettlementTimeout => "T402-3008",
            ChainUnavailable => "T402-4001",
            TransactionFailed => "T402-4002",
            TransactionReverted => "T402-4003",
            GasEstimationFailed => "T402-4004",
            NonceConflict => "T402-4005",
            ChainCongested => "T402-4006",
            ContractError => "T402-4007",
            BridgeUnavailable => "T402-5001",
            BridgeQuoteFailed => "T402-5002",
            BridgeTransferFailed => "T402-5003",
            BridgeTimeout => "T402-5004",
            UnsupportedRoute => "T402-5005",
        }
    }

    /// Whether the same request may succeed if sent again later.
    ///
    /// A bridge delivery timeout is not retryable: the transfer is in flight and
    /// must be polled by message id, never resubmitted.
    pub fn is_retryable(&self) -> bool {
        use T402ErrorCode::*;
        matches!(
            self,
            RpcUnavailable
                | RateLimited
                | ServiceUnavailable
                | CacheUnavailable
                | DatabaseUnavailable
                | SettlementFailed
                | SettlementPending
                | ChainUnavailable
                | NonceConflict
                | ChainCongested
                | BridgeUnavailable
                | BridgeQuoteFailed
        )
    }

    /// The category digit: 1 client, 2 server, 3 facilitator, 4 chain, 5 bridge.
    pub fn category(&self) -> u8 {
        self.as_str().as_bytes()[5] - b'0'
    }

    pub fn default_message(&self) -> &'static str {
        use T402ErrorCode::*;
        match self {
            InvalidRequest => "Invalid request",
            MissingPayload => "Payment payload is missing",
            MissingRequirements => "Payment requirements are missing",
            InvalidPayload => "Payment payload is malformed",
            InvalidRequirements => "Payment requirements are malformed",
            InvalidSignature => "Signature is invalid",
            InvalidNetwork => "Network is invalid or unsupported",
            InvalidScheme => "Scheme is invalid or unsupported",
            InvalidAmount => "Amount is invalid",
            InvalidAddress => "Address is invalid",
            ExpiredPayment => "Payment authorization has expired",
            InvalidNonce => "Nonce is invalid",
            Internal => "Internal error",
            DatabaseUnavailable => "Database unavailable",
            CacheUnavailable => "Cache unavailable",
            RpcUnavailable => "RPC endpoint unavailable",
            RateLimited => "Rate limited",
            ServiceUnavailable => "Service unavailable",
            VerificationFailed => "Payment verification failed",
            SettlementFailed => "Payment settlement failed",
            InsufficientBalance => "Insufficient balance",
            AllowanceInsufficient => "Insufficient allowance",
            PaymentMismatch => "Payment does not match requirements",
            DuplicatePayment => "Payment was already processed",
            SettlementPending => "Settlement is pending",
            SettlementTimeout => "Settlement confirmation timed out",
            ChainUnavailable => "Chain unavailable",
            TransactionFailed => "Transaction failed",
            TransactionReverted => "Transaction reverted",
            GasEstimationFailed => "Gas estimation failed",
            NonceConflict => "Nonce conflict",
            ChainCongested => "Chain congested",
            ContractError => "Contract error",
            BridgeUnavailable => "Bridge unavailable",
            BridgeQuoteFailed => "Bridge quote failed",
            BridgeTransferFailed => "Bridge transfer failed",
            BridgeTimeout => "Bridge delivery timed out",
            UnsupportedRoute => "Bridge route is not supported",
        }
    }
}

impl fmt::Display for T402ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for T402ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A coded error as reported to callers.
///
/// Displays as `[T402-xxxx] message: details`.
#[derive(Debug, Clone, Serialize)]
pub struct T402Error {
    pub code: T402ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub retry: bool,
}

impl T402Error {
    pub fn new(code: T402ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
            retry: code.is_retryable(),
        }
    }

    pub fn with_message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_details<S: Into<String>>(mut self, details: S) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for T402Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.details {
            Some(details) => write!(f, "[{}] {}: {}", self.code, self.message, details),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

impl std::error::Error for T402Error {}

impl From<T402ErrorCode> for T402Error {
    fn from(code: T402ErrorCode) -> Self {
        T402Error::new(code)
    }
}
