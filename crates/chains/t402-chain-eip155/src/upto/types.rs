//! Wire types for the EVM `upto` scheme.

use alloy_primitives::{Address, B256, Bytes, Signature, U256, hex};
use alloy_sol_types::{SolValue, sol};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use t402_types::proto::v2::PaymentRequirements;
use t402_types::timestamp::UnixTimestamp;
use t402_types::util::TokenAmount;

pub const UPTO_SCHEME: &str = "upto";

sol!(
    /// EIP-2612 message signed by the payer.
    #[derive(Debug)]
    struct Permit {
        address owner;
        address spender;
        uint256 value;
        uint256 nonce;
        uint256 deadline;
    }
);

sol! {
    function permit(
        address owner,
        address spender,
        uint256 value,
        uint256 deadline,
        uint8 v,
        bytes32 r,
        bytes32 s
    ) external;

    function transferFrom(address from, address to, uint256 amount) external returns (bool);
}

/// The `payload` object of an EVM `upto` payment.
///
/// ```json
/// {
///   "signature": { "v": 27, "r": "0x...", "s": "0x..." },
///   "authorization": {
///     "owner": "0x...", "spender": "0x...", "value": "5000000",
///     "deadline": "1700000300", "nonce": 0
///   },
///   "paymentNonce": "0x...32 bytes"
/// }
/// ```
///
/// `signature` may also be a single 65-byte hex string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UptoEvmPayload {
    pub signature: PermitSignature,
    pub authorization: PermitAuthorization,
    /// Client-chosen, makes every payload unique even for identical permits.
    pub payment_nonce: B256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermitSignature {
    Split { v: u8, r: B256, s: B256 },
    Compact(Bytes),
}

impl PermitSignature {
    pub fn from_signature(signature: &Signature) -> Self {
        PermitSignature::Split {
            v: 27 + u8::from(signature.v()),
            r: signature.r().into(),
            s: signature.s().into(),
        }
    }

    pub fn to_signature(&self) -> Result<Signature, UptoError> {
        let raw = match self {
            PermitSignature::Split { v, r, s } => {
                let mut raw = Vec::with_capacity(65);
                raw.extend_from_slice(r.as_slice());
                raw.extend_from_slice(s.as_slice());
                raw.push(*v);
                raw
            }
            PermitSignature::Compact(bytes) => bytes.to_vec(),
        };
        Signature::from_raw(&raw).map_err(|e| UptoError::Signature(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitAuthorization {
    pub owner: Address,
    /// Allowed to pull funds; a facilitator signer.
    pub spender: Address,
    /// The maximum that may be charged.
    pub value: TokenAmount,
    pub deadline: UnixTimestamp,
    /// The token's `nonces(owner)` at signing time.
    pub nonce: u64,
}

impl PermitAuthorization {
    pub fn typed_message(&self) -> Permit {
        Permit {
            owner: self.owner,
            spender: self.spender,
            value: self.value.0,
            nonce: U256::from(self.nonce),
            deadline: U256::from(self.deadline.as_secs()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UptoError {
    #[error("Invalid permit signature: {0}")]
    Signature(String),
    #[error("Invalid minAmount {0}")]
    MinAmount(String),
    #[error("Can not decode settlement calls: {0}")]
    CallsDecoding(String),
    #[error("Settlement batch holds {0} calls, expected a permit and a transfer")]
    CallCount(usize),
}

/// Lowest amount the resource server may settle, from `extra.minAmount`.
pub fn min_amount(requirements: &PaymentRequirements) -> Result<Option<TokenAmount>, UptoError> {
    let Some(value) = requirements.extra.as_ref().and_then(|extra| extra.get("minAmount")) else {
        return Ok(None);
    };
    let parsed = match value {
        serde_json::Value::String(s) => TokenAmount::from_str(s).ok(),
        serde_json::Value::Number(n) => n.as_u64().map(TokenAmount::from),
        _ => None,
    };
    parsed
        .map(Some)
        .ok_or_else(|| UptoError::MinAmount(value.to_string()))
}

/// The spender the client must approve, from `extra.routerAddress`.
pub fn router_address(requirements: &PaymentRequirements) -> Option<&str> {
    requirements.extra_str("routerAddress")
}

/// The two token calls that settle an `upto` payment, in relay order.
///
/// Carried in a single relayable body as the ABI encoding of `bytes[]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementCalls {
    pub permit: Bytes,
    pub transfer: Bytes,
}

impl SettlementCalls {
    pub fn encode(&self) -> String {
        let calls = vec![self.permit.clone(), self.transfer.clone()];
        hex::encode_prefixed(calls.abi_encode())
    }

    pub fn decode(body: &str) -> Result<Self, UptoError> {
        let bytes = hex::decode(body.trim()).map_err(|e| UptoError::CallsDecoding(e.to_string()))?;
        let calls = Vec::<Bytes>::abi_decode(&bytes)
            .map_err(|e| UptoError::CallsDecoding(e.to_string()))?;
        match <[Bytes; 2]>::try_from(calls) {
            Ok([permit, transfer]) => Ok(SettlementCalls { permit, transfer }),
            Err(calls) => Err(UptoError::CallCount(calls.len())),
        }
    }
}
