//! Wire types for the TRON `exact` scheme.

use serde::{Deserialize, Serialize};
use t402_types::util::TokenAmount;

use crate::address::TronAddress;

pub const TRON_NAMESPACE: &str = "tron";

/// `transfer(address,uint256)` selector.
pub const TRC20_TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// Secp256k1 recoverable signature appended to the raw transaction.
pub const SIGNATURE_LEN: usize = 65;

/// Fee limit used when the client does not set one, in SUN.
pub const DEFAULT_FEE_LIMIT: u64 = 100_000_000;

/// The `payload` object of a TRON `exact` payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactTronPayload {
    /// Signed TRC-20 transfer transaction, hex.
    pub signed_transaction: String,
    pub authorization: ExactTronAuthorization,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactTronAuthorization {
    pub from: String,
    pub to: String,
    pub contract_address: String,
    pub amount: TokenAmount,
    /// Transaction expiration, unix milliseconds.
    pub expiration: u64,
    pub ref_block_bytes: String,
    pub ref_block_hash: String,
    /// Transaction creation time, unix milliseconds.
    pub timestamp: u64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("signed transaction is not valid hex")]
    Hex,
    #[error("signed transaction is {0} bytes, too short to carry a signature")]
    TooShort(usize),
}

/// A signed transaction split into its raw part and trailing signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    pub signature: [u8; SIGNATURE_LEN],
}

impl SignedTransaction {
    pub fn decode(hex_str: &str) -> Result<Self, TransactionError> {
        let bytes = hex::decode(hex_str.trim().trim_start_matches("0x"))
            .map_err(|_| TransactionError::Hex)?;
        if bytes.len() <= SIGNATURE_LEN {
            return Err(TransactionError::TooShort(bytes.len()));
        }
        let (raw, signature) = bytes.split_at(bytes.len() - SIGNATURE_LEN);
        let mut sig = [0u8; SIGNATURE_LEN];
        sig.copy_from_slice(signature);
        Ok(Self {
            raw: raw.to_vec(),
            signature: sig,
        })
    }

    /// Zeroed signature bytes mean the transaction was never signed.
    pub fn is_signed(&self) -> bool {
        self.signature.iter().any(|b| *b != 0)
    }

    /// Whether the raw transaction calls `transfer(to, amount)`.
    ///
    /// Trigger-smart-contract data is stored as a protobuf bytes field, so the ABI
    /// call appears verbatim in the raw transaction.
    pub fn carries_transfer(&self, to: &TronAddress, amount: TokenAmount) -> bool {
        let call = trc20_transfer_call(to, amount);
        self.raw.windows(call.len()).any(|window| window == call)
    }
}

/// ABI-encoded `transfer(to, amount)` call data.
pub fn trc20_transfer_call(to: &TronAddress, amount: TokenAmount) -> Vec<u8> {
    let mut call = Vec::with_capacity(4 + 64);
    call.extend_from_slice(&TRC20_TRANSFER_SELECTOR);
    call.extend_from_slice(&to.abi_word());
    call.extend_from_slice(&amount.0.to_be_bytes::<32>());
    call
}
