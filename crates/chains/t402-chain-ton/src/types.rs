//! Wire types for the TON `exact` scheme.

use serde::{Deserialize, Serialize};
use t402_types::timestamp::UnixTimestamp;
use t402_types::util::{Base64Bytes, TokenAmount};

pub const TON_NAMESPACE: &str = "ton";

/// Bag-of-cells serialization magic.
pub const BOC_MAGIC: [u8; 4] = [0xb5, 0xee, 0x9c, 0x72];

/// TEP-74 `transfer` opcode of a Jetton wallet.
pub const JETTON_TRANSFER_OP: u32 = 0x0f8a7ea5;

/// TON attached to a Jetton transfer to pay for forwarding, in nanoTON.
pub const DEFAULT_JETTON_TRANSFER_TON: u64 = 100_000_000;

/// The `payload` object of a TON `exact` payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactTonPayload {
    /// Signed external message to the payer's wallet, base64 BOC.
    pub signed_boc: String,
    pub authorization: ExactTonAuthorization,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactTonAuthorization {
    pub from: String,
    pub to: String,
    pub jetton_master: String,
    pub jetton_amount: TokenAmount,
    /// Gas attached to the transfer, in nanoTON.
    pub ton_amount: TokenAmount,
    pub valid_until: UnixTimestamp,
    pub seqno: u64,
    pub query_id: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BocError {
    #[error("BOC is empty")]
    Empty,
    #[error("BOC is not valid base64")]
    Encoding,
    #[error("BOC does not start with the bag-of-cells magic")]
    Magic,
}

/// Decodes a base64 BOC and checks its magic prefix.
pub fn decode_boc(boc: &str) -> Result<Vec<u8>, BocError> {
    let boc = boc.trim();
    if boc.is_empty() {
        return Err(BocError::Empty);
    }
    let bytes = Base64Bytes::from(boc).decode().map_err(|_| BocError::Encoding)?;
    if !bytes.starts_with(&BOC_MAGIC) {
        return Err(BocError::Magic);
    }
    Ok(bytes)
}

/// Byte pattern that opens the body of a Jetton transfer: opcode then query id.
///
/// Cell data starts on a byte boundary, so this sequence appears verbatim in the
/// serialized BOC of any message carrying the transfer.
pub fn jetton_transfer_marker(query_id: u64) -> [u8; 12] {
    let mut marker = [0u8; 12];
    marker[..4].copy_from_slice(&JETTON_TRANSFER_OP.to_be_bytes());
    marker[4..].copy_from_slice(&query_id.to_be_bytes());
    marker
}

pub fn contains_jetton_transfer(boc: &[u8], query_id: u64) -> bool {
    let marker = jetton_transfer_marker(query_id);
    boc.windows(marker.len()).any(|window| window == marker)
}
