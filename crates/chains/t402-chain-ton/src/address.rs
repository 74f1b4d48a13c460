//! TON addresses in raw (`0:<hex>`) and user-friendly (base64url) form.
//!
//! A friendly address is 36 bytes: flags, workchain, 32-byte account hash and a
//! CRC16-XMODEM checksum of the first 34 bytes. Flags only affect how a wallet
//! handles bounces, so two addresses are equal when workchain and hash match.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use t402_types::util::Base64Bytes;

static FRIENDLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-+/]{46,48}$").expect("valid regex"));
static RAW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]:[a-fA-F0-9]{64}$").expect("valid regex"));

const FLAG_BOUNCEABLE: u8 = 0x11;
const FLAG_NON_BOUNCEABLE: u8 = 0x51;
const FLAG_TEST_ONLY: u8 = 0x80;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TonAddressError {
    #[error("Not a TON address: {0}")]
    Format(String),
    #[error("Checksum mismatch in {0}")]
    Checksum(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TonAddress {
    pub workchain: i8,
    pub hash: [u8; 32],
}

impl TonAddress {
    pub fn parse(input: &str) -> Result<Self, TonAddressError> {
        let input = input.trim();
        if RAW.is_match(input) {
            return Self::parse_raw(input);
        }
        if FRIENDLY.is_match(input) {
            return Self::parse_friendly(input);
        }
        Err(TonAddressError::Format(input.to_string()))
    }

    fn parse_raw(input: &str) -> Result<Self, TonAddressError> {
        let format_error = || TonAddressError::Format(input.to_string());
        let (workchain, hash) = input.split_once(':').ok_or_else(format_error)?;
        let workchain: i8 = workchain.parse().map_err(|_| format_error())?;
        let bytes = hex::decode(hash).map_err(|_| format_error())?;
        let hash: [u8; 32] = bytes.try_into().map_err(|_| format_error())?;
        Ok(Self { workchain, hash })
    }

    fn parse_friendly(input: &str) -> Result<Self, TonAddressError> {
        let format_error = || TonAddressError::Format(input.to_string());
        let bytes = Base64Bytes::from(input)
            .decode_lenient()
            .map_err(|_| format_error())?;
        let bytes: [u8; 36] = bytes.try_into().map_err(|_| format_error())?;
        let flags = bytes[0] & !FLAG_TEST_ONLY;
        if flags != FLAG_BOUNCEABLE && flags != FLAG_NON_BOUNCEABLE {
            return Err(format_error());
        }
        let checksum = u16::from_be_bytes([bytes[34], bytes[35]]);
        if crc16_xmodem(&bytes[..34]) != checksum {
            return Err(TonAddressError::Checksum(input.to_string()));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[2..34]);
        Ok(Self {
            workchain: bytes[1] as i8,
            hash,
        })
    }

    pub fn to_raw(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash))
    }

    /// User-friendly, url-safe form.
    pub fn to_friendly(&self, bounceable: bool, test_only: bool) -> String {
        let mut flags = if bounceable {
            FLAG_BOUNCEABLE
        } else {
            FLAG_NON_BOUNCEABLE
        };
        if test_only {
            flags |= FLAG_TEST_ONLY;
        }
        let mut bytes = Vec::with_capacity(36);
        bytes.push(flags);
        bytes.push(self.workchain as u8);
        bytes.extend_from_slice(&self.hash);
        let checksum = crc16_xmodem(&bytes);
        bytes.extend_from_slice(&checksum.to_be_bytes());
        URL_SAFE.encode(bytes)
    }
}

impl FromStr for TonAddress {
    type Err = TonAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TonAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_raw())
    }
}

pub fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for byte in data {
        crc ^= u16::from(*byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

pub fn is_valid_address(address: &str) -> bool {
    TonAddress::parse(address).is_ok()
}

/// Equal when both parse and point at the same account.
pub fn addresses_equal(a: &str, b: &str) -> bool {
    match (TonAddress::parse(a), TonAddress::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
