//! TRON account addresses.
//!
//! A TRON address is 21 bytes: the `0x41` network prefix followed by the 20-byte
//! account id shared with the EVM. The user-facing form is base58check over those
//! 21 bytes, which always starts with `T` and is 34 characters long.

use std::fmt;
use std::str::FromStr;

/// Version byte of every TRON address.
pub const ADDRESS_PREFIX: u8 = 0x41;

const BASE58_LEN: usize = 34;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TronAddressError {
    #[error("TRON address must be {BASE58_LEN} characters, got {0}")]
    Length(usize),
    #[error("invalid base58check address: {0}")]
    Base58(String),
    #[error("decoded address has {0} bytes, expected 21")]
    Payload(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TronAddress([u8; 20]);

impl TronAddress {
    pub fn from_account_id(id: [u8; 20]) -> Self {
        Self(id)
    }

    /// Account id without the network prefix, as used in ABI words.
    pub fn account_id(&self) -> &[u8; 20] {
        &self.0
    }

    /// Left-pads the account id into a 32-byte ABI word.
    pub fn abi_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }
}

impl FromStr for TronAddress {
    type Err = TronAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != BASE58_LEN {
            return Err(TronAddressError::Length(s.len()));
        }
        let bytes = bs58::decode(s)
            .with_check(Some(ADDRESS_PREFIX))
            .into_vec()
            .map_err(|e| TronAddressError::Base58(e.to_string()))?;
        if bytes.len() != 21 {
            return Err(TronAddressError::Payload(bytes.len()));
        }
        let mut id = [0u8; 20];
        id.copy_from_slice(&bytes[1..]);
        Ok(Self(id))
    }
}

impl fmt::Display for TronAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = bs58::encode(self.0)
            .with_check_version(ADDRESS_PREFIX)
            .into_string();
        f.write_str(&encoded)
    }
}

pub fn is_valid_address(address: &str) -> bool {
    address.parse::<TronAddress>().is_ok()
}

/// Base58check is case sensitive, so equality is on the decoded bytes.
pub fn addresses_equal(a: &str, b: &str) -> bool {
    match (a.parse::<TronAddress>(), b.parse::<TronAddress>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USDT_MAINNET: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

    #[test]
    fn test_parse_and_display() {
        let address: TronAddress = USDT_MAINNET.parse().unwrap();
        assert_eq!(address.to_string(), USDT_MAINNET);

        let generated = TronAddress::from_account_id([7; 20]).to_string();
        assert!(generated.starts_with('T'));
        assert_eq!(generated.len(), 34);
        assert_eq!(generated.parse::<TronAddress>().unwrap().account_id(), &[7; 20]);
    }

    #[test]
    fn test_rejects_bad_checksum_and_shape() {
        let mut corrupted = USDT_MAINNET.to_string();
        corrupted.replace_range(33.., "u");
        assert!(!is_valid_address(&corrupted));
        assert!(!is_valid_address("0x209693Bc6afc0C5328bA36FaF03C514EF312287C"));
        assert!(!is_valid_address(""));
        assert!(matches!(
            "TR7NHqjeKQ".parse::<TronAddress>(),
            Err(TronAddressError::Length(10))
        ));
    }

    #[test]
    fn test_abi_word_and_equality() {
        let address = TronAddress::from_account_id([0xab; 20]);
        let word = address.abi_word();
        assert_eq!(&word[..12], &[0u8; 12]);
        assert_eq!(&word[12..], &[0xab; 20]);

        assert!(addresses_equal(USDT_MAINNET, USDT_MAINNET));
        assert!(!addresses_equal(USDT_MAINNET, &USDT_MAINNET.to_lowercase()));
        assert!(!addresses_equal("", ""));
    }
}
