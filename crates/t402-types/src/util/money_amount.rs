//! Human-readable prices.
//!
//! Servers quote prices as `"$0.10"`, `"1,000"` or `"0.5"`. [`MoneyAmount`] parses
//! those into an exact decimal and converts them into base units for a token of
//! known decimals.
//!
//! ```rust
//! use t402_types::util::money_amount::MoneyAmount;
//!
//! let amount = MoneyAmount::parse("$10.50").unwrap();
//! assert_eq!(amount.to_token_amount(6).unwrap().to_string(), "10500000");
//! ```

use alloy_primitives::U256;
use regex::Regex;
use rust_decimal::Decimal;
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::util::TokenAmount;

/// A non-negative decimal amount of money.
#[derive(Debug, Clone, PartialEq)]
pub struct MoneyAmount(pub Decimal);

#[derive(Debug, thiserror::Error)]
pub enum MoneyAmountParseError {
    #[error("Invalid number format")]
    InvalidFormat,
    #[error(
        "Amount must be between {} and {}",
        constants::MIN_STR,
        constants::MAX_STR
    )]
    OutOfRange,
    #[error("Negative value is not allowed")]
    Negative,
    /// The input has more decimal places than the token supports.
    #[error("Too big of a precision: {money} vs {token} on token")]
    WrongPrecision { money: u32, token: u32 },
}

mod constants {
    use super::*;

    pub const MIN_STR: &str = "0.000000001";
    pub const MAX_STR: &str = "999999999";

    pub static MIN: LazyLock<Decimal> =
        LazyLock::new(|| Decimal::from_str(MIN_STR).expect("valid decimal"));
    pub static MAX: LazyLock<Decimal> =
        LazyLock::new(|| Decimal::from_str(MAX_STR).expect("valid decimal"));
    pub static NON_NUMERIC: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^\d\.\-]+").expect("valid regex"));
}

impl MoneyAmount {
    /// Strips currency symbols, separators and whitespace, then parses.
    pub fn parse(input: &str) -> Result<Self, MoneyAmountParseError> {
        let cleaned = constants::NON_NUMERIC.replace_all(input, "").to_string();
        let parsed =
            Decimal::from_str(&cleaned).map_err(|_| MoneyAmountParseError::InvalidFormat)?;
        if parsed.is_sign_negative() {
            return Err(MoneyAmountParseError::Negative);
        }
        if parsed < *constants::MIN || parsed > *constants::MAX {
            return Err(MoneyAmountParseError::OutOfRange);
        }
        Ok(MoneyAmount(parsed))
    }

    pub fn scale(&self) -> u32 {
        self.0.scale()
    }

    pub fn mantissa(&self) -> u128 {
        self.0.mantissa().unsigned_abs()
    }

    /// Converts to base units of a token with `decimals` places.
    pub fn to_token_amount(&self, decimals: u8) -> Result<TokenAmount, MoneyAmountParseError> {
        let decimals = u32::from(decimals);
        let scale = self.scale();
        if scale > decimals {
            return Err(MoneyAmountParseError::WrongPrecision {
                money: scale,
                token: decimals,
            });
        }
        let multiplier = U256::from(10u8).pow(U256::from(decimals - scale));
        let value = U256::from(self.mantissa()) * multiplier;
        Ok(TokenAmount(value))
    }
}

impl FromStr for MoneyAmount {
    type Err = MoneyAmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MoneyAmount::parse(s)
    }
}

impl Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}
