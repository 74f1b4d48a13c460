//! Helper types.
//!
//! - [`b64`] - Base64 wrapper used for BOC cells and Solana transactions
//! - [`money_amount`] - Human-readable price parsing (`"$0.10"`)
//! - [`token_amount`] - Base-unit token amounts as decimal strings

pub mod b64;
pub mod money_amount;
pub mod token_amount;

pub use b64::*;
pub use token_amount::*;
