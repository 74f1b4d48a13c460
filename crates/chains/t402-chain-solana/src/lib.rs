//! Solana chain support for t402.
//!
//! Payments are SPL Token (or Token-2022) `TransferChecked` transactions signed
//! by the payer with the facilitator as fee payer, so payers need no SOL.
//!
//! # Feature Flags
//!
//! - `client` - transaction building around a [`solana_signer::Signer`]
//! - `server` - price parsing and fee payer advertisement
//! - `facilitator` - the [`ExactChainFamily`](t402_types::scheme::ExactChainFamily) adapter
//! - `telemetry` - tracing

pub mod types;

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "facilitator")]
pub mod facilitator;
#[cfg(feature = "server")]
pub mod server;

pub use types::*;

#[cfg(feature = "client")]
pub use client::{SolanaClientRpc, SolanaExactClient};
#[cfg(feature = "facilitator")]
pub use facilitator::{SolanaExactFacilitator, SolanaExactFamily};
#[cfg(feature = "server")]
pub use server::SolanaExactServer;
