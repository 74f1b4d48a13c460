//! TRON chain support for t402.
//!
//! Payments are pre-signed TRC-20 `transfer` transactions. The facilitator checks
//! them against the payment requirements and broadcasts them as they are; the
//! payer's account pays energy and bandwidth.
//!
//! # Feature Flags
//!
//! - `client` - payload construction around a [`client::TronSigner`]
//! - `server` - price parsing
//! - `facilitator` - the [`ExactChainFamily`](t402_types::scheme::ExactChainFamily) adapter
//! - `telemetry` - tracing

pub mod address;
pub mod types;

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "facilitator")]
pub mod facilitator;
#[cfg(feature = "server")]
pub mod server;

pub use address::TronAddress;
pub use types::*;

#[cfg(feature = "client")]
pub use client::{TronExactClient, TronSigner};
#[cfg(feature = "facilitator")]
pub use facilitator::{TronExactFacilitator, TronExactFamily};
#[cfg(feature = "server")]
pub use server::TronExactServer;
