//! TON chain support for t402.
//!
//! Payments are USDT Jetton transfers. The client signs an external message to
//! its wallet contract; the facilitator relays that BOC unchanged. The wallet's
//! seqno guards against replay and the facilitator only ever pays the relay fee.
//!
//! # Feature Flags
//!
//! - `client` - payload construction around a [`client::TonSigner`]
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

pub use address::TonAddress;
pub use types::*;

#[cfg(feature = "client")]
pub use client::{TonExactClient, TonSigner};
#[cfg(feature = "facilitator")]
pub use facilitator::{TonExactFacilitator, TonExactFamily};
#[cfg(feature = "server")]
pub use server::TonExactServer;
