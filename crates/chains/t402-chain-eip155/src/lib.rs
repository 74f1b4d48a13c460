//! EIP-155 (EVM) chain support for t402.
//!
//! Payments are ERC-3009 `transferWithAuthorization` signatures: the payer signs
//! an EIP-712 typed message, the facilitator submits it to the token contract and
//! pays gas. The token contract tracks used nonces, so replay protection is a
//! single `authorizationState` lookup.
//!
//! The [`upto`] scheme authorizes a maximum with an EIP-2612 permit instead and
//! settles the amount actually used.
//!
//! # Feature Flags
//!
//! - `client` - signing payment payloads with an alloy signer
//! - `server` - price parsing and requirement enrichment
//! - `facilitator` - the [`ExactChainFamily`](t402_types::scheme::ExactChainFamily) adapter
//! - `telemetry` - tracing of relayed payloads

pub mod types;
pub mod upto;

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "facilitator")]
pub mod facilitator;
#[cfg(feature = "server")]
pub mod server;

pub use types::*;

#[cfg(feature = "client")]
pub use client::Eip155ExactClient;
#[cfg(feature = "facilitator")]
pub use facilitator::{Eip155ExactFacilitator, Eip155ExactFamily};
#[cfg(feature = "server")]
pub use server::Eip155ExactServer;
#[cfg(feature = "client")]
pub use upto::Eip155UptoClient;
#[cfg(feature = "facilitator")]
pub use upto::Eip155UptoFacilitator;
#[cfg(feature = "server")]
pub use upto::Eip155UptoServer;
