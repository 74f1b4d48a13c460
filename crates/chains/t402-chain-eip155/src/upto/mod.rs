//! The EVM `upto` scheme: usage-based payments.
//!
//! The client signs an EIP-2612 permit for the requirements' `amount`, which is
//! the maximum the request may cost. At settlement the resource server names the
//! amount actually used (between `extra.minAmount` and the maximum) and the
//! facilitator pulls only that much with `transferFrom`.
//!
//! Differences from `exact`:
//!
//! - the permit spender is a facilitator signer, advertised as `routerAddress`
//! - replay protection is the token's permit nonce for the owner
//! - the settled amount can be lower than the authorized one

pub mod types;

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "facilitator")]
pub mod facilitator;
#[cfg(feature = "server")]
pub mod server;

pub use types::*;

#[cfg(feature = "client")]
pub use client::{Eip155UptoClient, PermitNonceSource};
#[cfg(feature = "facilitator")]
pub use facilitator::Eip155UptoFacilitator;
#[cfg(feature = "server")]
pub use server::Eip155UptoServer;
