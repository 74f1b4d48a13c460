#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the t402 payment protocol.
//!
//! A resource server answers with HTTP 402 and a list of payment requirements;
//! the client signs an authorization for one of them; a facilitator verifies the
//! authorization and relays it on-chain. This crate holds the chain-agnostic part
//! of that flow. Chain families live in their own crates and plug in through
//! [`scheme::ExactChainFamily`] and the injected [`chain::ChainRpc`] capability.
//!
//! # Modules
//!
//! - [`chain`] - CAIP-2 chain ids, patterns, and the per-chain RPC capability
//! - [`config`] - RPC config and environment variable resolution
//! - [`errors`] - Stable `T402-xxxx` error codes with retry hints
//! - [`facilitator`] - The verify/settle/supported surface
//! - [`networks`] - Well-known networks and stablecoin deployments
//! - [`proto`] - Wire format (protocol version 2)
//! - [`scheme`] - Scheme registry and the shared `exact` verification pipeline
//! - [`timestamp`] - Unix timestamps for authorization windows
//! - [`util`] - Base64, token amounts, human-readable prices

pub mod chain;
pub mod config;
pub mod errors;
pub mod facilitator;
pub mod networks;
pub mod proto;
pub mod scheme;
pub mod timestamp;
pub mod util;
