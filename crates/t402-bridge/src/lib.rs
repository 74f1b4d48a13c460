//! USDT0 bridging over LayerZero OFT.
//!
//! Moves a facilitator's USDT0 reserve between EVM chains so settlement liquidity
//! sits where payments arrive.
//!
//! - [`chains`] - the fixed set of bridge-capable chains and their contracts
//! - [`oft`] - OFT/ERC-20 ABI and encoding helpers
//! - [`client`] - the injected per-chain EVM capability ([`BridgeChainClient`])
//! - [`bridge`] - quote validation, quoting and sending from one source chain
//! - [`router`] - balance aggregation, route pricing, strategy selection, auto-bridge
//! - [`tracking`] - delivery status of LayerZero messages
//!
//! ```ignore
//! let router = BridgeRouter::new(BridgeConfig::default())
//!     .with_chain(BridgeChain::Arbitrum, arbitrum_client)
//!     .with_chain(BridgeChain::Ink, ink_client);
//! let outcome = router
//!     .auto_bridge(AutoBridgeParams {
//!         to: BridgeChain::Ethereum.chain_id(),
//!         amount: TokenAmount::from(250_000_000u64),
//!         recipient: None,
//!         strategy: RouteStrategy::Cheapest,
//!     })
//!     .await?;
//! let tracker = DeliveryTracker::new(scan_client, router.config());
//! let message = tracker.wait_for_delivery(outcome.result.message_guid).await?;
//! ```

pub mod bridge;
pub mod chains;
pub mod client;
pub mod config;
pub mod error;
pub mod oft;
pub mod router;
pub mod tracking;

#[cfg(test)]
mod mock;

pub use bridge::{BridgeQuote, BridgeResult, QuoteParams, Usdt0Bridge};
pub use chains::BridgeChain;
pub use client::BridgeChainClient;
pub use config::BridgeConfig;
pub use error::{BridgeError, QuoteValidationError};
pub use router::{AutoBridgeParams, AutoBridgeResult, BridgeRouter, RouteStrategy, select_best_route};
pub use tracking::{DeliveryStatus, DeliveryTracker, MessageStatusLookup};
