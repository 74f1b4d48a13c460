#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! In-process t402 facilitator.
//!
//! [`FacilitatorLocal`] implements [`Facilitator`](t402_types::facilitator::Facilitator)
//! over a [`SchemeRegistry`](t402_types::scheme::SchemeRegistry) of scheme
//! implementations, one per chain family. It owns what the schemes do not:
//! routing, the settlement state machine (deadline, cancellation, outcome
//! reporting), the optional replay cache and de-duplication locks, and the
//! merged `supported` answer.
//!
//! # Modules
//!
//! - [`config`] - JSON configuration, CLI arguments and `.env` loading
//! - [`facilitator_local`] - Routing and settlement
//! - [`replay`] - Payload fingerprints, replay cache and de-duplication locks
//! - [`util`] - Shutdown signals and telemetry
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use t402_chain_ton::TonExactFacilitator;
//! use t402_facilitator_local::{FacilitatorLocal, build_scheme_registry};
//! use t402_facilitator_local::config::FacilitatorConfig;
//! use t402_facilitator_local::util::SigDown;
//!
//! let config = FacilitatorConfig::load()?;
//! let ton: Arc<dyn SchemeFacilitator> = Arc::new(TonExactFacilitator::new(family, ton_providers));
//! let schemes = build_scheme_registry(&config, [ton])?;
//! let sig_down = SigDown::try_new()?;
//! let facilitator = FacilitatorLocal::from_config(&config, schemes)
//!     .with_shutdown(sig_down.cancellation_token());
//! let response = facilitator.settle(&request).await?;
//! ```

pub mod config;
pub mod facilitator_local;
pub mod replay;
pub mod util;

pub use facilitator_local::*;
