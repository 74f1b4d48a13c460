//! Process-level helpers.
//!
//! | Module | Description | Feature |
//! |--------|-------------|---------|
//! | [`sig_down`] | Shutdown on SIGTERM / SIGINT, shared with in-flight settlements | - |
//! | [`telemetry`] | OTLP or plain `tracing` subscriber setup | `telemetry` |

pub mod sig_down;
#[cfg(feature = "telemetry")]
pub mod telemetry;

pub use sig_down::*;
#[cfg(feature = "telemetry")]
pub use telemetry::*;
