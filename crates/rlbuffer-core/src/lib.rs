//! `rlbuffer` Core Library
//!
//! Shared functionality for `rlbuffer` components:
//! - Rate-limited event relay (tick-batched and paced policies)
//! - Configuration resolution and hierarchy
//! - Tracing subscriber setup
//! - Common error types

pub mod config;
pub mod error;
pub mod relay;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, Result};
pub use relay::{
    Deliveries, PacedRelay, Relay, RelayConfig, RelayHandle, RelayState, TryPushError,
};
