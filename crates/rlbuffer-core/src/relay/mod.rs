//! Bounded, rate-limited event relay.
//!
//! Producers push opaque events; a single coordination task owns the
//! staging buffer and re-emits events on a single-consumer output stream.
//!
//! Two policies:
//! - [`Relay`]: stages up to `capacity` events and flushes them in batches,
//!   at most one forced flush per flush window under sustained pressure.
//! - [`PacedRelay`]: forwards events one at a time at a fixed rate.
//!
//! Both drain everything they accepted before closing the output stream
//! on [`stop`](Relay::stop). Pushing after `stop` panics.

mod batched;
mod conduit;
mod handle;
mod paced;
mod pipe;
mod types;

pub use batched::Relay;
pub use handle::{Deliveries, RelayHandle};
pub use paced::PacedRelay;
pub use types::{
    DEFAULT_FLUSH_WINDOW, MIN_CAPACITY, MIN_FLUSH_WINDOW, RelayConfig, RelayState, TryPushError,
};
