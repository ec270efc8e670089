//! Relay configuration, lifecycle and error types.

use std::time::Duration;

/// Default interval between proactive flushes.
pub const DEFAULT_FLUSH_WINDOW: Duration = Duration::from_secs(1);

/// Smallest staging capacity a relay runs with.
pub const MIN_CAPACITY: usize = 1;

/// Shortest flush window; a zero-length timer period is not allowed.
pub const MIN_FLUSH_WINDOW: Duration = Duration::from_millis(1);

/// Configuration for a tick-batched [`Relay`](super::Relay).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    /// Staging queue capacity. Values below [`MIN_CAPACITY`] are clamped.
    pub capacity: usize,
    /// Interval between proactive flushes of the staging queue.
    pub flush_window: Duration,
}

impl RelayConfig {
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            flush_window: DEFAULT_FLUSH_WINDOW,
        }
    }

    #[must_use]
    pub const fn with_flush_window(mut self, flush_window: Duration) -> Self {
        self.flush_window = flush_window;
        self
    }

    /// Capacity with the lower bound applied.
    pub fn effective_capacity(&self) -> usize {
        self.capacity.max(MIN_CAPACITY)
    }

    /// Flush window with the lower bound applied.
    pub fn effective_flush_window(&self) -> Duration {
        self.flush_window.max(MIN_FLUSH_WINDOW)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::new(8)
    }
}

/// Lifecycle of a relay's coordination loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Constructed, loop not started yet.
    Created,
    /// Loop is accepting intake and flushing on ticks.
    Running,
    /// Shutdown requested; remaining events are being flushed.
    Draining,
    /// Output stream closed. Terminal.
    Closed,
}

impl RelayState {
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl std::fmt::Display for RelayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Error returned by the non-suspending `try_push`. The rejected event is
/// handed back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum TryPushError<T> {
    #[error("relay intake is full")]
    Full(T),

    #[error("relay intake is closed")]
    Closed(T),
}

impl<T> TryPushError<T> {
    /// Recover the event that was not accepted.
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(event) | Self::Closed(event) => event,
        }
    }
}
