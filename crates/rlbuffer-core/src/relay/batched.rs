//! Tick-batched relay: the default policy.

use tracing::warn;

use super::conduit::wire;
use super::handle::{Deliveries, RelayHandle};
use super::pipe::BatchPipe;
use super::types::{RelayConfig, RelayState, TryPushError};

/// Bounded relay that stages events and flushes them in batches on a fixed
/// flush window.
///
/// Create it, take [`deliveries`](Self::deliveries) for the consumer, then
/// [`start`](Self::start) it inside a tokio runtime. Producers call
/// [`push`](Self::push) (or push through a [`RelayHandle`]); [`stop`](Self::stop)
/// drains the staging queue and closes the deliveries stream.
pub struct Relay<T> {
    config: RelayConfig,
    handle: RelayHandle<T>,
    pipe: Option<BatchPipe<T>>,
    deliveries: Option<Deliveries<T>>,
}

impl<T: Send + 'static> Relay<T> {
    /// Create a relay with the given staging capacity and the default
    /// one-second flush window. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self::with_config(RelayConfig::new(capacity))
    }

    pub fn with_config(config: RelayConfig) -> Self {
        let capacity = config.effective_capacity();
        if capacity != config.capacity {
            warn!(
                requested = config.capacity,
                capacity, "Relay capacity raised to minimum"
            );
        }
        let config = RelayConfig {
            capacity,
            flush_window: config.effective_flush_window(),
        };

        // No intake buffer: producers hand over to the loop rather than
        // queueing in front of it.
        let (conduits, handle, deliveries) = wire(0);
        Self {
            config,
            handle,
            pipe: Some(BatchPipe::new(capacity, config.flush_window, conduits)),
            deliveries: Some(deliveries),
        }
    }

    /// Spawn the coordination loop on the current tokio runtime.
    ///
    /// Call once; later calls are ignored with a warning.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(&mut self) {
        let Some(pipe) = self.pipe.take() else {
            warn!("Relay already started");
            return;
        };
        tokio::spawn(pipe.run());
    }
}

impl<T> Relay<T> {
    /// Take the consumer side of the output stream. Returns `None` after
    /// the first call: the stream has a single consumer.
    pub fn deliveries(&mut self) -> Option<Deliveries<T>> {
        self.deliveries.take()
    }

    /// Submit one event. Suspends until the coordination loop takes it, so
    /// a push waits while the relay is not started, busy flushing, or
    /// holding an event for the next window.
    ///
    /// # Panics
    ///
    /// Panics if [`stop`](Self::stop) has already been requested.
    pub async fn push(&self, event: T) {
        self.handle.push(event).await;
    }

    /// Submit one event without suspending. Only succeeds while the loop is
    /// idle and waiting for intake.
    pub fn try_push(&self, event: T) -> Result<(), TryPushError<T>> {
        self.handle.try_push(event)
    }

    /// Request graceful shutdown; returns immediately.
    pub fn stop(&self) {
        self.handle.stop();
    }

    /// A cloneable producer-side handle for other tasks.
    pub fn handle(&self) -> RelayHandle<T> {
        self.handle.clone()
    }

    /// Current lifecycle state of the coordination loop.
    pub fn state(&self) -> RelayState {
        self.handle.state()
    }

    /// Wait until the deliveries stream has been closed.
    pub async fn closed(&self) {
        self.handle.closed().await;
    }

    /// Effective configuration (after minimums are applied).
    pub const fn config(&self) -> RelayConfig {
        self.config
    }
}
