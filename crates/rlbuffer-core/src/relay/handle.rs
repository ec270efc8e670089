//! Producer- and consumer-side handles shared by both relay policies.

use tokio::sync::watch;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::types::{RelayState, TryPushError};

/// Cloneable producer-side handle to a relay.
///
/// Every clone feeds the same intake and shares the same shutdown signal, so
/// any number of producer tasks can push while one of them calls [`stop`].
///
/// [`stop`]: RelayHandle::stop
#[derive(Debug)]
pub struct RelayHandle<T> {
    intake: flume::Sender<T>,
    shutdown: CancellationToken,
    state: watch::Receiver<RelayState>,
}

impl<T> Clone for RelayHandle<T> {
    fn clone(&self) -> Self {
        Self {
            intake: self.intake.clone(),
            shutdown: self.shutdown.clone(),
            state: self.state.clone(),
        }
    }
}

impl<T> RelayHandle<T> {
    pub(crate) const fn new(
        intake: flume::Sender<T>,
        shutdown: CancellationToken,
        state: watch::Receiver<RelayState>,
    ) -> Self {
        Self {
            intake,
            shutdown,
            state,
        }
    }

    /// Submit one event, suspending until the relay takes it.
    ///
    /// # Panics
    ///
    /// Panics if [`stop`](Self::stop) has already been requested, or if the
    /// relay closes its intake while this push is still waiting. Producers
    /// must stop pushing before, or at the same point as, they request
    /// shutdown.
    pub async fn push(&self, event: T) {
        assert!(
            !self.shutdown.is_cancelled(),
            "push after stop: relay intake is closed"
        );
        let accepted = self.intake.send_async(event).await.is_ok();
        assert!(accepted, "push on closed relay intake");
    }

    /// Submit one event without suspending. Succeeds only if the relay can
    /// take it right now.
    pub fn try_push(&self, event: T) -> Result<(), TryPushError<T>> {
        if self.shutdown.is_cancelled() {
            return Err(TryPushError::Closed(event));
        }
        self.intake.try_send(event).map_err(|e| match e {
            flume::TrySendError::Full(event) => TryPushError::Full(event),
            flume::TrySendError::Disconnected(event) => TryPushError::Closed(event),
        })
    }

    /// Request graceful shutdown. Returns immediately; completion is
    /// observed when the deliveries stream closes.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RelayState {
        *self.state.borrow()
    }

    /// Wait until the coordination loop has closed the deliveries stream.
    ///
    /// Also returns if the loop is gone without reaching [`RelayState::Closed`]
    /// (for example, the relay was dropped before it was started).
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        if state.wait_for(|s| s.is_closed()).await.is_err() {
            debug!("Relay loop gone without closing");
        }
    }
}

/// Single-consumer receive side of a relay's output stream.
#[derive(Debug)]
pub struct Deliveries<T> {
    rx: flume::Receiver<T>,
}

impl<T> Deliveries<T> {
    pub(crate) const fn new(rx: flume::Receiver<T>) -> Self {
        Self { rx }
    }

    /// Receive the next event, or `None` once the relay has closed the
    /// stream. Every call after the first `None` also returns `None`.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv_async().await.ok()
    }

    /// Convert into a [`Stream`] of events that ends when the relay closes.
    pub fn into_stream(self) -> impl Stream<Item = T>
    where
        T: 'static,
    {
        self.rx.into_stream()
    }
}
