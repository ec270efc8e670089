//! Channel wiring shared by the relay policies.
//!
//! A relay is three conduits plus a published lifecycle state. The loop side
//! ([`Conduits`]) is moved into the spawned task; the caller side is split
//! into a cloneable [`RelayHandle`] and the single [`Deliveries`] receiver.
//!
//! The output stream is a zero-capacity `flume` channel: a send completes
//! only once the consumer takes the event. Intake is zero-capacity as well
//! unless the policy asks for a buffer.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::handle::{Deliveries, RelayHandle};
use super::types::RelayState;

/// Loop-side ends of a relay's conduits.
pub(crate) struct Conduits<T> {
    intake: Option<flume::Receiver<T>>,
    pub output: flume::Sender<T>,
    pub shutdown: CancellationToken,
    state: watch::Sender<RelayState>,
}

impl<T> Conduits<T> {
    pub fn set_state(&self, state: RelayState) {
        self.state.send_replace(state);
    }

    /// Next event a producer hands over. `None` once every producer-side
    /// sender is gone or the intake has been sealed.
    pub async fn next_intake(&self) -> Option<T> {
        match &self.intake {
            Some(intake) => intake.recv_async().await.ok(),
            None => None,
        }
    }

    /// Close the intake and return whatever was already buffered in it.
    ///
    /// Producers still waiting to hand over an event see a closed intake.
    pub fn seal_intake(&mut self) -> Vec<T> {
        self.intake
            .take()
            .map(|intake| intake.drain().collect())
            .unwrap_or_default()
    }

    /// Close the output stream and publish [`RelayState::Closed`].
    pub fn close(mut self, delivered: u64) {
        let abandoned = self.seal_intake().len();
        let Self { output, state, .. } = self;
        drop(output);
        state.send_replace(RelayState::Closed);
        info!(delivered, abandoned, "Relay closed");
    }
}

/// Build the conduits for a relay whose intake buffers `intake_depth` events
/// (zero for a direct handoff to the loop).
pub(crate) fn wire<T>(intake_depth: usize) -> (Conduits<T>, RelayHandle<T>, Deliveries<T>) {
    let (intake_tx, intake_rx) = flume::bounded(intake_depth);
    let (output_tx, output_rx) = flume::bounded(0);
    let (state_tx, state_rx) = watch::channel(RelayState::Created);
    let shutdown = CancellationToken::new();

    let conduits = Conduits {
        intake: Some(intake_rx),
        output: output_tx,
        shutdown: shutdown.clone(),
        state: state_tx,
    };
    let handle = RelayHandle::new(intake_tx, shutdown, state_rx);
    (conduits, handle, Deliveries::new(output_rx))
}

/// The consumer dropped its [`Deliveries`]; nothing more can be delivered.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConsumerGone {
    pub undelivered: usize,
}
