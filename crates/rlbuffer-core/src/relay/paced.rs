//! Paced relay: token-bucket forwarding at a fixed events-per-second rate.
//!
//! Intake is a bounded buffer of `capacity` events. The loop forwards them
//! one by one, never faster than `events_per_sec` (burst of one). Stop
//! drains the buffer at the same pace and then closes the output stream.

use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::conduit::{Conduits, wire};
use super::handle::{Deliveries, RelayHandle};
use super::types::{MIN_CAPACITY, RelayState, TryPushError};
use crate::error::{Error, Result};

/// Relay that forwards events individually at a bounded rate.
pub struct PacedRelay<T> {
    capacity: usize,
    events_per_sec: f64,
    handle: RelayHandle<T>,
    pipe: Option<PacedPipe<T>>,
    deliveries: Option<Deliveries<T>>,
}

impl<T: Send + 'static> PacedRelay<T> {
    /// Create a paced relay buffering up to `capacity` events and emitting
    /// at most `events_per_sec` of them per second.
    pub fn new(capacity: usize, events_per_sec: f64) -> Result<Self> {
        let period = pacing_period(events_per_sec)?;
        let capacity = capacity.max(MIN_CAPACITY);

        let (conduits, handle, deliveries) = wire(capacity);
        Ok(Self {
            capacity,
            events_per_sec,
            handle,
            pipe: Some(PacedPipe {
                period,
                conduits,
                delivered: 0,
            }),
            deliveries: Some(deliveries),
        })
    }

    /// Spawn the forwarding loop on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(&mut self) {
        let Some(pipe) = self.pipe.take() else {
            warn!("Paced relay already started");
            return;
        };
        tokio::spawn(pipe.run());
    }
}

impl<T> PacedRelay<T> {
    /// Take the consumer side of the output stream. Returns `None` after
    /// the first call: the stream has a single consumer.
    pub fn deliveries(&mut self) -> Option<Deliveries<T>> {
        self.deliveries.take()
    }

    /// Submit one event, suspending while the buffer is full.
    ///
    /// # Panics
    ///
    /// Panics if [`stop`](Self::stop) has already been requested.
    pub async fn push(&self, event: T) {
        self.handle.push(event).await;
    }

    /// Submit one event without suspending. Fails with
    /// [`TryPushError::Full`] while the buffer is full.
    pub fn try_push(&self, event: T) -> std::result::Result<(), TryPushError<T>> {
        self.handle.try_push(event)
    }

    /// Request graceful shutdown; returns immediately. The buffer is still
    /// forwarded at the configured rate before the stream closes.
    pub fn stop(&self) {
        self.handle.stop();
    }

    /// A cloneable producer-side handle for other tasks.
    pub fn handle(&self) -> RelayHandle<T> {
        self.handle.clone()
    }

    /// Current lifecycle state of the forwarding loop.
    pub fn state(&self) -> RelayState {
        self.handle.state()
    }

    /// Wait until the deliveries stream has been closed.
    pub async fn closed(&self) {
        self.handle.closed().await;
    }

    /// Intake buffer size (after the minimum is applied).
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Maximum forwarding rate.
    pub const fn events_per_sec(&self) -> f64 {
        self.events_per_sec
    }
}

/// Minimum spacing between two forwarded events.
fn pacing_period(events_per_sec: f64) -> Result<Duration> {
    if !events_per_sec.is_finite() || events_per_sec <= 0.0 {
        return Err(Error::InvalidSetting {
            name: "events_per_sec",
            reason: format!("must be a positive finite number, got {events_per_sec}"),
        });
    }
    Duration::try_from_secs_f64(events_per_sec.recip())
        .map(|period| period.max(Duration::from_nanos(1)))
        .map_err(|e| Error::InvalidSetting {
            name: "events_per_sec",
            reason: e.to_string(),
        })
}

struct PacedPipe<T> {
    period: Duration,
    conduits: Conduits<T>,
    delivered: u64,
}

impl<T: Send + 'static> PacedPipe<T> {
    async fn run(mut self) {
        self.conduits.set_state(RelayState::Running);
        info!(period_ms = self.period.as_millis(), "Paced relay started");

        // First tick is immediate; after an idle spell the bucket holds one
        // token again.
        let mut pacer = time::interval(self.period);
        pacer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut consumer_gone = false;
        loop {
            tokio::select! {
                biased;
                () = self.conduits.shutdown.cancelled() => break,
                event = self.conduits.next_intake() => {
                    let Some(event) = event else {
                        debug!("Every relay producer dropped, shutting down");
                        break;
                    };
                    pacer.tick().await;
                    if !self.forward(event).await {
                        consumer_gone = true;
                        break;
                    }
                }
            }
        }

        if !consumer_gone {
            self.conduits.set_state(RelayState::Draining);
            let leftover = self.conduits.seal_intake();
            debug!(leftover = leftover.len(), "Paced relay draining");
            for event in leftover {
                pacer.tick().await;
                if !self.forward(event).await {
                    consumer_gone = true;
                    break;
                }
            }
        }

        if consumer_gone {
            warn!("Relay deliveries dropped by consumer, closing");
        }
        self.conduits.close(self.delivered);
    }

    async fn forward(&mut self, event: T) -> bool {
        if self.conduits.output.send_async(event).await.is_err() {
            return false;
        }
        self.delivered += 1;
        true
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use tokio::time::Instant;

    use super::*;

    #[test]
    fn rejects_non_positive_rate() {
        assert!(matches!(
            PacedRelay::<u32>::new(4, 0.0),
            Err(Error::InvalidSetting { name: "events_per_sec", .. })
        ));
        assert!(PacedRelay::<u32>::new(4, -1.0).is_err());
        assert!(PacedRelay::<u32>::new(4, f64::NAN).is_err());
        assert!(PacedRelay::<u32>::new(4, f64::INFINITY).is_err());
    }

    #[test]
    fn pacing_period_is_reciprocal_of_rate() {
        assert_eq!(pacing_period(2.0).unwrap(), Duration::from_millis(500));
        assert_eq!(pacing_period(0.5).unwrap(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn forwards_no_faster_than_rate() {
        let mut relay = PacedRelay::new(8, 2.0).unwrap();
        let mut deliveries = relay.deliveries().unwrap();
        relay.start();
        let t0 = Instant::now();

        for i in 0..4u32 {
            relay.push(i).await;
        }

        for (i, expected_ms) in [0u64, 500, 1000, 1500].into_iter().enumerate() {
            assert_eq!(deliveries.recv().await, Some(u32::try_from(i).unwrap()));
            assert_eq!(t0.elapsed(), Duration::from_millis(expected_ms));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_drains_buffer_then_closes() {
        let mut relay = PacedRelay::new(4, 10.0).unwrap();
        let mut deliveries = relay.deliveries().unwrap();
        relay.start();

        relay.push("a").await;
        relay.push("b").await;
        relay.push("c").await;
        relay.stop();

        assert_eq!(deliveries.recv().await, Some("a"));
        assert_eq!(deliveries.recv().await, Some("b"));
        assert_eq!(deliveries.recv().await, Some("c"));
        assert_eq!(deliveries.recv().await, None);
        relay.closed().await;
        assert_eq!(relay.state(), RelayState::Closed);
    }

    #[tokio::test]
    #[should_panic(expected = "push after stop")]
    async fn push_after_stop_panics() {
        let mut relay = PacedRelay::new(4, 10.0).unwrap();
        let _deliveries = relay.deliveries().unwrap();
        relay.start();
        relay.stop();
        relay.push("late").await;
    }

    #[tokio::test]
    async fn buffer_capacity_bounds_try_push() {
        let relay: PacedRelay<u32> = PacedRelay::new(2, 1.0).unwrap();
        relay.try_push(1).unwrap();
        relay.try_push(2).unwrap();
        assert!(matches!(relay.try_push(3), Err(TryPushError::Full(3))));
    }
}
