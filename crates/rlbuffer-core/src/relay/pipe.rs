//! Coordination loop for the tick-batched relay.
//!
//! The loop owns the staging queue and the flush timer and is the only
//! writer to the output stream. It waits on shutdown, the flush tick and
//! intake, in that order of priority:
//!
//! - intake below the headroom (`len < capacity - 1`) is staged;
//! - intake at the headroom is held until the next tick, staged, and the
//!   whole queue is flushed immediately;
//! - a tick flushes whatever is staged;
//! - shutdown seals intake, flushes everything (including an event a
//!   producer handed over just before the seal), and closes the output
//!   stream.
//!
//! Intake and output are direct handoffs, so a producer stays suspended
//! while the loop holds an event for the tick or waits on the consumer.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::conduit::{Conduits, ConsumerGone};
use super::types::RelayState;

/// What caused a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushTrigger {
    Tick,
    Headroom,
    Shutdown,
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tick => "tick",
            Self::Headroom => "headroom",
            Self::Shutdown => "shutdown",
        })
    }
}

pub(crate) struct BatchPipe<T> {
    capacity: usize,
    flush_window: Duration,
    queue: VecDeque<T>,
    conduits: Conduits<T>,
    delivered: u64,
}

impl<T: Send + 'static> BatchPipe<T> {
    pub fn new(capacity: usize, flush_window: Duration, conduits: Conduits<T>) -> Self {
        Self {
            capacity,
            flush_window,
            queue: VecDeque::with_capacity(capacity),
            conduits,
            delivered: 0,
        }
    }

    pub async fn run(mut self) {
        self.conduits.set_state(RelayState::Running);
        info!(
            capacity = self.capacity,
            flush_window_ms = self.flush_window.as_millis(),
            "Relay started"
        );

        let mut ticker = time::interval_at(Instant::now() + self.flush_window, self.flush_window);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let outcome = loop {
            tokio::select! {
                biased;
                () = self.conduits.shutdown.cancelled() => break Ok(()),
                _ = ticker.tick() => {
                    if let Err(gone) = self.flush(FlushTrigger::Tick).await {
                        break Err(gone);
                    }
                }
                event = self.conduits.next_intake() => {
                    let Some(event) = event else {
                        debug!("Every relay producer dropped, shutting down");
                        break Ok(());
                    };
                    if self.has_headroom() {
                        self.queue.push_back(event);
                        continue;
                    }

                    // Hold the event back until the window boundary.
                    let stopping = tokio::select! {
                        biased;
                        () = self.conduits.shutdown.cancelled() => true,
                        _ = ticker.tick() => false,
                    };
                    self.queue.push_back(event);
                    if stopping {
                        break Ok(());
                    }
                    if let Err(gone) = self.flush(FlushTrigger::Headroom).await {
                        break Err(gone);
                    }
                }
            }
        };
        drop(ticker);

        match outcome {
            Ok(()) => self.drain().await,
            Err(gone) => warn!(
                undelivered = gone.undelivered,
                "Relay deliveries dropped by consumer, closing"
            ),
        }
        self.conduits.close(self.delivered);
    }

    fn has_headroom(&self) -> bool {
        self.queue.len() < self.capacity - 1
    }

    /// Final flush: everything staged, then whatever was already handed to
    /// the intake when it was sealed.
    async fn drain(&mut self) {
        self.conduits.set_state(RelayState::Draining);
        let leftover = self.conduits.seal_intake();
        debug!(
            staged = self.queue.len(),
            leftover = leftover.len(),
            "Relay draining"
        );
        self.queue.extend(leftover);

        if let Err(gone) = self.flush(FlushTrigger::Shutdown).await {
            warn!(
                undelivered = gone.undelivered,
                "Relay deliveries dropped by consumer during drain"
            );
        }
    }

    /// Send every staged event, oldest first. Each send waits until the
    /// consumer takes the event; there is no pacing between events of one
    /// batch.
    async fn flush(&mut self, trigger: FlushTrigger) -> Result<(), ConsumerGone> {
        if self.queue.is_empty() {
            return Ok(());
        }

        let batch = self.queue.len();
        while let Some(event) = self.queue.pop_front() {
            if self.conduits.output.send_async(event).await.is_err() {
                return Err(ConsumerGone {
                    undelivered: self.queue.len() + 1,
                });
            }
            self.delivered += 1;
        }

        debug!(batch, %trigger, "Flushed staging queue");
        Ok(())
    }
}
