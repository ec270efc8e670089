//! Producer and consumer tasks for the demo.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use rlbuffer_core::{Deliveries, RelayHandle};

/// Push `E1`, `E2`, ... every `interval` until cancelled or `max_events`
/// have been produced, then request relay shutdown.
///
/// The producer is the only task that calls `stop`, and it never pushes
/// after doing so. Returns the number of events pushed.
pub async fn produce(
    relay: RelayHandle<String>,
    interval: Duration,
    max_events: Option<u64>,
    cancel: CancellationToken,
) -> u64 {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // Skip first immediate tick
    let mut produced = 0u64;

    loop {
        if max_events.is_some_and(|max| produced >= max) {
            info!(produced, "Reached event limit");
            break;
        }
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let event = format!("E{}", produced + 1);
                relay.push(event.clone()).await;
                info!(event = %event, "[PUB]");
                produced += 1;
            }
        }
    }

    info!("Stop producing");
    relay.stop();
    produced
}

/// Log every delivery until the relay closes its output stream.
///
/// On cancellation the consumer keeps reading so the relay can drain.
/// Returns the number of events received.
pub async fn consume(mut deliveries: Deliveries<String>, cancel: CancellationToken) -> u64 {
    let mut received = 0u64;

    loop {
        tokio::select! {
            event = deliveries.recv() => {
                let Some(event) = event else { break };
                info!(event = %event, "[RECV]");
                received += 1;
            }
            () = cancel.cancelled() => {
                info!("Draining last events");
                while let Some(event) = deliveries.recv().await {
                    info!(event = %event, "[RECV]");
                    received += 1;
                }
                break;
            }
        }
    }

    info!(received, "Stop consuming");
    received
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use rlbuffer_core::{PacedRelay, Relay, RelayConfig};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn bounded_run_delivers_everything_produced() {
        let mut relay = Relay::with_config(RelayConfig::new(8));
        let deliveries = relay.deliveries().unwrap();
        relay.start();
        let cancel = CancellationToken::new();

        let consumer = tokio::spawn(consume(deliveries, cancel.clone()));
        let produced = produce(
            relay.handle(),
            Duration::from_millis(300),
            Some(12),
            cancel.clone(),
        )
        .await;

        assert_eq!(produced, 12);
        assert_eq!(consumer.await.unwrap(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_drains_in_flight_events() {
        let mut relay = Relay::with_config(RelayConfig::new(8));
        let deliveries = relay.deliveries().unwrap();
        relay.start();
        let cancel = CancellationToken::new();

        let consumer = tokio::spawn(consume(deliveries, cancel.clone()));
        let producer = tokio::spawn(produce(
            relay.handle(),
            Duration::from_millis(300),
            None,
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(2_050)).await;
        cancel.cancel();

        let produced = producer.await.unwrap();
        let received = consumer.await.unwrap();
        assert!(produced > 0);
        assert_eq!(produced, received);
    }

    #[tokio::test(start_paused = true)]
    async fn paced_relay_works_with_same_workers() {
        let mut relay = PacedRelay::new(4, 10.0).unwrap();
        let deliveries = relay.deliveries().unwrap();
        relay.start();
        let cancel = CancellationToken::new();

        let consumer = tokio::spawn(consume(deliveries, cancel.clone()));
        let produced = produce(relay.handle(), Duration::from_millis(50), Some(6), cancel).await;

        assert_eq!(produced, 6);
        assert_eq!(consumer.await.unwrap(), 6);
    }
}
