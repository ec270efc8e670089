//! rlbuffer Demo
//!
//! Drives a rate-limited relay with one producer and one consumer task.
//! Ctrl+C stops the producer, which requests relay shutdown; the consumer
//! keeps reading until the relay has drained and closed its output.

mod workers;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use rlbuffer_core::config::{Config, RelayPolicy, load_config};
use rlbuffer_core::tracing_init::init_tracing;
use rlbuffer_core::{Deliveries, PacedRelay, Relay, RelayHandle};

#[derive(Parser, Debug)]
#[command(name = "rlbuffer-demo")]
#[command(version, about = "rlbuffer demo - rate-limited producer/consumer")]
struct Args {
    /// Path to a JSON settings file (overrides the global settings file).
    #[arg(long, env = "RLBUFFER_CONFIG")]
    config: Option<PathBuf>,

    /// Relay policy.
    #[arg(long, value_parser = ["batched", "paced"])]
    policy: Option<String>,

    /// Staging capacity of the relay.
    #[arg(long)]
    capacity: Option<usize>,

    /// Flush window in milliseconds (batched policy).
    #[arg(long)]
    flush_window_ms: Option<u64>,

    /// Maximum delivery rate (paced policy).
    #[arg(long)]
    events_per_sec: Option<f64>,

    /// Interval between produced events in milliseconds.
    #[arg(long)]
    produce_interval_ms: Option<u64>,

    /// Stop after producing this many events.
    #[arg(long)]
    max_events: Option<u64>,

    /// Log level filter (e.g. "info", "debug").
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

impl Args {
    /// Apply CLI flags on top of the resolved configuration.
    fn apply(&self, config: &mut Config) -> anyhow::Result<()> {
        if let Some(policy) = &self.policy {
            config.relay.policy = policy.parse()?;
        }
        if let Some(capacity) = self.capacity {
            config.relay.capacity = capacity;
        }
        if let Some(ms) = self.flush_window_ms {
            config.relay.flush_window_ms = ms;
        }
        if let Some(rate) = self.events_per_sec {
            config.relay.events_per_sec = rate;
        }
        if let Some(ms) = self.produce_interval_ms {
            config.demo.produce_interval_ms = ms;
        }
        if self.max_events.is_some() {
            config.demo.max_events = self.max_events;
        }
        if let Some(level) = &self.log_level {
            config.logging.level.clone_from(level);
        }
        if self.log_json {
            config.logging.json = true;
        }
        config.validate()?;
        Ok(())
    }
}

/// Build and start the configured relay, returning the producer handle and
/// the consumer side.
fn start_relay(config: &Config) -> anyhow::Result<(RelayHandle<String>, Deliveries<String>)> {
    match config.relay.policy {
        RelayPolicy::Batched => {
            let mut relay = Relay::with_config(config.relay.relay_config());
            let deliveries = relay
                .deliveries()
                .context("relay deliveries already taken")?;
            relay.start();
            Ok((relay.handle(), deliveries))
        }
        RelayPolicy::Paced => {
            let mut relay = PacedRelay::new(config.relay.capacity, config.relay.events_per_sec)?;
            let deliveries = relay
                .deliveries()
                .context("relay deliveries already taken")?;
            relay.start();
            Ok((relay.handle(), deliveries))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config)?;

    init_tracing("rlbuffer_demo", &config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        policy = ?config.relay.policy,
        capacity = config.relay.capacity,
        flush_window_ms = config.relay.flush_window_ms,
        "Starting rlbuffer-demo"
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received SIGINT, initiating graceful shutdown");
        }
        signal_cancel.cancel();
    });

    let (handle, deliveries) = start_relay(&config)?;

    let consumer = tokio::spawn(workers::consume(deliveries, cancel.clone()));
    let producer = tokio::spawn(workers::produce(
        handle,
        Duration::from_millis(config.demo.produce_interval_ms),
        config.demo.max_events,
        cancel,
    ));

    let produced = producer.await?;
    let received = consumer.await?;

    info!(produced, received, "Exiting");
    Ok(())
}
