//! Command implementations.

use std::sync::Arc;

use anyhow::Context;
use logship_cache::{CacheStore, MemoryCacheStore, SqliteCacheStore};
use logship_core::{CacheBackend, Destination, Level, Paths, ShipperConfig};
use logship_delivery::{DeliveryGate, FlushReport, GateConfig, KindRouter};
use logship_input::{LogDisposition, LogEvent, LogInput};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Level, host and fields shared by every event of one command.
pub struct EventTemplate {
    level: Level,
    source: Option<String>,
    fields: Vec<(String, Value)>,
}

impl EventTemplate {
    pub fn new(level: Level, source: Option<String>, fields: Vec<(String, Value)>) -> Self {
        Self {
            level,
            source,
            fields,
        }
    }

    pub fn event(&self, message: String, full_message: Option<String>) -> LogEvent {
        let mut event = LogEvent::new(message).with_level(self.level);
        if let Some(full_message) = full_message {
            event = event.with_full_message(full_message);
        }
        if let Some(source) = &self.source {
            event = event.with_host(source.clone());
        }
        for (key, value) in &self.fields {
            event = event.field(key.clone(), value);
        }
        event
    }
}

fn open_store(config: &ShipperConfig, paths: &Paths) -> anyhow::Result<Arc<dyn CacheStore>> {
    Ok(match config.cache_backend {
        CacheBackend::Memory => Arc::new(MemoryCacheStore::new()),
        CacheBackend::Sqlite => {
            let path = config.cache_path(paths);
            let store = SqliteCacheStore::open(&path)
                .with_context(|| format!("failed to open cache at {}", path.display()))?;
            Arc::new(store)
        }
    })
}

fn open_gate(config: &ShipperConfig, paths: &Paths) -> anyhow::Result<Arc<DeliveryGate>> {
    let store = open_store(config, paths)?;
    let transport = Arc::new(KindRouter::standard().context("failed to build transports")?);
    let gate = DeliveryGate::new(GateConfig::from(config), transport, store)?;
    Ok(Arc::new(gate))
}

fn print_disposition(disposition: LogDisposition) {
    match disposition {
        LogDisposition::Delivered => println!("Delivered"),
        LogDisposition::Queued => println!("Collector unavailable, event cached for retry"),
        LogDisposition::Filtered => println!("Filtered by level, nothing sent"),
    }
}

fn print_report(report: &FlushReport) {
    match report.skipped {
        Some(reason) => println!("Flush skipped: {reason:?}"),
        None => println!(
            "Flushed {} cached entries: {} delivered, {} retained",
            report.attempted, report.delivered, report.retained
        ),
    }
}

/// Send one event.
pub async fn send(
    config: &ShipperConfig,
    paths: &Paths,
    destination: Destination,
    event: LogEvent,
) -> anyhow::Result<()> {
    let gate = open_gate(config, paths)?;
    let input = LogInput::new(destination, gate);

    let disposition = input.log(event).await?;
    print_disposition(disposition);
    if disposition == LogDisposition::Queued && config.cache_backend == CacheBackend::Memory {
        warn!("Memory cache is discarded on exit; use the sqlite backend to keep undelivered events");
    }
    Ok(())
}

/// Send stdin line by line. The gate's timer keeps draining the cache
/// while input is flowing; remaining entries get one last flush on exit.
pub async fn pipe(
    config: &ShipperConfig,
    paths: &Paths,
    destination: Destination,
    template: EventTemplate,
) -> anyhow::Result<()> {
    let gate = open_gate(config, paths)?;
    let input = LogInput::new(destination, Arc::clone(&gate));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sent = 0usize;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match input.log(template.event(line, None)).await {
                    Ok(_) => sent += 1,
                    Err(e) => warn!(error = %e, "Dropped line"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    info!(lines = sent, "Input finished");
    if gate.has_pending()? {
        print_report(&gate.flush().await);
    }
    let pending = gate.pending_count()?;
    if pending > 0 {
        println!("{pending} entries remain cached");
    }
    Ok(())
}

/// Resubmit cached entries.
pub async fn flush(config: &ShipperConfig, paths: &Paths) -> anyhow::Result<()> {
    if config.cache_backend == CacheBackend::Memory {
        println!("Memory cache is empty at startup, nothing to flush");
        return Ok(());
    }
    let gate = open_gate(config, paths)?;
    print_report(&gate.flush().await);
    Ok(())
}

/// Print cache status.
pub fn status(config: &ShipperConfig, paths: &Paths) -> anyhow::Result<()> {
    println!("Cache backend: {:?}", config.cache_backend);
    println!("Flush interval: {}s", config.flush_interval_secs);

    if config.cache_backend == CacheBackend::Sqlite {
        let path = config.cache_path(paths);
        println!("Cache file: {}", path.display());
        if !path.exists() {
            println!("Pending: 0");
            return Ok(());
        }
        let store = SqliteCacheStore::open(&path)
            .with_context(|| format!("failed to open cache at {}", path.display()))?;
        println!("Pending: {}", store.pending_count()?);
        let invalid = store.invalid_count()?;
        if invalid > 0 {
            println!("Set aside (undecodable): {invalid}");
        }
    }
    Ok(())
}
