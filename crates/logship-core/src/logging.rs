//! Logging initialization.
//!
//! Installs a `tracing` subscriber with a compact stderr layer and an
//! optional JSONL file layer. The filter comes from `RUST_LOG` when set,
//! otherwise from the configured level.

use crate::{CoreError, CoreResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Append-only log file writer, flushed after every line.
#[derive(Clone)]
pub struct LogFileWriter {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl LogFileWriter {
    pub fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::with_capacity(8192, file))),
        })
    }
}

impl Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock();
        let written = guard.write(buf)?;
        guard.flush()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for LogFileWriter {
    type Writer = LogFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize logging to stderr only.
///
/// # Example
///
/// ```ignore
/// logship_core::init_logging("info")?;
/// tracing::info!("shipper started");
/// ```
pub fn init_logging(level: &str) -> CoreResult<()> {
    init_logging_with_file(level, None)
}

/// Initialize logging to stderr and, when `log_file` is given, to a JSONL file.
pub fn init_logging_with_file(level: &str, log_file: Option<PathBuf>) -> CoreResult<()> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .compact()
        .with_writer(io::stderr)
        .with_filter(env_filter(level));

    let file_layer = match log_file {
        Some(path) => {
            let writer = LogFileWriter::new(&path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(writer)
                    .with_filter(env_filter(level)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| CoreError::Config(format!("failed to install log subscriber: {e}")))?;

    Ok(())
}
