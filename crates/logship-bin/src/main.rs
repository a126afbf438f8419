//! logship - ship GELF logs with local caching and retry.

mod app;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use logship_core::{init_logging_with_file, Destination, Level, Paths, ShipperConfig, TransportKind};
use serde_json::Value;

/// logship command-line interface.
#[derive(Parser)]
#[command(name = "logship")]
#[command(about = "Ship GELF logs to a collector, caching what cannot be delivered")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config and logs. Defaults to ~/.logship
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Also write JSON logs to <base dir>/logs/logship.jsonl
    #[arg(long, global = true)]
    log_file: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one event
    Send {
        #[command(flatten)]
        destination: DestinationArgs,

        #[command(flatten)]
        event: EventArgs,

        /// Short message
        message: String,

        /// Long message, e.g. a backtrace
        #[arg(long)]
        full_message: Option<String>,
    },
    /// Send each line of stdin as an event until EOF or Ctrl-C
    Pipe {
        #[command(flatten)]
        destination: DestinationArgs,

        #[command(flatten)]
        event: EventArgs,
    },
    /// Resubmit cached entries now
    Flush,
    /// Show cache status
    Status,
}

#[derive(Args)]
struct DestinationArgs {
    /// Transport kind (http, https, udp)
    #[arg(long, default_value = "http")]
    kind: TransportKind,

    /// Collector host
    #[arg(long)]
    host: String,

    /// Collector input port
    #[arg(long, default_value_t = 12201)]
    port: u16,

    /// Drop events less severe than this level
    #[arg(long)]
    max_level: Option<Level>,
}

impl DestinationArgs {
    fn destination(&self) -> Destination {
        let destination = Destination::new(self.kind, self.host.clone(), self.port);
        match self.max_level {
            Some(level) => destination.with_max_level(level),
            None => destination,
        }
    }
}

#[derive(Args)]
struct EventArgs {
    /// Event level
    #[arg(long, default_value = "alert")]
    level: Level,

    /// Source host reported in the event
    #[arg(long)]
    source: Option<String>,

    /// Additional field as key=value. JSON values are kept typed.
    #[arg(short, long = "field", value_parser = parse_field)]
    fields: Vec<(String, Value)>,
}

fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = ShipperConfig::load(&paths)?;

    let log_level = cli.log_level.unwrap_or_else(|| config.log_level.clone());
    let log_file = cli.log_file.then(|| paths.log_file());
    init_logging_with_file(&log_level, log_file)?;

    match cli.command {
        Commands::Send {
            destination,
            event,
            message,
            full_message,
        } => {
            let template = app::EventTemplate::new(event.level, event.source, event.fields);
            app::send(
                &config,
                &paths,
                destination.destination(),
                template.event(message, full_message),
            )
            .await?;
        }
        Commands::Pipe { destination, event } => {
            let template = app::EventTemplate::new(event.level, event.source, event.fields);
            app::pipe(&config, &paths, destination.destination(), template).await?;
        }
        Commands::Flush => {
            app::flush(&config, &paths).await?;
        }
        Commands::Status => {
            app::status(&config, &paths)?;
        }
    }

    Ok(())
}
