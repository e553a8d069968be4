//! Logging setup: console plus an append-mode log file.

use anyhow::Context;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Crates whose events are logged.
const TARGETS: [&str; 2] = ["wp_migrate", "wp_migrator"];

/// Install the process-wide subscriber.
///
/// The console follows `RUST_LOG` when set, otherwise the verbosity flag.
/// The log file always receives the full debug trace.
pub fn init(verbose: u8, log_file: &Path) -> anyhow::Result<()> {
    let console_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(console_level)));
    let file_filter = EnvFilter::new(directives("debug"));

    let file = open_log_file(log_file)?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .with(
            fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .try_init()
        .context("failed to install the logging subscriber")?;

    Ok(())
}

fn directives(level: &str) -> String {
    TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Open `path` for appending, creating it if needed.
pub fn open_log_file(path: &Path) -> anyhow::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}
