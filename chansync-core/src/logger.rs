//! Global tracing subscriber: compact events on stderr, full records appended to a log file.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::fmt::{self, format::FmtSpan};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset or does not parse.
const DEFAULT_FILTER: &str = "info,sqlx=warn";

/// Installs the global tracing subscriber.
///
/// Stderr gets compact events, leaving stdout to command output. `log_file_path` gets
/// every event with thread ids and span timings; its directory is created if missing.
/// `RUST_LOG` filters both, e.g. `reconciler=debug,telegram_export=trace`. Load `.env`
/// before calling this.
pub fn init_tracing(log_file_path: impl AsRef<Path>) -> anyhow::Result<()> {
    let file = open_log_file(log_file_path.as_ref())?;

    let console = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(false);
    let file = fmt::layer()
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .with_thread_ids(true)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(console)
        .with(file)
        .try_init()
        .context("Install global tracing subscriber")
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Opens `path` for appending, creating the file and its parent directory.
fn open_log_file(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Open log file {}", path.display()))
}
