//! tracing subscriber setup shared by both binaries.

use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::LogSettings;
use crate::error::{Error, Result};

/// Where log lines go when the settings do not name a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Stderr,
    /// Nothing is written; the TUI uses this when no log file is configured.
    Discard,
}

/// `RUST_LOG` overrides the configured level.
fn build_env_filter(settings: &LogSettings) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&settings.level)
        .map_err(|e| Error::Config(format!("invalid log level {:?}: {}", settings.level, e)))
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("cannot create log directory: {}", e)))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::Config(format!("cannot open log file {}: {}", path.display(), e)))
}

/// Install the global subscriber. Calling it twice is harmless: the second
/// call keeps the first subscriber.
pub fn init(settings: &LogSettings, fallback: Output) -> Result<()> {
    let filter = build_env_filter(settings)?;
    let base = Registry::default().with(filter);

    let installed = match (&settings.file, fallback) {
        (Some(path), _) => {
            let file = open_log_file(path)?;
            base.with(fmt::layer().with_target(true).with_ansi(false).with_writer(file))
                .try_init()
        }
        (None, Output::Stderr) => base
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init(),
        (None, Output::Discard) => base
            .with(fmt::layer().with_writer(std::io::sink))
            .try_init(),
    };

    if installed.is_err() {
        tracing::debug!("subscriber already installed");
    }
    Ok(())
}
