//! Settings loaded from a TOML file.
//!
//! Lookup order: explicit `--config` path, `SPACEFILER_CONFIG`, then
//! `./spacefiler.toml` when it exists. Missing files fall back to defaults;
//! a file that exists but does not parse is an error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const CONFIG_ENV: &str = "SPACEFILER_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "spacefiler.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory scanned on startup when no path is given on the command line.
    pub root: Option<PathBuf>,
    /// Entry names the scanner skips, e.g. `.git` or `node_modules`.
    pub exclude: Vec<String>,
    /// Size of the scanner's thread pool; `None` uses all cores.
    pub scan_threads: Option<usize>,
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// tracing filter directive, overridden by `RUST_LOG`
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Settings {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            if !env_path.is_empty() {
                return Self::load_from_file(Path::new(&env_path));
            }
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            return Self::load_from_file(local);
        }
        Ok(Self::default())
    }

    /// Command-line path first, then the configured root, then the working directory.
    pub fn scan_root(&self, cli: Option<PathBuf>) -> PathBuf {
        cli.or_else(|| self.root.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
