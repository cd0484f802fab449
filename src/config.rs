// ⚙️ Configuration - defaults, then environment, then CLI flags

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::fetch::{FileSource, HttpSource, SnapshotSource};

pub const ENV_BASE_URL: &str = "FISCAL_SHIFT_BASE_URL";
pub const ENV_DATA_DIR: &str = "FISCAL_SHIFT_DATA_DIR";
pub const ENV_LOG_JSON: &str = "FISCAL_SHIFT_LOG_JSON";
pub const ENV_BIND: &str = "FISCAL_SHIFT_BIND";

pub const DEFAULT_BIND: &str = "0.0.0.0:3000";

/// Where the two snapshots are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    Http { base_url: String },
    Directory { root: PathBuf },
}

impl SourceConfig {
    pub fn build(&self) -> Arc<dyn SnapshotSource> {
        match self {
            SourceConfig::Http { base_url } => Arc::new(HttpSource::new(base_url.clone())),
            SourceConfig::Directory { root } => Arc::new(FileSource::new(root.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub source: SourceConfig,
    pub log_json: bool,
    /// Listen address for the server binary
    pub bind: String,
}

/// Values supplied on the command line; None means "not given"
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub log_json: Option<bool>,
    pub bind: Option<String>,
}

impl Config {
    /// Resolve from the process environment and CLI overrides
    pub fn load(overrides: Overrides) -> Result<Self> {
        Self::resolve(|key| std::env::var(key).ok(), overrides)
    }

    /// Resolve with an explicit environment lookup.
    ///
    /// CLI beats environment. A data directory beats a base URL at the same
    /// level. With neither, `./` is used as the data directory.
    pub fn resolve<F>(env: F, overrides: Overrides) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_dir = env(ENV_DATA_DIR).filter(|s| !s.trim().is_empty()).map(PathBuf::from);
        let env_url = env(ENV_BASE_URL).filter(|s| !s.trim().is_empty());

        let source = match (overrides.data_dir, overrides.base_url) {
            (Some(root), _) => SourceConfig::Directory { root },
            (None, Some(base_url)) => SourceConfig::Http { base_url },
            (None, None) => match (env_dir, env_url) {
                (Some(root), _) => SourceConfig::Directory { root },
                (None, Some(base_url)) => SourceConfig::Http { base_url },
                (None, None) => SourceConfig::Directory {
                    root: PathBuf::from("."),
                },
            },
        };

        if let SourceConfig::Http { base_url } = &source {
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                bail!("Base URL must start with http:// or https://, got {:?}", base_url);
            }
        }

        let log_json = match overrides.log_json {
            Some(flag) => flag,
            None => env(ENV_LOG_JSON).map(|v| parse_bool(&v)).unwrap_or(false),
        };

        let bind = overrides
            .bind
            .or_else(|| env(ENV_BIND))
            .unwrap_or_else(|| DEFAULT_BIND.to_string());

        Ok(Config {
            source,
            log_json,
            bind,
        })
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
