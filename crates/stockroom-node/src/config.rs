//! Node configuration.
//!
//! Values come from the environment. `.env.local` is loaded first when
//! present, so a workstation can keep its settings next to the binary.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use stockroom_core::EtaPolicy;
use thiserror::Error;
use tracing::debug;

pub const ENV_ADDR: &str = "STOCKROOM_ADDR";
pub const ENV_ETA_BUSINESS_DAYS: &str = "STOCKROOM_ETA_BUSINESS_DAYS";
pub const ENV_HOLIDAYS: &str = "STOCKROOM_HOLIDAYS";
pub const ENV_SEED_FILE: &str = "STOCKROOM_SEED_FILE";

/// Optional file of `KEY=value` lines read before the environment.
pub const ENV_FILE: &str = ".env.local";

const DEFAULT_ADDR: &str = "0.0.0.0:3000";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{key} is not a valid value: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("could not read seed file {path}: {source}")]
    SeedRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("seed file {path} is not valid: {source}")]
    SeedParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Node settings.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Address the HTTP server binds to.
    pub addr: SocketAddr,

    /// How default delivery estimates are computed.
    pub eta_policy: EtaPolicy,

    /// JSON file with catalog entries and orders to load at startup.
    pub seed_file: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            eta_policy: EtaPolicy::default(),
            seed_file: None,
        }
    }
}

impl NodeConfig {
    /// Load `.env.local` (if any), then read the process environment.
    ///
    /// Install the tracing subscriber first or the file's outcome goes
    /// unlogged.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_env_file(Path::new(ENV_FILE));
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let addr_raw = lookup(ENV_ADDR).unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key: ENV_ADDR,
            value: addr_raw.clone(),
        })?;

        let mut eta_policy = EtaPolicy::default();
        if let Some(raw) = lookup(ENV_ETA_BUSINESS_DAYS) {
            let days = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: ENV_ETA_BUSINESS_DAYS,
                value: raw.clone(),
            })?;
            eta_policy = eta_policy.with_business_days(days);
        }
        if let Some(raw) = lookup(ENV_HOLIDAYS) {
            eta_policy = eta_policy.with_holidays(parse_holidays(&raw)?);
        }

        let seed_file = lookup(ENV_SEED_FILE)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            addr,
            eta_policy,
            seed_file,
        })
    }
}

/// Export the variables in `path` into the process environment. Returns
/// true if the file was loaded.
fn load_env_file(path: &Path) -> bool {
    match dotenvy::from_path(path) {
        Ok(()) => {
            debug!(path = %path.display(), "loaded environment file");
            true
        }
        Err(e) if e.not_found() => false,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "ignoring unreadable environment file");
            false
        }
    }
}

/// Comma-separated ISO dates. Blank entries are skipped.
fn parse_holidays(raw: &str) -> Result<Vec<NaiveDate>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            NaiveDate::parse_from_str(part, "%Y-%m-%d").map_err(|_| ConfigError::Invalid {
                key: ENV_HOLIDAYS,
                value: part.to_string(),
            })
        })
        .collect()
}
