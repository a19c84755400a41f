//! Configuration loading
//!
//! Priority order: command-line argument, then the optional TOML config
//! file, then the compiled-in device defaults. The log level additionally
//! honors the `LOGLEVEL` environment variable and the on-device debug
//! marker file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::{logreader, resolver, scrobble, server};

/// Fraction of a track's duration (percent) that must play for a listened
/// verdict.
pub const DEFAULT_LISTEN_PERCENT: u32 = 50;

/// Existence of this file switches the daemon to debug logging, for devices
/// where setting environment variables is inconvenient.
pub const DEBUG_MARKER_FILE: &str = "/tmp/scrd";

/// Daemon configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Kernel log device to observe.
    pub log_device: String,
    /// Unix socket path of the status server.
    pub socket_path: PathBuf,
    /// Scrobble log file on internal storage.
    pub scrobble_log: PathBuf,
    /// MTP object database used by the resolver.
    pub db_path: String,
    /// Listen threshold percent in (0, 100]; out-of-range values snap back
    /// to the default when applied.
    pub listen_percent: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_device: logreader::DEFAULT_LOG_DEVICE.to_string(),
            socket_path: PathBuf::from(server::DEFAULT_SOCKET_PATH),
            scrobble_log: PathBuf::from(scrobble::DEFAULT_LOG_PATH),
            db_path: resolver::DEFAULT_DB_PATH.to_string(),
            listen_percent: DEFAULT_LISTEN_PERCENT,
        }
    }
}

impl Config {
    /// Load the config file when given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("cannot parse {}: {e}", path.display())))
    }
}

/// True when debug logging was requested via environment or marker file.
pub fn debug_logging() -> bool {
    if std::env::var("LOGLEVEL")
        .map(|v| v.eq_ignore_ascii_case("debug"))
        .unwrap_or(false)
    {
        return true;
    }

    Path::new(DEBUG_MARKER_FILE).exists()
}
