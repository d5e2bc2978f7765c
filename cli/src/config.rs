// Configuration file handling for the ampctl CLI.
//
// Looks for `ampctl.toml` in the working directory unless `--config` names
// a file. Every key is optional; command-line flags override file values.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use ampctl::Dialect;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "ampctl.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AmpConfig {
    /// Serial port path (e.g. "/dev/ttyUSB0", "COM3").
    pub port_name: Option<String>,
    /// Pause after each write, in milliseconds.
    pub write_delay_ms: u64,
    /// Firmware dialect: "legacy" or "constrained".
    pub dialect: Dialect,
    /// Health monitor period, in seconds.
    pub monitor_period_secs: u64,
    /// TOML file holding the last known zone states, replayed on recovery.
    pub state_file: Option<PathBuf>,
}

impl Default for AmpConfig {
    fn default() -> Self {
        AmpConfig {
            port_name: None,
            write_delay_ms: 100,
            dialect: Dialect::default(),
            monitor_period_secs: 15,
            state_file: None,
        }
    }
}

impl AmpConfig {
    /// Load the config.
    ///
    /// An explicit path must exist. Without one, `ampctl.toml` in the
    /// working directory is used if present, otherwise the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    bail!("config file {} does not exist", path.display());
                }
                path.to_path_buf()
            }
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !path.exists() {
                    tracing::trace!("No config file, using defaults");
                    return Ok(Self::default());
                }
                path
            }
        };

        tracing::debug!(path = %path.display(), "Loading config");
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        tracing::debug!(
            port = ?config.port_name,
            dialect = %config.dialect,
            write_delay_ms = config.write_delay_ms,
            "Config loaded"
        );
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        if config.monitor_period_secs == 0 {
            bail!("monitor_period_secs must be at least 1");
        }
        Ok(config)
    }

    pub fn write_delay(&self) -> Duration {
        Duration::from_millis(self.write_delay_ms)
    }

    pub fn monitor_period(&self) -> Duration {
        Duration::from_secs(self.monitor_period_secs)
    }
}
