//! Layered configuration: built-in defaults, then a TOML file, then
//! environment and command-line overrides (clap resolves those two).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gosolis_frame::DeviceId;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// File looked up in the home directory when `--config` is not given.
pub const DEFAULT_FILE_NAME: &str = ".gosolis.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("no serial port specified (use --port, GOSOLIS_PORT or inverter.port)")]
    MissingPort,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub inverter: InverterConfig,
    pub daemon: DaemonConfig,
}

/// Serial link and target device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InverterConfig {
    /// Serial device path, e.g. `/dev/ttyUSB0`. Empty means unset.
    pub port: String,
    pub addr: u8,
    pub baud: u32,
    /// Read deadline in milliseconds.
    pub timeout: u64,
}

impl Default for InverterConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            addr: 1,
            baud: 9600,
            timeout: 500,
        }
    }
}

impl InverterConfig {
    pub fn address(&self) -> DeviceId {
        DeviceId(self.addr)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// The configured port, or [`ConfigError::MissingPort`].
    pub fn require_port(&self) -> Result<&str> {
        if self.port.is_empty() {
            return Err(ConfigError::MissingPort);
        }
        Ok(&self.port)
    }
}

/// Polling cadence of `gosolis daemon`, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    pub interval: u64,
    pub probe_interval: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval: 30,
            probe_interval: 10,
        }
    }
}

impl DaemonConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval)
    }
}

/// Values supplied by flags or the environment. `None` keeps the file value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<String>,
    pub addr: Option<u8>,
    pub baud: Option<u32>,
    pub timeout: Option<u64>,
}

impl Config {
    /// Load the effective file configuration.
    ///
    /// An explicit path must exist. Without one, `~/.gosolis.toml` is used
    /// when present and the defaults otherwise. Returns the file that was
    /// read, if any.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_path() {
                Some(path) if path.is_file() => path,
                _ => {
                    debug!("no config file, using defaults");
                    return Ok((Self::default(), None));
                }
            },
        };

        let config = Self::from_file(&path)?;
        debug!(path = %path.display(), "loaded config file");
        Ok((config, Some(path)))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply(&mut self, overrides: Overrides) {
        let inverter = &mut self.inverter;
        if let Some(port) = overrides.port {
            inverter.port = port;
        }
        if let Some(addr) = overrides.addr {
            inverter.addr = addr;
        }
        if let Some(baud) = overrides.baud {
            inverter.baud = baud;
        }
        if let Some(timeout) = overrides.timeout {
            inverter.timeout = timeout;
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DEFAULT_FILE_NAME))
}
