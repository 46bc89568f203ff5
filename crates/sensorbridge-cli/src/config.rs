//! Configuration – reads `~/.sensorbridge/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use sensorbridge_hal::SerialSettings;
use sensorbridge_runtime::AdapterConfig;
use sensorbridge_types::BridgeError;

/// User configuration. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Serial device path.
    #[serde(default = "default_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Sleep between availability checks while the device is idle.  Must be
    /// non-zero.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum wait for the rest of a partially received line.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Serve the bus channels over the rosbridge WebSocket protocol.
    #[serde(default = "default_bridge_enabled")]
    pub bridge_enabled: bool,

    /// Interface for the rosbridge endpoint: an IP address or a hostname.
    #[serde(default = "default_bridge_host")]
    pub bridge_host: String,

    /// rosbridge WebSocket port; dashboards expect 9090.
    #[serde(default = "default_bridge_port")]
    pub bridge_port: u16,
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}
fn default_baud_rate() -> u32 {
    9600
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_read_timeout_ms() -> u64 {
    1000
}
fn default_bridge_enabled() -> bool {
    true
}
fn default_bridge_host() -> String {
    "127.0.0.1".to_string()
}
fn default_bridge_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            poll_interval_ms: default_poll_interval_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            bridge_enabled: default_bridge_enabled(),
            bridge_host: default_bridge_host(),
            bridge_port: default_bridge_port(),
        }
    }
}

impl Config {
    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            port: self.port.clone(),
            baud_rate: self.baud_rate,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
        }
    }

    pub fn adapter_config(&self) -> AdapterConfig {
        AdapterConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    /// Socket address for the rosbridge endpoint.
    ///
    /// Hostnames such as `localhost` are resolved; the first address wins.
    pub fn bridge_addr(&self) -> Result<SocketAddr, BridgeError> {
        let host = self.bridge_host.trim();
        if host.is_empty() {
            return Err(BridgeError::Config("bridge_host is empty".to_string()));
        }
        (host, self.bridge_port)
            .to_socket_addrs()
            .map_err(|e| {
                BridgeError::Config(format!(
                    "cannot resolve bridge address {host}:{}: {e}",
                    self.bridge_port
                ))
            })?
            .next()
            .ok_or_else(|| {
                BridgeError::Config(format!(
                    "bridge address {host}:{} resolved to nothing",
                    self.bridge_port
                ))
            })
    }
}

/// Return the config file path.
///
/// `SENSORBRIDGE_CONFIG` wins; otherwise `~/.sensorbridge/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("SENSORBRIDGE_CONFIG") {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".sensorbridge").join("config.toml")
}

/// Load the config from disk and apply environment overrides.
/// Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, BridgeError> {
    let Some(mut cfg) = load_from(&config_path())? else {
        return Ok(None);
    };
    apply_overrides(&mut cfg, |key| std::env::var(key).ok());
    Ok(Some(cfg))
}

/// Defaults plus environment overrides, for when no file exists.
pub fn from_env() -> Config {
    let mut cfg = Config::default();
    apply_overrides(&mut cfg, |key| std::env::var(key).ok());
    cfg
}

/// Load the config from a specific path, without overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, BridgeError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        BridgeError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| BridgeError::Config(format!("failed to parse {}: {e}", path.display())))?;
    if cfg.poll_interval_ms == 0 {
        return Err(BridgeError::Config(format!(
            "{}: poll_interval_ms must be greater than 0",
            path.display()
        )));
    }
    Ok(Some(cfg))
}

/// Apply `SENSORBRIDGE_*` overrides looked up through `var`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SENSORBRIDGE_PORT` | `port` |
/// | `SENSORBRIDGE_BAUD_RATE` | `baud_rate` |
/// | `SENSORBRIDGE_POLL_INTERVAL_MS` | `poll_interval_ms` |
/// | `SENSORBRIDGE_BRIDGE_ENABLED` | `bridge_enabled` |
/// | `SENSORBRIDGE_BRIDGE_HOST` | `bridge_host` |
/// | `SENSORBRIDGE_BRIDGE_PORT` | `bridge_port` |
///
/// Values that fail to parse are ignored, as is a poll interval of `0`.
pub fn apply_overrides(cfg: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("SENSORBRIDGE_PORT") {
        cfg.port = v;
    }
    if let Some(v) = var("SENSORBRIDGE_BAUD_RATE")
        && let Ok(baud) = v.parse::<u32>()
    {
        cfg.baud_rate = baud;
    }
    if let Some(v) = var("SENSORBRIDGE_POLL_INTERVAL_MS")
        && let Ok(ms) = v.parse::<u64>()
        && ms > 0
    {
        cfg.poll_interval_ms = ms;
    }
    if let Some(v) = var("SENSORBRIDGE_BRIDGE_ENABLED")
        && let Ok(enabled) = v.parse::<bool>()
    {
        cfg.bridge_enabled = enabled;
    }
    if let Some(v) = var("SENSORBRIDGE_BRIDGE_HOST")
        && !v.trim().is_empty()
    {
        cfg.bridge_host = v;
    }
    if let Some(v) = var("SENSORBRIDGE_BRIDGE_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.bridge_port = port;
    }
}
