//! Link service configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via BLUOSEC_CONFIG)
//! 3. Environment variables

use bluosec_core::{ControllerConfig, Telemetry};
use bluosec_eeprom::layout;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network configuration.
    pub network: NetworkConfig,
    /// EEPROM image configuration.
    pub eeprom: EepromConfig,
    /// Factory defaults of the configuration mirror.
    pub controller: ControllerConfig,
    /// Simulated telemetry.
    pub telemetry: TelemetryConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("BLUOSEC_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.network.apply_env_overrides();
        self.eeprom.apply_env_overrides();
        self.telemetry.apply_env_overrides();
        self.metrics.apply_env_overrides();

        if let Ok(magic) = std::env::var("BLUOSEC_MAGIC_BYTE") {
            if let Ok(byte) = magic.parse() {
                self.controller.magic_byte = byte;
            }
        }
    }

    /// Checks values the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "network.max_connections must be greater than 0".to_string(),
            ));
        }
        if self.eeprom.size < layout::CONFIG_END as usize {
            return Err(ConfigError::ValidationError(format!(
                "eeprom.size must be at least {} bytes, got {}",
                layout::CONFIG_END,
                self.eeprom.size
            )));
        }
        if self.eeprom.size > u16::MAX as usize + 1 {
            return Err(ConfigError::ValidationError(format!(
                "eeprom.size must not exceed {} bytes",
                u16::MAX as usize + 1
            )));
        }
        if self.telemetry.tick_ms == 0 {
            return Err(ConfigError::ValidationError(
                "telemetry.tick_ms must be greater than 0".to_string(),
            ));
        }
        self.controller
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
    /// Idle link timeout in seconds.
    pub idle_timeout_secs: u64,
    /// Maximum concurrent links.
    pub max_connections: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], bluosec_protocol::DEFAULT_PORT)),
            idle_timeout_secs: 300,
            max_connections: 16,
        }
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("BLUOSEC_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }

        if let Ok(timeout) = std::env::var("BLUOSEC_IDLE_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.idle_timeout_secs = secs;
            }
        }

        if let Ok(max) = std::env::var("BLUOSEC_MAX_CONNECTIONS") {
            if let Ok(n) = max.parse() {
                self.max_connections = n;
            }
        }
    }

    /// Returns idle timeout as Duration.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// EEPROM image configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EepromConfig {
    /// Image file. Without one the image lives in memory and every start
    /// begins from factory defaults.
    pub path: Option<PathBuf>,
    /// Image size in bytes.
    pub size: usize,
}

impl Default for EepromConfig {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from("./data/eeprom.bin")),
            size: layout::IMAGE_SIZE,
        }
    }
}

impl EepromConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("BLUOSEC_EEPROM_PATH") {
            self.path = if path.is_empty() || path == "memory" {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }

        if let Ok(size) = std::env::var("BLUOSEC_EEPROM_SIZE") {
            if let Ok(n) = size.parse() {
                self.size = n;
            }
        }
    }
}

/// Simulated telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Period of the uptime counter in milliseconds.
    pub tick_ms: u64,
    /// Static values reported for every other field.
    pub initial: Telemetry,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            initial: Telemetry::default(),
        }
    }
}

impl TelemetryConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(tick) = std::env::var("BLUOSEC_TELEMETRY_TICK_MS") {
            if let Ok(ms) = tick.parse() {
                self.tick_ms = ms;
            }
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics HTTP server.
    #[serde(default)]
    pub enabled: bool,
    /// Address to bind the metrics server to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9092)),
        }
    }
}

impl MetricsConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(enabled) = std::env::var("BLUOSEC_METRICS_ENABLED") {
            self.enabled = enabled == "1" || enabled.to_lowercase() == "true";
        }
        if let Ok(addr) = std::env::var("BLUOSEC_METRICS_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// SocketAddr as a plain string in YAML.
mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.bind_addr.port(), 7402);
        assert_eq!(config.eeprom.size, layout::IMAGE_SIZE);
        assert_eq!(config.controller.magic_byte, 142);
        assert!(!config.metrics.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.network.bind_addr, config.network.bind_addr);
        assert_eq!(parsed.controller, config.controller);
    }

    #[test]
    fn test_from_file_partial() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bluosec.yaml");
        std::fs::write(
            &path,
            "network:\n  bind_addr: \"0.0.0.0:9000\"\neeprom:\n  path: null\ncontroller:\n  assist_level: 5\ntelemetry:\n  initial:\n    battery_voltage: 41\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.network.bind_addr.port(), 9000);
        assert_eq!(config.network.max_connections, 16);
        assert!(config.eeprom.path.is_none());
        assert_eq!(config.controller.assist_level, 5);
        assert_eq!(config.controller.max_speed_default, 25);
        assert_eq!(config.telemetry.initial.battery_voltage, 41);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("saved.yaml");
        let mut config = Config::default();
        config.metrics.enabled = true;
        config.save(&path).unwrap();

        let reloaded = Config::from_file(&path).unwrap();
        assert!(reloaded.metrics.enabled);
    }

    #[test]
    fn test_from_file_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            Config::from_file(&missing),
            Err(ConfigError::IoError(..))
        ));

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "network: [1, 2").unwrap();
        let err = Config::from_file(&bad).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.eeprom.size = 4;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.controller.gear_ratio = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("gear_ratio"));

        let mut config = Config::default();
        config.network.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.telemetry.tick_ms = 0;
        assert!(config.validate().is_err());
    }
}
