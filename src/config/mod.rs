//! Configuration module
//!
//! Handles loading and saving RoverNet configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::network::{self, TransportKind, DEFAULT_RECEIVE_SIZE};
use crate::protocol::DEFAULT_PORT;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid speed range: {min}..={max}")]
    InvalidSpeedRange { min: u8, max: u8 },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Network settings
    #[serde(default)]
    pub network: NetworkConfig,

    /// Drive command limits
    #[serde(default)]
    pub drive: DriveConfig,

    /// Simulator settings
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

/// General configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
    /// Log filter directive, overrides `verbose` (e.g. "rovernet=trace")
    pub log_filter: Option<String>,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Robot address
    #[serde(default = "default_host")]
    pub host: String,
    /// Robot port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Socket type
    #[serde(default)]
    pub transport: TransportKind,
    /// Connection timeout in ms
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Response timeout in ms
    #[serde(default = "default_response_timeout")]
    pub response_timeout_ms: u64,
    /// Largest single receive in bytes
    #[serde(default = "default_receive_buffer")]
    pub receive_buffer_size: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_response_timeout() -> u64 {
    2000
}

fn default_receive_buffer() -> usize {
    DEFAULT_RECEIVE_SIZE
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            transport: TransportKind::default(),
            connect_timeout_ms: default_connect_timeout(),
            response_timeout_ms: default_response_timeout(),
            receive_buffer_size: default_receive_buffer(),
        }
    }
}

/// Drive command configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Slowest speed the console accepts
    #[serde(default = "default_min_speed")]
    pub min_speed: u8,
    /// Fastest speed the console accepts
    #[serde(default = "default_max_speed")]
    pub max_speed: u8,
}

fn default_min_speed() -> u8 {
    80
}

fn default_max_speed() -> u8 {
    100
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            min_speed: default_min_speed(),
            max_speed: default_max_speed(),
        }
    }
}

/// Simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Address to listen on
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Grade reported in telemetry
    #[serde(default)]
    pub current_grade: u16,
    /// Hit count reported in telemetry
    #[serde(default)]
    pub hit_count: u16,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            current_grade: 0,
            hit_count: 0,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("rovernet/config.toml")),
            Some(PathBuf::from("./rovernet.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                tracing::debug!("Loading configuration from {}", path.display());
                return Self::load(path);
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.drive.min_speed > self.drive.max_speed {
            return Err(ConfigError::InvalidSpeedRange {
                min: self.drive.min_speed,
                max: self.drive.max_speed,
            });
        }
        Ok(())
    }

    /// Network settings for the transport layer
    pub fn network_config(&self) -> network::NetworkConfig {
        network::NetworkConfig {
            host: self.network.host.clone(),
            port: self.network.port,
            transport: self.network.transport,
            connect_timeout_ms: self.network.connect_timeout_ms,
            response_timeout_ms: self.network.response_timeout_ms,
            receive_buffer_size: self.network.receive_buffer_size,
        }
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> ConfigResult<String> {
    let config = Config {
        network: NetworkConfig {
            host: "192.168.1.50".to_string(),
            transport: TransportKind::Tcp,
            ..Default::default()
        },
        simulator: SimulatorConfig {
            current_grade: 80,
            ..Default::default()
        },
        ..Default::default()
    };

    Ok(toml::to_string_pretty(&config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.port, DEFAULT_PORT);
        assert_eq!(config.drive.min_speed, 80);
        assert_eq!(config.drive.max_speed, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let mut config = Config::default();
        config.network.transport = TransportKind::Tcp;
        let file = NamedTempFile::new().unwrap();

        config.save(file.path()).unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.network.port, config.network.port);
        assert_eq!(loaded.network.transport, TransportKind::Tcp);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[network]\nport = 6000\ntransport = \"tcp\"").unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.network.port, 6000);
        assert_eq!(loaded.network.host, "127.0.0.1");
        assert_eq!(loaded.network.response_timeout_ms, 2000);
        assert_eq!(loaded.drive.max_speed, 100);
    }

    #[test]
    fn test_invalid_speed_range() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[drive]\nmin_speed = 100\nmax_speed = 80").unwrap();

        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::InvalidSpeedRange { min: 100, max: 80 })
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(Path::new("/nonexistent/rovernet.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_sample_config() {
        let sample = generate_sample_config().unwrap();
        let parsed: Config = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.network.host, "192.168.1.50");
        assert_eq!(parsed.simulator.current_grade, 80);
    }

    #[test]
    fn test_network_config_conversion() {
        let config = Config::default();
        let net = config.network_config();
        assert_eq!(net.port, config.network.port);
        assert_eq!(net.transport, TransportKind::Udp);
    }
}
