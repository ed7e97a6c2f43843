//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use super::error::{ConfigError, ConfigResult};
use crate::port::ModemParams;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial port defaults
    pub serial: SerialConfig,
    /// Device discovery settings
    pub discovery: DiscoveryConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Check values the schema types cannot enforce on their own.
    pub fn validate(&self) -> ConfigResult<()> {
        self.serial
            .defaults
            .validate()
            .map_err(|e| ConfigError::validation("serial.defaults", e.to_string()))?;

        let discovery = &self.discovery;
        if discovery.com_first == 0 || discovery.com_first > discovery.com_last {
            return Err(ConfigError::validation(
                "discovery.com_first",
                format!(
                    "probe range COM{}..=COM{} is empty",
                    discovery.com_first, discovery.com_last
                ),
            ));
        }
        Ok(())
    }
}

/// Serial port configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Parameters applied when a device is opened
    pub defaults: ModemParams,
    /// Port aliases for convenience
    pub port_aliases: HashMap<String, String>,
}

impl SerialConfig {
    /// Resolve a port name through aliases
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

/// Device discovery configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Use this device instead of searching
    pub device: Option<String>,
    /// Substrings identifying candidate entries in the device directory
    pub patterns: Vec<String>,
    /// Directory listed on POSIX systems
    pub dev_dir: PathBuf,
    /// First COM port number probed on Windows
    pub com_first: u8,
    /// Last COM port number probed on Windows
    pub com_last: u8,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            device: None,
            patterns: vec!["ttyUSB".to_string(), "cu.usbserial".to_string()],
            dev_dir: PathBuf::from("/dev"),
            com_first: 1,
            com_last: 9,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    Pretty,
    /// Compact format
    #[default]
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(ConfigError::validation(
                "logging.format",
                format!("unknown format {other:?}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{FlowControl, Parity};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.serial.defaults, ModemParams::default());
        assert_eq!(config.discovery.patterns, vec!["ttyUSB", "cu.usbserial"]);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_alias_resolution() {
        let mut config = SerialConfig::default();
        config
            .port_aliases
            .insert("modem".to_string(), "/dev/ttyUSB0".to_string());

        assert_eq!(config.resolve_port("modem"), "/dev/ttyUSB0");
        assert_eq!(config.resolve_port("COM5"), "COM5");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[serial.defaults]"));
        assert!(toml_str.contains("[discovery]"));
        assert!(toml_str.contains("[logging]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [serial.defaults]
            baud = 19200
            parity = 1
            flow_control = 3

            [discovery]
            patterns = ["ttyACM"]
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.serial.defaults.baud, 19200);
        assert_eq!(config.serial.defaults.parity, Parity::Even);
        assert_eq!(
            config.serial.defaults.flow_control,
            FlowControl::SOFT | FlowControl::HARD
        );
        assert_eq!(config.discovery.patterns, vec!["ttyACM"]);
        // Defaults should still work
        assert_eq!(config.discovery.com_last, 9);
    }

    #[test]
    fn test_out_of_domain_values_rejected() {
        let bad_bits = r#"
            [serial.defaults]
            data_bits = 9
        "#;
        assert!(toml::from_str::<Config>(bad_bits).is_err());

        let mut config = Config::default();
        config.serial.defaults.baud = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError { .. })
        ));

        let mut config = Config::default();
        config.discovery.com_first = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
