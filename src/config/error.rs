//! Errors raised while loading, validating or saving the configuration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("cannot read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("cannot encode configuration as TOML: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// The config file or its directory could not be written.
    #[error("cannot write config file {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value parsed but is outside what a serial device accepts, e.g. a
    /// zero baud rate or an empty COM probe range.
    #[error("{key}: {message}")]
    ValidationError { key: String, message: String },

    /// A `SERIAL_DEVICE_*` override could not be parsed.
    #[error("environment override {var}: {message}")]
    EnvParseError { var: String, message: String },

    /// `save` was called on a loader that has no file behind it.
    #[error("no config file: {0}")]
    MissingRequired(String),
}

impl ConfigError {
    pub fn validation<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::ValidationError {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn env_parse<V: Into<String>, M: Into<String>>(var: V, message: M) -> Self {
        Self::EnvParseError {
            var: var.into(),
            message: message.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
