//! Configuration module for serial-device.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SERIAL_DEVICE_CONFIG` environment variable (explicit path)
//! 2. `./serial-device.toml` (current directory)
//! 3. The platform config directory, e.g. `~/.config/serial-device/config.toml`
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! Selected values can be overridden via environment variables following the
//! pattern `SERIAL_DEVICE_<SECTION>_<KEY>`:
//!
//! - `SERIAL_DEVICE_SERIAL_BAUD=115200`
//! - `SERIAL_DEVICE_SERIAL_READ_TIMEOUT=500`
//! - `SERIAL_DEVICE_DISCOVERY_DEVICE=/dev/ttyUSB1`
//! - `SERIAL_DEVICE_LOGGING_LEVEL=debug`
//!
//! The legacy `TEST_PORT` variable is also honoured for the discovery device.
//!
//! # Example
//!
//! ```rust,no_run
//! use serial_device::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let config = loader.config();
//!
//! println!("Default baud: {}", config.serial.defaults.baud);
//! # Ok::<(), serial_device::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{get_default_config_path, resolve_config_path, ConfigLoader};
pub use schema::{Config, DiscoveryConfig, LogFormat, LoggingConfig, SerialConfig};
