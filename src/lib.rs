//! Serial Device Library
//!
//! A validated, cross-platform handle on an OS serial port: line parameters
//! (baud, data bits, stop bits, parity, flow control, read timeout), modem
//! control and status lines, and blocking byte I/O.
//!
//! # Modules
//!
//! - `port`: The `SerialPort` handle and the backends it runs on
//! - `config`: Configuration management with TOML support
//! - `discovery`: Locating a device to open

pub mod config;
pub mod discovery;
pub mod port;

// Re-export commonly used types for convenience
pub use port::{
    ClearBuffer, CloseHandle, DataBits, ErrorKind, FlowControl, Line, LineCapabilities,
    MockBackend, ModemParams, NativeBackend, ParamKey, Parity, PortError, SerialBackend,
    SerialPort, Signals, StopBits, MAX_BAUD_RATE,
};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
