//! Port-specific error types.
//!
//! Every failure surfaced by a [`SerialPort`](super::SerialPort) is a
//! [`PortError`]. Callers that only care about the broad category can match on
//! [`PortError::kind`].

use thiserror::Error;

/// Broad error categories reported by the port layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A value is outside the valid domain of a field.
    InvalidArgument,
    /// A value of the wrong type was supplied for a numeric field.
    TypeMismatch,
    /// The OS refused to open or initially configure the device.
    DeviceOpen,
    /// A read, write, or signal call failed after a successful open.
    DeviceIo,
}

/// Errors that can occur during serial port operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// A parameter value is outside its valid domain.
    #[error("Invalid {param}: {reason}")]
    InvalidArgument { param: String, reason: String },

    /// A parameter was given a value of the wrong type.
    #[error("Type mismatch for {param}: expected {expected}, got {found}")]
    TypeMismatch {
        param: String,
        expected: &'static str,
        found: String,
    },

    /// Opening the device failed.
    #[error("Failed to open {device}: {source}")]
    DeviceOpen {
        device: String,
        #[source]
        source: serialport::Error,
    },

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialport-specific error occurred after the device was opened.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Attempted to use a port that has been closed.
    #[error("Port is closed")]
    Closed,
}

impl PortError {
    /// Create an InvalidArgument error for the named parameter.
    pub fn invalid_argument(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            param: param.into(),
            reason: reason.into(),
        }
    }

    /// Create a TypeMismatch error for the named parameter.
    pub fn type_mismatch(
        param: impl Into<String>,
        expected: &'static str,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            param: param.into(),
            expected,
            found: found.into(),
        }
    }

    /// Map a driver error raised while applying a configuration field.
    ///
    /// Rejections of the value itself become `InvalidArgument`, anything else
    /// stays a device error.
    pub fn from_config(param: &str, err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::InvalidInput => {
                Self::invalid_argument(param, err.description)
            }
            _ => Self::Serial(err),
        }
    }

    /// The broad category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::DeviceOpen { .. } => ErrorKind::DeviceOpen,
            Self::Io(_) | Self::Serial(_) | Self::Closed => ErrorKind::DeviceIo,
        }
    }

    /// Whether this error is a read/write timeout reported by the driver.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
            Self::Serial(e) => {
                matches!(e.kind(), serialport::ErrorKind::Io(std::io::ErrorKind::TimedOut))
            }
            _ => false,
        }
    }
}

impl From<PortError> for std::io::Error {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Io(e) => e,
            PortError::InvalidArgument { .. } | PortError::TypeMismatch { .. } => {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, err)
            }
            PortError::Closed => std::io::Error::new(std::io::ErrorKind::NotConnected, err),
            other => std::io::Error::other(other),
        }
    }
}
