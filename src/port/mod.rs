//! Port abstraction layer for serial communication.
//!
//! [`SerialPort`] is the validated handle applications use. It sits on a
//! [`SerialBackend`], implemented by [`NativeBackend`] for real devices and by
//! [`MockBackend`] for tests.

pub mod error;
pub mod mock;
pub mod native;
pub mod params;
pub mod serial_port;
pub mod traits;

pub use error::{ErrorKind, PortError};
pub use mock::MockBackend;
pub use native::NativeBackend;
pub use params::*;
pub use serial_port::{CloseHandle, SerialPort, POLL_SLICE};
pub use traits::*;
