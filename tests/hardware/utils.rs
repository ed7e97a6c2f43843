//! Utility functions for hardware testing.
//!
//! Provides device lookup and a fixture that closes the port on teardown.

use serial_device::config::ConfigLoader;
use serial_device::discovery::find_device;
use serial_device::port::{ModemParams, PortError, SerialPort};
use std::ops::{Deref, DerefMut};

/// Device to run against: `TEST_PORT`, the configured device, or discovery.
pub fn test_device() -> Option<String> {
    let loader = ConfigLoader::with_defaults();
    find_device(&loader.config().discovery)
}

/// Skip test if hardware is not available.
pub fn skip_without_hardware() -> Option<String> {
    let device = test_device();
    if device.is_none() {
        println!("Skipping hardware test: no serial device found (set TEST_PORT)");
    }
    device
}

/// Whether this platform can read DTR and RTS back from the device.
pub fn is_posix() -> bool {
    cfg!(unix)
}

/// An open port that is closed when the fixture drops.
pub struct PortTestFixture {
    pub port: SerialPort,
    pub device: String,
}

impl PortTestFixture {
    /// Open the test device with default parameters.
    pub fn setup() -> Option<Self> {
        Self::setup_with(&ModemParams::default())
    }

    /// Open the test device with the given parameters.
    pub fn setup_with(params: &ModemParams) -> Option<Self> {
        let device = skip_without_hardware()?;
        match SerialPort::open_with_params(&device, params) {
            Ok(port) => Some(Self { port, device }),
            Err(e) => panic!("failed to open {device}: {e}"),
        }
    }

    /// Open the test device, returning the error instead of panicking.
    pub fn try_open(device: &str, params: &ModemParams) -> Result<SerialPort, PortError> {
        SerialPort::open_with_params(device, params)
    }
}

impl Deref for PortTestFixture {
    type Target = SerialPort;

    fn deref(&self) -> &SerialPort {
        &self.port
    }
}

impl DerefMut for PortTestFixture {
    fn deref_mut(&mut self) -> &mut SerialPort {
        &mut self.port
    }
}

impl Drop for PortTestFixture {
    fn drop(&mut self) {
        self.port.close();
    }
}
