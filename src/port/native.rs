//! Native serial port backend.
//!
//! Wraps the `serialport` crate's platform port type with our own
//! `SerialBackend` trait. On Unix the termios and modem-control ioctls are
//! used directly for what the crate does not expose: combined RTS/CTS plus
//! XON/XOFF flow control and reading back DTR/RTS.

use super::error::PortError;
use super::params::{DataBits, FlowControl, ModemParams, Parity, StopBits};
use super::traits::{ClearBuffer, Line, LineCapabilities, SerialBackend, Signals};
use serialport::SerialPort as _;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

#[cfg(unix)]
type RawPort = serialport::TTYPort;

#[cfg(windows)]
type RawPort = serialport::COMPort;

/// Serial backend talking to a real OS device.
pub struct NativeBackend {
    /// The underlying platform port.
    port: RawPort,
    /// The port name/path for identification.
    name: String,
}

impl NativeBackend {
    /// Open a device and apply the framing part of `params`.
    ///
    /// Parameters are expected to be validated already; values the driver
    /// cannot represent are still rejected here before the device is opened.
    ///
    /// # Example
    /// ```no_run
    /// use serial_device::port::{ModemParams, NativeBackend};
    ///
    /// let backend = NativeBackend::open("/dev/ttyUSB0", &ModemParams::default())?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(device: &str, params: &ModemParams) -> Result<Self, PortError> {
        let builder = serialport::new(device, params.baud)
            .data_bits(driver_data_bits(params.data_bits)?)
            .parity(driver_parity(params.parity)?)
            .stop_bits(driver_stop_bits(params.stop_bits))
            .flow_control(driver_flow_control(params.flow_control)?)
            .timeout(Duration::ZERO);

        let port = builder.open_native().map_err(|source| PortError::DeviceOpen {
            device: device.to_string(),
            source,
        })?;

        debug!(device, baud = params.baud, "opened native serial device");

        Ok(Self {
            port,
            name: device.to_string(),
        })
    }

    /// Get a reference to the underlying platform port.
    pub fn as_raw(&self) -> &RawPort {
        &self.port
    }
}

fn driver_data_bits(bits: DataBits) -> Result<serialport::DataBits, PortError> {
    match bits {
        DataBits::Five => Ok(serialport::DataBits::Five),
        DataBits::Six => Ok(serialport::DataBits::Six),
        DataBits::Seven => Ok(serialport::DataBits::Seven),
        DataBits::Eight => Ok(serialport::DataBits::Eight),
        DataBits::Four => Err(PortError::invalid_argument(
            "data_bits",
            "4 data bits are not supported by this driver",
        )),
    }
}

fn driver_parity(parity: Parity) -> Result<serialport::Parity, PortError> {
    match parity {
        Parity::None => Ok(serialport::Parity::None),
        Parity::Even => Ok(serialport::Parity::Even),
        Parity::Odd => Ok(serialport::Parity::Odd),
        Parity::Mark | Parity::Space => Err(PortError::invalid_argument(
            "parity",
            format!("{parity:?} parity is not supported by this driver"),
        )),
    }
}

fn driver_stop_bits(bits: StopBits) -> serialport::StopBits {
    match bits {
        StopBits::One => serialport::StopBits::One,
        StopBits::Two => serialport::StopBits::Two,
    }
}

/// The closest flow control mode the crate can set on its own.
///
/// The combined mode is completed through termios on Unix.
fn driver_flow_control(flow: FlowControl) -> Result<serialport::FlowControl, PortError> {
    match (flow.is_hardware(), flow.is_software()) {
        (false, false) => Ok(serialport::FlowControl::None),
        (false, true) => Ok(serialport::FlowControl::Software),
        (true, false) => Ok(serialport::FlowControl::Hardware),
        #[cfg(unix)]
        (true, true) => Ok(serialport::FlowControl::Hardware),
        #[cfg(not(unix))]
        (true, true) => Err(PortError::invalid_argument(
            "flow_control",
            "combined hardware and software flow control is not supported on this platform",
        )),
    }
}

#[cfg(unix)]
mod termios {
    use std::io;
    use std::mem::MaybeUninit;
    use std::os::unix::io::RawFd;

    pub fn get(fd: RawFd) -> io::Result<libc::termios> {
        let mut attrs = MaybeUninit::<libc::termios>::uninit();
        // SAFETY: tcgetattr fully initialises the struct when it returns 0.
        if unsafe { libc::tcgetattr(fd, attrs.as_mut_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(unsafe { attrs.assume_init() })
    }

    pub fn set(fd: RawFd, attrs: &libc::termios) -> io::Result<()> {
        // SAFETY: attrs points to a valid termios obtained from `get`.
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, attrs) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Current modem-control bits (`TIOCM_*`).
    pub fn modem_bits(fd: RawFd) -> io::Result<libc::c_int> {
        let mut bits: libc::c_int = 0;
        // SAFETY: TIOCMGET writes a single c_int through the pointer.
        if unsafe { libc::ioctl(fd, libc::TIOCMGET, &mut bits) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(bits)
    }
}

#[cfg(unix)]
impl NativeBackend {
    fn fd(&self) -> std::os::unix::io::RawFd {
        use std::os::unix::io::AsRawFd;
        self.port.as_raw_fd()
    }

    /// Add XON/XOFF on top of whatever flow control is already set.
    fn enable_software_flow(&mut self) -> Result<(), PortError> {
        let fd = self.fd();
        let mut attrs = termios::get(fd)?;
        attrs.c_iflag |= libc::IXON | libc::IXOFF;
        termios::set(fd, &attrs)?;
        Ok(())
    }
}

#[cfg(unix)]
fn line_bit(line: Line) -> libc::c_int {
    match line {
        Line::Cts => libc::TIOCM_CTS,
        Line::Dcd => libc::TIOCM_CAR,
        Line::Dsr => libc::TIOCM_DSR,
        Line::Ri => libc::TIOCM_RNG,
        Line::Dtr => libc::TIOCM_DTR,
        Line::Rts => libc::TIOCM_RTS,
    }
}

impl SerialBackend for NativeBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> LineCapabilities {
        LineCapabilities {
            read_dtr: cfg!(unix),
            read_rts: cfg!(unix),
        }
    }

    fn baud_rate(&self) -> Result<u32, PortError> {
        self.port.baud_rate().map_err(PortError::Serial)
    }

    fn set_baud_rate(&mut self, baud: u32) -> Result<(), PortError> {
        self.port
            .set_baud_rate(baud)
            .map_err(|e| PortError::from_config("baud", e))
    }

    fn data_bits(&self) -> Result<DataBits, PortError> {
        Ok(match self.port.data_bits()? {
            serialport::DataBits::Five => DataBits::Five,
            serialport::DataBits::Six => DataBits::Six,
            serialport::DataBits::Seven => DataBits::Seven,
            serialport::DataBits::Eight => DataBits::Eight,
        })
    }

    fn set_data_bits(&mut self, bits: DataBits) -> Result<(), PortError> {
        let bits = driver_data_bits(bits)?;
        self.port
            .set_data_bits(bits)
            .map_err(|e| PortError::from_config("data_bits", e))
    }

    fn stop_bits(&self) -> Result<StopBits, PortError> {
        Ok(match self.port.stop_bits()? {
            serialport::StopBits::One => StopBits::One,
            serialport::StopBits::Two => StopBits::Two,
        })
    }

    fn set_stop_bits(&mut self, bits: StopBits) -> Result<(), PortError> {
        self.port
            .set_stop_bits(driver_stop_bits(bits))
            .map_err(|e| PortError::from_config("stop_bits", e))
    }

    fn parity(&self) -> Result<Parity, PortError> {
        Ok(match self.port.parity()? {
            serialport::Parity::None => Parity::None,
            serialport::Parity::Even => Parity::Even,
            serialport::Parity::Odd => Parity::Odd,
        })
    }

    fn set_parity(&mut self, parity: Parity) -> Result<(), PortError> {
        let parity = driver_parity(parity)?;
        self.port
            .set_parity(parity)
            .map_err(|e| PortError::from_config("parity", e))
    }

    #[cfg(unix)]
    fn flow_control(&self) -> Result<FlowControl, PortError> {
        let attrs = termios::get(self.fd())?;
        let mut flow = FlowControl::NONE;
        if attrs.c_cflag & libc::CRTSCTS != 0 {
            flow = flow | FlowControl::HARD;
        }
        if attrs.c_iflag & (libc::IXON | libc::IXOFF) != 0 {
            flow = flow | FlowControl::SOFT;
        }
        Ok(flow)
    }

    #[cfg(not(unix))]
    fn flow_control(&self) -> Result<FlowControl, PortError> {
        Ok(match self.port.flow_control()? {
            serialport::FlowControl::None => FlowControl::NONE,
            serialport::FlowControl::Software => FlowControl::SOFT,
            serialport::FlowControl::Hardware => FlowControl::HARD,
        })
    }

    fn set_flow_control(&mut self, flow: FlowControl) -> Result<(), PortError> {
        let base = driver_flow_control(flow)?;
        self.port
            .set_flow_control(base)
            .map_err(|e| PortError::from_config("flow_control", e))?;

        #[cfg(unix)]
        if flow.is_hardware() && flow.is_software() {
            self.enable_software_flow()?;
        }
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.port.set_timeout(timeout).map_err(PortError::Serial)
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        self.port.read(buffer).map_err(PortError::Io)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.port.write(data).map_err(PortError::Io)
    }

    fn flush(&mut self) -> Result<(), PortError> {
        self.port.flush().map_err(PortError::Io)
    }

    fn bytes_to_read(&self) -> Result<u32, PortError> {
        self.port.bytes_to_read().map_err(PortError::Serial)
    }

    fn clear(&self, buffer: ClearBuffer) -> Result<(), PortError> {
        self.port.clear(buffer.into()).map_err(PortError::Serial)
    }

    fn send_break(&mut self, duration: Duration) -> Result<(), PortError> {
        self.port.set_break()?;
        std::thread::sleep(duration);
        self.port.clear_break()?;
        Ok(())
    }

    #[cfg(unix)]
    fn read_line(&mut self, line: Line) -> Result<bool, PortError> {
        let bits = termios::modem_bits(self.fd())?;
        Ok(bits & line_bit(line) != 0)
    }

    #[cfg(not(unix))]
    fn read_line(&mut self, line: Line) -> Result<bool, PortError> {
        match line {
            Line::Cts => self.port.read_clear_to_send().map_err(PortError::Serial),
            Line::Dcd => self.port.read_carrier_detect().map_err(PortError::Serial),
            Line::Dsr => self.port.read_data_set_ready().map_err(PortError::Serial),
            Line::Ri => self.port.read_ring_indicator().map_err(PortError::Serial),
            Line::Dtr | Line::Rts => Err(PortError::invalid_argument(
                "line",
                format!("{line:?} cannot be read back on this platform"),
            )),
        }
    }

    fn write_line(&mut self, line: Line, level: bool) -> Result<(), PortError> {
        match line {
            Line::Dtr => self.port.write_data_terminal_ready(level)?,
            Line::Rts => self.port.write_request_to_send(level)?,
            input => {
                return Err(PortError::invalid_argument(
                    "line",
                    format!("{input:?} is an input line"),
                ))
            }
        }
        Ok(())
    }

    #[cfg(unix)]
    fn read_signals(&mut self) -> Result<Signals, PortError> {
        let bits = termios::modem_bits(self.fd())?;
        let mut signals = Signals::default();
        for line in [Line::Cts, Line::Dcd, Line::Dsr, Line::Ri, Line::Dtr, Line::Rts] {
            signals.set(line, bits & line_bit(line) != 0);
        }
        Ok(signals)
    }

    fn close(self: Box<Self>) -> Result<(), PortError> {
        debug!(device = %self.name, "closing native serial device");
        drop(self);
        Ok(())
    }
}

impl std::fmt::Debug for NativeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBackend")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate().ok())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_not_found_error() {
        let result = NativeBackend::open("/dev/nonexistent_port_12345", &ModemParams::default());

        match result {
            Err(PortError::DeviceOpen { device, .. }) => {
                assert!(device.contains("nonexistent"));
            }
            other => panic!("Expected DeviceOpen error, got: {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_values_rejected_before_open() {
        let params = ModemParams {
            data_bits: DataBits::Four,
            ..ModemParams::default()
        };
        let err = NativeBackend::open("/dev/nonexistent_port_12345", &params).unwrap_err();
        assert_eq!(err.kind(), crate::port::ErrorKind::InvalidArgument);

        assert!(driver_parity(Parity::Mark).is_err());
        assert!(driver_parity(Parity::Even).is_ok());
    }

    #[test]
    fn test_flow_control_mapping() {
        assert!(matches!(
            driver_flow_control(FlowControl::SOFT),
            Ok(serialport::FlowControl::Software)
        ));
        assert!(matches!(
            driver_flow_control(FlowControl::HARD),
            Ok(serialport::FlowControl::Hardware)
        ));
        #[cfg(unix)]
        assert!(driver_flow_control(FlowControl::SOFT | FlowControl::HARD).is_ok());
    }
}
