//! Mock serial backend for testing.
//!
//! Provides a `MockBackend` that simulates a serial device without requiring
//! actual hardware. Clones share state, so a test can keep a handle to the
//! mock after moving it into a [`SerialPort`](super::SerialPort).

use super::error::PortError;
use super::params::{DataBits, FlowControl, ModemParams, Parity, StopBits, MAX_BAUD_RATE};
use super::traits::{ClearBuffer, Line, LineCapabilities, SerialBackend, Signals};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Inner state of the mock device.
#[derive(Debug)]
struct MockDeviceState {
    params: ModemParams,
    /// Highest baud rate the simulated driver accepts.
    max_baud: u32,
    unsupported_data_bits: Vec<DataBits>,
    unsupported_parity: Vec<Parity>,
    /// Values the simulated driver silently stores as something else.
    data_bits_coercions: Vec<(DataBits, DataBits)>,
    parity_coercions: Vec<(Parity, Parity)>,
    /// Operation whose next call fails with a device error.
    fail_next: Option<&'static str>,
    timeout: Duration,
    lines: Signals,
    capabilities: LineCapabilities,
    /// Queue of bytes to be returned by read operations.
    read_queue: VecDeque<u8>,
    /// Log of all bytes written to the device.
    write_log: Vec<Vec<u8>>,
    breaks: Vec<Duration>,
    closed: bool,
}

impl Default for MockDeviceState {
    fn default() -> Self {
        Self {
            params: ModemParams::default(),
            max_baud: MAX_BAUD_RATE,
            unsupported_data_bits: Vec::new(),
            unsupported_parity: Vec::new(),
            data_bits_coercions: Vec::new(),
            parity_coercions: Vec::new(),
            fail_next: None,
            timeout: Duration::ZERO,
            lines: Signals {
                dtr: 1,
                rts: 1,
                ..Signals::default()
            },
            capabilities: LineCapabilities {
                read_dtr: true,
                read_rts: true,
            },
            read_queue: VecDeque::new(),
            write_log: Vec::new(),
            breaks: Vec::new(),
            closed: false,
        }
    }
}

impl MockDeviceState {
    fn take_failure(&mut self, operation: &'static str) -> Result<(), PortError> {
        if self.fail_next == Some(operation) {
            self.fail_next = None;
            return Err(PortError::Serial(serialport::Error::new(
                serialport::ErrorKind::Unknown,
                format!("simulated failure in {operation}"),
            )));
        }
        Ok(())
    }
}

fn coerced<T: Copy + PartialEq>(coercions: &[(T, T)], value: T) -> T {
    coercions
        .iter()
        .find(|(from, _)| *from == value)
        .map_or(value, |&(_, to)| to)
}

/// Mock serial backend.
///
/// # Example
/// ```
/// use serial_device::port::{MockBackend, SerialPort};
///
/// let mock = MockBackend::new("MOCK0");
/// mock.enqueue_read(b"OK\r\n");
///
/// let mut port = SerialPort::from_backend(Box::new(mock.clone()), &Default::default())?;
/// port.set_read_timeout(0)?;
///
/// let mut buffer = [0u8; 8];
/// let n = port.read_bytes(&mut buffer)?;
/// assert_eq!(&buffer[..n], b"OK\r\n");
///
/// port.close();
/// assert!(mock.is_closed());
/// # Ok::<(), serial_device::port::PortError>(())
/// ```
#[derive(Clone)]
pub struct MockBackend {
    name: String,
    state: Arc<Mutex<MockDeviceState>>,
}

impl MockBackend {
    /// Create a new mock device with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockDeviceState::default())),
        }
    }

    /// Lower the highest baud rate the simulated driver accepts.
    pub fn with_max_baud(self, max_baud: u32) -> Self {
        self.state.lock().max_baud = max_baud;
        self
    }

    /// Make the simulated driver reject a data bits setting.
    pub fn without_data_bits(self, bits: DataBits) -> Self {
        self.state.lock().unsupported_data_bits.push(bits);
        self
    }

    /// Make the simulated driver reject a parity setting.
    pub fn without_parity(self, parity: Parity) -> Self {
        self.state.lock().unsupported_parity.push(parity);
        self
    }

    /// Make the simulated driver accept `from` data bits but store `to`.
    pub fn coerce_data_bits(self, from: DataBits, to: DataBits) -> Self {
        self.state.lock().data_bits_coercions.push((from, to));
        self
    }

    /// Make the simulated driver accept `from` parity but store `to`.
    pub fn coerce_parity(self, from: Parity, to: Parity) -> Self {
        self.state.lock().parity_coercions.push((from, to));
        self
    }

    /// Override what the device reports about output line readability.
    pub fn with_capabilities(self, capabilities: LineCapabilities) -> Self {
        self.state.lock().capabilities = capabilities;
        self
    }

    /// Fail the next call of one operation with a device error.
    ///
    /// `operation` is a parameter name (`"baud"`, `"parity"`, ...) for its
    /// setter, or one of `"read"`, `"write"` and `"line"` for data transfer
    /// and line reads.
    pub fn fail_next(&self, operation: &'static str) {
        self.state.lock().fail_next = Some(operation);
    }

    /// Set the level of an input line as seen by the port.
    pub fn set_input(&self, line: Line, level: bool) {
        self.state.lock().lines.set(line, level);
    }

    /// Enqueue bytes to be returned by subsequent reads.
    pub fn enqueue_read(&self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Get a copy of all data written to the device.
    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Durations of all breaks sent so far.
    pub fn breaks(&self) -> Vec<Duration> {
        self.state.lock().breaks.clone()
    }

    /// The parameters currently applied to the simulated device.
    pub fn device_params(&self) -> ModemParams {
        self.state.lock().params
    }

    /// The current level of every line, regardless of capabilities.
    pub fn lines(&self) -> Signals {
        self.state.lock().lines
    }

    /// The per-read timeout most recently set by the port.
    pub fn timeout(&self) -> Duration {
        self.state.lock().timeout
    }

    /// Whether the port released the device.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Get the number of bytes available to read.
    pub fn available_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }
}

impl SerialBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> LineCapabilities {
        self.state.lock().capabilities
    }

    fn baud_rate(&self) -> Result<u32, PortError> {
        Ok(self.state.lock().params.baud)
    }

    fn set_baud_rate(&mut self, baud: u32) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.take_failure("baud")?;
        if baud > state.max_baud {
            return Err(PortError::invalid_argument(
                "baud",
                format!("{baud} is not supported by the device"),
            ));
        }
        state.params.baud = baud;
        Ok(())
    }

    fn data_bits(&self) -> Result<DataBits, PortError> {
        Ok(self.state.lock().params.data_bits)
    }

    fn set_data_bits(&mut self, bits: DataBits) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.take_failure("data_bits")?;
        if state.unsupported_data_bits.contains(&bits) {
            return Err(PortError::invalid_argument(
                "data_bits",
                format!("{} data bits are not supported by the device", bits.bits()),
            ));
        }
        let stored = coerced(&state.data_bits_coercions, bits);
        state.params.data_bits = stored;
        Ok(())
    }

    fn stop_bits(&self) -> Result<StopBits, PortError> {
        Ok(self.state.lock().params.stop_bits)
    }

    fn set_stop_bits(&mut self, bits: StopBits) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.take_failure("stop_bits")?;
        state.params.stop_bits = bits;
        Ok(())
    }

    fn parity(&self) -> Result<Parity, PortError> {
        Ok(self.state.lock().params.parity)
    }

    fn set_parity(&mut self, parity: Parity) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.take_failure("parity")?;
        if state.unsupported_parity.contains(&parity) {
            return Err(PortError::invalid_argument(
                "parity",
                format!("{parity:?} parity is not supported by the device"),
            ));
        }
        let stored = coerced(&state.parity_coercions, parity);
        state.params.parity = stored;
        Ok(())
    }

    fn flow_control(&self) -> Result<FlowControl, PortError> {
        Ok(self.state.lock().params.flow_control)
    }

    fn set_flow_control(&mut self, flow: FlowControl) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.take_failure("flow_control")?;
        state.params.flow_control = flow;
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.state.lock().timeout = timeout;
        Ok(())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let timeout = {
            let mut state = self.state.lock();
            state.take_failure("read")?;
            if !state.read_queue.is_empty() {
                let n = buffer.len().min(state.read_queue.len());
                for (slot, byte) in buffer.iter_mut().zip(state.read_queue.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
            state.timeout
        };

        // Nothing queued: behave like a driver waiting out its timeout.
        std::thread::sleep(timeout);
        Err(PortError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "no data available",
        )))
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        state.take_failure("write")?;
        state.write_log.push(data.to_vec());
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), PortError> {
        Ok(())
    }

    fn bytes_to_read(&self) -> Result<u32, PortError> {
        Ok(self.state.lock().read_queue.len() as u32)
    }

    fn clear(&self, buffer: ClearBuffer) -> Result<(), PortError> {
        if matches!(buffer, ClearBuffer::Input | ClearBuffer::All) {
            self.state.lock().read_queue.clear();
        }
        Ok(())
    }

    fn send_break(&mut self, duration: Duration) -> Result<(), PortError> {
        self.state.lock().breaks.push(duration);
        Ok(())
    }

    fn read_line(&mut self, line: Line) -> Result<bool, PortError> {
        let mut state = self.state.lock();
        state.take_failure("line")?;
        if !state.capabilities.can_read(line) {
            return Err(PortError::invalid_argument(
                "line",
                format!("{line:?} cannot be read back"),
            ));
        }
        Ok(state.lines.get(line) != 0)
    }

    fn write_line(&mut self, line: Line, level: bool) -> Result<(), PortError> {
        if !line.is_output() {
            return Err(PortError::invalid_argument(
                "line",
                format!("{line:?} is an input line"),
            ));
        }
        self.state.lock().lines.set(line, level);
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), PortError> {
        self.state.lock().closed = true;
        Ok(())
    }
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}
