//! The validated serial port handle.
//!
//! [`SerialPort`] owns one backend for its whole life and exposes every modem
//! parameter and line through checked accessors. Setters either apply the
//! exact value or fail without touching the rest of the configuration.

use super::error::PortError;
use super::native::NativeBackend;
use super::params::{
    integer_value, validate_baud, DataBits, FlowControl, ModemParams, ParamKey, Parity, StopBits,
};
use super::traits::{ClearBuffer, Line, LineCapabilities, SerialBackend, Signals};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Longest single wait inside a blocking read.
///
/// A pending [`CloseHandle::close`] is noticed within this interval.
pub const POLL_SLICE: Duration = Duration::from_millis(100);

/// Closes a [`SerialPort`] from another thread.
///
/// Obtained from [`SerialPort::close_handle`]. Closing through the handle
/// makes an in-flight blocking read fail with [`PortError::Closed`] and
/// releases the device on the port's next operation.
#[derive(Debug, Clone)]
pub struct CloseHandle(Arc<AtomicBool>);

impl CloseHandle {
    pub fn close(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An open serial device.
///
/// # Example
/// ```no_run
/// use serial_device::port::{FlowControl, ModemParams, Parity, SerialPort, StopBits};
///
/// let params = ModemParams {
///     baud: 19200,
///     parity: Parity::Even,
///     stop_bits: StopBits::Two,
///     flow_control: FlowControl::SOFT,
///     read_timeout: 100,
///     ..ModemParams::default()
/// };
///
/// SerialPort::with_open("/dev/ttyUSB0", &params, |port| {
///     port.write_bytes(b"AT\r\n")?;
///     let mut reply = [0u8; 64];
///     let n = port.read_bytes(&mut reply)?;
///     println!("{:?}", &reply[..n]);
///     Ok::<_, serial_device::port::PortError>(())
/// })?;
/// # Ok::<(), serial_device::port::PortError>(())
/// ```
pub struct SerialPort {
    backend: Option<Box<dyn SerialBackend>>,
    name: String,
    capabilities: LineCapabilities,
    read_timeout: i64,
    /// Per-read timeout last handed to the backend.
    backend_timeout: Option<Duration>,
    /// Last levels written to DTR and RTS, for platforms that cannot read them.
    dtr_level: bool,
    rts_level: bool,
    closed: Arc<AtomicBool>,
}

fn check_device(device: &str) -> Result<(), PortError> {
    if device.trim().is_empty() {
        return Err(PortError::invalid_argument(
            "device",
            "device identifier is empty",
        ));
    }
    Ok(())
}

impl SerialPort {
    /// Open a device with the default parameters (9600 8N1, no flow control,
    /// blocking reads).
    pub fn open(device: &str) -> Result<Self, PortError> {
        Self::open_with_params(device, &ModemParams::default())
    }

    /// Open a device and apply `params`.
    ///
    /// Everything is validated before the device is touched. If the device
    /// rejects a value while being configured it is closed again before the
    /// error is returned.
    pub fn open_with_params(device: &str, params: &ModemParams) -> Result<Self, PortError> {
        check_device(device)?;
        params.validate()?;
        let backend = NativeBackend::open(device, params)?;
        Self::from_backend(Box::new(backend), params)
    }

    /// Open a device configured from a parameter mapping.
    ///
    /// Missing keys take their default value; unrecognized keys are ignored.
    pub fn open_with_map(device: &str, params: &Map<String, Value>) -> Result<Self, PortError> {
        check_device(device)?;
        let params = ModemParams::from_map(params)?;
        Self::open_with_params(device, &params)
    }

    /// Wrap an already opened backend and apply `params` to it.
    pub fn from_backend(
        backend: Box<dyn SerialBackend>,
        params: &ModemParams,
    ) -> Result<Self, PortError> {
        if let Err(err) = params.validate() {
            let name = backend.name().to_string();
            if let Err(close_err) = backend.close() {
                warn!(port = %name, error = %close_err, "error while closing serial port");
            }
            return Err(err);
        }

        let mut port = Self {
            name: backend.name().to_string(),
            capabilities: backend.capabilities(),
            backend: Some(backend),
            read_timeout: params.read_timeout,
            backend_timeout: None,
            dtr_level: true,
            rts_level: true,
            closed: Arc::new(AtomicBool::new(false)),
        };

        let configured = port
            .device_params()
            .and_then(|current| port.apply_changes(&current, params));
        let configured = configured.and_then(|()| port.assert_unreadable_outputs(params));
        if let Err(err) = configured {
            warn!(port = %port.name, error = %err, "failed to configure device, closing it");
            port.close();
            return Err(err);
        }

        info!(port = %port.name, baud = params.baud, "serial port opened");
        Ok(port)
    }

    /// Raise DTR and RTS where their level can only be shadowed, so the
    /// shadows start out true.
    ///
    /// RTS is left to the driver under hardware flow control.
    fn assert_unreadable_outputs(&mut self, params: &ModemParams) -> Result<(), PortError> {
        if !self.capabilities.can_read(Line::Dtr) {
            self.set_line(Line::Dtr, true)?;
        }
        if !self.capabilities.can_read(Line::Rts) && !params.flow_control.is_hardware() {
            self.set_line(Line::Rts, true)?;
        }
        Ok(())
    }

    /// Open a device, run `f` with it, and close it on every exit path.
    ///
    /// The device is also released if `f` panics.
    pub fn with_open<T, E, F>(device: &str, params: &ModemParams, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut SerialPort) -> Result<T, E>,
        E: From<PortError>,
    {
        let port = Self::open_with_params(device, params)?;
        Self::scoped(port, f)
    }

    /// Like [`with_open`](Self::with_open) for an already opened backend.
    pub fn with_backend<T, E, F>(
        backend: Box<dyn SerialBackend>,
        params: &ModemParams,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(&mut SerialPort) -> Result<T, E>,
        E: From<PortError>,
    {
        let port = Self::from_backend(backend, params)?;
        Self::scoped(port, f)
    }

    fn scoped<T, E, F>(mut port: SerialPort, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut SerialPort) -> Result<T, E>,
    {
        let result = f(&mut port);
        port.close();
        result
    }

    /// Get the name/path of the device.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// What the platform can report about DTR and RTS.
    pub fn capabilities(&self) -> LineCapabilities {
        self.capabilities
    }

    pub fn is_open(&self) -> bool {
        self.backend.is_some() && !self.closed.load(Ordering::SeqCst)
    }

    /// A handle that can close this port from another thread.
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle(Arc::clone(&self.closed))
    }

    /// Release the device.
    ///
    /// Closing an already closed port does nothing. Failures while releasing
    /// are logged, never returned.
    pub fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(backend) = self.backend.take() {
            match backend.close() {
                Ok(()) => info!(port = %self.name, "serial port closed"),
                Err(err) => warn!(port = %self.name, error = %err, "error while closing serial port"),
            }
        }
    }

    fn backend(&self) -> Result<&(dyn SerialBackend + 'static), PortError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PortError::Closed);
        }
        self.backend.as_deref().ok_or(PortError::Closed)
    }

    fn backend_mut(&mut self) -> Result<&mut (dyn SerialBackend + 'static), PortError> {
        if self.closed.load(Ordering::SeqCst) {
            // Closed through a CloseHandle; release the device now.
            self.close();
            return Err(PortError::Closed);
        }
        match self.backend.as_mut() {
            Some(backend) => Ok(backend.as_mut()),
            None => Err(PortError::Closed),
        }
    }

    // --- Configuration -----------------------------------------------------

    pub fn baud(&self) -> Result<u32, PortError> {
        self.backend()?.baud_rate()
    }

    /// Set the baud rate.
    ///
    /// Rates above [`MAX_BAUD_RATE`](super::MAX_BAUD_RATE), zero, and rates
    /// the driver would round are rejected and the previous rate kept.
    pub fn set_baud(&mut self, baud: u32) -> Result<(), PortError> {
        validate_baud(i64::from(baud))?;
        self.set_checked("baud", baud, |b| b.baud_rate(), |b, v| b.set_baud_rate(v))?;
        debug!(port = %self.name, baud, "baud rate set");
        Ok(())
    }

    pub fn data_bits(&self) -> Result<DataBits, PortError> {
        self.backend()?.data_bits()
    }

    pub fn set_data_bits(&mut self, bits: DataBits) -> Result<(), PortError> {
        self.set_checked("data_bits", bits, |b| b.data_bits(), |b, v| b.set_data_bits(v))?;
        debug!(port = %self.name, bits = bits.bits(), "data bits set");
        Ok(())
    }

    pub fn stop_bits(&self) -> Result<StopBits, PortError> {
        self.backend()?.stop_bits()
    }

    pub fn set_stop_bits(&mut self, bits: StopBits) -> Result<(), PortError> {
        self.set_checked("stop_bits", bits, |b| b.stop_bits(), |b, v| b.set_stop_bits(v))?;
        debug!(port = %self.name, ?bits, "stop bits set");
        Ok(())
    }

    pub fn parity(&self) -> Result<Parity, PortError> {
        self.backend()?.parity()
    }

    pub fn set_parity(&mut self, parity: Parity) -> Result<(), PortError> {
        self.set_checked("parity", parity, |b| b.parity(), |b, v| b.set_parity(v))?;
        debug!(port = %self.name, ?parity, "parity set");
        Ok(())
    }

    pub fn flow_control(&self) -> Result<FlowControl, PortError> {
        self.backend()?.flow_control()
    }

    pub fn set_flow_control(&mut self, flow: FlowControl) -> Result<(), PortError> {
        self.set_checked("flow_control", flow, |b| b.flow_control(), |b, v| {
            b.set_flow_control(v)
        })?;
        debug!(port = %self.name, flow = flow.bits(), "flow control set");
        Ok(())
    }

    /// Set one framing field and read it back.
    ///
    /// A driver that stores something other than `value` gets the previous
    /// value restored and the call fails with `InvalidArgument`.
    fn set_checked<T>(
        &mut self,
        param: &'static str,
        value: T,
        get: fn(&(dyn SerialBackend + 'static)) -> Result<T, PortError>,
        set: fn(&mut (dyn SerialBackend + 'static), T) -> Result<(), PortError>,
    ) -> Result<(), PortError>
    where
        T: Copy + PartialEq + std::fmt::Debug,
    {
        let previous = get(self.backend()?)?;
        let backend = self.backend_mut()?;
        set(backend, value)?;

        let applied = get(backend)?;
        if applied != value {
            set(backend, previous)?;
            return Err(PortError::invalid_argument(
                param,
                format!("driver cannot represent {value:?} exactly (got {applied:?})"),
            ));
        }
        Ok(())
    }

    /// Read timeout in milliseconds; negative means reads block.
    pub fn read_timeout(&self) -> Result<i64, PortError> {
        self.backend()?;
        Ok(self.read_timeout)
    }

    /// Set the read timeout in milliseconds.
    ///
    /// Any value is accepted: negative blocks until data arrives, zero
    /// returns immediately, positive waits up to that many milliseconds.
    pub fn set_read_timeout(&mut self, millis: i64) -> Result<(), PortError> {
        self.backend_mut()?;
        self.read_timeout = millis;
        debug!(port = %self.name, millis, "read timeout set");
        Ok(())
    }

    fn device_params(&self) -> Result<ModemParams, PortError> {
        let backend = self.backend()?;
        Ok(ModemParams {
            baud: backend.baud_rate()?,
            data_bits: backend.data_bits()?,
            stop_bits: backend.stop_bits()?,
            parity: backend.parity()?,
            flow_control: backend.flow_control()?,
            read_timeout: self.read_timeout,
        })
    }

    /// The full current configuration.
    pub fn modem_params(&self) -> Result<ModemParams, PortError> {
        self.device_params()
    }

    /// The full current configuration as a mapping keyed by parameter name.
    pub fn modem_params_map(&self) -> Result<Map<String, Value>, PortError> {
        Ok(self.modem_params()?.to_map())
    }

    /// Apply a full configuration.
    ///
    /// Either every field is applied or the port is left as it was: if the
    /// device rejects a field part way through, the fields already changed
    /// are restored before the error is returned.
    pub fn set_modem_params(&mut self, params: &ModemParams) -> Result<(), PortError> {
        params.validate()?;
        let previous = self.modem_params()?;

        if let Err(err) = self.apply_changes(&previous, params) {
            warn!(port = %self.name, error = %err, "reconfiguration failed, restoring previous parameters");
            if let Err(restore_err) = self.apply_changes(params, &previous) {
                warn!(port = %self.name, error = %restore_err, "failed to restore previous parameters");
            }
            return Err(err);
        }
        Ok(())
    }

    /// Apply the entries of a parameter mapping.
    ///
    /// Missing keys keep their current value and unrecognized keys are
    /// ignored. A single invalid entry rejects the whole mapping.
    pub fn set_modem_params_map(&mut self, params: &Map<String, Value>) -> Result<(), PortError> {
        let target = self.modem_params()?.merged_with(params)?;
        self.set_modem_params(&target)
    }

    /// Read one parameter by name in its integer form.
    pub fn param(&self, name: &str) -> Result<i64, PortError> {
        let key: ParamKey = name.parse()?;
        Ok(self.modem_params()?.get_raw(key))
    }

    /// Set one parameter by name from a dynamic value.
    ///
    /// Non-integer values fail with `TypeMismatch`, out-of-domain integers
    /// and unknown names with `InvalidArgument`.
    pub fn set_param(&mut self, name: &str, value: &Value) -> Result<(), PortError> {
        let key: ParamKey = name.parse()?;
        let raw = integer_value(key, value)?;
        match key {
            ParamKey::Baud => self.set_baud(validate_baud(raw)?),
            ParamKey::DataBits => self.set_data_bits(DataBits::try_from(raw)?),
            ParamKey::StopBits => self.set_stop_bits(StopBits::try_from(raw)?),
            ParamKey::Parity => self.set_parity(Parity::try_from(raw)?),
            ParamKey::FlowControl => self.set_flow_control(FlowControl::try_from(raw)?),
            ParamKey::ReadTimeout => self.set_read_timeout(raw),
        }
    }

    /// Apply each field of `to` that differs from `from`.
    fn apply_changes(&mut self, from: &ModemParams, to: &ModemParams) -> Result<(), PortError> {
        if from.baud != to.baud {
            self.set_baud(to.baud)?;
        }
        if from.data_bits != to.data_bits {
            self.set_data_bits(to.data_bits)?;
        }
        if from.stop_bits != to.stop_bits {
            self.set_stop_bits(to.stop_bits)?;
        }
        if from.parity != to.parity {
            self.set_parity(to.parity)?;
        }
        if from.flow_control != to.flow_control {
            self.set_flow_control(to.flow_control)?;
        }
        self.set_read_timeout(to.read_timeout)
    }

    // --- Modem lines -------------------------------------------------------

    /// Level of a line as 0 or 1.
    ///
    /// DTR and RTS report the last written level where the platform cannot
    /// read them back.
    pub fn line(&mut self, line: Line) -> Result<u8, PortError> {
        let readable = self.capabilities.can_read(line);
        let backend = self.backend_mut()?;
        if readable {
            return backend.read_line(line).map(u8::from);
        }
        Ok(u8::from(match line {
            Line::Dtr => self.dtr_level,
            _ => self.rts_level,
        }))
    }

    /// Drive DTR or RTS.
    pub fn set_line(&mut self, line: Line, level: bool) -> Result<(), PortError> {
        self.backend_mut()?.write_line(line, level)?;
        match line {
            Line::Dtr => self.dtr_level = level,
            Line::Rts => self.rts_level = level,
            _ => {}
        }
        debug!(port = %self.name, ?line, level, "line set");
        Ok(())
    }

    pub fn cts(&mut self) -> Result<u8, PortError> {
        self.line(Line::Cts)
    }

    pub fn dcd(&mut self) -> Result<u8, PortError> {
        self.line(Line::Dcd)
    }

    pub fn dsr(&mut self) -> Result<u8, PortError> {
        self.line(Line::Dsr)
    }

    pub fn ri(&mut self) -> Result<u8, PortError> {
        self.line(Line::Ri)
    }

    pub fn dtr(&mut self) -> Result<u8, PortError> {
        self.line(Line::Dtr)
    }

    pub fn set_dtr(&mut self, level: bool) -> Result<(), PortError> {
        self.set_line(Line::Dtr, level)
    }

    pub fn rts(&mut self) -> Result<u8, PortError> {
        self.line(Line::Rts)
    }

    pub fn set_rts(&mut self, level: bool) -> Result<(), PortError> {
        self.set_line(Line::Rts, level)
    }

    /// Snapshot of all six lines taken in one device query.
    pub fn signals(&mut self) -> Result<Signals, PortError> {
        let capabilities = self.capabilities;
        let (dtr_level, rts_level) = (self.dtr_level, self.rts_level);
        let mut signals = self.backend_mut()?.read_signals()?;
        if !capabilities.can_read(Line::Dtr) {
            signals.set(Line::Dtr, dtr_level);
        }
        if !capabilities.can_read(Line::Rts) {
            signals.set(Line::Rts, rts_level);
        }
        Ok(signals)
    }

    // --- Data transfer -----------------------------------------------------

    fn set_backend_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        if self.backend_timeout == Some(timeout) {
            return Ok(());
        }
        self.backend_mut()?.set_timeout(timeout)?;
        self.backend_timeout = Some(timeout);
        Ok(())
    }

    /// Read into `buffer`, honouring the read timeout.
    ///
    /// Returns 0 when the timeout expires with nothing received. With a
    /// negative timeout this waits until at least one byte arrives, the
    /// device fails, or the port is closed through a [`CloseHandle`].
    pub fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        if buffer.is_empty() {
            self.backend_mut()?;
            return Ok(0);
        }

        let deadline = if self.read_timeout < 0 {
            None
        } else {
            Instant::now().checked_add(Duration::from_millis(self.read_timeout as u64))
        };

        loop {
            let slice = match deadline {
                Some(deadline) => deadline
                    .saturating_duration_since(Instant::now())
                    .min(POLL_SLICE),
                None => POLL_SLICE,
            };
            self.set_backend_timeout(slice)?;

            match self.backend_mut()?.read_bytes(buffer) {
                Ok(n) => return Ok(n),
                Err(err) if err.is_timeout() => {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        return Ok(0);
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Write bytes, returning how many the device accepted.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.backend_mut()?.write_bytes(data)
    }

    pub fn flush(&mut self) -> Result<(), PortError> {
        self.backend_mut()?.flush()
    }

    /// Number of bytes waiting in the input queue.
    pub fn bytes_to_read(&self) -> Result<u32, PortError> {
        self.backend()?.bytes_to_read()
    }

    /// Discard buffered data.
    pub fn clear(&self, buffer: ClearBuffer) -> Result<(), PortError> {
        self.backend()?.clear(buffer)
    }

    /// Hold the line in the break condition for `duration`.
    pub fn send_break(&mut self, duration: Duration) -> Result<(), PortError> {
        self.backend_mut()?.send_break(duration)
    }
}

impl std::io::Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.read_bytes(buf).map_err(Into::into)
    }
}

impl std::io::Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.write_bytes(buf).map_err(Into::into)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        SerialPort::flush(self).map_err(Into::into)
    }
}

impl Drop for SerialPort {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPort")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}
