//! Core traits for serial port abstraction.
//!
//! Defines the `SerialBackend` trait that sits between [`SerialPort`] and the
//! operating system, allowing both native ports and mock implementations to
//! be used interchangeably.
//!
//! [`SerialPort`]: super::SerialPort

use super::error::PortError;
use super::params::{DataBits, FlowControl, Parity, StopBits};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;

/// Modem control and status lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Line {
    /// Clear To Send (input).
    Cts,
    /// Data Carrier Detect (input).
    Dcd,
    /// Data Set Ready (input).
    Dsr,
    /// Ring Indicator (input).
    Ri,
    /// Data Terminal Ready (output).
    Dtr,
    /// Request To Send (output).
    Rts,
}

impl Line {
    /// Whether the line is driven by this end of the connection.
    pub fn is_output(self) -> bool {
        matches!(self, Line::Dtr | Line::Rts)
    }
}

/// What the platform can report about the output lines.
///
/// Resolved once when a backend is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineCapabilities {
    /// The kernel can report the current DTR level.
    pub read_dtr: bool,
    /// The kernel can report the current RTS level.
    pub read_rts: bool,
}

impl LineCapabilities {
    /// Whether the given line can be read back from the device.
    pub fn can_read(&self, line: Line) -> bool {
        match line {
            Line::Dtr => self.read_dtr,
            Line::Rts => self.read_rts,
            _ => true,
        }
    }
}

/// Snapshot of all six modem lines, each 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Signals {
    pub cts: u8,
    pub dcd: u8,
    pub dsr: u8,
    pub dtr: u8,
    pub ri: u8,
    pub rts: u8,
}

impl Signals {
    /// Value of a single line in this snapshot.
    pub fn get(&self, line: Line) -> u8 {
        match line {
            Line::Cts => self.cts,
            Line::Dcd => self.dcd,
            Line::Dsr => self.dsr,
            Line::Ri => self.ri,
            Line::Dtr => self.dtr,
            Line::Rts => self.rts,
        }
    }

    pub fn set(&mut self, line: Line, level: bool) {
        let value = u8::from(level);
        match line {
            Line::Cts => self.cts = value,
            Line::Dcd => self.dcd = value,
            Line::Dsr => self.dsr = value,
            Line::Ri => self.ri = value,
            Line::Dtr => self.dtr = value,
            Line::Rts => self.rts = value,
        }
    }

    /// The snapshot as a mapping keyed `cts, dcd, dsr, dtr, ri, rts`.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("cts".to_string(), json!(self.cts));
        map.insert("dcd".to_string(), json!(self.dcd));
        map.insert("dsr".to_string(), json!(self.dsr));
        map.insert("dtr".to_string(), json!(self.dtr));
        map.insert("ri".to_string(), json!(self.ri));
        map.insert("rts".to_string(), json!(self.rts));
        map
    }
}

/// Which buffer to discard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearBuffer {
    Input,
    Output,
    All,
}

impl From<ClearBuffer> for serialport::ClearBuffer {
    fn from(buffer: ClearBuffer) -> Self {
        match buffer {
            ClearBuffer::Input => serialport::ClearBuffer::Input,
            ClearBuffer::Output => serialport::ClearBuffer::Output,
            ClearBuffer::All => serialport::ClearBuffer::All,
        }
    }
}

/// Trait for the device operations a [`SerialPort`](super::SerialPort) is
/// built on.
///
/// Every call maps onto one blocking OS request. Values the driver is known
/// not to support are rejected with `InvalidArgument`. Drivers may still store
/// a setting other than the one asked for, so `SerialPort` reads each field
/// back after setting it.
pub trait SerialBackend: Send + std::fmt::Debug {
    /// Get the name/path of the underlying device.
    fn name(&self) -> &str;

    /// What this backend can report about the output lines.
    fn capabilities(&self) -> LineCapabilities;

    fn baud_rate(&self) -> Result<u32, PortError>;
    fn set_baud_rate(&mut self, baud: u32) -> Result<(), PortError>;

    fn data_bits(&self) -> Result<DataBits, PortError>;
    fn set_data_bits(&mut self, bits: DataBits) -> Result<(), PortError>;

    fn stop_bits(&self) -> Result<StopBits, PortError>;
    fn set_stop_bits(&mut self, bits: StopBits) -> Result<(), PortError>;

    fn parity(&self) -> Result<Parity, PortError>;
    fn set_parity(&mut self, parity: Parity) -> Result<(), PortError>;

    fn flow_control(&self) -> Result<FlowControl, PortError>;
    fn set_flow_control(&mut self, flow: FlowControl) -> Result<(), PortError>;

    /// Set how long a single `read_bytes` call may wait for data.
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError>;

    /// Read bytes into the buffer.
    ///
    /// Fails with a timeout error if nothing arrives within the configured
    /// timeout.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Write bytes, returning how many were accepted.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    fn flush(&mut self) -> Result<(), PortError>;

    /// Number of bytes waiting in the input queue.
    fn bytes_to_read(&self) -> Result<u32, PortError>;

    fn clear(&self, buffer: ClearBuffer) -> Result<(), PortError>;

    /// Hold the line in the break condition for the given duration.
    fn send_break(&mut self, duration: Duration) -> Result<(), PortError>;

    /// Read the level of a line.
    ///
    /// Output lines are only readable when [`LineCapabilities`] says so.
    fn read_line(&mut self, line: Line) -> Result<bool, PortError>;

    /// Drive an output line.
    fn write_line(&mut self, line: Line, level: bool) -> Result<(), PortError>;

    /// Read all lines in one request where the platform allows it.
    ///
    /// Output lines the backend cannot read are reported as 0.
    fn read_signals(&mut self) -> Result<Signals, PortError> {
        let caps = self.capabilities();
        let mut signals = Signals::default();
        for line in [Line::Cts, Line::Dcd, Line::Dsr, Line::Ri, Line::Dtr, Line::Rts] {
            if caps.can_read(line) {
                let level = self.read_line(line)?;
                signals.set(line, level);
            }
        }
        Ok(signals)
    }

    /// Release the device handle.
    fn close(self: Box<Self>) -> Result<(), PortError>;
}
