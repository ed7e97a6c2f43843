//! Locating a serial device to work with.
//!
//! On systems with a `/dev` directory the directory is scanned for entries
//! whose names contain one of the configured patterns (USB-serial adapters by
//! default). Elsewhere `COM1`..`COM9` are probed by opening each in turn.

use crate::config::DiscoveryConfig;
use crate::port::{PortError, SerialPort};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, trace};

/// A device reported by the operating system's port enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub port_name: String,
    /// "usb", "bluetooth", "pci" or "unknown"
    pub transport: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vid: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
}

impl From<serialport::SerialPortInfo> for DeviceInfo {
    fn from(info: serialport::SerialPortInfo) -> Self {
        use serialport::SerialPortType;

        let mut device = DeviceInfo {
            port_name: info.port_name,
            transport: "unknown",
            vid: None,
            pid: None,
            serial_number: None,
            manufacturer: None,
            product: None,
        };
        match info.port_type {
            SerialPortType::UsbPort(usb) => {
                device.transport = "usb";
                device.vid = Some(usb.vid);
                device.pid = Some(usb.pid);
                device.serial_number = usb.serial_number;
                device.manufacturer = usb.manufacturer;
                device.product = usb.product;
            }
            SerialPortType::BluetoothPort => device.transport = "bluetooth",
            SerialPortType::PciPort => device.transport = "pci",
            SerialPortType::Unknown => {}
        }
        device
    }
}

/// Every serial device the operating system reports.
pub fn available_devices() -> Result<Vec<DeviceInfo>, PortError> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(DeviceInfo::from).collect())
}

/// Pick a device according to `config`.
///
/// An explicitly configured device is returned as is. Otherwise the device
/// directory is scanned if it exists, and COM ports are probed if it does
/// not.
pub fn find_device(config: &DiscoveryConfig) -> Option<String> {
    if let Some(device) = &config.device {
        debug!(device = %device, "using configured device");
        return Some(device.clone());
    }

    let found = if config.dev_dir.is_dir() {
        scan_directory(&config.dev_dir, &config.patterns)
    } else {
        probe_com_ports(config.com_first, config.com_last, |name| {
            SerialPort::open(name).map(drop).is_ok()
        })
    };

    match &found {
        Some(device) => debug!(device = %device, "discovered device"),
        None => debug!("no serial device found"),
    }
    found
}

/// First entry of `dir`, in name order, containing any of `patterns`.
pub fn scan_directory(dir: &Path, patterns: &[String]) -> Option<String> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = %dir.display(), error = %err, "cannot list device directory");
            return None;
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();

    names
        .into_iter()
        .find(|name| patterns.iter().any(|pattern| name.contains(pattern.as_str())))
        .map(|name| dir.join(name).to_string_lossy().into_owned())
}

/// Probe `COM{first}`..=`COM{last}` with `can_open`.
///
/// Every port in the range is tried and the highest numbered one that opens
/// is returned.
pub fn probe_com_ports<F>(first: u8, last: u8, mut can_open: F) -> Option<String>
where
    F: FnMut(&str) -> bool,
{
    let mut found = None;
    for number in first..=last {
        let name = format!("COM{number}");
        if can_open(&name) {
            trace!(port = %name, "probe succeeded");
            found = Some(name);
        }
    }
    found
}
