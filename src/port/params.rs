//! Modem parameter types.
//!
//! [`ModemParams`] is the full line configuration of a port. Each field has a
//! typed representation and a raw integer form used by dynamic mappings and
//! configuration files; converting from the raw form is where domain
//! validation happens.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;
use tracing::debug;

/// Highest baud rate accepted by the port layer.
pub const MAX_BAUD_RATE: u32 = 4_000_000;

/// Check a raw baud rate against the supported range.
pub fn validate_baud(baud: i64) -> Result<u32, PortError> {
    if baud <= 0 {
        return Err(PortError::invalid_argument(
            "baud",
            format!("{baud} is not a positive rate"),
        ));
    }
    if baud > i64::from(MAX_BAUD_RATE) {
        return Err(PortError::invalid_argument(
            "baud",
            format!("{baud} exceeds the maximum of {MAX_BAUD_RATE}"),
        ));
    }
    // Bounded by MAX_BAUD_RATE above.
    Ok(baud as u32)
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum DataBits {
    Four,
    Five,
    Six,
    Seven,
    Eight,
}

impl DataBits {
    pub const ALL: [DataBits; 5] = [
        DataBits::Four,
        DataBits::Five,
        DataBits::Six,
        DataBits::Seven,
        DataBits::Eight,
    ];

    /// Number of bits as an integer.
    pub fn bits(self) -> u8 {
        match self {
            DataBits::Four => 4,
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

impl TryFrom<i64> for DataBits {
    type Error = PortError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(DataBits::Four),
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(PortError::invalid_argument(
                "data_bits",
                format!("{other} is not in 4..=8"),
            )),
        }
    }
}

impl From<DataBits> for i64 {
    fn from(bits: DataBits) -> Self {
        i64::from(bits.bits())
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum StopBits {
    One,
    Two,
}

impl TryFrom<i64> for StopBits {
    type Error = PortError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            other => Err(PortError::invalid_argument(
                "stop_bits",
                format!("{other} is not 1 or 2"),
            )),
        }
    }
}

impl From<StopBits> for i64 {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

/// Parity checking modes.
///
/// `Mark` and `Space` are platform extensions; backends that cannot express
/// them reject the value with `InvalidArgument`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Parity {
    None,
    Even,
    Odd,
    Mark,
    Space,
}

impl TryFrom<i64> for Parity {
    type Error = PortError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Parity::None),
            1 => Ok(Parity::Even),
            2 => Ok(Parity::Odd),
            3 => Ok(Parity::Mark),
            4 => Ok(Parity::Space),
            other => Err(PortError::invalid_argument(
                "parity",
                format!("{other} is not a parity mode"),
            )),
        }
    }
}

impl From<Parity> for i64 {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => 0,
            Parity::Even => 1,
            Parity::Odd => 2,
            Parity::Mark => 3,
            Parity::Space => 4,
        }
    }
}

/// Flow control bitmask.
///
/// Hardware (RTS/CTS) and software (XON/XOFF) flow control can be combined:
///
/// ```
/// use serial_device::port::FlowControl;
///
/// let both = FlowControl::SOFT | FlowControl::HARD;
/// assert!(both.is_hardware() && both.is_software());
/// assert_eq!(i64::from(both), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct FlowControl(u8);

impl FlowControl {
    pub const NONE: FlowControl = FlowControl(0);
    pub const HARD: FlowControl = FlowControl(1);
    pub const SOFT: FlowControl = FlowControl(2);

    const MASK: u8 = 0b11;

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_hardware(self) -> bool {
        self.0 & Self::HARD.0 != 0
    }

    pub fn is_software(self) -> bool {
        self.0 & Self::SOFT.0 != 0
    }
}

impl BitOr for FlowControl {
    type Output = FlowControl;

    fn bitor(self, rhs: FlowControl) -> FlowControl {
        FlowControl(self.0 | rhs.0)
    }
}

impl TryFrom<i64> for FlowControl {
    type Error = PortError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if !(0..=i64::from(Self::MASK)).contains(&value) {
            return Err(PortError::invalid_argument(
                "flow_control",
                format!("{value} is not a combination of NONE, HARD and SOFT"),
            ));
        }
        Ok(FlowControl(value as u8))
    }
}

impl From<FlowControl> for i64 {
    fn from(flow: FlowControl) -> Self {
        i64::from(flow.0)
    }
}

/// Names of the individual modem parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKey {
    Baud,
    DataBits,
    StopBits,
    Parity,
    FlowControl,
    ReadTimeout,
}

impl ParamKey {
    pub const ALL: [ParamKey; 6] = [
        ParamKey::Baud,
        ParamKey::DataBits,
        ParamKey::StopBits,
        ParamKey::Parity,
        ParamKey::FlowControl,
        ParamKey::ReadTimeout,
    ];

    /// The mapping key for this parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            ParamKey::Baud => "baud",
            ParamKey::DataBits => "data_bits",
            ParamKey::StopBits => "stop_bits",
            ParamKey::Parity => "parity",
            ParamKey::FlowControl => "flow_control",
            ParamKey::ReadTimeout => "read_timeout",
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamKey {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParamKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| PortError::invalid_argument("parameter", format!("unknown name {s:?}")))
    }
}

/// Extract the integer carried by a dynamic value.
///
/// Anything that is not an integer number is a type mismatch.
pub fn integer_value(key: ParamKey, value: &Value) -> Result<i64, PortError> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if n.is_u64() {
                Err(PortError::invalid_argument(key.as_str(), format!("{n} is out of range")))
            } else {
                Err(PortError::type_mismatch(key.as_str(), "integer", format!("float {n}")))
            }
        }
        Value::Null => Err(PortError::type_mismatch(key.as_str(), "integer", "null")),
        Value::Bool(b) => Err(PortError::type_mismatch(key.as_str(), "integer", format!("bool {b}"))),
        Value::String(s) => Err(PortError::type_mismatch(
            key.as_str(),
            "integer",
            format!("string {s:?}"),
        )),
        Value::Array(_) => Err(PortError::type_mismatch(key.as_str(), "integer", "array")),
        Value::Object(_) => Err(PortError::type_mismatch(key.as_str(), "integer", "object")),
    }
}

/// Full line configuration of a serial port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemParams {
    /// Baud rate (bits per second).
    pub baud: u32,

    /// Number of data bits (4 through 8).
    pub data_bits: DataBits,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// Parity checking mode.
    pub parity: Parity,

    /// Flow control bitmask.
    pub flow_control: FlowControl,

    /// Read timeout in milliseconds. Negative blocks indefinitely, zero
    /// returns immediately.
    pub read_timeout: i64,
}

impl Default for ModemParams {
    fn default() -> Self {
        Self {
            baud: 9600,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::NONE,
            read_timeout: -1,
        }
    }
}

impl ModemParams {
    /// Check the fields whose types do not already guarantee validity.
    pub fn validate(&self) -> Result<(), PortError> {
        validate_baud(i64::from(self.baud)).map(|_| ())
    }

    /// Set one field from its raw integer form.
    pub fn set_raw(&mut self, key: ParamKey, raw: i64) -> Result<(), PortError> {
        match key {
            ParamKey::Baud => self.baud = validate_baud(raw)?,
            ParamKey::DataBits => self.data_bits = DataBits::try_from(raw)?,
            ParamKey::StopBits => self.stop_bits = StopBits::try_from(raw)?,
            ParamKey::Parity => self.parity = Parity::try_from(raw)?,
            ParamKey::FlowControl => self.flow_control = FlowControl::try_from(raw)?,
            ParamKey::ReadTimeout => self.read_timeout = raw,
        }
        Ok(())
    }

    /// Read one field in its raw integer form.
    pub fn get_raw(&self, key: ParamKey) -> i64 {
        match key {
            ParamKey::Baud => i64::from(self.baud),
            ParamKey::DataBits => self.data_bits.into(),
            ParamKey::StopBits => self.stop_bits.into(),
            ParamKey::Parity => self.parity.into(),
            ParamKey::FlowControl => self.flow_control.into(),
            ParamKey::ReadTimeout => self.read_timeout,
        }
    }

    /// The parameters as a mapping keyed by parameter name.
    pub fn to_map(&self) -> Map<String, Value> {
        ParamKey::ALL
            .into_iter()
            .map(|key| (key.as_str().to_string(), json!(self.get_raw(key))))
            .collect()
    }

    /// Build parameters from a mapping, starting from the defaults.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, PortError> {
        Self::default().merged_with(map)
    }

    /// Overlay the entries of a mapping onto a copy of these parameters.
    ///
    /// Missing keys keep their current value. Unrecognized keys are ignored.
    /// Nothing is returned unless every recognized entry is valid.
    pub fn merged_with(&self, map: &Map<String, Value>) -> Result<Self, PortError> {
        let mut merged = *self;
        for (name, value) in map {
            match name.parse::<ParamKey>() {
                Ok(key) => merged.set_raw(key, integer_value(key, value)?)?,
                Err(_) => debug!(key = %name, "ignoring unrecognized modem parameter"),
            }
        }
        Ok(merged)
    }
}
