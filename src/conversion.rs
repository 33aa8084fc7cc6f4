//! Conversion from raw register bytes to values.
//!
//! Every register names a conversion ID. A fixed set of IDs render the register as text
//! (switch states, operating modes, error codes); every other ID is numeric, and the
//! register's [`DataType`] alone decides signedness and scaling. Multi-byte integers are
//! big-endian, signed ones two's complement.
//!
//! A numeric conversion ID that is not known is not an error: it decodes like any other
//! numeric register of its data type.

use core::fmt;

use modular_bitfield::prelude::*;
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, FromRepr, IntoStaticStr};
use thiserror::Error;

use crate::register::DataType;

/// Conversion IDs whose registers decode to text.
pub const TEXT_CONVERSION_IDS: [u16; 16] = [
    200, 201, 203, 204, 211, 217, 300, 301, 302, 303, 304, 305, 306, 307, 315, 316,
];

/// Conversion IDs of temperature readings. Only affects sensor defaults, not decoding.
pub const TEMPERATURE_CONVERSION_IDS: [u16; 6] = [105, 107, 114, 118, 119, 405];

/// Identifies how a register's raw bytes map to a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversionId(pub u16);

/// The two kinds of decoded values. Fixed per conversion ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Numeric,
    Text,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueKind::Numeric => "numeric",
            ValueKind::Text => "text",
        })
    }
}

impl ConversionId {
    pub fn kind(&self) -> ValueKind {
        match self.text_rule() {
            Some(_) => ValueKind::Text,
            None => ValueKind::Numeric,
        }
    }

    /// Whether this conversion reads a temperature.
    pub fn is_temperature(&self) -> bool {
        TEMPERATURE_CONVERSION_IDS.contains(&self.0)
    }

    /// The states a text conversion names, in table order. Empty for numeric conversions and
    /// for error codes, which are open-ended.
    pub fn text_options(&self) -> Vec<&'static str> {
        self.text_rule().map_or_else(Vec::new, TextRule::options)
    }

    fn text_rule(&self) -> Option<TextRule> {
        Some(match self.0 {
            200 => TextRule::OnOff,
            201 => TextRule::OperatingMode,
            203 => TextRule::ErrorClass,
            204 => TextRule::ErrorCode,
            211 => TextRule::FanStep,
            217 => TextRule::ExtendedMode,
            id @ 300..=307 => TextRule::Flag((id - 300) as u8),
            315 => TextRule::OperationState,
            316 => TextRule::HeatSource,
            _ => return None,
        })
    }
}

impl From<u16> for ConversionId {
    fn from(value: u16) -> Self {
        ConversionId(value)
    }
}

/// A decoded register value.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    Numeric(f64),
    Text(String),
}

impl DecodedValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            DecodedValue::Numeric(_) => ValueKind::Numeric,
            DecodedValue::Text(_) => ValueKind::Text,
        }
    }

    /// Render as text, numbers with exactly `decimals` decimal places.
    pub fn render(&self, decimals: u8) -> String {
        match self {
            DecodedValue::Numeric(value) => format!("{:.*}", decimals as usize, value),
            DecodedValue::Text(text) => text.clone(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected {expected} raw bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("no integer decoding for a {0}-byte register")]
    UnsupportedWidth(usize),
    #[error("text conversion needs at least one byte")]
    Empty,
}

/// Decode `raw`, the `data_size` bytes of one register.
pub fn decode(
    conversion_id: ConversionId,
    data_type: DataType,
    data_size: usize,
    raw: &[u8],
) -> Result<DecodedValue, DecodeError> {
    if raw.len() != data_size {
        return Err(DecodeError::LengthMismatch {
            expected: data_size,
            actual: raw.len(),
        });
    }
    match conversion_id.text_rule() {
        Some(rule) => rule.render(raw).map(DecodedValue::Text),
        None => decode_numeric(data_type, raw).map(DecodedValue::Numeric),
    }
}

fn decode_numeric(data_type: DataType, raw: &[u8]) -> Result<f64, DecodeError> {
    let scaling = data_type.scaling();
    let value: i64 = match (raw, scaling.signed) {
        (&[b], true) => i8::from_be_bytes([b]).into(),
        (&[b], false) => b.into(),
        (&[b0, b1], true) => i16::from_be_bytes([b0, b1]).into(),
        (&[b0, b1], false) => u16::from_be_bytes([b0, b1]).into(),
        (&[b0, b1, b2, b3], true) => i32::from_be_bytes([b0, b1, b2, b3]).into(),
        (&[b0, b1, b2, b3], false) => u32::from_be_bytes([b0, b1, b2, b3]).into(),
        _ => return Err(DecodeError::UnsupportedWidth(raw.len())),
    };
    Ok(scaling.apply(value))
}

/// How a text conversion renders the first byte of its register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextRule {
    OnOff,
    OperatingMode,
    ErrorClass,
    ErrorCode,
    FanStep,
    ExtendedMode,
    /// `ON` when the given bit is set.
    Flag(u8),
    OperationState,
    HeatSource,
}

impl TextRule {
    fn render(self, raw: &[u8]) -> Result<String, DecodeError> {
        let &byte = raw.first().ok_or(DecodeError::Empty)?;
        let nibbles = Nibbles::from_bytes([byte]);
        Ok(match self {
            TextRule::OnOff => on_off(byte != 0),
            TextRule::OperatingMode => lookup(byte, OperatingMode::from_repr),
            TextRule::ErrorClass => lookup(byte, ErrorClass::from_repr),
            TextRule::ErrorCode => error_code(nibbles),
            TextRule::FanStep => lookup(byte, FanStep::from_repr),
            TextRule::ExtendedMode => lookup(byte, ExtendedMode::from_repr),
            TextRule::Flag(bit) => on_off(byte & (1 << bit) != 0),
            TextRule::OperationState => lookup(nibbles.high(), OperationState::from_repr),
            TextRule::HeatSource => lookup(nibbles.high(), HeatSource::from_repr),
        })
    }

    fn options(self) -> Vec<&'static str> {
        match self {
            TextRule::OnOff | TextRule::Flag(_) => vec!["OFF", "ON"],
            TextRule::OperatingMode => names::<OperatingMode>(),
            TextRule::ErrorClass => names::<ErrorClass>(),
            TextRule::ErrorCode => Vec::new(),
            TextRule::FanStep => names::<FanStep>(),
            TextRule::ExtendedMode => names::<ExtendedMode>(),
            TextRule::OperationState => names::<OperationState>(),
            TextRule::HeatSource => names::<HeatSource>(),
        }
    }
}

fn names<T: IntoEnumIterator + Into<&'static str>>() -> Vec<&'static str> {
    T::iter().map(Into::into).collect()
}

fn on_off(on: bool) -> String {
    String::from(if on { "ON" } else { "OFF" })
}

fn lookup<T: Into<&'static str>>(value: u8, from_repr: fn(u8) -> Option<T>) -> String {
    match from_repr(value) {
        Some(entry) => entry.into().to_string(),
        None => format!("Unknown (0x{value:02X})"),
    }
}

/// A status byte split into its nibbles, low nibble first.
#[bitfield]
#[derive(Clone, Copy)]
struct Nibbles {
    low: B4,
    high: B4,
}

const ERROR_CODE_FIRST: &[u8; 16] = b" ACEHFJLPU987654";
const ERROR_CODE_SECOND: &[u8; 16] = b"0123456789AHCJEF";

/// Two character error code as shown on the unit's remote, e.g. `0x33` => `"E3"`.
fn error_code(nibbles: Nibbles) -> String {
    let first = ERROR_CODE_FIRST[nibbles.high() as usize] as char;
    let second = ERROR_CODE_SECOND[nibbles.low() as usize] as char;
    format!("{first}{second}").trim_start().to_string()
}

/// Conversion 201.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr, EnumIter)]
#[repr(u8)]
enum OperatingMode {
    #[strum(serialize = "Fan Only")]
    FanOnly = 0,
    Heating = 1,
    Cooling = 2,
    Auto = 3,
    Ventilation = 4,
    #[strum(serialize = "Auto Cool")]
    AutoCool = 5,
    #[strum(serialize = "Auto Heat")]
    AutoHeat = 6,
    Dry = 7,
    #[strum(serialize = "Aux.")]
    Aux = 8,
    #[strum(serialize = "Cooling Storage")]
    CoolingStorage = 9,
    #[strum(serialize = "Heating Storage")]
    HeatingStorage = 10,
}

/// Conversion 203.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr, EnumIter)]
#[repr(u8)]
enum ErrorClass {
    Normal = 0,
    Error = 1,
    Warning = 2,
    Caution = 3,
}

/// Conversion 211.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr, EnumIter)]
#[repr(u8)]
enum FanStep {
    #[strum(serialize = "OFF")]
    Off = 0,
    #[strum(serialize = "LOW")]
    Low = 1,
    #[strum(serialize = "MID")]
    Mid = 2,
    #[strum(serialize = "HIGH")]
    High = 3,
}

/// Conversion 217. Conversion 201 plus the stored-thermostat steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr, EnumIter)]
#[repr(u8)]
enum ExtendedMode {
    #[strum(serialize = "Fan Only")]
    FanOnly = 0,
    Heating = 1,
    Cooling = 2,
    Auto = 3,
    Ventilation = 4,
    #[strum(serialize = "Auto Cool")]
    AutoCool = 5,
    #[strum(serialize = "Auto Heat")]
    AutoHeat = 6,
    Dry = 7,
    #[strum(serialize = "Aux.")]
    Aux = 8,
    #[strum(serialize = "Cooling Storage")]
    CoolingStorage = 9,
    #[strum(serialize = "Heating Storage")]
    HeatingStorage = 10,
    #[strum(serialize = "UseStrdThrm(cl)1")]
    StoredCool1 = 11,
    #[strum(serialize = "UseStrdThrm(cl)2")]
    StoredCool2 = 12,
    #[strum(serialize = "UseStrdThrm(cl)3")]
    StoredCool3 = 13,
    #[strum(serialize = "UseStrdThrm(cl)4")]
    StoredCool4 = 14,
    #[strum(serialize = "UseStrdThrm(ht)1")]
    StoredHeat1 = 15,
    #[strum(serialize = "UseStrdThrm(ht)2")]
    StoredHeat2 = 16,
    #[strum(serialize = "UseStrdThrm(ht)3")]
    StoredHeat3 = 17,
    #[strum(serialize = "UseStrdThrm(ht)4")]
    StoredHeat4 = 18,
}

/// Conversion 315, high nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr, EnumIter)]
#[repr(u8)]
enum OperationState {
    Stop = 0,
    Heating = 1,
    Cooling = 2,
    #[strum(serialize = "??")]
    Undefined = 3,
    #[strum(serialize = "DHW")]
    HotWater = 4,
    #[strum(serialize = "Heating + DHW")]
    HeatingHotWater = 5,
    #[strum(serialize = "Cooling + DHW")]
    CoolingHotWater = 6,
}

/// Conversion 316, high nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr, EnumIter)]
#[repr(u8)]
enum HeatSource {
    #[strum(serialize = "H/P only")]
    HeatPumpOnly = 0,
    Hybrid = 1,
    #[strum(serialize = "Boiler only")]
    BoilerOnly = 2,
}
