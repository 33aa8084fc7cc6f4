//! Scaling factors for the numeric data types.
//!
//! Numeric X10A registers hold big-endian integers. The register's data type decides whether
//! the integer is signed and how far the decimal point moves, and also suggests what kind of
//! physical quantity it is.

use crate::{conversion::ConversionId, register::DataType};

/// How to turn a register's raw integer into its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalingFactors {
    /// Whether the raw bytes are two's complement.
    pub signed: bool,
    /// The raw integer is divided by this, e.g. `10` means the raw value is in tenths.
    pub divisor: u32,
}

impl Default for ScalingFactors {
    /// Default to no scaling.
    fn default() -> Self {
        Self {
            signed: false,
            divisor: 1,
        }
    }
}

impl ScalingFactors {
    pub const fn new(signed: bool, divisor: u32) -> Self {
        Self { signed, divisor }
    }

    /// Convert a raw register integer into its scaled value.
    #[inline]
    pub fn apply(&self, raw: i64) -> f64 {
        // Dividing keeps e.g. `215 / 10` exactly equal to the literal `21.5`.
        raw as f64 / self.divisor as f64
    }
}

/// What a numeric register measures, used to default a sensor's unit and device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityHint {
    Temperature,
    Pressure,
    Current,
}

impl QuantityHint {
    /// Default unit of measurement.
    pub const fn unit(&self) -> &'static str {
        match self {
            QuantityHint::Temperature => "°C",
            QuantityHint::Pressure => "bar",
            QuantityHint::Current => "A",
        }
    }

    /// Default device class.
    pub const fn device_class(&self) -> &'static str {
        match self {
            QuantityHint::Temperature => "temperature",
            QuantityHint::Pressure => "pressure",
            QuantityHint::Current => "current",
        }
    }
}

impl DataType {
    /// Scaling applied to a register of this data type.
    pub const fn scaling(&self) -> ScalingFactors {
        match self {
            DataType::Temperature => ScalingFactors::new(true, 10),
            DataType::Pressure => ScalingFactors::new(true, 10),
            DataType::Current => ScalingFactors::new(false, 10),
            DataType::Raw(_) => ScalingFactors::new(false, 1),
        }
    }

    /// The quantity a register of this type measures when decoded with `conversion_id`.
    ///
    /// Only temperature conversions make a `Temperature` register a temperature, the others are
    /// tenths of something unknown.
    pub fn hint(&self, conversion_id: ConversionId) -> Option<QuantityHint> {
        match self {
            DataType::Temperature if conversion_id.is_temperature() => {
                Some(QuantityHint::Temperature)
            }
            DataType::Pressure => Some(QuantityHint::Pressure),
            DataType::Current => Some(QuantityHint::Current),
            _ => None,
        }
    }
}
