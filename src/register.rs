//! This module is used to define the registers read from the X10A unit.
//!
//! The register catalogue itself is configuration data: every register is described by a
//! [`RegisterDefinition`] and collected into a [`RegisterTable`] once at startup.

use crate::{
    binding::BindingError,
    conversion::{ConversionId, ValueKind},
};

/// `mode` value of registers that are polled and exposed as sensor values.
pub const EXPOSED_MODE: u8 = 1;

/// Decimal places used when a numeric value is rendered as text, unless configured otherwise.
pub const DEFAULT_ACCURACY_DECIMALS: u8 = 1;

/// Numeric interpretation of a register's raw bytes.
///
/// See [`DataType::scaling`] for the scaling applied to each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// `1` - signed, tenths. Temperatures.
    Temperature,
    /// `2` - signed, tenths. Pressures in bar.
    Pressure,
    /// `3` - unsigned, tenths. Currents in amps.
    Current,
    /// Any other value - plain integer without a unit.
    Raw(u8),
}

impl From<u8> for DataType {
    fn from(value: u8) -> Self {
        match value {
            1 => DataType::Temperature,
            2 => DataType::Pressure,
            3 => DataType::Current,
            other => DataType::Raw(other),
        }
    }
}

impl From<DataType> for u8 {
    fn from(value: DataType) -> Self {
        match value {
            DataType::Temperature => 1,
            DataType::Pressure => 2,
            DataType::Current => 3,
            DataType::Raw(other) => other,
        }
    }
}

/// One register as declared in configuration. Immutable once added to a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterDefinition {
    /// `1` for polled, exposed registers; anything else is a write or control register.
    pub mode: u8,
    pub conversion_id: ConversionId,
    /// Byte offset of the register inside its registry's payload.
    pub offset: u16,
    pub registry_id: u8,
    /// Length of the register's raw value in bytes.
    pub data_size: u8,
    pub data_type: DataType,
    pub label: String,
    /// Precision used by [`BindingRegistry::value_as_text`](crate::binding::BindingRegistry::value_as_text).
    pub accuracy_decimals: u8,
}

impl RegisterDefinition {
    pub fn new(
        mode: u8,
        conversion_id: u16,
        offset: u16,
        registry_id: u8,
        data_size: u8,
        data_type: u8,
        label: impl Into<String>,
    ) -> Self {
        Self {
            mode,
            conversion_id: ConversionId(conversion_id),
            offset,
            registry_id,
            data_size,
            data_type: DataType::from(data_type),
            label: label.into(),
            accuracy_decimals: DEFAULT_ACCURACY_DECIMALS,
        }
    }

    pub fn with_accuracy_decimals(mut self, decimals: u8) -> Self {
        self.accuracy_decimals = decimals;
        self
    }

    /// Whether this register is polled and backs a sensor.
    pub fn is_exposed(&self) -> bool {
        self.mode == EXPOSED_MODE
    }

    /// The kind of value this register decodes to. Fixed by its conversion ID.
    pub fn kind(&self) -> ValueKind {
        self.conversion_id.kind()
    }
}

/// Append-only, ordered collection of register definitions.
///
/// Exposed labels are unique; a second exposed register with a taken label is rejected here,
/// before anything is ever decoded under it.
#[derive(Debug, Default, Clone)]
pub struct RegisterTable {
    registers: Vec<RegisterDefinition>,
}

impl RegisterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `register`.
    ///
    /// Returns `Ok(false)` when an identical definition is already present, so repeated
    /// declarations of the same register are harmless.
    pub fn push(&mut self, register: RegisterDefinition) -> Result<bool, BindingError> {
        if self.registers.contains(&register) {
            return Ok(false);
        }
        if register.is_exposed() && self.exposed_by_label(&register.label).is_some() {
            return Err(BindingError::LabelCollision(register.label));
        }
        self.registers.push(register);
        Ok(true)
    }

    /// Take back the most recently pushed register.
    pub(crate) fn pop(&mut self) -> Option<RegisterDefinition> {
        self.registers.pop()
    }

    /// Build a table from `registers`, failing on the first label collision.
    pub fn from_definitions(
        registers: impl IntoIterator<Item = RegisterDefinition>,
    ) -> Result<Self, BindingError> {
        let mut table = Self::new();
        for register in registers {
            table.push(register)?;
        }
        Ok(table)
    }

    /// The exposed register carrying `label`, if any.
    pub fn exposed_by_label(&self, label: &str) -> Option<&RegisterDefinition> {
        self.exposed().find(|r| r.label == label)
    }

    /// Exposed registers in table order.
    pub fn exposed(&self) -> impl Iterator<Item = &RegisterDefinition> {
        self.registers.iter().filter(|r| r.is_exposed())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisterDefinition> {
        self.registers.iter()
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outdoor_temp() -> RegisterDefinition {
        RegisterDefinition::new(1, 105, 0, 3, 2, 1, "outdoor_temp")
    }

    #[test]
    fn data_type_conversions() {
        for raw in 0..=u8::MAX {
            assert_eq!(u8::from(DataType::from(raw)), raw);
        }
        assert_eq!(DataType::from(1), DataType::Temperature);
        assert_eq!(DataType::from(2), DataType::Pressure);
        assert_eq!(DataType::from(3), DataType::Current);
        assert_eq!(DataType::from(0), DataType::Raw(0));
    }

    #[test]
    fn keeps_declaration_order() {
        let table = RegisterTable::from_definitions([
            RegisterDefinition::new(1, 105, 0, 0x61, 2, 1, "b"),
            RegisterDefinition::new(0, 152, 2, 0x61, 1, 0, "control"),
            RegisterDefinition::new(1, 105, 2, 0x60, 2, 1, "a"),
        ])
        .unwrap();

        let labels: Vec<_> = table.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, ["b", "control", "a"]);
        let exposed: Vec<_> = table.exposed().map(|r| r.label.as_str()).collect();
        assert_eq!(exposed, ["b", "a"]);
    }

    #[test]
    fn duplicate_exposed_label_is_rejected() {
        let mut table = RegisterTable::new();
        table
            .push(RegisterDefinition::new(1, 200, 0, 0x10, 1, 0, "status"))
            .unwrap();
        let err = table
            .push(RegisterDefinition::new(1, 203, 1, 0x10, 1, 0, "status"))
            .unwrap_err();
        assert_eq!(err, BindingError::LabelCollision("status".into()));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn unexposed_registers_may_share_labels() {
        let mut table = RegisterTable::new();
        table
            .push(RegisterDefinition::new(1, 200, 0, 0x10, 1, 0, "status"))
            .unwrap();
        assert_eq!(
            table.push(RegisterDefinition::new(2, 200, 4, 0x10, 1, 0, "status")),
            Ok(true)
        );
    }

    #[test]
    fn identical_declaration_is_idempotent() {
        let mut table = RegisterTable::new();
        assert_eq!(table.push(outdoor_temp()), Ok(true));
        assert_eq!(table.push(outdoor_temp()), Ok(false));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn register_kind_follows_conversion() {
        assert_eq!(outdoor_temp().kind(), ValueKind::Numeric);
        assert_eq!(
            RegisterDefinition::new(1, 217, 0, 0x10, 1, 0, "mode").kind(),
            ValueKind::Text
        );
    }
}
