//! YAML configuration of the register list and the sensors it exposes.
//!
//! ```yaml
//! mode: 1
//! scan_interval_ms: 30000
//! response_timeout_ms: 300
//! registers:
//!   - mode: 1
//!     ConversionID: 105
//!     offset: 0
//!     registryID: 97
//!     dataSize: 2
//!     dataType: 1
//!     label: "Outdoor air temp."
//! ```
//!
//! Optional per-register keys `unit`, `device_class`, `accuracy_decimals` and `icon` override
//! the sensor defaults derived from the conversion ID and data type.

use fugit::MillisDurationU32;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    component::{DaikinX10a, DEFAULT_SCAN_INTERVAL},
    conversion::ValueKind,
    error::Result,
    register::{DEFAULT_ACCURACY_DECIMALS, RegisterDefinition},
    transport::{X10aTransport, DEFAULT_RESPONSE_TIMEOUT},
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Register {index} has an empty label")]
    EmptyLabel { index: usize },
    #[error("Register {index} is invalid: {reason}")]
    Invalid { index: usize, reason: &'static str },
}

/// One entry of the `registers` list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisterConfig {
    pub mode: u8,
    #[serde(rename = "ConversionID")]
    pub conversion_id: u16,
    pub offset: u16,
    #[serde(rename = "registryID")]
    pub registry_id: u8,
    #[serde(rename = "dataSize")]
    pub data_size: u8,
    #[serde(rename = "dataType")]
    pub data_type: u8,
    pub label: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub device_class: Option<String>,
    #[serde(default)]
    pub accuracy_decimals: Option<u8>,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Whole component configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ComponentConfig {
    /// Component-level mode. Required in register files, not interpreted.
    pub mode: u8,
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u32,
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u32,
    #[serde(default)]
    pub registers: Vec<RegisterConfig>,
}

fn default_scan_interval_ms() -> u32 {
    DEFAULT_SCAN_INTERVAL.to_millis()
}

fn default_response_timeout_ms() -> u32 {
    DEFAULT_RESPONSE_TIMEOUT.to_millis()
}

/// The sensor a host should create for one exposed register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorMetadata {
    pub label: String,
    /// Identifier derived from the label, see [`object_id`].
    pub object_id: String,
    /// Numeric sensor or text sensor.
    pub kind: ValueKind,
    pub unit: Option<String>,
    pub device_class: Option<String>,
    /// Only meaningful for numeric sensors.
    pub accuracy_decimals: u8,
    /// States a text sensor can report, empty when open-ended.
    pub options: Vec<&'static str>,
    pub icon: Option<String>,
}

/// Host identifier for a label: lower case, runs of anything but `a-z0-9` become `_`.
///
/// `"Outdoor air temp."` => `"daikin_outdoor_air_temp"`
pub fn object_id(label: &str) -> String {
    let mut id = String::from("daikin_");
    let mut pending_separator = false;
    for c in label.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !id.ends_with('_') {
                id.push('_');
            }
            pending_separator = false;
            id.push(c);
        } else {
            pending_separator = true;
        }
    }
    id
}

impl RegisterConfig {
    pub fn definition(&self) -> RegisterDefinition {
        RegisterDefinition::new(
            self.mode,
            self.conversion_id,
            self.offset,
            self.registry_id,
            self.data_size,
            self.data_type,
            self.label.clone(),
        )
        .with_accuracy_decimals(self.accuracy_decimals.unwrap_or(DEFAULT_ACCURACY_DECIMALS))
    }

    /// Sensor description for this register, `None` unless it is exposed.
    ///
    /// Explicit keys win. Otherwise numeric sensors take their unit and device class from the
    /// data type's quantity (temperature only for temperature conversions).
    pub fn sensor(&self) -> Option<SensorMetadata> {
        let definition = self.definition();
        if !definition.is_exposed() {
            return None;
        }

        let kind = definition.kind();
        let hint = match kind {
            ValueKind::Numeric => definition.data_type.hint(definition.conversion_id),
            ValueKind::Text => None,
        };
        Some(SensorMetadata {
            label: self.label.clone(),
            object_id: object_id(&self.label),
            kind,
            unit: self
                .unit
                .clone()
                .or_else(|| hint.map(|h| h.unit().to_owned())),
            device_class: self
                .device_class
                .clone()
                .or_else(|| hint.map(|h| h.device_class().to_owned())),
            accuracy_decimals: definition.accuracy_decimals,
            options: definition.conversion_id.text_options(),
            icon: self.icon.clone(),
        })
    }
}

impl ComponentConfig {
    pub fn from_yaml_str(yaml: &str) -> core::result::Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> core::result::Result<(), ConfigError> {
        for (index, register) in self.registers.iter().enumerate() {
            if register.label.trim().is_empty() {
                return Err(ConfigError::EmptyLabel { index });
            }
            if register.data_size == 0 {
                return Err(ConfigError::Invalid {
                    index,
                    reason: "dataSize must be at least one byte",
                });
            }
        }
        Ok(())
    }

    pub fn definitions(&self) -> impl Iterator<Item = RegisterDefinition> + '_ {
        self.registers.iter().map(RegisterConfig::definition)
    }

    /// Sensors to create, one per exposed register, in declaration order.
    pub fn sensors(&self) -> Vec<SensorMetadata> {
        self.registers.iter().filter_map(RegisterConfig::sensor).collect()
    }

    pub fn scan_interval(&self) -> MillisDurationU32 {
        MillisDurationU32::from_ticks(self.scan_interval_ms)
    }

    pub fn response_timeout(&self) -> MillisDurationU32 {
        MillisDurationU32::from_ticks(self.response_timeout_ms)
    }

    /// Build a component talking over `interface` with every configured register added.
    ///
    /// Fails on the first label collision, before anything is polled.
    pub fn build<S: embedded_io::Read + embedded_io::Write, const L: usize>(
        &self,
        interface: S,
    ) -> Result<DaikinX10a<S, L>, S::Error> {
        self.validate()?;
        let transport = X10aTransport::new(interface).with_timeout(self.response_timeout());
        let mut component = DaikinX10a::new(transport).with_scan_interval(self.scan_interval());
        for definition in self.definitions() {
            component.add_register_definition(definition)?;
        }
        Ok(component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{binding::BindingError, error::Error, mock_serial::MockSerial};

    const CONFIG: &str = r#"
mode: 1
scan_interval_ms: 10000
registers:
  - mode: 1
    ConversionID: 105
    offset: 0
    registryID: 97
    dataSize: 2
    dataType: 1
    label: "Outdoor air temp."
  - mode: 1
    ConversionID: 217
    offset: 2
    registryID: 97
    dataSize: 1
    dataType: 0
    label: "Operation Mode"
    icon: "mdi:hvac"
  - mode: 1
    ConversionID: 105
    offset: 3
    registryID: 97
    dataSize: 2
    dataType: 2
    label: "Refrigerant pressure"
    accuracy_decimals: 2
  - mode: 1
    ConversionID: 105
    offset: 0
    registryID: 98
    dataSize: 2
    dataType: 1
    label: "Some tenths"
    unit: "K"
  - mode: 0
    ConversionID: 152
    offset: 5
    registryID: 97
    dataSize: 1
    dataType: 0
    label: "Control"
"#;

    #[test]
    fn parses_register_list() {
        let config = ComponentConfig::from_yaml_str(CONFIG).unwrap();
        assert_eq!(config.mode, 1);
        assert_eq!(config.scan_interval_ms, 10_000);
        assert_eq!(config.response_timeout_ms, 300);
        assert_eq!(config.registers.len(), 5);

        let first = config.definitions().next().unwrap();
        assert_eq!(first, RegisterDefinition::new(1, 105, 0, 97, 2, 1, "Outdoor air temp."));
        let pressure = config.definitions().nth(2).unwrap();
        assert_eq!(pressure.accuracy_decimals, 2);
    }

    #[test]
    fn sensor_defaults() {
        let config = ComponentConfig::from_yaml_str(CONFIG).unwrap();
        let sensors = config.sensors();
        assert_eq!(sensors.len(), 4, "the mode 0 register is not exposed");

        let temp = &sensors[0];
        assert_eq!(temp.object_id, "daikin_outdoor_air_temp");
        assert_eq!(temp.kind, ValueKind::Numeric);
        assert_eq!(temp.unit.as_deref(), Some("°C"));
        assert_eq!(temp.device_class.as_deref(), Some("temperature"));
        assert_eq!(temp.accuracy_decimals, 1);

        let mode = &sensors[1];
        assert_eq!(mode.kind, ValueKind::Text);
        assert_eq!(mode.unit, None);
        assert_eq!(mode.icon.as_deref(), Some("mdi:hvac"));
        assert_eq!(mode.options.first(), Some(&"Fan Only"));
        assert!(temp.options.is_empty());

        let pressure = &sensors[2];
        assert_eq!(pressure.unit.as_deref(), Some("bar"));
        assert_eq!(pressure.device_class.as_deref(), Some("pressure"));
        assert_eq!(pressure.accuracy_decimals, 2);

        let explicit = &sensors[3];
        assert_eq!(explicit.unit.as_deref(), Some("K"));
        assert_eq!(explicit.device_class.as_deref(), Some("temperature"));
    }

    #[test]
    fn object_ids() {
        assert_eq!(object_id("Outdoor air temp."), "daikin_outdoor_air_temp");
        assert_eq!(object_id("  INV  frequency (rps) "), "daikin_inv_frequency_rps");
        assert_eq!(object_id("DHW-tank temp"), "daikin_dhw_tank_temp");
        assert_eq!(object_id("R1T"), "daikin_r1t");
    }

    #[test]
    fn empty_label_is_rejected() {
        let yaml = r#"
mode: 1
registers:
  - { mode: 1, ConversionID: 105, offset: 0, registryID: 1, dataSize: 2, dataType: 1, label: " " }
"#;
        assert!(matches!(
            ComponentConfig::from_yaml_str(yaml),
            Err(ConfigError::EmptyLabel { index: 0 })
        ));
    }

    #[test]
    fn zero_size_register_is_rejected() {
        let yaml = r#"
mode: 1
registers:
  - { mode: 1, ConversionID: 105, offset: 0, registryID: 1, dataSize: 2, dataType: 1, label: "a" }
  - { mode: 1, ConversionID: 200, offset: 0, registryID: 1, dataSize: 0, dataType: 0, label: "b" }
"#;
        assert!(matches!(
            ComponentConfig::from_yaml_str(yaml),
            Err(ConfigError::Invalid { index: 1, .. })
        ));
    }

    #[test]
    fn component_mode_is_required() {
        let yaml = r#"
registers:
  - { mode: 1, ConversionID: 105, offset: 0, registryID: 1, dataSize: 2, dataType: 1, label: "a" }
"#;
        assert!(matches!(
            ComponentConfig::from_yaml_str(yaml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn wrong_field_type_is_rejected() {
        let yaml = r#"
mode: 1
registers:
  - { mode: 1, ConversionID: 105, offset: 0, registryID: 300, dataSize: 2, dataType: 1, label: "x" }
"#;
        assert!(matches!(
            ComponentConfig::from_yaml_str(yaml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn build_adds_registers() {
        let config = ComponentConfig::from_yaml_str(CONFIG).unwrap();
        let component: DaikinX10a<MockSerial> = config.build(MockSerial::new()).unwrap();
        assert_eq!(component.registers().count(), 5);
        assert_eq!(component.scan_interval(), MillisDurationU32::from_ticks(10_000));
    }

    #[test]
    fn build_fails_on_label_collision() {
        let yaml = r#"
mode: 1
registers:
  - { mode: 1, ConversionID: 200, offset: 0, registryID: 16, dataSize: 1, dataType: 0, label: "status" }
  - { mode: 1, ConversionID: 203, offset: 1, registryID: 16, dataSize: 1, dataType: 0, label: "status" }
"#;
        let config = ComponentConfig::from_yaml_str(yaml).unwrap();
        let result: Result<DaikinX10a<MockSerial>, _> = config.build(MockSerial::new());
        assert!(matches!(
            result,
            Err(Error::Binding(BindingError::LabelCollision(label))) if label == "status"
        ));
    }
}
