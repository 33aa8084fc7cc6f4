//! This crate reads and decodes the registers of Daikin heat pumps and air conditioners which
//! speak the X10A serial protocol, and publishes the decoded values to observers by label.
//!
//! The register catalogue is configuration, not code: each register names a registry, an
//! offset and size inside that registry's response, a data type, and a conversion ID which
//! picks the decoding rule. Exposed registers (`mode: 1`) are polled every scan interval and
//! their values handed to whichever numeric or text observer is registered under their label.
//!
//! The serial port used for X10A comms should be configured like so:
//! * Baud rate: 9600
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: Even

pub mod binding;
pub mod component;
pub mod config;
pub mod conversion;
pub mod error;
pub mod frame;
pub mod register;
pub mod scaling;
pub mod transport;

#[cfg(test)]
mod mock_serial;

pub use binding::{BindingRegistry, NumericObserver, Observer, TextObserver};
pub use component::{DaikinX10a, SweepReport};
pub use config::ComponentConfig;
pub use conversion::{ConversionId, DecodedValue, ValueKind};
pub use register::{DataType, RegisterDefinition};
pub use transport::X10aTransport;
