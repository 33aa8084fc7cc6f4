use std::{env, fs, sync::Arc};

use daikin_x10a::{ComponentConfig, DaikinX10a, NumericObserver, TextObserver, ValueKind};
use inquire::Select;
use serialport::{Parity, SerialPort};
use tracing_subscriber::EnvFilter;

// X10A line settings.
const BAUD_RATE: u32 = 9600;
// Short port timeout: the transport keeps its own response deadline.
const SERIAL_TIMEOUT_MS: u64 = 20;

pub struct PortWrapper(Box<dyn SerialPort>);

#[derive(Debug)]
pub struct IoError(std::io::Error);

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
            std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for PortWrapper {
    type Error = IoError;
}

impl embedded_io::Read for PortWrapper {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf).map_err(IoError)
    }
}

impl embedded_io::Write for PortWrapper {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(IoError)
    }
}

/// Prints every value it is given.
struct PrintSensor {
    name: String,
    unit: String,
}

impl NumericObserver for PrintSensor {
    fn publish_state(&self, value: f64) {
        println!("{}: {} {}", self.name, value, self.unit);
    }
}

impl TextObserver for PrintSensor {
    fn publish_state(&self, value: &str) {
        println!("{}: {}", self.name, value);
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Usage: poll <registers.yaml> [serial port]
    let config_path = env::args()
        .nth(1)
        .expect("Usage: poll <registers.yaml> [serial port]");
    let yaml = fs::read_to_string(&config_path).expect("Failed to read register configuration");
    let config = ComponentConfig::from_yaml_str(&yaml).expect("Invalid register configuration");

    let port_name = env::args().nth(2).unwrap_or_else(|| {
        let ports = serialport::available_ports().expect("Failed to enumerate serial ports");
        if ports.is_empty() {
            eprintln!("No serial ports found!");
            std::process::exit(1);
        }
        let port_names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();
        Select::new("Select a serial port:", port_names)
            .prompt()
            .expect("Failed to select port")
    });
    println!("Using port: {}", port_name);

    let port = serialport::new(&port_name, BAUD_RATE)
        .parity(Parity::Even)
        .timeout(std::time::Duration::from_millis(SERIAL_TIMEOUT_MS))
        .open()
        .expect("Failed to open serial port");

    let mut daikin: DaikinX10a<PortWrapper> = match config.build(PortWrapper(port)) {
        Ok(daikin) => daikin,
        Err(err) => {
            eprintln!("Configuration error: {err}");
            std::process::exit(1);
        }
    };

    // The component only holds observers weakly, keep them alive here.
    let mut sensors = Vec::new();
    for meta in config.sensors() {
        let sensor = Arc::new(PrintSensor {
            name: meta.label.clone(),
            unit: meta.unit.clone().unwrap_or_default(),
        });
        let registered = match meta.kind {
            ValueKind::Numeric => daikin.register_numeric_observer(&meta.label, &sensor),
            ValueKind::Text => daikin.register_text_observer(&meta.label, &sensor),
        };
        if let Err(err) = registered {
            eprintln!("Cannot bind {}: {err}", meta.object_id);
            std::process::exit(1);
        }
        sensors.push(sensor);
    }

    println!(
        "Polling {} sensors every {} ms",
        sensors.len(),
        config.scan_interval_ms
    );
    daikin.run(|| false);
}
