use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use fugit::MillisDurationU32;

use crate::{
    binding::{BindingRegistry, NumericObserver, TextObserver},
    conversion::{self, DecodedValue},
    error::Result,
    frame,
    register::{RegisterDefinition, RegisterTable},
    transport::X10aTransport,
};

/// Time between two sweeps over the register table, unless configured otherwise.
pub const DEFAULT_SCAN_INTERVAL: MillisDurationU32 = MillisDurationU32::from_ticks(30_000);

/// Longest single sleep while waiting for the next sweep, so a stop request is noticed quickly.
const STOP_POLL: Duration = Duration::from_millis(100);

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Registers whose value was decoded and published.
    pub updated: usize,
    /// Registers left at their previous value.
    pub failed: usize,
}

/// The X10A component: polls the exposed registers of a Daikin unit and publishes their values
/// to observers by label.
///
/// For its methods, "add" declares a register, "register" binds an observer, and "sweep" polls
/// the unit once.
pub struct DaikinX10a<S: embedded_io::Read + embedded_io::Write, const L: usize = 128> {
    transport: X10aTransport<S, L>,
    table: RegisterTable,
    bindings: Arc<BindingRegistry>,
    scan_interval: MillisDurationU32,
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> DaikinX10a<S, L> {
    pub fn new(transport: X10aTransport<S, L>) -> Self {
        Self {
            transport,
            table: RegisterTable::new(),
            bindings: Arc::new(BindingRegistry::new()),
            scan_interval: DEFAULT_SCAN_INTERVAL,
        }
    }

    pub fn with_scan_interval(mut self, scan_interval: MillisDurationU32) -> Self {
        self.scan_interval = scan_interval;
        self
    }

    pub fn scan_interval(&self) -> MillisDurationU32 {
        self.scan_interval
    }

    /// Declare a register. Declaring the identical register twice is a no-op.
    #[allow(clippy::too_many_arguments)]
    pub fn add_register(
        &mut self,
        mode: u8,
        conversion_id: u16,
        offset: u16,
        registry_id: u8,
        data_size: u8,
        data_type: u8,
        label: impl Into<String>,
    ) -> Result<(), S::Error> {
        self.add_register_definition(RegisterDefinition::new(
            mode,
            conversion_id,
            offset,
            registry_id,
            data_size,
            data_type,
            label,
        ))
    }

    /// Declare a register.
    ///
    /// Fails when an exposed register already uses the label, or when an observer of the
    /// wrong kind has already been registered for it. Both are configuration errors and the
    /// component should not be started.
    pub fn add_register_definition(&mut self, register: RegisterDefinition) -> Result<(), S::Error> {
        let (label, kind, decimals, exposed) = (
            register.label.clone(),
            register.kind(),
            register.accuracy_decimals,
            register.is_exposed(),
        );
        if !exposed {
            self.table.push(register)?;
            return Ok(());
        }

        self.bindings.check_declare(&label, kind)?;
        if self.table.push(register)? {
            if let Err(err) = self.bindings.declare(&label, kind, decimals) {
                // An observer of the other kind slipped in since the check.
                self.table.pop();
                return Err(err.into());
            }
        }
        Ok(())
    }

    pub fn registers(&self) -> impl Iterator<Item = &RegisterDefinition> {
        self.table.iter()
    }

    pub fn register_numeric_observer<O: NumericObserver + 'static>(
        &self,
        label: &str,
        observer: &Arc<O>,
    ) -> Result<(), S::Error> {
        Ok(self.bindings.register_numeric_observer(label, observer)?)
    }

    pub fn register_text_observer<O: TextObserver + 'static>(
        &self,
        label: &str,
        observer: &Arc<O>,
    ) -> Result<(), S::Error> {
        Ok(self.bindings.register_text_observer(label, observer)?)
    }

    /// Shared handle to the bindings, for registering observers or reading values from another
    /// thread while the component is polling.
    pub fn bindings(&self) -> Arc<BindingRegistry> {
        Arc::clone(&self.bindings)
    }

    /// Latest value of `label` as text; empty if it has not been decoded yet.
    pub fn value_as_text(&self, label: &str) -> String {
        self.bindings.value_as_text(label)
    }

    /// Publish a value under `label` as if it had been decoded.
    pub fn update_value(&self, label: &str, value: DecodedValue) {
        self.bindings.update_value(label, value);
    }

    /// Poll every exposed register once, in table order.
    ///
    /// Each registry is queried at most once per sweep and shared by all registers in it. A
    /// failure only costs the registers it touches: they keep their previous value and the
    /// sweep carries on.
    pub fn sweep(&mut self) -> SweepReport {
        let mut report = SweepReport::default();
        let mut blocks: HashMap<u8, core::result::Result<heapless::Vec<u8, L>, String>> =
            HashMap::new();

        for register in self.table.exposed() {
            let transport = &mut self.transport;
            let block = blocks.entry(register.registry_id).or_insert_with(|| {
                transport
                    .query_registry(register.registry_id)
                    .map_err(|err| err.to_string())
            });
            let payload = match block {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!(
                        label = %register.label,
                        registry_id = register.registry_id,
                        offset = register.offset,
                        error = %err,
                        "registry query failed, keeping last value"
                    );
                    report.failed += 1;
                    continue;
                }
            };

            match Self::decode_register(register, payload) {
                Ok(value) => {
                    tracing::debug!(label = %register.label, value = ?value, "register decoded");
                    self.bindings.update_value(&register.label, value);
                    report.updated += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        label = %register.label,
                        registry_id = register.registry_id,
                        offset = register.offset,
                        error = %err,
                        "register decode failed"
                    );
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            updated = report.updated,
            failed = report.failed,
            "sweep complete"
        );
        report
    }

    fn decode_register(register: &RegisterDefinition, payload: &[u8]) -> Result<DecodedValue, S::Error> {
        let raw = frame::register_slice(
            payload,
            register.offset as usize,
            register.data_size as usize,
        )?;
        Ok(conversion::decode(
            register.conversion_id,
            register.data_type,
            register.data_size as usize,
            raw,
        )?)
    }

    /// Sweep every scan interval until `stop` returns true.
    pub fn run(&mut self, mut stop: impl FnMut() -> bool) {
        let interval = Duration::from_millis(self.scan_interval.to_millis().into());
        while !stop() {
            let started = Instant::now();
            self.sweep();
            loop {
                let remaining = interval.saturating_sub(started.elapsed());
                if remaining.is_zero() {
                    break;
                }
                if stop() {
                    return;
                }
                std::thread::sleep(remaining.min(STOP_POLL));
            }
        }
    }

    /// Give the serial interface back.
    pub fn release(self) -> S {
        self.transport.release()
    }
}
