//! Binding of decoded values to externally owned observers, addressed by label.
//!
//! A label's binding is created by whichever arrives first, a decoded value or an observer,
//! and once both are present every new value is published to the observer:
//!
//! ```text
//! Unbound --value--> PendingObserver --observer--> Bound
//! Unbound --observer--> PendingValue --value--> Bound
//! ```
//!
//! Observers are held weakly. The host owns them; one that has been dropped is skipped.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use thiserror::Error;

use crate::{
    conversion::{DecodedValue, ValueKind},
    register::DEFAULT_ACCURACY_DECIMALS,
};

/// Receives numeric values, e.g. a numeric sensor.
pub trait NumericObserver: Send + Sync {
    fn publish_state(&self, value: f64);
}

/// Receives text values, e.g. a text sensor.
pub trait TextObserver: Send + Sync {
    fn publish_state(&self, value: &str);
}

/// Non-owning reference to one of the two observer kinds.
#[derive(Clone)]
pub enum Observer {
    Numeric(Weak<dyn NumericObserver>),
    Text(Weak<dyn TextObserver>),
}

impl Observer {
    pub fn numeric<O: NumericObserver + 'static>(observer: &Arc<O>) -> Self {
        let weak = Arc::downgrade(observer);
        Observer::Numeric(weak)
    }

    pub fn text<O: TextObserver + 'static>(observer: &Arc<O>) -> Self {
        let weak = Arc::downgrade(observer);
        Observer::Text(weak)
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Observer::Numeric(_) => ValueKind::Numeric,
            Observer::Text(_) => ValueKind::Text,
        }
    }

    fn publish(&self, label: &str, value: &DecodedValue) {
        match (self, value) {
            (Observer::Numeric(observer), DecodedValue::Numeric(value)) => match observer.upgrade() {
                Some(observer) => observer.publish_state(*value),
                None => tracing::trace!(label, "numeric observer dropped, skipping publish"),
            },
            (Observer::Text(observer), DecodedValue::Text(value)) => match observer.upgrade() {
                Some(observer) => observer.publish_state(value),
                None => tracing::trace!(label, "text observer dropped, skipping publish"),
            },
            _ => tracing::warn!(
                label,
                observer = %self.kind(),
                value = %value.kind(),
                "value kind does not match observer, not published"
            ),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("label {0:?} is used by more than one exposed register")]
    LabelCollision(String),
    #[error("{found} observer registered for label {label:?}, which decodes as {expected}")]
    ObserverKindMismatch {
        label: String,
        expected: ValueKind,
        found: ValueKind,
    },
}

/// Where a label is in its binding lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    /// Neither a value nor an observer yet.
    Unbound,
    /// Decoded at least once, no observer registered.
    PendingObserver,
    /// Observer registered, nothing decoded yet.
    PendingValue,
    Bound,
}

/// An observer plus the sequence number of the newest value handed to it.
#[derive(Clone)]
struct Subscription {
    observer: Observer,
    delivered: Arc<Mutex<u64>>,
}

impl Subscription {
    fn new(observer: Observer) -> Self {
        Self {
            observer,
            delivered: Arc::new(Mutex::new(0)),
        }
    }

    /// Publish `value`, the label's `seq`th update, unless a newer one already got through.
    fn deliver(&self, label: &str, seq: u64, value: &DecodedValue) {
        let mut delivered = self.delivered.lock().unwrap_or_else(PoisonError::into_inner);
        if seq <= *delivered {
            tracing::trace!(label, seq, delivered = *delivered, "stale value, not published");
            return;
        }
        *delivered = seq;
        self.observer.publish(label, value);
    }
}

struct Binding {
    /// Kind of value the label's register decodes to, once a register declares it.
    expected: Option<ValueKind>,
    decimals: u8,
    subscription: Option<Subscription>,
    last_value: Option<DecodedValue>,
    /// Number of updates so far; numbers the publishes.
    seq: u64,
}

impl Default for Binding {
    fn default() -> Self {
        Self {
            expected: None,
            decimals: DEFAULT_ACCURACY_DECIMALS,
            subscription: None,
            last_value: None,
            seq: 0,
        }
    }
}

impl Binding {
    fn state(&self) -> BindingState {
        match (&self.subscription, &self.last_value) {
            (None, None) => BindingState::Unbound,
            (None, Some(_)) => BindingState::PendingObserver,
            (Some(_), None) => BindingState::PendingValue,
            (Some(_), Some(_)) => BindingState::Bound,
        }
    }

    /// The kind this label is known to carry, from its register or else its last value.
    fn known_kind(&self) -> Option<ValueKind> {
        self.expected
            .or_else(|| self.last_value.as_ref().map(DecodedValue::kind))
    }

    /// Fails when the bound observer cannot take values of `kind`.
    fn accepts(&self, label: &str, kind: ValueKind) -> Result<(), BindingError> {
        match self.subscription.as_ref().map(|s| s.observer.kind()) {
            Some(found) if found != kind => Err(BindingError::ObserverKindMismatch {
                label: label.to_owned(),
                expected: kind,
                found,
            }),
            _ => Ok(()),
        }
    }
}

/// Label-keyed map of bindings, shared between the polling loop and observer registration.
///
/// A single lock guards the whole map. Observers are always called with the lock released, so
/// an observer may read back through [`BindingRegistry::value_as_text`]. Publishes to one
/// observer are serialized and never go back in time: a value overtaken by a newer update is
/// dropped. An observer must not call [`BindingRegistry::update_value`] for its own label.
#[derive(Default)]
pub struct BindingRegistry {
    bindings: Mutex<HashMap<String, Binding>>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Binding>> {
        self.bindings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that an exposed register decodes `label` as `kind`, rendered with `decimals`.
    ///
    /// Fails when an observer of the other kind already waits on the label.
    pub fn declare(&self, label: &str, kind: ValueKind, decimals: u8) -> Result<(), BindingError> {
        let mut bindings = self.lock();
        let binding = bindings.entry(label.to_owned()).or_default();
        binding.accepts(label, kind)?;
        binding.expected = Some(kind);
        binding.decimals = decimals;
        Ok(())
    }

    /// Whether [`BindingRegistry::declare`] would accept `kind` for `label`, without changing
    /// anything.
    pub fn check_declare(&self, label: &str, kind: ValueKind) -> Result<(), BindingError> {
        match self.lock().get(label) {
            Some(binding) => binding.accepts(label, kind),
            None => Ok(()),
        }
    }

    pub fn register_numeric_observer<O: NumericObserver + 'static>(
        &self,
        label: &str,
        observer: &Arc<O>,
    ) -> Result<(), BindingError> {
        self.register_observer(label, Observer::numeric(observer))
    }

    pub fn register_text_observer<O: TextObserver + 'static>(
        &self,
        label: &str,
        observer: &Arc<O>,
    ) -> Result<(), BindingError> {
        self.register_observer(label, Observer::text(observer))
    }

    /// Bind `observer` to `label`, publishing the last value straight away if there is one.
    ///
    /// A later registration for the same label replaces the earlier observer.
    pub fn register_observer(&self, label: &str, observer: Observer) -> Result<(), BindingError> {
        let subscription = Subscription::new(observer);
        let current = {
            let mut bindings = self.lock();
            let binding = bindings.entry(label.to_owned()).or_default();
            if let Some(expected) = binding.known_kind() {
                let found = subscription.observer.kind();
                if expected != found {
                    return Err(BindingError::ObserverKindMismatch {
                        label: label.to_owned(),
                        expected,
                        found,
                    });
                }
            }
            if binding.subscription.is_some() {
                tracing::warn!(label, "replacing previously registered observer");
            }
            binding.subscription = Some(subscription.clone());
            binding.last_value.clone().map(|value| (binding.seq, value))
        };

        tracing::debug!(label, kind = %subscription.observer.kind(), "observer registered");
        if let Some((seq, value)) = current {
            subscription.deliver(label, seq, &value);
        }
        Ok(())
    }

    /// Store `value` as the label's latest and publish it to the bound observer, if any.
    ///
    /// Every update is published, including repeats of the same value.
    pub fn update_value(&self, label: &str, value: DecodedValue) {
        let (seq, subscription) = {
            let mut bindings = self.lock();
            let binding = bindings.entry(label.to_owned()).or_default();
            binding.seq += 1;
            binding.last_value = Some(value.clone());
            (binding.seq, binding.subscription.clone())
        };

        if let Some(subscription) = subscription {
            subscription.deliver(label, seq, &value);
        }
    }

    /// The last value decoded for `label`.
    pub fn value(&self, label: &str) -> Option<DecodedValue> {
        self.lock().get(label).and_then(|b| b.last_value.clone())
    }

    /// The last value decoded for `label` rendered as text, or an empty string if there is none.
    ///
    /// Numbers use the label's accuracy (one decimal unless configured), text is returned as is.
    pub fn value_as_text(&self, label: &str) -> String {
        self.lock()
            .get(label)
            .and_then(|b| b.last_value.as_ref().map(|v| v.render(b.decimals)))
            .unwrap_or_default()
    }

    pub fn state(&self, label: &str) -> BindingState {
        self.lock()
            .get(label)
            .map_or(BindingState::Unbound, Binding::state)
    }
}
