//! A sink for debugging and testing.
//!
//! [`DebuggingSink`] keeps everything that was pushed to it, so tests can assert on exactly what a collector would
//! have received.
use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;

use crate::sink::{MetricDescriptor, Sink, SinkError, ValueType};

/// A value pushed to a [`DebuggingSink`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedValue {
    /// Name of the series.
    pub name: String,
    /// Textual value.
    pub value: String,
    /// How the value should be interpreted.
    pub value_type: ValueType,
}

#[derive(Default)]
struct Recorded {
    descriptors: Vec<MetricDescriptor>,
    values: Vec<RecordedValue>,
}

/// A sink that records everything pushed to it.
///
/// Clones share the same recordings, so a clone can be handed to a registry while the original is used to inspect
/// what was pushed.
#[derive(Clone, Default)]
pub struct DebuggingSink {
    recorded: Arc<Mutex<Recorded>>,
}

impl DebuggingSink {
    /// Creates a new, empty `DebuggingSink`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every descriptor pushed, in order.
    pub fn descriptors(&self) -> Vec<MetricDescriptor> {
        self.recorded.lock().descriptors.clone()
    }

    /// Returns every value pushed, in order.
    pub fn values(&self) -> Vec<RecordedValue> {
        self.recorded.lock().values.clone()
    }

    /// Returns the most recent value pushed for the given series.
    pub fn latest_value(&self, name: &str) -> Option<String> {
        self.recorded
            .lock()
            .values
            .iter()
            .rev()
            .find(|recorded| recorded.name == name)
            .map(|recorded| recorded.value.clone())
    }

    /// Returns the most recent value of every series, in the order the series were first seen.
    ///
    /// This is the view a collector would have after processing everything pushed so far.
    pub fn snapshot(&self) -> Vec<RecordedValue> {
        let recorded = self.recorded.lock();

        let mut positions = HashMap::new();
        let mut snapshot: Vec<RecordedValue> = Vec::new();
        for value in &recorded.values {
            match positions.get(&value.name) {
                Some(&idx) => snapshot[idx] = value.clone(),
                None => {
                    positions.insert(value.name.clone(), snapshot.len());
                    snapshot.push(value.clone());
                }
            }
        }

        snapshot
    }

    /// Clears all recordings.
    pub fn clear(&self) {
        let mut recorded = self.recorded.lock();
        recorded.descriptors.clear();
        recorded.values.clear();
    }
}

impl Sink for DebuggingSink {
    fn send_meta(&self, descriptor: &MetricDescriptor) -> Result<(), SinkError> {
        self.recorded.lock().descriptors.push(descriptor.clone());
        Ok(())
    }

    fn send_value(&self, name: &str, value: &str, value_type: ValueType) -> Result<(), SinkError> {
        self.recorded.lock().values.push(RecordedValue {
            name: name.to_string(),
            value: value.to_string(),
            value_type,
        });
        Ok(())
    }
}
