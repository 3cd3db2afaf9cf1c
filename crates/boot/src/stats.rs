//! Global statistics registry.
//!
//! Counters that do not belong to any single flow (resolved flow counts, power
//! model state, and anything else a collaborator wants in every report) are kept
//! here and written after the scheduler's per-flow fields.

use std::collections::BTreeMap;
use std::io;

use crate::report::ReportSink;

/// Named global counters, reported in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsRegistry {
    counters: BTreeMap<String, u64>,
}

impl StatsRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `by` to the counter `name`, creating it at zero first.
    pub fn inc(&mut self, name: &str, by: u64) {
        *self.counters.entry(name.to_owned()).or_insert(0) += by;
    }

    /// Sets the counter `name` to `value`.
    pub fn set(&mut self, name: &str, value: u64) {
        let _ = self.counters.insert(name.to_owned(), value);
    }

    /// Current value of `name`, if it was ever set.
    pub fn get(&self, name: &str) -> Option<u64> {
        self.counters.get(name).copied()
    }

    /// Number of registered counters.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Returns `true` when no counter is registered.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Writes every counter as a `name=value` field.
    pub fn report(&self, _label: &str, sink: &mut dyn ReportSink) -> io::Result<()> {
        for (name, value) in &self.counters {
            sink.field(&format!("{name}={value}"))?;
        }
        Ok(())
    }
}
