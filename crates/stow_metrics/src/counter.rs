//! Named counters for lifecycle events

use std::collections::BTreeMap;

/// Monotonic event counters keyed by a static name.
///
/// Stored in a `BTreeMap` so snapshots come out in a stable order.
#[derive(Debug, Default, Clone)]
pub struct Counter {
    counters: BTreeMap<&'static str, u64>,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            counters: BTreeMap::new(),
        }
    }

    pub fn increment(&mut self, name: &'static str, value: u64) {
        *self.counters.entry(name).or_insert(0) += value;
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn reset_all(&mut self) {
        self.counters.clear();
    }

    /// All counters with a non-zero value, ordered by name.
    pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
        self.counters
            .iter()
            .filter(|(_, &value)| value > 0)
            .map(|(&name, &value)| (name, value))
            .collect()
    }
}
