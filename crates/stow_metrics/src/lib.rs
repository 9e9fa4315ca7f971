//! Stow Metrics - named counters for entity lifecycle bookkeeping
//!
//! Counters are keyed by static names (`"spawned"`, `"kicked"`, ...) and
//! completely vanish in production builds via the `metrics` feature.
//!
//! # Feature Flags
//!
//! - `metrics` - Enable metrics collection (default: disabled)
//!
//! # Usage
//!
//! ```ignore
//! use stow_metrics::Counter;
//!
//! let mut counter = Counter::new();
//! counter.increment("spawned", 1);
//! assert_eq!(counter.get("spawned"), 1);
//! ```

#[cfg(feature = "metrics")]
mod counter;

#[cfg(feature = "metrics")]
pub use counter::Counter;

/// Execute code only when metrics are enabled
#[macro_export]
macro_rules! metrics {
    ($($tt:tt)*) => {
        #[cfg(feature = "metrics")]
        {
            $($tt)*
        }
    };
}

// ============================================================================
// No-op stub when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default, Clone)]
pub struct Counter;

#[cfg(not(feature = "metrics"))]
impl Counter {
    pub fn new() -> Self { Self }
    pub fn increment(&mut self, _name: &'static str, _value: u64) {}
    pub fn get(&self, _name: &str) -> u64 { 0 }
    pub fn reset_all(&mut self) {}
    pub fn snapshot(&self) -> Vec<(&'static str, u64)> { Vec::new() }
}

/// Whether counters record anything in this build.
pub const fn enabled() -> bool {
    cfg!(feature = "metrics")
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_counter_api_compiles_in_both_modes() {
        let mut counter = super::Counter::new();
        counter.increment("spawned", 2);
        if super::enabled() {
            assert_eq!(counter.get("spawned"), 2);
        } else {
            assert_eq!(counter.get("spawned"), 0);
        }
    }
}
