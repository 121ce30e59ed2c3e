//! Batch check type definitions
//!
//! Supporting types for batch progress tracking and user-facing notices.

use serde::{Deserialize, Serialize};

use crate::api::StatusClass;

/// Running counters for one in-flight batch
///
/// Invariant: `success + warning + error == processed <= total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCounters {
    pub processed: usize,
    pub total: usize,
    pub success: usize,
    pub warning: usize,
    pub error: usize,
}

impl ProgressCounters {
    /// Fresh counters for a batch of `total` ASINs
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Record one returned result in its bucket
    pub fn record(&mut self, class: StatusClass) {
        self.processed += 1;
        match class {
            StatusClass::Success => self.success += 1,
            StatusClass::Warning => self.warning += 1,
            StatusClass::Error => self.error += 1,
        }
    }

    /// Record a failed or empty lookup
    pub fn record_failure(&mut self) {
        self.record(StatusClass::Error);
    }

    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }

    /// Percentage complete (0.0 - 100.0)
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.processed as f64 / self.total as f64 * 100.0
        }
    }
}

/// Severity of a user-facing notice (toast)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_sum_matches_processed() {
        let mut counters = ProgressCounters::new(4);
        counters.record(StatusClass::Success);
        counters.record(StatusClass::Warning);
        counters.record_failure();
        assert_eq!(counters.processed, 3);
        assert_eq!(counters.success + counters.warning + counters.error, counters.processed);
        assert!(!counters.is_complete());

        counters.record(StatusClass::Error);
        assert!(counters.is_complete());
        assert_eq!(counters.error, 2);
        assert_eq!(counters.percentage(), 100.0);
    }

    #[test]
    fn test_empty_batch_percentage() {
        assert_eq!(ProgressCounters::new(0).percentage(), 0.0);
    }
}
