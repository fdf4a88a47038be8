//! Run statistics tracking.
//!
//! Accumulates per-run counters while a reconciliation executes and
//! snapshots them into the job's results.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;
use std::time::Instant;

/// Counters for one named check within a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckCounts {
    #[serde(default)]
    pub matches: u32,
    #[serde(default)]
    pub mismatches: u32,
    #[serde(default)]
    pub errors: u32,
}

/// Statistics for a reconciliation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Events pulled from the source and examined.
    #[serde(default)]
    pub events_processed: u32,
    /// Check records written (mismatches and errors; matches are counted
    /// but not necessarily materialized).
    #[serde(default)]
    pub checks_recorded: u32,
    #[serde(default)]
    pub matches: u32,
    #[serde(default)]
    pub mismatches: u32,
    /// Isolated per-resource failures.
    #[serde(default)]
    pub errors: u32,
    /// Discrepancies auto-resolved during the run.
    #[serde(default)]
    pub auto_resolved: u32,
    /// Per-check breakdown.
    #[serde(default)]
    pub by_check: HashMap<String, CheckCounts>,
    #[serde(default)]
    pub duration_seconds: u64,
}

impl RunStatistics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate counts for a named check.
    #[must_use]
    pub fn check_counts(&self, check_name: &str) -> CheckCounts {
        self.by_check.get(check_name).copied().unwrap_or_default()
    }
}

/// Thread-safe tracker for accumulating statistics during a run.
pub struct StatisticsTracker {
    events_processed: AtomicU32,
    checks_recorded: AtomicU32,
    matches: AtomicU32,
    mismatches: AtomicU32,
    errors: AtomicU32,
    auto_resolved: AtomicU32,
    by_check: RwLock<HashMap<String, CheckCounts>>,
    start_time: Instant,
}

impl StatisticsTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            events_processed: AtomicU32::new(0),
            checks_recorded: AtomicU32::new(0),
            matches: AtomicU32::new(0),
            mismatches: AtomicU32::new(0),
            errors: AtomicU32::new(0),
            auto_resolved: AtomicU32::new(0),
            by_check: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    pub fn record_events(&self, count: u32) {
        self.events_processed.fetch_add(count, Ordering::SeqCst);
    }

    pub fn record_check_written(&self) {
        self.checks_recorded.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_match(&self, check_name: &str) {
        self.matches.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut map) = self.by_check.write() {
            map.entry(check_name.to_string()).or_default().matches += 1;
        }
    }

    pub fn record_mismatch(&self, check_name: &str) {
        self.mismatches.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut map) = self.by_check.write() {
            map.entry(check_name.to_string()).or_default().mismatches += 1;
        }
    }

    pub fn record_error(&self, check_name: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut map) = self.by_check.write() {
            map.entry(check_name.to_string()).or_default().errors += 1;
        }
    }

    pub fn record_auto_resolved(&self) {
        self.auto_resolved.fetch_add(1, Ordering::SeqCst);
    }

    /// Snapshot current statistics.
    #[must_use]
    pub fn snapshot(&self) -> RunStatistics {
        let by_check = self
            .by_check
            .read()
            .map(|map| map.clone())
            .unwrap_or_default();

        RunStatistics {
            events_processed: self.events_processed.load(Ordering::SeqCst),
            checks_recorded: self.checks_recorded.load(Ordering::SeqCst),
            matches: self.matches.load(Ordering::SeqCst),
            mismatches: self.mismatches.load(Ordering::SeqCst),
            errors: self.errors.load(Ordering::SeqCst),
            auto_resolved: self.auto_resolved.load(Ordering::SeqCst),
            by_check,
            duration_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for StatisticsTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_counts() {
        let tracker = StatisticsTracker::new();

        tracker.record_events(5);
        tracker.record_match("transfer_status");
        tracker.record_match("transfer_status");
        tracker.record_mismatch("transfer_status");
        tracker.record_error("customer_profile");
        tracker.record_auto_resolved();

        let stats = tracker.snapshot();
        assert_eq!(stats.events_processed, 5);
        assert_eq!(stats.matches, 2);
        assert_eq!(stats.mismatches, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.auto_resolved, 1);

        let transfer = stats.check_counts("transfer_status");
        assert_eq!(transfer.matches, 2);
        assert_eq!(transfer.mismatches, 1);
        assert_eq!(transfer.errors, 0);

        let customer = stats.check_counts("customer_profile");
        assert_eq!(customer.errors, 1);
    }

    #[test]
    fn test_unknown_check_counts_default() {
        let stats = RunStatistics::new();
        assert_eq!(stats.check_counts("nope"), CheckCounts::default());
    }

    #[test]
    fn test_statistics_serde_roundtrip() {
        let tracker = StatisticsTracker::new();
        tracker.record_mismatch("transfer_status");

        let stats = tracker.snapshot();
        let json = serde_json::to_string(&stats).unwrap();
        let back: RunStatistics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.mismatches, 1);
        assert_eq!(back.check_counts("transfer_status").mismatches, 1);
    }
}
