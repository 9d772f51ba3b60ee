// ═══════════════════════════════════════════════════════════════
// RUN STATISTICS - what a sweep did, counted as it happened
// ═══════════════════════════════════════════════════════════════
//
// Atomic counters bumped by the extractors through a shared reference, and a
// serializable snapshot the pipeline logs when the run ends. Nothing here
// feeds back into extraction; it is bookkeeping only.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RunStatsSnapshot {
    pub banks: u64,
    pub deposit_rows: u64,
    pub deposit_failures: u64,
    pub loan_attempts: u64,
    pub loan_ineligible: u64,
    pub loan_out_of_envelope: u64,
    pub loan_rows: u64,
    pub loan_failures: u64,
    pub retries: u64,
    pub elapsed_seconds: u64,
}

pub struct RunStats {
    banks: AtomicU64,
    deposit_rows: AtomicU64,
    deposit_failures: AtomicU64,
    loan_attempts: AtomicU64,
    loan_ineligible: AtomicU64,
    loan_out_of_envelope: AtomicU64,
    loan_rows: AtomicU64,
    loan_failures: AtomicU64,
    retries: AtomicU64,
    start_time: Instant,
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            banks: AtomicU64::new(0),
            deposit_rows: AtomicU64::new(0),
            deposit_failures: AtomicU64::new(0),
            loan_attempts: AtomicU64::new(0),
            loan_ineligible: AtomicU64::new(0),
            loan_out_of_envelope: AtomicU64::new(0),
            loan_rows: AtomicU64::new(0),
            loan_failures: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn increment_banks(&self) {
        self.banks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_deposit_rows(&self, n: usize) {
        self.deposit_rows.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn increment_deposit_failures(&self) {
        self.deposit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_loan_attempts(&self) {
        self.loan_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_loan_ineligible(&self) {
        self.loan_ineligible.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_loan_out_of_envelope(&self) {
        self.loan_out_of_envelope.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_loan_rows(&self) {
        self.loan_rows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_loan_failures(&self) {
        self.loan_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_retries(&self, n: u32) {
        self.retries.fetch_add(u64::from(n), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RunStatsSnapshot {
        RunStatsSnapshot {
            banks: self.banks.load(Ordering::Relaxed),
            deposit_rows: self.deposit_rows.load(Ordering::Relaxed),
            deposit_failures: self.deposit_failures.load(Ordering::Relaxed),
            loan_attempts: self.loan_attempts.load(Ordering::Relaxed),
            loan_ineligible: self.loan_ineligible.load(Ordering::Relaxed),
            loan_out_of_envelope: self.loan_out_of_envelope.load(Ordering::Relaxed),
            loan_rows: self.loan_rows.load(Ordering::Relaxed),
            loan_failures: self.loan_failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            elapsed_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    pub fn log_summary(&self) {
        let s = self.snapshot();
        info!(
            banks = s.banks,
            deposit_rows = s.deposit_rows,
            deposit_failures = s.deposit_failures,
            loan_attempts = s.loan_attempts,
            loan_ineligible = s.loan_ineligible,
            loan_out_of_envelope = s.loan_out_of_envelope,
            loan_rows = s.loan_rows,
            loan_failures = s.loan_failures,
            retries = s.retries,
            elapsed_seconds = s.elapsed_seconds,
            "📊 Run summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = RunStats::new();
        stats.increment_banks();
        stats.add_deposit_rows(12);
        stats.add_deposit_rows(3);
        stats.increment_loan_ineligible();
        stats.add_retries(2);
        let s = stats.snapshot();
        assert_eq!(s.banks, 1);
        assert_eq!(s.deposit_rows, 15);
        assert_eq!(s.loan_ineligible, 1);
        assert_eq!(s.retries, 2);
        assert_eq!(s.loan_rows, 0);
    }
}
