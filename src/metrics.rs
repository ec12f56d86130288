//! Structured counters mirroring the teacher's `Metrics`/`MResp` pattern
//! (spec SPEC_FULL.md §2, item 11): no HTTP metrics server (an external
//! surface outside this crate's scope), but the counters themselves are
//! ambient and always carried, exposed via `snapshot()` for a `tracing`
//! event per verdict cycle and for the test suite to assert on.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Default)]
pub struct Metrics {
    ingested: AtomicU64,
    decode_errors: AtomicU64,
    registered: AtomicU64,
    duplicate_registrations: AtomicU64,
    unknown_unregisters: AtomicU64,
    verdicts_published: AtomicU64,
    reputation_updates_skipped: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct MetricsSnapshot {
    pub ingested: u64,
    pub decode_errors: u64,
    pub registered: u64,
    pub duplicate_registrations: u64,
    pub unknown_unregisters: u64,
    pub verdicts_published: u64,
    pub reputation_updates_skipped: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_ingested(&self) {
        self.ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_registered(&self) {
        self.registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate_registration(&self) {
        self.duplicate_registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown_unregister(&self) {
        self.unknown_unregisters.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_verdict_published(&self) {
        self.verdicts_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reputation_updates_skipped(&self) {
        self.reputation_updates_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ingested: self.ingested.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            registered: self.registered.load(Ordering::Relaxed),
            duplicate_registrations: self.duplicate_registrations.load(Ordering::Relaxed),
            unknown_unregisters: self.unknown_unregisters.load(Ordering::Relaxed),
            verdicts_published: self.verdicts_published.load(Ordering::Relaxed),
            reputation_updates_skipped: self.reputation_updates_skipped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let m = Metrics::new();
        let s = m.snapshot();
        assert_eq!(s.ingested, 0);
        assert_eq!(s.verdicts_published, 0);
    }

    #[test]
    fn counters_increment_independently() {
        let m = Metrics::new();
        m.record_ingested();
        m.record_ingested();
        m.record_duplicate_registration();
        let s = m.snapshot();
        assert_eq!(s.ingested, 2);
        assert_eq!(s.duplicate_registrations, 1);
        assert_eq!(s.registered, 0);
    }
}
