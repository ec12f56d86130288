//! Run controller (spec §4.8, parking variant only): bounds the
//! experiment to `max_decision_history + 10` verdicts, then publishes
//! `finished` and the process exits cleanly. Also drives the
//! accuracy-against-ground-truth progress report logged each cycle.

use std::collections::VecDeque;

use crate::fusion::VerdictMap;

const TAIL_MARGIN: usize = 10;

/// Fraction of verdict slots that match the configured ground truth
/// (spec §9 "SUPPLEMENT"), or `None` if no ground truth was configured
/// or its length doesn't match the verdict.
pub fn accuracy_against_truth(verdict: &VerdictMap, true_occupants: &[String]) -> Option<f64> {
    if true_occupants.is_empty() || verdict.is_empty() {
        return None;
    }
    let mut matches = 0usize;
    for (slot, label) in verdict {
        let idx: usize = slot.parse().ok()?;
        let truth = true_occupants.get(idx)?;
        if truth == label {
            matches += 1;
        }
    }
    Some(matches as f64 / verdict.len() as f64)
}

pub struct RunController {
    max_decision_history: usize,
    threshold: u64,
    verdict_count: u64,
    decision_history: VecDeque<f64>,
    started_at: f64,
}

impl RunController {
    pub fn new(max_decision_history: usize, started_at: f64) -> Self {
        Self {
            max_decision_history,
            threshold: (max_decision_history + TAIL_MARGIN) as u64,
            verdict_count: 0,
            decision_history: VecDeque::new(),
            started_at,
        }
    }

    /// `true` once the bounded experiment has produced `threshold`
    /// verdicts: the caller must publish `finished` and exit instead of
    /// running another cycle.
    pub fn should_finish(&self) -> bool {
        self.verdict_count >= self.threshold
    }

    pub fn verdict_count(&self) -> u64 {
        self.verdict_count
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Appends this cycle's ground-truth accuracy (if available) to the
    /// bounded ring and advances the verdict counter.
    pub fn record_verdict(&mut self, accuracy: Option<f64>) {
        self.verdict_count += 1;
        if let Some(acc) = accuracy {
            self.decision_history.push_back(acc);
            while self.decision_history.len() > self.max_decision_history {
                self.decision_history.pop_front();
            }
        }
    }

    pub fn mean_accuracy(&self) -> Option<f64> {
        if self.decision_history.is_empty() {
            None
        } else {
            Some(self.decision_history.iter().sum::<f64>() / self.decision_history.len() as f64)
        }
    }

    /// Human-readable progress report, logged at `info` each cycle —
    /// mirrors `parking_broker.py`'s `print_decision_report`.
    pub fn progress_report(&self, now: f64) -> String {
        let mean_pct = self.mean_accuracy().map(|a| a * 100.0).unwrap_or(0.0);
        let progressed = self.verdict_count.saturating_sub(TAIL_MARGIN as u64);
        let span = self.max_decision_history as f64;
        let pct_complete = if span > 0.0 {
            (progressed as f64 / span * 100.0).clamp(0.0, 100.0)
        } else {
            100.0
        };
        let bar_width = 50usize;
        let filled = ((pct_complete / 100.0) * bar_width as f64) as usize;
        let elapsed = (now - self.started_at).max(0.0);
        let avg_per_verdict = if self.decision_history.is_empty() {
            1.0
        } else {
            let v = elapsed / self.decision_history.len() as f64;
            if !(0.1..=2.0).contains(&v) {
                1.0
            } else {
                v
            }
        };
        let remaining = self.threshold.saturating_sub(self.verdict_count);
        let eta = remaining as f64 * avg_per_verdict;
        format!(
            "mean accuracy over last {} verdicts: {:.3}% [{}{}] progress: {}/{} ({:.3}%) eta: {:.3}s",
            self.decision_history.len(),
            mean_pct,
            "#".repeat(filled),
            ".".repeat(bar_width - filled),
            progressed,
            self.max_decision_history,
            pct_complete,
            eta
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_counts_matching_slots() {
        let mut v = VerdictMap::new();
        v.insert("0".to_string(), "ABC".to_string());
        v.insert("1".to_string(), "EMPTY".to_string());
        let truth = vec!["ABC".to_string(), "XYZ".to_string()];
        assert_eq!(accuracy_against_truth(&v, &truth), Some(0.5));
    }

    #[test]
    fn accuracy_none_without_ground_truth() {
        let mut v = VerdictMap::new();
        v.insert("0".to_string(), "ABC".to_string());
        assert_eq!(accuracy_against_truth(&v, &[]), None);
    }

    #[test]
    fn finishes_after_threshold_verdicts() {
        let mut rc = RunController::new(5, 0.0);
        assert_eq!(rc.threshold(), 15);
        for _ in 0..15 {
            assert!(!rc.should_finish());
            rc.record_verdict(Some(1.0));
        }
        assert!(rc.should_finish());
    }

    #[test]
    fn decision_history_bounded_by_max() {
        let mut rc = RunController::new(3, 0.0);
        for i in 0..10 {
            rc.record_verdict(Some(i as f64));
        }
        assert_eq!(rc.mean_accuracy(), Some((7.0 + 8.0 + 9.0) / 3.0));
    }
}
