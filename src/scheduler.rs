//! Verdict scheduler (spec §4.7): gates verdict computation by minimum
//! refresh interval, invoked unconditionally on every inbound
//! observation (and, for the parking variant, on run-controller ticks).

#[derive(Debug)]
pub struct VerdictScheduler {
    last_verdict_time: f64,
    min_refresh_time: f64,
}

impl VerdictScheduler {
    pub fn new(min_refresh_time: f64) -> Self {
        Self {
            last_verdict_time: 0.0,
            min_refresh_time,
        }
    }

    /// If `now - last_verdict_time >= min_refresh_time`, records `now`
    /// as the new last-verdict time and returns `true` (the caller must
    /// run the fusion + reputation pipeline). Otherwise returns `false`
    /// without side effect. Safe to call unconditionally from any
    /// number of trigger paths (spec §4.7).
    pub fn try_begin_cycle(&mut self, now: f64) -> bool {
        if now - self.last_verdict_time < self.min_refresh_time {
            return false;
        }
        self.last_verdict_time = now;
        true
    }

    pub fn last_verdict_time(&self) -> f64 {
        self.last_verdict_time
    }
}
