//! Wall-clock pacing for realtime mode.
//!
//! With realtime enabled, each loop iteration advances simulated time by
//! `ticks * timestep_ms` and the pacer compares that against the wall
//! time the iteration took:
//!
//! - faster than simulated time: the loop sleeps for the difference;
//! - slower without fast-step: the shortfall is recorded as drift and the
//!   loop proceeds immediately;
//! - slower with fast-step: the shortfall becomes lag, and the next
//!   iteration runs extra ticks to work it off, bounded by
//!   `max_catchup_ticks`. Lag beyond what one full catch-up batch could
//!   recover is moved to drift.

use std::time::Duration;

use crate::properties::PropertyMirror;

/// Realtime pacing state owned by the simulation thread.
#[derive(Debug, Default)]
pub struct RealtimePacer {
    lag_ms: f64,
    drift_ms: f64,
}

impl RealtimePacer {
    /// Fresh pacer with no lag or drift.
    pub fn new() -> Self {
        Self::default()
    }

    /// How many ticks the next iteration should run.
    pub fn plan(&self, mirror: &PropertyMirror, max_catchup_ticks: u32) -> u32 {
        if !(mirror.realtime && mirror.fast_step) || self.lag_ms <= 0.0 {
            return 1;
        }
        let owed = (self.lag_ms / mirror.timestep_ms).floor();
        let limit = max_catchup_ticks.max(1);
        if owed >= f64::from(limit) {
            limit
        } else {
            1 + owed as u32
        }
    }

    /// Account for an iteration that ran `ticks` ticks in `elapsed` wall time.
    ///
    /// Returns how long the loop should sleep before the next iteration.
    pub fn settle(
        &mut self,
        mirror: &PropertyMirror,
        ticks: u32,
        elapsed: Duration,
        max_catchup_ticks: u32,
    ) -> Option<Duration> {
        if !mirror.realtime {
            self.lag_ms = 0.0;
            return None;
        }
        let budget_ms = f64::from(ticks) * mirror.timestep_ms;
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;

        if !mirror.fast_step {
            self.lag_ms = 0.0;
            let over = elapsed_ms - budget_ms;
            if over > 0.0 {
                self.drift_ms += over;
                return None;
            }
            return Some(ms_to_duration(-over));
        }

        self.lag_ms += elapsed_ms - budget_ms;
        if self.lag_ms < 0.0 {
            let sleep = ms_to_duration(-self.lag_ms);
            self.lag_ms = 0.0;
            return Some(sleep);
        }
        let recoverable = f64::from(max_catchup_ticks.max(1)) * mirror.timestep_ms;
        if self.lag_ms > recoverable {
            self.drift_ms += self.lag_ms - recoverable;
            self.lag_ms = recoverable;
        }
        None
    }

    /// Forget outstanding lag, e.g. after the loop sat stopped.
    pub fn reset_lag(&mut self) {
        self.lag_ms = 0.0;
    }

    /// Catch-up debt in milliseconds.
    pub fn lag_ms(&self) -> f64 {
        self.lag_ms
    }

    /// Total unrecovered lateness in milliseconds.
    pub fn drift_ms(&self) -> f64 {
        self.drift_ms
    }
}

fn ms_to_duration(ms: f64) -> Duration {
    Duration::from_secs_f64(ms.max(0.0) / 1000.0)
}
