//! Loop metrics for the simulation thread.
//!
//! [`LoopMetrics`] accumulates counters and the most recent timings. The
//! simulation thread writes them through [`MetricsCell`]; any thread may
//! read a snapshot.

use std::sync::{Mutex, PoisonError};

/// Counters and timings collected by the simulation loop.
///
/// Durations are in microseconds. Counters are cumulative since spawn.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LoopMetrics {
    /// Physics ticks executed.
    pub ticks: u64,
    /// Ticks run beyond the first in a fast-step catch-up batch.
    pub catchup_ticks: u64,
    /// Unrecovered realtime lateness.
    pub drift_us: u64,
    /// Outstanding fast-step catch-up debt.
    pub lag_us: u64,
    /// Wall-clock time of the most recent tick, physics plus dispatch.
    pub last_tick_us: u64,
    /// Queued requests executed.
    pub requests_processed: u64,
    /// Queued requests that failed.
    pub requests_failed: u64,
    /// Plugin faults contained.
    pub plugin_faults: u64,
    /// Synchronous draws that timed out.
    pub draw_timeouts: u64,
}

/// Shared home of the loop metrics.
#[derive(Debug, Default)]
pub struct MetricsCell {
    inner: Mutex<LoopMetrics>,
}

impl MetricsCell {
    /// Zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current metrics.
    pub fn snapshot(&self) -> LoopMetrics {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate the metrics in place.
    pub(crate) fn update(&self, f: impl FnOnce(&mut LoopMetrics)) {
        let mut metrics = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut metrics);
    }
}

pub(crate) fn ms_to_us(ms: f64) -> u64 {
    (ms.max(0.0) * 1000.0) as u64
}
