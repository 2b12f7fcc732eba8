//! Run/stop/step state machine gating the simulation thread.
//!
//! [`SteppingController`] owns the single [`SimulationStatus`] behind a
//! mutex and a condition variable. Every status transition happens with
//! the lock held. The simulation thread calls
//! [`wait_for_work()`](SteppingController::wait_for_work) at the top of
//! each iteration and [`finish_tick()`](SteppingController::finish_tick)
//! after each tick; external threads call `start`, `stop`, `single_step`.
//!
//! # Protocol
//!
//! ```text
//!   caller threads                 simulation thread
//!        |                              |
//!        |--start()/single_step()-----> | lock; while Stopped && !kicked: wait
//!        |     (status, notify_all)     | re-check status after every wake
//!        |                              | unlock; tick outside the lock
//!        |--stop() mid-tick-----------> | finish_tick(): Stopping -> Stopped,
//!        |                              |   Stepping -> Stopped when no steps remain
//! ```
//!
//! Each `single_step()` adds one pending step. A tick that *began* in
//! `Stepping` consumes one; a tick that began in `Running` never does, so
//! the number of stepping ticks always equals the number of calls.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use marlin_core::{ControlError, PhysicsError, SimulationStatus};

/// Mode a tick was admitted under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickMode {
    /// Free-running; subject to realtime pacing and fast-step.
    Running,
    /// One explicitly requested tick.
    Stepping,
}

/// Why [`SteppingController::wait_for_work`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wake {
    /// Advance physics.
    Tick(TickMode),
    /// Stopped, but requests are waiting to be serviced.
    Service,
    /// Exit was requested.
    Exit,
}

#[derive(Debug)]
struct SteppingState {
    status: SimulationStatus,
    pending_steps: u64,
    kicked: bool,
    exit: bool,
    ticks: u64,
    fault: Option<PhysicsError>,
}

/// Status owner and wait gate for the simulation thread.
#[derive(Debug)]
pub struct SteppingController {
    state: Mutex<SteppingState>,
    cond: Condvar,
}

// Compile-time assertion: shared between caller threads and the loop.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<SteppingController>();
};

impl Default for SteppingController {
    fn default() -> Self {
        Self::new(SimulationStatus::Stopped)
    }
}

impl SteppingController {
    /// Create a controller in the given status.
    pub fn new(initial: SimulationStatus) -> Self {
        Self {
            state: Mutex::new(SteppingState {
                status: initial,
                pending_steps: 0,
                kicked: false,
                exit: false,
                ticks: 0,
                fault: None,
            }),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SteppingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switch to `Running` and wake all waiters.
    ///
    /// Outstanding single steps are absorbed into the free run. Refused
    /// while a fault is latched; the check and the transition happen
    /// under the same lock as [`fault_stop`](Self::fault_stop).
    pub fn start(&self) -> Result<(), ControlError> {
        let mut st = self.lock();
        if let Some(fault) = &st.fault {
            return Err(ControlError::Faulted(fault.clone()));
        }
        st.status = SimulationStatus::Running;
        st.pending_steps = 0;
        self.cond.notify_all();
        Ok(())
    }

    /// Request a halt at the next tick boundary.
    ///
    /// No-op when already `Stopped`. Pending single steps are not
    /// cancelled: a requested step always completes.
    pub fn stop(&self) {
        let mut st = self.lock();
        match st.status {
            SimulationStatus::Stopped | SimulationStatus::Stepping => {}
            _ => st.status = SimulationStatus::Stopping,
        }
        self.cond.notify_all();
    }

    /// Request exactly one more tick, after which the loop returns to
    /// `Stopped` (unless further steps or a `start()` arrive). Refused
    /// while a fault is latched.
    pub fn single_step(&self) -> Result<(), ControlError> {
        let mut st = self.lock();
        if let Some(fault) = &st.fault {
            return Err(ControlError::Faulted(fault.clone()));
        }
        st.status = SimulationStatus::Stepping;
        st.pending_steps += 1;
        self.cond.notify_all();
        Ok(())
    }

    /// Latch a tick-fatal fault and force `Stopped`, dropping pending
    /// steps. `start` and `single_step` are refused until
    /// [`clear_fault`](Self::clear_fault).
    pub fn fault_stop(&self, error: PhysicsError) {
        let mut st = self.lock();
        st.fault = Some(error);
        st.status = SimulationStatus::Stopped;
        st.pending_steps = 0;
        self.cond.notify_all();
    }

    /// Clear a latched fault. Returns `true` if one was latched.
    pub fn clear_fault(&self) -> bool {
        self.lock().fault.take().is_some()
    }

    /// The latched fault, if any.
    pub fn fault(&self) -> Option<PhysicsError> {
        self.lock().fault.clone()
    }

    /// Wake a stopped loop so it services queued requests.
    pub fn kick(&self) {
        let mut st = self.lock();
        st.kicked = true;
        self.cond.notify_all();
    }

    /// Ask the loop to exit at the top of its next iteration.
    pub fn request_exit(&self) {
        let mut st = self.lock();
        st.exit = true;
        self.cond.notify_all();
    }

    /// True once exit has been requested.
    pub fn exit_requested(&self) -> bool {
        self.lock().exit
    }

    /// Current status.
    pub fn status(&self) -> SimulationStatus {
        self.lock().status
    }

    /// True if status is `Running` or `Stepping`.
    pub fn is_running(&self) -> bool {
        self.lock().status.permits_tick()
    }

    /// True while status is exactly `Running`. The loop checks this
    /// between catch-up ticks so a `stop()` ends the batch.
    pub fn is_free_running(&self) -> bool {
        self.lock().status == SimulationStatus::Running
    }

    /// Total ticks completed since construction.
    pub fn ticks_completed(&self) -> u64 {
        self.lock().ticks
    }

    fn decide(&self, st: &mut SteppingState) -> Option<Wake> {
        if st.exit {
            return Some(Wake::Exit);
        }
        if st.status == SimulationStatus::Stopping {
            st.status = SimulationStatus::Stopped;
            self.cond.notify_all();
        }
        match st.status {
            SimulationStatus::Running => {
                st.kicked = false;
                Some(Wake::Tick(TickMode::Running))
            }
            SimulationStatus::Stepping => {
                st.kicked = false;
                Some(Wake::Tick(TickMode::Stepping))
            }
            _ if st.kicked => {
                st.kicked = false;
                Some(Wake::Service)
            }
            _ => None,
        }
    }

    /// Non-blocking form of [`wait_for_work`](Self::wait_for_work).
    ///
    /// Returns `None` where the blocking form would wait.
    pub fn poll(&self) -> Option<Wake> {
        let mut st = self.lock();
        self.decide(&mut st)
    }

    /// Block until there is work for the simulation thread.
    ///
    /// The status is re-evaluated after every wake, so spurious wakeups
    /// and notifications that raced ahead of the wait are both harmless.
    pub fn wait_for_work(&self) -> Wake {
        let mut st = self.lock();
        loop {
            if let Some(wake) = self.decide(&mut st) {
                return wake;
            }
            st = self.cond.wait(st).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Record a completed tick admitted under `mode`.
    pub fn finish_tick(&self, mode: TickMode) {
        let mut st = self.lock();
        st.ticks += 1;
        match (mode, st.status) {
            (TickMode::Stepping, SimulationStatus::Stepping) => {
                st.pending_steps = st.pending_steps.saturating_sub(1);
                if st.pending_steps == 0 {
                    st.status = SimulationStatus::Stopped;
                }
            }
            (_, SimulationStatus::Stopping) => st.status = SimulationStatus::Stopped,
            _ => {}
        }
        self.cond.notify_all();
    }

    /// Block until the status is `Stopped` or exit is requested.
    ///
    /// Returns `false` on timeout.
    pub fn wait_until_stopped(&self, timeout: Duration) -> bool {
        let st = self.lock();
        let (st, _) = self
            .cond
            .wait_timeout_while(st, timeout, |s| {
                s.status != SimulationStatus::Stopped && !s.exit
            })
            .unwrap_or_else(PoisonError::into_inner);
        st.status == SimulationStatus::Stopped || st.exit
    }

    /// Block until at least `target` ticks have completed.
    ///
    /// Returns `false` on timeout or exit.
    pub fn wait_for_ticks(&self, target: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut st = self.lock();
        while st.ticks < target && !st.exit {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            st = self
                .cond
                .wait_timeout(st, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        st.ticks >= target
    }
}
