//! Counted, re-entrant exclusion around the physics engine.
//!
//! The simulation thread holds the physics lock for the duration of each
//! step. Other threads (a renderer reading body poses, a tool editing the
//! world) take the same lock through [`PhysicsCell::hold`] to keep the
//! world still while they work. Holds nest on the same thread; the lock
//! is released when the outermost [`PhysicsHold`] drops.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use marlin_core::PhysicsEngine;

#[derive(Debug, Default)]
struct HoldState {
    owner: Option<ThreadId>,
    depth: u32,
}

/// Shared home of the physics engine.
pub struct PhysicsCell {
    engine: Mutex<Box<dyn PhysicsEngine>>,
    hold: Mutex<HoldState>,
    released: Condvar,
}

impl PhysicsCell {
    /// Wrap `engine`.
    pub fn new(engine: Box<dyn PhysicsEngine>) -> Self {
        Self {
            engine: Mutex::new(engine),
            hold: Mutex::new(HoldState::default()),
            released: Condvar::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, HoldState> {
        self.hold.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the physics lock, blocking while another thread holds it.
    ///
    /// Re-entrant: a thread that already holds the lock gets a nested
    /// hold immediately.
    pub fn hold(&self) -> PhysicsHold<'_> {
        let me = thread::current().id();
        let mut state = self.state();
        loop {
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.depth = 1;
                    break;
                }
                Some(owner) if owner == me => {
                    state.depth += 1;
                    break;
                }
                Some(_) => {
                    state = self
                        .released
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        PhysicsHold { cell: self }
    }

    fn release(&self) {
        let mut state = self.state();
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            state.owner = None;
            self.released.notify_all();
        }
    }

    /// Nesting depth of the current hold, zero when free.
    pub fn hold_depth(&self) -> u32 {
        self.state().depth
    }

    /// True if some thread holds the lock.
    pub fn is_held(&self) -> bool {
        self.state().owner.is_some()
    }

    /// Run `f` against the engine under the physics lock.
    ///
    /// Must not be called again from inside `f`.
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn PhysicsEngine) -> R) -> R {
        let _hold = self.hold();
        let mut engine = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
        f(engine.as_mut())
    }
}

/// RAII guard for one level of the physics lock.
#[must_use = "the physics lock is released when the hold is dropped"]
pub struct PhysicsHold<'a> {
    cell: &'a PhysicsCell,
}

impl PhysicsHold<'_> {
    /// Run `f` against the engine while this hold is live.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut dyn PhysicsEngine) -> R) -> R {
        self.cell.with(f)
    }
}

impl Drop for PhysicsHold<'_> {
    fn drop(&mut self) {
        self.cell.release();
    }
}

// Compile-time assertion: the cell is shared across threads.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<PhysicsCell>();
};
