//! Handshake between the simulation thread and the rendering thread.
//!
//! The simulation thread calls [`allow_draw`](GraphicsGate::allow_draw)
//! once scene state is stable after a frame-worthy tick. The renderer
//! waits for that permit with [`wait_for_frame`](GraphicsGate::wait_for_frame),
//! draws, and acknowledges with [`finished_draw`](GraphicsGate::finished_draw).
//!
//! In synchronous mode the simulation thread then blocks in
//! [`wait_for_draw`](GraphicsGate::wait_for_draw) until the acknowledgement
//! arrives or a timeout elapses, so a stalled renderer can slow the
//! simulation but never deadlock it. In asynchronous mode it does not
//! wait and the renderer may skip or repeat frames.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Result of a synchronous draw wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawOutcome {
    /// The renderer acknowledged the frame.
    Drawn,
    /// The timeout elapsed first.
    TimedOut,
    /// The gate was closed during shutdown.
    Closed,
}

#[derive(Debug, Default)]
struct GateState {
    frame: u64,
    finished: u64,
    allowed: bool,
    closed: bool,
}

/// Frame permit/acknowledge gate.
#[derive(Debug, Default)]
pub struct GraphicsGate {
    state: Mutex<GateState>,
    cond: Condvar,
}

impl GraphicsGate {
    /// Create an open gate with no frames issued.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Permit the renderer to draw the current scene. Returns the new
    /// frame number.
    pub fn allow_draw(&self) -> u64 {
        let mut st = self.lock();
        st.frame += 1;
        st.allowed = true;
        self.cond.notify_all();
        st.frame
    }

    /// Acknowledge that the renderer consumed the latest permitted frame.
    pub fn finished_draw(&self) {
        let mut st = self.lock();
        st.finished = st.frame;
        st.allowed = false;
        self.cond.notify_all();
    }

    /// True while a permitted frame has not been acknowledged.
    pub fn draw_allowed(&self) -> bool {
        self.lock().allowed
    }

    /// Most recent frame number issued.
    pub fn frame(&self) -> u64 {
        self.lock().frame
    }

    /// Block the simulation thread until `frame` is acknowledged.
    pub fn wait_for_draw(&self, frame: u64, timeout: Duration) -> DrawOutcome {
        let st = self.lock();
        let (st, _) = self
            .cond
            .wait_timeout_while(st, timeout, |s| s.finished < frame && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        if st.finished >= frame {
            DrawOutcome::Drawn
        } else if st.closed {
            DrawOutcome::Closed
        } else {
            DrawOutcome::TimedOut
        }
    }

    /// Block the renderer until a frame newer than `last_seen` is permitted.
    ///
    /// Returns the frame number, or `None` on timeout or close.
    pub fn wait_for_frame(&self, last_seen: u64, timeout: Duration) -> Option<u64> {
        let deadline = Instant::now() + timeout;
        let mut st = self.lock();
        loop {
            if st.closed {
                return None;
            }
            if st.allowed && st.frame > last_seen {
                return Some(st.frame);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            st = self
                .cond
                .wait_timeout(st, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Release every waiter on both sides. Used at shutdown.
    pub fn close(&self) {
        let mut st = self.lock();
        st.closed = true;
        self.cond.notify_all();
    }
}
