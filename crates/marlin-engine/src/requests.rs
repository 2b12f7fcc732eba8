//! FIFO queue funnelling thread-unsafe operations onto the simulation thread.
//!
//! Scene loads and saves, world resets, and every other world mutation
//! must not run concurrently with a physics tick. Callers on any thread
//! [`submit`](RequestQueue::submit) a [`SimRequest`]; the simulation thread
//! drains the queue between ticks and executes each request in arrival
//! order.
//!
//! Blocking callers get a per-request oneshot reply channel and wait on
//! it. Detached callers return immediately; if their request fails the
//! error is published on the data bus instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};

use marlin_core::{NodeId, RequestError, RequestKind, Vector3};

use crate::stepping::SteppingController;

/// How often a blocked caller re-checks whether the queue was closed.
const CLOSE_POLL: Duration = Duration::from_millis(50);

/// Load a scene file.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadRequest {
    /// Path handed to the scene store.
    pub path: String,
    /// Robot name to load the scene under.
    pub robot_name: Option<String>,
    /// Restart the simulation after the load completes.
    pub was_running: bool,
}

/// Save the current scene.
#[derive(Clone, Debug, PartialEq)]
pub struct SaveRequest {
    /// Path handed to the scene store.
    pub path: String,
    /// Restart the simulation after the save completes.
    pub was_running: bool,
}

/// An operation that may only execute on the simulation thread.
#[derive(Clone, Debug, PartialEq)]
pub enum SimRequest {
    /// Load a scene.
    Load(LoadRequest),
    /// Save the scene.
    Save(SaveRequest),
    /// Reset physics, plugins, and simulated time; clears a latched fault.
    ResetWorld,
    /// Discard the world. With `clear_all`, plugins are deactivated too.
    NewWorld {
        /// Also deactivate every plugin.
        clear_all: bool,
    },
    /// Apply a gravity vector to the physics engine.
    SetGravity(Vector3),
    /// Apply ERP and CFM to the physics engine.
    SetWorldConstants {
        /// Error reduction parameter.
        erp: f64,
        /// Constraint force mixing.
        cfm: f64,
    },
    /// Toggle contact drawing in the physics engine.
    SetDrawContacts(bool),
    /// Rigidly join two nodes.
    ConnectNodes(NodeId, NodeId),
    /// Remove the joint between two nodes.
    DisconnectNodes(NodeId, NodeId),
}

impl SimRequest {
    /// The request's kind, used when reporting failures.
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Load(_) => RequestKind::LoadScene,
            Self::Save(_) => RequestKind::SaveScene,
            Self::ResetWorld => RequestKind::ResetWorld,
            Self::NewWorld { .. } => RequestKind::NewWorld,
            Self::SetGravity(_) => RequestKind::SetGravity,
            Self::SetWorldConstants { .. } => RequestKind::SetWorldConstants,
            Self::SetDrawContacts(_) => RequestKind::SetDrawContacts,
            Self::ConnectNodes(..) => RequestKind::ConnectNodes,
            Self::DisconnectNodes(..) => RequestKind::DisconnectNodes,
        }
    }
}

/// A request in flight, paired with its reply channel when the caller blocks.
#[derive(Debug)]
pub(crate) struct QueuedRequest {
    pub request: SimRequest,
    reply: Option<Sender<Result<(), RequestError>>>,
}

impl QueuedRequest {
    /// Deliver the outcome.
    ///
    /// Returns the error when nobody is waiting for it, so the caller
    /// can publish it instead.
    pub fn complete(self, result: Result<(), RequestError>) -> Option<RequestError> {
        match self.reply {
            Some(reply) => match reply.send(result) {
                Ok(()) => None,
                Err(crossbeam_channel::SendError(unsent)) => unsent.err(),
            },
            None => result.err(),
        }
    }
}

/// Bounded multi-producer queue drained by the simulation thread.
pub struct RequestQueue {
    tx: Sender<QueuedRequest>,
    rx: Receiver<QueuedRequest>,
    stepping: Arc<SteppingController>,
    owner: OnceLock<ThreadId>,
    closed: AtomicBool,
}

impl RequestQueue {
    /// Create a queue holding at most `capacity` pending requests.
    ///
    /// Submitting wakes `stepping` so a stopped loop still drains.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize, stepping: Arc<SteppingController>) -> Self {
        assert!(capacity > 0, "RequestQueue capacity must be at least 1");
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self {
            tx,
            rx,
            stepping,
            owner: OnceLock::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Record the calling thread as the simulation thread.
    pub(crate) fn bind_owner(&self) {
        let _ = self.owner.set(thread::current().id());
    }

    /// True when called from the thread that drains this queue.
    pub fn on_owner_thread(&self) -> bool {
        self.owner.get() == Some(&thread::current().id())
    }

    fn enqueue(&self, queued: QueuedRequest) -> Result<(), RequestError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RequestError::Shutdown);
        }
        self.tx.try_send(queued).map_err(|e| match e {
            TrySendError::Full(_) => RequestError::QueueFull,
            TrySendError::Disconnected(_) => RequestError::Shutdown,
        })?;
        self.stepping.kick();
        Ok(())
    }

    /// Queue a request and return immediately.
    ///
    /// A failure during execution is published on the data bus.
    pub fn submit(&self, request: SimRequest) -> Result<(), RequestError> {
        self.enqueue(QueuedRequest {
            request,
            reply: None,
        })
    }

    /// Queue a request and block until the simulation thread has run it.
    ///
    /// Fails with [`RequestError::WouldDeadlock`] on the simulation thread
    /// itself, and with [`RequestError::Shutdown`] if the thread exits
    /// before reaching the request.
    pub fn submit_blocking(&self, request: SimRequest) -> Result<(), RequestError> {
        if self.on_owner_thread() {
            return Err(RequestError::WouldDeadlock);
        }
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.enqueue(QueuedRequest {
            request,
            reply: Some(reply_tx),
        })?;
        loop {
            match reply_rx.recv_timeout(CLOSE_POLL) {
                Ok(result) => return result,
                Err(RecvTimeoutError::Timeout) => {
                    if self.closed.load(Ordering::Acquire) {
                        return reply_rx.try_recv().unwrap_or(Err(RequestError::Shutdown));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Err(RequestError::Shutdown),
            }
        }
    }

    /// Number of requests waiting.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// True if nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Take every request queued so far, in arrival order.
    ///
    /// Requests submitted while the batch executes wait for the next drain,
    /// so one drain is bounded even under a steady stream of submissions.
    pub(crate) fn drain(&self) -> Vec<QueuedRequest> {
        let pending = self.rx.len();
        let mut batch = Vec::with_capacity(pending);
        for _ in 0..pending {
            match self.rx.try_recv() {
                Ok(queued) => batch.push(queued),
                Err(_) => break,
            }
        }
        batch
    }

    /// Refuse further submissions and fail everything still queued.
    pub(crate) fn close(&self) -> usize {
        self.closed.store(true, Ordering::Release);
        let leftovers = self.drain();
        let count = leftovers.len();
        for queued in leftovers {
            queued.complete(Err(RequestError::Shutdown));
        }
        count
    }
}
