//! Error types for the Marlin simulation core.
//!
//! Organised by failure class: physics (tick-fatal), plugin (isolated
//! per plugin), request (scene load/save and queue delivery), scene
//! store, and control-surface errors.

use std::error::Error;
use std::fmt;

use crate::id::NodeId;

/// Severity reported by the physics engine alongside an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhysicsSeverity {
    /// Diagnostic only; the tick is still valid.
    Debug,
    /// The step failed and the world state can no longer be trusted.
    Error,
    /// The engine could not classify the failure. Treated as fatal.
    Unknown,
}

/// Error reported by the physics engine contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhysicsError {
    /// How serious the condition is.
    pub severity: PhysicsSeverity,
    /// Human-readable description from the engine.
    pub message: String,
}

impl PhysicsError {
    /// Construct an error-severity physics error.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            severity: PhysicsSeverity::Error,
            message: message.into(),
        }
    }

    /// Construct a debug-severity diagnostic.
    pub fn debug(message: impl Into<String>) -> Self {
        Self {
            severity: PhysicsSeverity::Debug,
            message: message.into(),
        }
    }

    /// True if this error must halt ticking.
    pub fn is_fatal(&self) -> bool {
        !matches!(self.severity, PhysicsSeverity::Debug)
    }
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            PhysicsSeverity::Debug => "debug",
            PhysicsSeverity::Error => "error",
            PhysicsSeverity::Unknown => "unknown",
        };
        write!(f, "physics {level}: {}", self.message)
    }
}

impl Error for PhysicsError {}

/// Errors raised by a plugin callback.
///
/// Contained at the plugin: the offending plugin is deactivated and the
/// remaining plugins keep receiving updates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PluginError {
    /// `update()` returned an error.
    UpdateFailed {
        /// Description of the failure.
        reason: String,
    },
    /// `init()` failed during the activation pass.
    InitFailed {
        /// Description of the failure.
        reason: String,
    },
    /// The callback panicked.
    Panicked {
        /// The panic payload, if it was a string.
        message: String,
    },
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpdateFailed { reason } => write!(f, "update failed: {reason}"),
            Self::InitFailed { reason } => write!(f, "init failed: {reason}"),
            Self::Panicked { message } => write!(f, "plugin panicked: {message}"),
        }
    }
}

impl Error for PluginError {}

/// Error returned by a [`SceneStore`](crate::SceneStore).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SceneError {
    /// Description of the failure.
    pub reason: String,
}

impl SceneError {
    /// Construct a scene error from a description.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl Error for SceneError {}

/// Errors from requests funnelled onto the simulation thread.
///
/// Delivered synchronously to a blocking caller, or published on the data
/// bus when nobody is waiting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestError {
    /// Loading a scene failed.
    SceneLoad {
        /// Path of the scene.
        path: String,
        /// The store's error.
        reason: SceneError,
    },
    /// Saving a scene failed.
    SceneSave {
        /// Path of the scene.
        path: String,
        /// The store's error.
        reason: SceneError,
    },
    /// Connecting or disconnecting nodes failed.
    NodeLink {
        /// First node.
        a: NodeId,
        /// Second node.
        b: NodeId,
        /// The engine's error.
        reason: PhysicsError,
    },
    /// The request queue is at capacity.
    QueueFull,
    /// The simulation thread has exited; the request will never run.
    Shutdown,
    /// A blocking request was issued from the simulation thread itself.
    WouldDeadlock,
    /// The request was rejected before reaching the queue.
    Rejected {
        /// Why it was rejected.
        reason: String,
    },
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SceneLoad { path, reason } => write!(f, "loading '{path}' failed: {reason}"),
            Self::SceneSave { path, reason } => write!(f, "saving '{path}' failed: {reason}"),
            Self::NodeLink { a, b, reason } => {
                write!(f, "linking nodes {a} and {b} failed: {reason}")
            }
            Self::QueueFull => write!(f, "request queue full"),
            Self::Shutdown => write!(f, "simulation thread has exited"),
            Self::WouldDeadlock => {
                write!(f, "blocking request issued from the simulation thread")
            }
            Self::Rejected { reason } => write!(f, "request rejected: {reason}"),
        }
    }
}

impl Error for RequestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SceneLoad { reason, .. } | Self::SceneSave { reason, .. } => Some(reason),
            Self::NodeLink { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Errors from the simulator's control surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlError {
    /// A physics fault is latched; reset the world before starting.
    Faulted(PhysicsError),
    /// The simulation thread has exited.
    Exited,
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Faulted(e) => write!(f, "simulation faulted: {e}"),
            Self::Exited => write!(f, "simulation has exited"),
        }
    }
}

impl Error for ControlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Faulted(e) => Some(e),
            Self::Exited => None,
        }
    }
}
