//! Contracts for the collaborators the simulation core drives.
//!
//! The physics solver, renderer, scene format, and data transport live
//! outside the core. These traits are the only surface the core uses.

use crate::error::{PhysicsError, PluginError, SceneError};
use crate::id::NodeId;
use crate::publication::Publication;
use crate::scene::SceneState;
use crate::vector::Vector3;

/// The physics engine the simulation thread advances.
///
/// Only ever called with the physics lock held, so implementations need
/// `Send` but not `Sync`.
pub trait PhysicsEngine: Send {
    /// Advance the world by one timestep of `step_ms` milliseconds.
    ///
    /// A returned error with debug severity is logged and the tick stands;
    /// any other severity faults the simulation.
    fn step_tick(&mut self, step_ms: f64) -> Result<(), PhysicsError>;

    /// The most recent error reported by the engine, if any.
    fn last_error(&self) -> Option<PhysicsError>;

    /// Replace the world gravity vector.
    fn set_gravity(&mut self, gravity: Vector3);

    /// Replace the global error reduction parameter and constraint force mixing.
    fn set_world_constants(&mut self, erp: f64, cfm: f64);

    /// Toggle contact point visualisation.
    fn set_draw_contacts(&mut self, _enabled: bool) {}

    /// Return every body to its initial state.
    fn reset(&mut self);

    /// Discard the world and start an empty one.
    fn clear_world(&mut self);

    /// Rigidly join two nodes.
    fn connect_nodes(&mut self, a: NodeId, b: NodeId) -> Result<(), PhysicsError> {
        Err(PhysicsError::fatal(format!(
            "connecting nodes {a} and {b} is not supported"
        )))
    }

    /// Remove a joint created by [`connect_nodes`](Self::connect_nodes).
    fn disconnect_nodes(&mut self, a: NodeId, b: NodeId) -> Result<(), PhysicsError> {
        Err(PhysicsError::fatal(format!(
            "disconnecting nodes {a} and {b} is not supported"
        )))
    }
}

/// A behavior unit invoked by the simulation loop.
///
/// Implementations are supplied externally; the core only references them.
/// Faults are contained: a plugin whose `update` errors or panics is
/// deactivated and the rest keep running.
pub trait Plugin: Send {
    /// Name used in logs, fault reports, and saved scenes.
    fn name(&self) -> &str;

    /// One-time activation hook, run on the simulation thread before the
    /// first `update`.
    fn init(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Per-tick callback with the timestep in milliseconds.
    fn update(&mut self, dt_ms: f64) -> Result<(), PluginError>;

    /// The world was reset.
    fn reset(&mut self) {}

    /// The physics engine faulted.
    fn receive_fault(&mut self, _error: &PhysicsError) {}
}

/// Outbound publish channel for per-tick data and fault reports.
pub trait DataBus: Send + Sync {
    /// Publish one message. Must not block the simulation thread.
    fn publish(&self, publication: Publication);
}

/// Notification sink on the rendering side.
pub trait GraphicsUpdate: Send + Sync {
    /// Scene state is stable and frame `frame` may be drawn.
    fn scene_updated(&self, frame: u64);

    /// Switch between visual (1), physical (2), or both (3) representations.
    fn set_visual_rep(&self, _mode: u32) {}
}

/// Persistence for scenes. The file format is the store's business.
pub trait SceneStore: Send + Sync {
    /// Load the scene at `path`, optionally under a robot name.
    fn load(&self, path: &str, robot_name: Option<&str>) -> Result<SceneState, SceneError>;

    /// Save `scene` to `path`.
    fn save(&self, path: &str, scene: &SceneState) -> Result<(), SceneError>;
}
