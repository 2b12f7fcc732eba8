//! Messages published on the data bus.
//!
//! The simulation thread publishes a [`PhysicsUpdate`] and the simulated
//! time once per tick. Contained faults (plugin, request) and the
//! tick-fatal physics fault are reported on the same channel so that
//! subscribers need no knowledge of the core's internals.

use crate::error::{PhysicsError, PluginError, RequestError};
use crate::id::{PluginId, TickId};

/// Snapshot of physics progress published after every tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicsUpdate {
    /// Tick that just completed.
    pub tick: TickId,
    /// Simulated time after the tick, in milliseconds.
    pub sim_time_ms: f64,
    /// Timestep used for the tick, in milliseconds.
    pub step_ms: f64,
    /// Wall-clock duration of the physics step, in microseconds.
    pub step_us: u64,
}

/// Which kind of queued request a failure belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Scene load.
    LoadScene,
    /// Scene save.
    SaveScene,
    /// World reset.
    ResetWorld,
    /// Fresh empty world.
    NewWorld,
    /// Gravity change.
    SetGravity,
    /// ERP/CFM change.
    SetWorldConstants,
    /// Contact drawing toggle.
    SetDrawContacts,
    /// Node connection.
    ConnectNodes,
    /// Node disconnection.
    DisconnectNodes,
}

/// A message on the data bus.
#[derive(Clone, Debug, PartialEq)]
pub enum Publication {
    /// Per-tick physics snapshot.
    PhysicsUpdate(PhysicsUpdate),
    /// Per-tick simulated time value.
    SimTime {
        /// Tick that just completed.
        tick: TickId,
        /// Simulated time in milliseconds.
        sim_time_ms: f64,
    },
    /// A plugin faulted and was deactivated.
    PluginFault {
        /// The faulting plugin.
        plugin: PluginId,
        /// Its name at registration.
        name: String,
        /// What went wrong.
        error: PluginError,
    },
    /// A non-blocking request failed on the simulation thread.
    RequestFailed {
        /// Which request failed.
        kind: RequestKind,
        /// Why.
        error: RequestError,
    },
    /// The physics engine reported a tick-fatal error; ticking halted.
    TickFailed {
        /// Tick that failed.
        tick: TickId,
        /// The engine's error.
        error: PhysicsError,
    },
}
