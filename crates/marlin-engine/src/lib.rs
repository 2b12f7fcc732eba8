//! Simulation thread and control plumbing for the Marlin simulation core.
//!
//! Provides the [`Simulator`] that owns the simulation thread and the
//! components it coordinates: the [`SteppingController`] run/stop/step
//! state machine, the [`RequestQueue`] funnelling world mutations onto
//! the simulation thread, the [`PluginRegistry`], the [`GraphicsGate`]
//! handshake with the renderer, and the [`PropertyBridge`] from the
//! property store.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod bus;
pub mod config;
mod context;
pub mod graphics;
pub mod metrics;
pub mod pacing;
pub mod physics;
pub mod plugins;
pub mod properties;
pub mod requests;
mod sim_thread;
pub mod simulator;
pub mod stepping;
mod tick;

pub use bus::{ChannelBus, NullBus};
pub use config::{ConfigError, GraphicsSyncPolicy, SimConfig};
pub use graphics::{DrawOutcome, GraphicsGate};
pub use metrics::LoopMetrics;
pub use pacing::RealtimePacer;
pub use physics::{PhysicsCell, PhysicsHold};
pub use plugins::{shared, PluginFault, PluginRegistry, SharedPlugin, UpdateMode};
pub use properties::{PropertyBridge, PropertyEffect, PropertyKey, PropertyMirror, PropertyValue};
pub use requests::{LoadRequest, RequestQueue, SaveRequest, SimRequest};
pub use simulator::{Collaborators, ShutdownReport, Simulator};
pub use stepping::{SteppingController, TickMode, Wake};
