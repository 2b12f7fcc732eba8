//! Marlin: a multi-threaded simulation core for physics-based robot
//! simulators.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the Marlin sub-crates. For most users, adding `marlin` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::time::Duration;
//! use marlin::prelude::*;
//!
//! struct Inert;
//! impl PhysicsEngine for Inert {
//!     fn step_tick(&mut self, _step_ms: f64) -> Result<(), PhysicsError> { Ok(()) }
//!     fn last_error(&self) -> Option<PhysicsError> { None }
//!     fn set_gravity(&mut self, _gravity: Vector3) {}
//!     fn set_world_constants(&mut self, _erp: f64, _cfm: f64) {}
//!     fn reset(&mut self) {}
//!     fn clear_world(&mut self) {}
//! }
//!
//! let mut sim = Simulator::spawn(SimConfig::default(), Collaborators::new(Box::new(Inert)))
//!     .unwrap();
//! sim.single_step().unwrap();
//! assert!(sim.wait_for_ticks(1, Duration::from_secs(5)));
//! assert_eq!(sim.current_tick(), TickId(1));
//! let report = sim.exit();
//! assert!(report.thread_joined);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `marlin-core` | IDs, status, errors, publications, collaborator traits |
//! | [`engine`] | `marlin-engine` | Simulator, stepping, requests, plugins, graphics gate |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`marlin-core`).
///
/// Contains the collaborator contracts ([`types::PhysicsEngine`],
/// [`types::Plugin`], [`types::DataBus`], [`types::GraphicsUpdate`],
/// [`types::SceneStore`]) and the error and publication types they use.
pub use marlin_core as types;

/// The simulation thread and its control surface (`marlin-engine`).
///
/// [`engine::Simulator`] is the entry point; the components it
/// coordinates are public for embedding and testing.
pub use marlin_engine as engine;

/// Common imports for typical Marlin usage.
///
/// ```rust
/// use marlin::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use marlin_core::{
        DataBus, GraphicsUpdate, NodeId, PhysicsEngine, Plugin, PluginId, Publication,
        SceneState, SceneStore, SimulationStatus, TickId, Vector3,
    };

    // Errors
    pub use marlin_core::{ControlError, PhysicsError, PluginError, RequestError, SceneError};

    // Engine
    pub use marlin_engine::{
        shared, ChannelBus, Collaborators, ConfigError, GraphicsSyncPolicy, LoopMetrics,
        PropertyValue, SimConfig, SimRequest, Simulator, UpdateMode,
    };
}
