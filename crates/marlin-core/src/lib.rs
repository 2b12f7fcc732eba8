//! Core types and traits for the Marlin simulation core.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the identifiers, status and error types shared across the workspace,
//! and the collaborator contracts the simulation loop drives: the
//! physics engine, behavior plugins, the data bus, the graphics sink,
//! and the scene store.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod publication;
pub mod scene;
pub mod status;
pub mod traits;
pub mod vector;

pub use error::{
    ControlError, PhysicsError, PhysicsSeverity, PluginError, RequestError, SceneError,
};
pub use id::{NodeId, PluginId, TickId};
pub use publication::{Publication, PhysicsUpdate, RequestKind};
pub use scene::SceneState;
pub use status::SimulationStatus;
pub use traits::{DataBus, GraphicsUpdate, PhysicsEngine, Plugin, SceneStore};
pub use vector::Vector3;
