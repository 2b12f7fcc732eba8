//! Scene-level state exchanged with a [`SceneStore`](crate::SceneStore).

use crate::vector::Vector3;

/// The portion of a scene the simulation core owns.
///
/// Node geometry and robot descriptions belong to the store's format;
/// the core only round-trips world configuration and which plugins were
/// active when the scene was saved.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneState {
    /// Robot name the scene was loaded under, if any.
    pub robot_name: Option<String>,
    /// World gravity.
    pub gravity: Vector3,
    /// Error reduction parameter.
    pub world_erp: f64,
    /// Constraint force mixing.
    pub world_cfm: f64,
    /// Names of the plugins active at save time, in dispatch order.
    pub active_plugins: Vec<String>,
}

impl Default for SceneState {
    fn default() -> Self {
        Self {
            robot_name: None,
            gravity: Vector3::earth_gravity(),
            world_erp: 0.1,
            world_cfm: 1e-10,
            active_plugins: Vec::new(),
        }
    }
}
