//! Bridge from the external property store to the loop's cached mirrors.
//!
//! The property store notifies [`PropertyBridge::on_property_changed`]
//! with a key name and a typed value. The bridge validates the value,
//! updates its [`PropertyMirror`] (read by the simulation thread every
//! iteration), and for keys that mutate the physics world queues the
//! mutation onto the simulation thread. A rejected value leaves the
//! mirror untouched.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use marlin_core::{GraphicsUpdate, RequestKind, Vector3};

use crate::config::{
    check_erp, check_finite, check_non_negative, check_timestep, check_visual_rep, ConfigError,
    SimConfig,
};
use crate::requests::{RequestQueue, SimRequest};

/// The property keys the simulation core recognises.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// Physics timestep in milliseconds.
    Timestep,
    /// Gravity X component.
    GravityX,
    /// Gravity Y component.
    GravityY,
    /// Gravity Z component.
    GravityZ,
    /// Realtime pacing toggle.
    Realtime,
    /// Fast-step catch-up toggle.
    FastStep,
    /// Synchronous graphics toggle.
    SyncGraphics,
    /// Simulated milliseconds between draw permits.
    SyncInterval,
    /// Contact drawing toggle.
    DrawContacts,
    /// World error reduction parameter.
    WorldErp,
    /// World constraint force mixing.
    WorldCfm,
    /// Visual representation mode.
    VisualRep,
}

impl PropertyKey {
    /// Every recognised key.
    pub const ALL: [Self; 12] = [
        Self::Timestep,
        Self::GravityX,
        Self::GravityY,
        Self::GravityZ,
        Self::Realtime,
        Self::FastStep,
        Self::SyncGraphics,
        Self::SyncInterval,
        Self::DrawContacts,
        Self::WorldErp,
        Self::WorldCfm,
        Self::VisualRep,
    ];

    /// Name of the key in the property store.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Timestep => "Simulator/calc_ms",
            Self::GravityX => "Simulator/Gravity x",
            Self::GravityY => "Simulator/Gravity y",
            Self::GravityZ => "Simulator/Gravity z",
            Self::Realtime => "Simulator/realtime calc",
            Self::FastStep => "Simulator/faststep",
            Self::SyncGraphics => "Simulator/sync graphics",
            Self::SyncInterval => "Simulator/sync time",
            Self::DrawContacts => "Simulator/draw contacts",
            Self::WorldErp => "Simulator/world erp",
            Self::WorldCfm => "Simulator/world cfm",
            Self::VisualRep => "Simulator/visual rep.",
        }
    }

    /// Look up a key by its store name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed property value as delivered by the store.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    /// Floating-point value.
    Double(f64),
    /// Integer value.
    Int(i64),
    /// Boolean value.
    Bool(bool),
    /// String value.
    Text(String),
}

impl PropertyValue {
    fn as_f64(&self, key: PropertyKey) -> Result<f64, ConfigError> {
        match self {
            Self::Double(v) => Ok(*v),
            Self::Int(v) => Ok(*v as f64),
            _ => Err(mismatch(key, "numeric")),
        }
    }

    fn as_bool(&self, key: PropertyKey) -> Result<bool, ConfigError> {
        match self {
            Self::Bool(v) => Ok(*v),
            _ => Err(mismatch(key, "boolean")),
        }
    }

    fn as_int(&self, key: PropertyKey) -> Result<i64, ConfigError> {
        match self {
            Self::Int(v) => Ok(*v),
            _ => Err(mismatch(key, "integer")),
        }
    }
}

fn mismatch(key: PropertyKey, expected: &'static str) -> ConfigError {
    ConfigError::TypeMismatch {
        key: key.name().to_string(),
        expected,
    }
}

/// Cached copies of every property the loop reads each iteration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PropertyMirror {
    /// Physics timestep in milliseconds.
    pub timestep_ms: f64,
    /// World gravity.
    pub gravity: Vector3,
    /// Realtime pacing.
    pub realtime: bool,
    /// Fast-step catch-up.
    pub fast_step: bool,
    /// Synchronous graphics.
    pub sync_graphics: bool,
    /// Simulated milliseconds between draw permits.
    pub sync_interval_ms: f64,
    /// Contact drawing.
    pub draw_contacts: bool,
    /// World ERP.
    pub world_erp: f64,
    /// World CFM.
    pub world_cfm: f64,
    /// Visual representation mode.
    pub visual_rep: u32,
}

impl From<&SimConfig> for PropertyMirror {
    fn from(config: &SimConfig) -> Self {
        Self {
            timestep_ms: config.timestep_ms,
            gravity: config.gravity,
            realtime: config.realtime,
            fast_step: config.fast_step,
            sync_graphics: config.sync_graphics,
            sync_interval_ms: config.sync_interval_ms,
            draw_contacts: config.draw_contacts,
            world_erp: config.world_erp,
            world_cfm: config.world_cfm,
            visual_rep: config.visual_rep,
        }
    }
}

/// What accepting a property change did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyEffect {
    /// Mirror updated; the loop picks it up next iteration.
    Mirrored,
    /// Mirror updated and a world mutation was queued.
    WorldQueued(RequestKind),
    /// Forwarded to the graphics sink.
    Visual,
    /// The key is not one the core handles.
    Ignored,
}

/// Validates property changes and applies them to loop state.
pub struct PropertyBridge {
    mirror: Mutex<PropertyMirror>,
    requests: Arc<RequestQueue>,
    graphics: Option<Arc<dyn GraphicsUpdate>>,
}

impl PropertyBridge {
    /// Create a bridge seeded from `initial`.
    pub fn new(
        initial: PropertyMirror,
        requests: Arc<RequestQueue>,
        graphics: Option<Arc<dyn GraphicsUpdate>>,
    ) -> Self {
        Self {
            mirror: Mutex::new(initial),
            requests,
            graphics,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PropertyMirror> {
        self.mirror.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current mirrors.
    pub fn snapshot(&self) -> PropertyMirror {
        *self.lock()
    }

    /// Handle a change notification from the property store.
    ///
    /// Unrecognised keys are ignored. Values outside their domain are
    /// rejected and the previous value is kept.
    pub fn on_property_changed(
        &self,
        key: &str,
        value: &PropertyValue,
    ) -> Result<PropertyEffect, ConfigError> {
        match PropertyKey::parse(key) {
            Some(key) => self.apply(key, value),
            None => Ok(PropertyEffect::Ignored),
        }
    }

    /// Apply a change to a recognised key.
    pub fn apply(
        &self,
        key: PropertyKey,
        value: &PropertyValue,
    ) -> Result<PropertyEffect, ConfigError> {
        let result = self.try_apply(key, value);
        match &result {
            Ok(effect) => debug!(%key, ?value, ?effect, "property applied"),
            Err(error) => warn!(%key, ?value, %error, "property change rejected"),
        }
        result
    }

    fn try_apply(
        &self,
        key: PropertyKey,
        value: &PropertyValue,
    ) -> Result<PropertyEffect, ConfigError> {
        let name = key.name();
        let mut mirror = self.lock();
        let mut next = *mirror;
        let request = match key {
            PropertyKey::Timestep => {
                next.timestep_ms = check_timestep(value.as_f64(key)?)?;
                None
            }
            PropertyKey::GravityX => {
                next.gravity.x = check_finite(name, value.as_f64(key)?)?;
                Some(SimRequest::SetGravity(next.gravity))
            }
            PropertyKey::GravityY => {
                next.gravity.y = check_finite(name, value.as_f64(key)?)?;
                Some(SimRequest::SetGravity(next.gravity))
            }
            PropertyKey::GravityZ => {
                next.gravity.z = check_finite(name, value.as_f64(key)?)?;
                Some(SimRequest::SetGravity(next.gravity))
            }
            PropertyKey::Realtime => {
                next.realtime = value.as_bool(key)?;
                None
            }
            PropertyKey::FastStep => {
                next.fast_step = value.as_bool(key)?;
                None
            }
            PropertyKey::SyncGraphics => {
                next.sync_graphics = value.as_bool(key)?;
                None
            }
            PropertyKey::SyncInterval => {
                next.sync_interval_ms = check_non_negative(name, value.as_f64(key)?)?;
                None
            }
            PropertyKey::DrawContacts => {
                next.draw_contacts = value.as_bool(key)?;
                Some(SimRequest::SetDrawContacts(next.draw_contacts))
            }
            PropertyKey::WorldErp => {
                next.world_erp = check_erp(name, value.as_f64(key)?)?;
                Some(SimRequest::SetWorldConstants {
                    erp: next.world_erp,
                    cfm: next.world_cfm,
                })
            }
            PropertyKey::WorldCfm => {
                next.world_cfm = check_non_negative(name, value.as_f64(key)?)?;
                Some(SimRequest::SetWorldConstants {
                    erp: next.world_erp,
                    cfm: next.world_cfm,
                })
            }
            PropertyKey::VisualRep => {
                next.visual_rep = check_visual_rep(name, value.as_int(key)?)?;
                None
            }
        };

        // Queue while holding the mirror lock so concurrent changes to
        // different gravity components reach the engine in mirror order.
        let effect = match request {
            Some(request) => {
                let kind = request.kind();
                self.requests
                    .submit(request)
                    .map_err(|reason| ConfigError::Undeliverable {
                        key: name.to_string(),
                        reason,
                    })?;
                PropertyEffect::WorldQueued(kind)
            }
            None if key == PropertyKey::VisualRep => PropertyEffect::Visual,
            None => PropertyEffect::Mirrored,
        };
        *mirror = next;
        drop(mirror);

        // The sink may read the bridge back, so call it unlocked.
        if effect == PropertyEffect::Visual {
            if let Some(graphics) = &self.graphics {
                graphics.set_visual_rep(next.visual_rep);
            }
        }
        Ok(effect)
    }

    /// Set the whole gravity vector, queueing it for the physics engine.
    pub fn set_gravity(&self, gravity: Vector3) -> Result<(), ConfigError> {
        let mut mirror = self.lock();
        if !gravity.is_finite() {
            return Err(ConfigError::InvalidValue {
                key: "gravity".to_string(),
                reason: format!("{gravity} is not finite"),
            });
        }
        self.requests
            .submit(SimRequest::SetGravity(gravity))
            .map_err(|reason| ConfigError::Undeliverable {
                key: "gravity".to_string(),
                reason,
            })?;
        mirror.gravity = gravity;
        Ok(())
    }

    /// Set ERP and CFM together as one queued mutation.
    pub fn set_world_constants(&self, erp: f64, cfm: f64) -> Result<(), ConfigError> {
        let mut mirror = self.lock();
        let erp = check_erp(PropertyKey::WorldErp.name(), erp)?;
        let cfm = check_non_negative(PropertyKey::WorldCfm.name(), cfm)?;
        self.requests
            .submit(SimRequest::SetWorldConstants { erp, cfm })
            .map_err(|reason| ConfigError::Undeliverable {
                key: "world constants".to_string(),
                reason,
            })?;
        mirror.world_erp = erp;
        mirror.world_cfm = cfm;
        Ok(())
    }

    /// Record world values applied on the simulation thread (scene load),
    /// keeping the mirror in agreement with the engine.
    pub(crate) fn record_world(&self, gravity: Vector3, erp: f64, cfm: f64) {
        let mut mirror = self.lock();
        mirror.gravity = gravity;
        mirror.world_erp = erp;
        mirror.world_cfm = cfm;
    }
}
