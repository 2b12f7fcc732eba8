//! Simulation configuration, validation, and error types.
//!
//! [`SimConfig`] carries the startup values for every property the loop
//! mirrors. [`validate()`](SimConfig::validate) checks them once at
//! construction; later changes go through the
//! [`PropertyBridge`](crate::properties::PropertyBridge), which applies the
//! same domain checks per key.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use marlin_core::{RequestError, Vector3};

// ── GraphicsSyncPolicy ─────────────────────────────────────────────

/// Which ticks of a fast-step catch-up batch open the graphics gate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GraphicsSyncPolicy {
    /// Only the last tick of a batch may trigger a draw. Bounds rendering
    /// overhead while catching up.
    #[default]
    FinalTickOnly,
    /// Every tick that crosses the sync interval triggers a draw.
    EveryTick,
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected in [`SimConfig::validate()`] or when a property change
/// is rejected.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// Timestep is NaN, infinite, zero, or negative.
    InvalidTimestep {
        /// The invalid value.
        value: f64,
    },
    /// A property value is outside its accepted domain.
    InvalidValue {
        /// Property name.
        key: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A property value has the wrong type for its key.
    TypeMismatch {
        /// Property name.
        key: String,
        /// The expected value type.
        expected: &'static str,
    },
    /// The value was valid but the world change could not be queued.
    Undeliverable {
        /// Property name.
        key: String,
        /// The queue's error.
        reason: RequestError,
    },
    /// The request queue capacity is zero.
    QueueCapacityZero,
    /// The simulation thread could not be spawned.
    ThreadSpawnFailed {
        /// The OS error text.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTimestep { value } => {
                write!(f, "timestep must be finite and positive, got {value}")
            }
            Self::InvalidValue { key, reason } => write!(f, "invalid value for '{key}': {reason}"),
            Self::TypeMismatch { key, expected } => {
                write!(f, "property '{key}' expects a {expected} value")
            }
            Self::Undeliverable { key, reason } => {
                write!(f, "change to '{key}' could not be queued: {reason}")
            }
            Self::QueueCapacityZero => write!(f, "request_queue_capacity must be at least 1"),
            Self::ThreadSpawnFailed { reason } => write!(f, "thread spawn failed: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Undeliverable { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

// ── Domain checks ──────────────────────────────────────────────────

pub(crate) fn check_timestep(value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidTimestep { value })
    }
}

pub(crate) fn check_finite(key: &str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("{value} is not finite"),
        })
    }
}

pub(crate) fn check_erp(key: &str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("erp must be in [0, 1], got {value}"),
        })
    }
}

pub(crate) fn check_non_negative(key: &str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("must be finite and non-negative, got {value}"),
        })
    }
}

pub(crate) fn check_visual_rep(key: &str, value: i64) -> Result<u32, ConfigError> {
    match value {
        1..=3 => Ok(value as u32),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("visual representation must be 1, 2, or 3, got {value}"),
        }),
    }
}

// ── SimConfig ──────────────────────────────────────────────────────

/// Startup configuration for a [`Simulator`](crate::Simulator).
#[derive(Clone, Debug)]
pub struct SimConfig {
    /// Physics timestep in milliseconds. Default: 10.
    pub timestep_ms: f64,
    /// World gravity. Default: (0, 0, -9.81).
    pub gravity: Vector3,
    /// Global error reduction parameter, in `[0, 1]`. Default: 0.1.
    pub world_erp: f64,
    /// Global constraint force mixing, non-negative. Default: 1e-10.
    pub world_cfm: f64,
    /// Pace ticks against wall-clock time. Default: false.
    pub realtime: bool,
    /// Run extra ticks per iteration to recover realtime lag. Default: false.
    pub fast_step: bool,
    /// Block after each draw permit until the renderer acknowledges. Default: false.
    pub sync_graphics: bool,
    /// Simulated milliseconds between draw permits. 0 permits every tick. Default: 40.
    pub sync_interval_ms: f64,
    /// Contact point visualisation. Default: false.
    pub draw_contacts: bool,
    /// Visual (1), physical (2), or both (3). Default: 1.
    pub visual_rep: u32,
    /// Upper bound on a synchronous draw wait, in milliseconds. Default: 200.
    pub graphics_timeout_ms: u64,
    /// Which catch-up ticks open the graphics gate. Default: final tick only.
    pub graphics_sync_policy: GraphicsSyncPolicy,
    /// Maximum ticks run in one fast-step iteration. Default: 10.
    pub max_catchup_ticks: u32,
    /// Capacity of the request queue. Default: 64.
    pub request_queue_capacity: usize,
    /// Begin in `Running` rather than `Stopped`. Default: false.
    pub start_running: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            timestep_ms: 10.0,
            gravity: Vector3::earth_gravity(),
            world_erp: 0.1,
            world_cfm: 1e-10,
            realtime: false,
            fast_step: false,
            sync_graphics: false,
            sync_interval_ms: 40.0,
            draw_contacts: false,
            visual_rep: 1,
            graphics_timeout_ms: 200,
            graphics_sync_policy: GraphicsSyncPolicy::FinalTickOnly,
            max_catchup_ticks: 10,
            request_queue_capacity: 64,
            start_running: false,
        }
    }
}

impl SimConfig {
    /// Validate every value against its accepted domain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_timestep(self.timestep_ms)?;
        if !self.gravity.is_finite() {
            return Err(ConfigError::InvalidValue {
                key: "gravity".to_string(),
                reason: format!("{} is not finite", self.gravity),
            });
        }
        check_erp("world_erp", self.world_erp)?;
        check_non_negative("world_cfm", self.world_cfm)?;
        check_non_negative("sync_interval_ms", self.sync_interval_ms)?;
        check_visual_rep("visual_rep", i64::from(self.visual_rep))?;
        if self.request_queue_capacity == 0 {
            return Err(ConfigError::QueueCapacityZero);
        }
        if self.max_catchup_ticks == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_catchup_ticks".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The synchronous draw wait bound as a [`Duration`].
    pub fn graphics_timeout(&self) -> Duration {
        Duration::from_millis(self.graphics_timeout_ms)
    }
}
