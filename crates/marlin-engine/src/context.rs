//! State shared between the simulation thread and the control surface.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use marlin_core::{DataBus, TickId};

use crate::graphics::GraphicsGate;
use crate::metrics::MetricsCell;
use crate::physics::PhysicsCell;
use crate::plugins::PluginRegistry;
use crate::properties::PropertyBridge;
use crate::requests::RequestQueue;
use crate::stepping::SteppingController;

/// Everything both sides of the simulation thread boundary touch.
///
/// Each component carries its own lock; there is no lock around the
/// aggregate.
pub(crate) struct SimShared {
    pub stepping: Arc<SteppingController>,
    pub requests: Arc<RequestQueue>,
    pub plugins: PluginRegistry,
    pub properties: PropertyBridge,
    pub gate: GraphicsGate,
    pub physics: PhysicsCell,
    pub metrics: MetricsCell,
    pub bus: Arc<dyn DataBus>,
    scene_changed: AtomicBool,
    tick: AtomicU64,
    sim_time_bits: AtomicU64,
}

impl SimShared {
    pub fn new(
        stepping: Arc<SteppingController>,
        requests: Arc<RequestQueue>,
        properties: PropertyBridge,
        physics: PhysicsCell,
        bus: Arc<dyn DataBus>,
    ) -> Self {
        Self {
            stepping,
            requests,
            plugins: PluginRegistry::new(),
            properties,
            gate: GraphicsGate::new(),
            physics,
            metrics: MetricsCell::new(),
            bus,
            scene_changed: AtomicBool::new(false),
            tick: AtomicU64::new(0),
            sim_time_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    // ── Scene-changed flag ───────────────────────────────────────

    pub fn mark_scene_changed(&self) {
        self.scene_changed.store(true, Ordering::Release);
    }

    pub fn scene_changed(&self) -> bool {
        self.scene_changed.load(Ordering::Acquire)
    }

    /// Read the flag, clearing it when `reset` is set.
    pub fn take_scene_changed(&self, reset: bool) -> bool {
        if reset {
            self.scene_changed.swap(false, Ordering::AcqRel)
        } else {
            self.scene_changed()
        }
    }

    // ── Simulated time ───────────────────────────────────────────

    pub fn record_time(&self, tick: TickId, sim_time_ms: f64) {
        self.tick.store(tick.0, Ordering::Release);
        self.sim_time_bits
            .store(sim_time_ms.to_bits(), Ordering::Release);
    }

    pub fn tick(&self) -> TickId {
        TickId(self.tick.load(Ordering::Acquire))
    }

    pub fn sim_time_ms(&self) -> f64 {
        f64::from_bits(self.sim_time_bits.load(Ordering::Acquire))
    }
}

const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<SimShared>();
};
