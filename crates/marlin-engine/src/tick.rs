//! Tick engine: one physics tick and the world mutations between ticks.
//!
//! [`TickEngine`] is owned by the simulation thread. It executes the
//! per-tick pipeline (physics step, plugin dispatch, publication,
//! graphics sync) and the queued requests that mutate the world, which
//! only ever run between ticks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use marlin_core::{
    GraphicsUpdate, PhysicsError, PhysicsUpdate, Publication, RequestError, SceneState,
    SceneStore, TickId,
};

use crate::config::GraphicsSyncPolicy;
use crate::context::SimShared;
use crate::graphics::DrawOutcome;
use crate::plugins::PluginFault;
use crate::properties::PropertyMirror;
use crate::requests::{LoadRequest, SaveRequest, SimRequest};

// ── TickEngine ───────────────────────────────────────────────────

/// Single-threaded executor for ticks and queued requests.
pub(crate) struct TickEngine {
    shared: Arc<SimShared>,
    graphics: Option<Arc<dyn GraphicsUpdate>>,
    scenes: Option<Arc<dyn SceneStore>>,
    graphics_policy: GraphicsSyncPolicy,
    graphics_timeout: Duration,
    current_tick: TickId,
    sim_time_ms: f64,
    since_draw_ms: f64,
}

impl TickEngine {
    pub fn new(
        shared: Arc<SimShared>,
        graphics: Option<Arc<dyn GraphicsUpdate>>,
        scenes: Option<Arc<dyn SceneStore>>,
        graphics_policy: GraphicsSyncPolicy,
        graphics_timeout: Duration,
    ) -> Self {
        Self {
            shared,
            graphics,
            scenes,
            graphics_policy,
            graphics_timeout,
            current_tick: TickId::default(),
            sim_time_ms: 0.0,
            since_draw_ms: 0.0,
        }
    }

    pub fn graphics_policy(&self) -> GraphicsSyncPolicy {
        self.graphics_policy
    }

    pub fn current_tick(&self) -> TickId {
        self.current_tick
    }

    pub fn sim_time_ms(&self) -> f64 {
        self.sim_time_ms
    }

    fn publish_plugin_faults(&self, faults: Vec<PluginFault>) {
        if faults.is_empty() {
            return;
        }
        let count = faults.len() as u64;
        self.shared.metrics.update(|m| m.plugin_faults += count);
        for fault in faults {
            self.shared.bus.publish(Publication::PluginFault {
                plugin: fault.plugin,
                name: fault.name,
                error: fault.error,
            });
        }
    }

    // ── Requests ─────────────────────────────────────────────────

    /// Execute every queued request in arrival order. Returns how many
    /// ran.
    pub fn process_requests(&mut self) -> usize {
        let batch = self.shared.requests.drain();
        let count = batch.len();
        if count > 0 {
            trace!(count, "draining requests");
        }
        for queued in batch {
            let kind = queued.request.kind();
            let result = self.process_request(&queued.request);
            let failed = result.is_err();
            self.shared.metrics.update(|m| {
                m.requests_processed += 1;
                if failed {
                    m.requests_failed += 1;
                }
            });
            if let Some(error) = queued.complete(result) {
                warn!(?kind, %error, "request failed");
                self.shared
                    .bus
                    .publish(Publication::RequestFailed { kind, error });
            }
        }
        count
    }

    /// Execute one world mutation. Only called between ticks.
    pub fn process_request(&mut self, request: &SimRequest) -> Result<(), RequestError> {
        match request {
            SimRequest::Load(load) => self.load_scene(load),
            SimRequest::Save(save) => self.save_scene(save),
            SimRequest::ResetWorld => {
                self.reset_world();
                Ok(())
            }
            SimRequest::NewWorld { clear_all } => {
                self.new_world(*clear_all);
                Ok(())
            }
            SimRequest::SetGravity(gravity) => {
                self.shared.physics.with(|e| e.set_gravity(*gravity));
                Ok(())
            }
            SimRequest::SetWorldConstants { erp, cfm } => {
                self.shared
                    .physics
                    .with(|e| e.set_world_constants(*erp, *cfm));
                Ok(())
            }
            SimRequest::SetDrawContacts(enabled) => {
                self.shared.physics.with(|e| e.set_draw_contacts(*enabled));
                Ok(())
            }
            SimRequest::ConnectNodes(a, b) => self
                .shared
                .physics
                .with(|e| e.connect_nodes(*a, *b))
                .map_err(|reason| RequestError::NodeLink {
                    a: *a,
                    b: *b,
                    reason,
                }),
            SimRequest::DisconnectNodes(a, b) => self
                .shared
                .physics
                .with(|e| e.disconnect_nodes(*a, *b))
                .map_err(|reason| RequestError::NodeLink {
                    a: *a,
                    b: *b,
                    reason,
                }),
        }
    }

    fn store(&self) -> Result<&Arc<dyn SceneStore>, RequestError> {
        self.scenes.as_ref().ok_or_else(|| RequestError::Rejected {
            reason: "no scene store configured".to_string(),
        })
    }

    /// Resume after a scene operation if the caller was running and no
    /// fault is latched.
    fn resume(&self, was_running: bool) {
        if was_running && self.shared.stepping.start().is_err() {
            debug!("resume skipped; physics fault latched");
        }
    }

    fn load_scene(&mut self, load: &LoadRequest) -> Result<(), RequestError> {
        // Halts a free run; a requested single step still completes.
        self.shared.stepping.stop();
        let result = self.store().and_then(|store| {
            store
                .load(&load.path, load.robot_name.as_deref())
                .map_err(|reason| RequestError::SceneLoad {
                    path: load.path.clone(),
                    reason,
                })
        });
        if let Ok(scene) = &result {
            self.apply_scene(scene);
            info!(path = %load.path, robot = ?load.robot_name, "scene loaded");
        }
        self.resume(load.was_running);
        result.map(|_| ())
    }

    fn apply_scene(&mut self, scene: &SceneState) {
        self.shared.physics.with(|e| {
            e.set_gravity(scene.gravity);
            e.set_world_constants(scene.world_erp, scene.world_cfm);
        });
        self.shared
            .properties
            .record_world(scene.gravity, scene.world_erp, scene.world_cfm);
        if !scene.active_plugins.is_empty() {
            let found = self.shared.plugins.restore_active(&scene.active_plugins);
            if found < scene.active_plugins.len() {
                warn!(
                    wanted = scene.active_plugins.len(),
                    found, "scene names plugins that are not registered"
                );
            }
        }
        self.shared.mark_scene_changed();
    }

    fn save_scene(&mut self, save: &SaveRequest) -> Result<(), RequestError> {
        self.shared.stepping.stop();
        let mirror = self.shared.properties.snapshot();
        let scene = SceneState {
            robot_name: None,
            gravity: mirror.gravity,
            world_erp: mirror.world_erp,
            world_cfm: mirror.world_cfm,
            active_plugins: self.shared.plugins.active_names(),
        };
        let result = self.store().and_then(|store| {
            store
                .save(&save.path, &scene)
                .map_err(|reason| RequestError::SceneSave {
                    path: save.path.clone(),
                    reason,
                })
        });
        if result.is_ok() {
            info!(path = %save.path, plugins = scene.active_plugins.len(), "scene saved");
        }
        self.resume(save.was_running);
        result
    }

    fn reset_world(&mut self) {
        self.shared.physics.with(|e| e.reset());
        self.shared.plugins.reset_all();
        if self.shared.stepping.clear_fault() {
            info!("physics fault cleared");
        }
        self.sim_time_ms = 0.0;
        self.since_draw_ms = 0.0;
        self.shared.record_time(self.current_tick, 0.0);
        info!(tick = %self.current_tick, "world reset");
    }

    fn new_world(&mut self, clear_all: bool) {
        self.shared.physics.with(|e| e.clear_world());
        if clear_all {
            self.shared.plugins.deactivate_all();
        }
        self.shared.stepping.clear_fault();
        self.sim_time_ms = 0.0;
        self.since_draw_ms = 0.0;
        self.shared.record_time(self.current_tick, 0.0);
        self.shared.mark_scene_changed();
        info!(clear_all, "new world");
    }

    // ── Ticks ────────────────────────────────────────────────────

    /// Activate plugins waiting in "new". Runs before the tick.
    pub fn merge_new_plugins(&self) {
        let faults = self.shared.plugins.activate_new();
        self.publish_plugin_faults(faults);
    }

    /// Run one tick: physics step, plugin dispatch, publication.
    ///
    /// A fatal physics error latches the fault, halts the stepping
    /// controller, and is returned; plugins are not dispatched for the
    /// failed tick.
    pub fn execute_tick(&mut self, step_ms: f64) -> Result<PhysicsUpdate, PhysicsError> {
        let tick_start = Instant::now();
        let tick = self.current_tick.next();

        let step = self.shared.physics.with(|e| e.step_tick(step_ms));
        let step_us = tick_start.elapsed().as_micros() as u64;
        match step {
            Ok(()) => {}
            Err(e) if !e.is_fatal() => debug!(%tick, error = %e, "physics diagnostic"),
            Err(e) => {
                self.fail_tick(tick, e.clone());
                return Err(e);
            }
        }

        self.current_tick = tick;
        self.sim_time_ms += step_ms;
        self.since_draw_ms += step_ms;
        self.shared.record_time(tick, self.sim_time_ms);

        let faults = self.shared.plugins.dispatch_sim(step_ms);
        self.publish_plugin_faults(faults);

        let update = PhysicsUpdate {
            tick,
            sim_time_ms: self.sim_time_ms,
            step_ms,
            step_us,
        };
        self.shared.bus.publish(Publication::PhysicsUpdate(update));
        self.shared.bus.publish(Publication::SimTime {
            tick,
            sim_time_ms: self.sim_time_ms,
        });

        let tick_us = tick_start.elapsed().as_micros() as u64;
        self.shared.metrics.update(|m| {
            m.ticks += 1;
            m.last_tick_us = tick_us;
        });
        trace!(%tick, sim_time_ms = self.sim_time_ms, "tick complete");
        Ok(update)
    }

    fn fail_tick(&mut self, tick: TickId, fault: PhysicsError) {
        error!(%tick, error = %fault, "physics step failed; simulation halted");
        self.shared.stepping.fault_stop(fault.clone());
        self.shared.plugins.notify_fault(&fault);
        self.shared
            .bus
            .publish(Publication::TickFailed { tick, error: fault });
    }

    /// Hand the renderer a frame if enough simulated time has passed.
    ///
    /// In synchronous mode blocks until the renderer acknowledges or the
    /// timeout elapses, and returns the outcome of that wait.
    pub fn sync_graphics(&mut self, mirror: &PropertyMirror) -> Option<DrawOutcome> {
        if self.since_draw_ms < mirror.sync_interval_ms {
            return None;
        }
        self.since_draw_ms = 0.0;
        let frame = self.shared.gate.allow_draw();
        if let Some(graphics) = &self.graphics {
            graphics.scene_updated(frame);
        }
        if !mirror.sync_graphics {
            return None;
        }
        let outcome = self.shared.gate.wait_for_draw(frame, self.graphics_timeout);
        if outcome == DrawOutcome::TimedOut {
            warn!(
                frame,
                timeout_ms = self.graphics_timeout.as_millis() as u64,
                "renderer did not acknowledge frame"
            );
            self.shared.metrics.update(|m| m.draw_timeouts += 1);
        }
        Some(outcome)
    }
}
