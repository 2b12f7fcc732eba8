//! User-facing [`Simulator`] control surface and shutdown.
//!
//! # Architecture
//!
//! ```text
//! Caller threads (CLI/GUI/net)      Simulation thread           Render thread
//!     |                                  |                           |
//!     |--start/stop/single_step--------->| wait_for_work()           |
//!     |--load_scene/reset/...----------->| requests.drain()          |
//!     |   [bounded(N) + kick]            | plugins.activate_new()    |
//!     |<--result via oneshot (blocking)--| physics.step_tick()       |
//!     |                                  | plugins.dispatch_sim()    |
//!     |                                  | bus.publish()             |
//!     |                                  | gate.allow_draw() ------->| wait_for_frame()
//!     |                                  | [sync: wait_for_draw] <---| finished_draw()
//!     |--on_property_changed()--> mirrors, queued world changes      |
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{error, info};

use marlin_core::{
    ControlError, DataBus, GraphicsUpdate, NodeId, PhysicsEngine, PhysicsError, PluginId,
    Publication, RequestError, SceneStore, SimulationStatus, TickId, Vector3,
};

use crate::bus::NullBus;
use crate::config::{ConfigError, SimConfig};
use crate::context::SimShared;
use crate::metrics::LoopMetrics;
use crate::physics::{PhysicsCell, PhysicsHold};
use crate::plugins::{PluginFault, PluginRegistry, SharedPlugin, UpdateMode};
use crate::properties::{PropertyBridge, PropertyEffect, PropertyMirror, PropertyValue};
use crate::requests::{LoadRequest, RequestQueue, SaveRequest, SimRequest};
use crate::sim_thread::SimThreadState;
use crate::stepping::SteppingController;
use crate::tick::TickEngine;

// ── Collaborators ────────────────────────────────────────────────

/// The external components a [`Simulator`] drives.
pub struct Collaborators {
    /// The physics engine. Moved behind the physics lock.
    pub physics: Box<dyn PhysicsEngine>,
    /// Outbound publication channel.
    pub bus: Arc<dyn DataBus>,
    /// Rendering-side notification sink, if a renderer is attached.
    pub graphics: Option<Arc<dyn GraphicsUpdate>>,
    /// Scene persistence, if scenes can be loaded and saved.
    pub scenes: Option<Arc<dyn SceneStore>>,
}

impl Collaborators {
    /// Physics only: publications are discarded, no renderer, no scenes.
    pub fn new(physics: Box<dyn PhysicsEngine>) -> Self {
        Self {
            physics,
            bus: Arc::new(NullBus),
            graphics: None,
            scenes: None,
        }
    }

    /// Publish on `bus`.
    pub fn with_bus(mut self, bus: Arc<dyn DataBus>) -> Self {
        self.bus = bus;
        self
    }

    /// Notify `graphics` of drawable frames.
    pub fn with_graphics(mut self, graphics: Arc<dyn GraphicsUpdate>) -> Self {
        self.graphics = Some(graphics);
        self
    }

    /// Load and save scenes through `scenes`.
    pub fn with_scenes(mut self, scenes: Arc<dyn SceneStore>) -> Self {
        self.scenes = Some(scenes);
        self
    }
}

// ── ShutdownReport ───────────────────────────────────────────────

/// Report from [`Simulator::exit`].
#[derive(Debug)]
pub struct ShutdownReport {
    /// Total time spent in the shutdown sequence.
    pub total_ms: u64,
    /// Whether the simulation thread was joined cleanly.
    pub thread_joined: bool,
    /// Ticks completed over the simulator's lifetime.
    pub ticks: u64,
    /// Requests still queued at exit, failed with `Shutdown`.
    pub requests_abandoned: usize,
}

// ── Simulator ────────────────────────────────────────────────────

/// The simulation core: one simulation thread plus the control surface
/// callers use to drive it.
///
/// Every method takes `&self` except [`exit`](Self::exit), so a
/// simulator can be shared behind an `Arc` between a GUI, a command
/// line, and network handlers.
pub struct Simulator {
    shared: Arc<SimShared>,
    thread: Option<JoinHandle<usize>>,
    exited: bool,
}

impl Simulator {
    /// Validate `config`, apply its world settings to the engine, and
    /// spawn the simulation thread.
    pub fn spawn(config: SimConfig, collaborators: Collaborators) -> Result<Self, ConfigError> {
        config.validate()?;
        let Collaborators {
            mut physics,
            bus,
            graphics,
            scenes,
        } = collaborators;

        physics.set_gravity(config.gravity);
        physics.set_world_constants(config.world_erp, config.world_cfm);
        physics.set_draw_contacts(config.draw_contacts);
        if let Some(graphics) = &graphics {
            graphics.set_visual_rep(config.visual_rep);
        }

        let initial = if config.start_running {
            SimulationStatus::Running
        } else {
            SimulationStatus::Stopped
        };
        let stepping = Arc::new(SteppingController::new(initial));
        let requests = Arc::new(RequestQueue::new(
            config.request_queue_capacity,
            Arc::clone(&stepping),
        ));
        let properties = PropertyBridge::new(
            PropertyMirror::from(&config),
            Arc::clone(&requests),
            graphics.clone(),
        );
        let shared = Arc::new(SimShared::new(
            stepping,
            requests,
            properties,
            PhysicsCell::new(physics),
            bus,
        ));

        let engine = TickEngine::new(
            Arc::clone(&shared),
            graphics,
            scenes,
            config.graphics_sync_policy,
            config.graphics_timeout(),
        );
        let state = SimThreadState::new(engine, Arc::clone(&shared), config.max_catchup_ticks);
        let thread = thread::Builder::new()
            .name("marlin-sim".into())
            .spawn(move || state.run())
            .map_err(|e| ConfigError::ThreadSpawnFailed {
                reason: e.to_string(),
            })?;

        Ok(Self {
            shared,
            thread: Some(thread),
            exited: false,
        })
    }

    fn check_live(&self) -> Result<(), ControlError> {
        if self.exited {
            return Err(ControlError::Exited);
        }
        Ok(())
    }

    // ── Stepping ─────────────────────────────────────────────────

    /// Run continuously. Refused while a physics fault is latched; call
    /// [`reset_world`](Self::reset_world) first.
    pub fn start(&self) -> Result<(), ControlError> {
        self.check_live()?;
        self.shared.stepping.start()
    }

    /// Halt at the next tick boundary.
    pub fn stop(&self) {
        self.shared.stepping.stop();
    }

    /// Advance exactly one tick, then stop.
    pub fn single_step(&self) -> Result<(), ControlError> {
        self.check_live()?;
        self.shared.stepping.single_step()
    }

    /// True while running or stepping.
    pub fn is_running(&self) -> bool {
        self.shared.stepping.is_running()
    }

    /// Current stepping status.
    pub fn status(&self) -> SimulationStatus {
        self.shared.stepping.status()
    }

    /// Block until the loop has settled in `Stopped`.
    pub fn wait_until_stopped(&self, timeout: Duration) -> bool {
        self.shared.stepping.wait_until_stopped(timeout)
    }

    /// Block until at least `target` ticks have completed in total.
    pub fn wait_for_ticks(&self, target: u64, timeout: Duration) -> bool {
        self.shared.stepping.wait_for_ticks(target, timeout)
    }

    /// Ticks completed over the simulator's lifetime.
    pub fn ticks_completed(&self) -> u64 {
        self.shared.stepping.ticks_completed()
    }

    // ── Queued requests ──────────────────────────────────────────

    /// Queue `request` for the simulation thread.
    ///
    /// With `blocking`, waits until it has run and returns its result;
    /// otherwise a failure is published as
    /// [`Publication::RequestFailed`].
    pub fn request(&self, request: SimRequest, blocking: bool) -> Result<(), RequestError> {
        if self.exited {
            return Err(RequestError::Shutdown);
        }
        if blocking {
            self.shared.requests.submit_blocking(request)
        } else {
            self.shared.requests.submit(request)
        }
    }

    /// Load a scene. The simulation is stopped while the scene is applied
    /// and resumes afterwards if it was running at the time of the call.
    pub fn load_scene(
        &self,
        path: impl Into<String>,
        robot_name: Option<&str>,
        blocking: bool,
    ) -> Result<(), RequestError> {
        let load = LoadRequest {
            path: path.into(),
            robot_name: robot_name.map(str::to_string),
            was_running: self.is_running(),
        };
        self.request(SimRequest::Load(load), blocking)
    }

    /// Save the current scene, with the same stop/resume behavior as
    /// [`load_scene`](Self::load_scene).
    pub fn save_scene(&self, path: impl Into<String>, blocking: bool) -> Result<(), RequestError> {
        let save = SaveRequest {
            path: path.into(),
            was_running: self.is_running(),
        };
        self.request(SimRequest::Save(save), blocking)
    }

    /// Reset every body and plugin, zero simulated time, and clear a
    /// latched physics fault.
    pub fn reset_world(&self) -> Result<(), RequestError> {
        self.request(SimRequest::ResetWorld, false)
    }

    /// Replace the world with an empty one. With `clear_all`, every
    /// plugin is also taken out of simulation dispatch.
    pub fn new_world(&self, clear_all: bool) -> Result<(), RequestError> {
        self.request(SimRequest::NewWorld { clear_all }, false)
    }

    /// Rigidly join two nodes.
    pub fn connect_nodes(&self, a: NodeId, b: NodeId) -> Result<(), RequestError> {
        self.request(SimRequest::ConnectNodes(a, b), false)
    }

    /// Remove a joint between two nodes.
    pub fn disconnect_nodes(&self, a: NodeId, b: NodeId) -> Result<(), RequestError> {
        self.request(SimRequest::DisconnectNodes(a, b), false)
    }

    // ── World properties ─────────────────────────────────────────

    /// Set gravity. The change reaches the engine between ticks.
    pub fn set_gravity(&self, gravity: Vector3) -> Result<(), ConfigError> {
        self.shared.properties.set_gravity(gravity)
    }

    /// Set ERP and CFM. The change reaches the engine between ticks.
    pub fn set_world_constants(&self, erp: f64, cfm: f64) -> Result<(), ConfigError> {
        self.shared.properties.set_world_constants(erp, cfm)
    }

    /// Property store change notification.
    pub fn on_property_changed(
        &self,
        key: &str,
        value: &PropertyValue,
    ) -> Result<PropertyEffect, ConfigError> {
        self.shared.properties.on_property_changed(key, value)
    }

    /// Current cached property values.
    pub fn properties(&self) -> PropertyMirror {
        self.shared.properties.snapshot()
    }

    // ── Plugins ──────────────────────────────────────────────────

    /// Register a plugin. It joins simulation dispatch at the next
    /// iteration boundary.
    pub fn add_plugin(&self, plugin: SharedPlugin) -> PluginId {
        self.shared.plugins.add(plugin)
    }

    /// Unregister a plugin. Returns `false` if it was not registered.
    pub fn remove_plugin(&self, id: PluginId) -> bool {
        self.shared.plugins.remove(id)
    }

    /// Change which dispatch sets a plugin belongs to.
    pub fn switch_plugin_update_mode(&self, id: PluginId, mode: UpdateMode) -> bool {
        self.shared.plugins.switch_update_mode(id, mode)
    }

    /// The plugin registry, for inspection.
    pub fn plugins(&self) -> &PluginRegistry {
        &self.shared.plugins
    }

    // ── Faults and time ──────────────────────────────────────────

    /// True while a physics fault is latched.
    pub fn has_sim_fault(&self) -> bool {
        self.shared.stepping.fault().is_some()
    }

    /// The latched physics fault, if any.
    pub fn last_fault(&self) -> Option<PhysicsError> {
        self.shared.stepping.fault()
    }

    /// Simulated time in milliseconds.
    pub fn sim_time_ms(&self) -> f64 {
        self.shared.sim_time_ms()
    }

    /// Most recent completed tick.
    pub fn current_tick(&self) -> TickId {
        self.shared.tick()
    }

    /// True if a scene was loaded or a new world created since the flag
    /// was last reset.
    pub fn scene_changed(&self) -> bool {
        self.shared.scene_changed()
    }

    /// Read the scene-changed flag, clearing it when `reset` is set.
    pub fn scene_has_changed(&self, reset: bool) -> bool {
        self.shared.take_scene_changed(reset)
    }

    /// Loop metrics snapshot.
    pub fn metrics(&self) -> LoopMetrics {
        self.shared.metrics.snapshot()
    }

    // ── Physics access ───────────────────────────────────────────

    /// Take the physics lock. Ticking pauses at the next tick boundary
    /// until the returned hold (and any nested ones) are dropped.
    pub fn physics_thread_lock(&self) -> PhysicsHold<'_> {
        self.shared.physics.hold()
    }

    /// Run `f` against the physics engine under the physics lock.
    pub fn with_physics<R>(&self, f: impl FnOnce(&mut dyn PhysicsEngine) -> R) -> R {
        self.shared.physics.with(f)
    }

    // ── Rendering side ───────────────────────────────────────────

    /// Renderer: wait for a frame newer than `last_seen`.
    pub fn wait_for_frame(&self, last_seen: u64, timeout: Duration) -> Option<u64> {
        self.shared.gate.wait_for_frame(last_seen, timeout)
    }

    /// Renderer: the permitted frame has been drawn.
    pub fn finished_draw(&self) {
        self.shared.gate.finished_draw();
    }

    /// Renderer: update the GUI plugins. Faults are isolated and published
    /// the same way as simulation dispatch.
    pub fn post_graphics_update(&self, dt_ms: f64) -> Vec<PluginFault> {
        let faults = self.shared.plugins.dispatch_gui(dt_ms);
        if !faults.is_empty() {
            let count = faults.len() as u64;
            self.shared.metrics.update(|m| m.plugin_faults += count);
            for fault in &faults {
                self.shared.bus.publish(Publication::PluginFault {
                    plugin: fault.plugin,
                    name: fault.name.clone(),
                    error: fault.error.clone(),
                });
            }
        }
        faults
    }

    // ── Shutdown ─────────────────────────────────────────────────

    /// Stop the simulation thread and join it.
    ///
    /// The current iteration completes; requests still queued fail with
    /// [`RequestError::Shutdown`]. Idempotent.
    pub fn exit(&mut self) -> ShutdownReport {
        let start = Instant::now();
        if self.exited {
            return ShutdownReport {
                total_ms: 0,
                thread_joined: true,
                ticks: self.shared.stepping.ticks_completed(),
                requests_abandoned: 0,
            };
        }
        self.exited = true;
        self.shared.stepping.request_exit();
        self.shared.gate.close();

        let (thread_joined, requests_abandoned) = match self.thread.take() {
            Some(handle) => {
                // Wake it if parked in a realtime pacing sleep.
                handle.thread().unpark();
                match handle.join() {
                    Ok(abandoned) => (true, abandoned),
                    Err(_) => {
                        error!("simulation thread panicked");
                        (false, self.shared.requests.close())
                    }
                }
            }
            None => (true, 0),
        };

        let report = ShutdownReport {
            total_ms: start.elapsed().as_millis() as u64,
            thread_joined,
            ticks: self.shared.stepping.ticks_completed(),
            requests_abandoned,
        };
        info!(
            total_ms = report.total_ms,
            ticks = report.ticks,
            "simulator exited"
        );
        report
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        if !self.exited {
            self.exit();
        }
    }
}

// Compile-time assertion: shareable behind an Arc.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Simulator>();
};

#[cfg(test)]
mod tests {
    use super::*;
    use marlin_test_utils::{MockPhysics, RecordingBus};

    const WAIT: Duration = Duration::from_secs(5);

    fn spawn(config: SimConfig) -> (Simulator, marlin_test_utils::PhysicsMonitor, Arc<RecordingBus>) {
        let physics = MockPhysics::new();
        let monitor = physics.monitor();
        let bus = Arc::new(RecordingBus::new());
        let collaborators = Collaborators::new(Box::new(physics)).with_bus(bus.clone());
        let sim = Simulator::spawn(config, collaborators).unwrap();
        (sim, monitor, bus)
    }

    #[test]
    fn lifecycle_start_and_exit() {
        let (mut sim, monitor, bus) = spawn(SimConfig::default());
        assert_eq!(sim.status(), SimulationStatus::Stopped);
        sim.start().unwrap();
        assert!(sim.wait_for_ticks(3, WAIT));
        let report = sim.exit();
        assert!(report.thread_joined);
        assert!(report.ticks >= 3);
        assert_eq!(monitor.steps(), report.ticks);
        assert_eq!(bus.physics_updates().len() as u64, report.ticks);
    }

    #[test]
    fn spawn_applies_world_config() {
        let config = SimConfig {
            gravity: Vector3::new(0.0, 0.0, -1.62),
            world_erp: 0.2,
            ..SimConfig::default()
        };
        let (_sim, monitor, _) = spawn(config);
        let log = monitor.log();
        assert_eq!(log.gravity, Vector3::new(0.0, 0.0, -1.62));
        assert_eq!(log.erp, 0.2);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SimConfig {
            timestep_ms: 0.0,
            ..SimConfig::default()
        };
        let result = Simulator::spawn(config, Collaborators::new(Box::new(MockPhysics::new())));
        assert!(matches!(result, Err(ConfigError::InvalidTimestep { .. })));
    }

    #[test]
    fn exit_is_idempotent_and_refuses_control() {
        let (mut sim, _, _) = spawn(SimConfig::default());
        sim.exit();
        let second = sim.exit();
        assert_eq!(second.total_ms, 0);
        assert_eq!(sim.start(), Err(ControlError::Exited));
        assert_eq!(sim.reset_world(), Err(RequestError::Shutdown));
    }

    #[test]
    fn exit_while_running_is_prompt() {
        let config = SimConfig {
            realtime: true,
            timestep_ms: 2000.0,
            ..SimConfig::default()
        };
        let (mut sim, _, _) = spawn(config);
        sim.start().unwrap();
        assert!(sim.wait_for_ticks(1, WAIT));
        // Give the loop time to enter its pacing sleep.
        thread::sleep(Duration::from_millis(50));
        let start = Instant::now();
        let report = sim.exit();
        assert!(report.thread_joined);
        assert!(
            start.elapsed() < Duration::from_millis(1000),
            "exit took {:?} with a 2s timestep",
            start.elapsed()
        );
    }

    #[test]
    fn drop_triggers_exit() {
        let (sim, _, _) = spawn(SimConfig::default());
        sim.start().unwrap();
        thread::sleep(Duration::from_millis(20));
        drop(sim);
        // If this doesn't hang, shutdown worked.
    }

    #[test]
    fn start_running_config_ticks_immediately() {
        let config = SimConfig {
            start_running: true,
            ..SimConfig::default()
        };
        let (sim, _, _) = spawn(config);
        assert!(sim.wait_for_ticks(2, WAIT));
        assert!(sim.is_running());
    }
}
