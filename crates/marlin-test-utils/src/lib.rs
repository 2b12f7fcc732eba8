//! Test utilities and mock collaborators for Marlin development.
//!
//! Provides recording implementations of the collaborator traits
//! ([`PhysicsEngine`], [`DataBus`], [`SceneStore`], [`GraphicsUpdate`]),
//! plugin fixtures in [`fixtures`], and a tracing initialiser for tests.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use marlin_core::{
    DataBus, GraphicsUpdate, NodeId, PhysicsEngine, PhysicsError, PhysicsUpdate, PluginError,
    PluginId, Publication, RequestError, RequestKind, SceneError, SceneState, SceneStore, TickId,
    Vector3,
};
use tracing_subscriber::EnvFilter;

pub use fixtures::{FailingPlugin, FailureMode, OrderLog, PluginLog, PluginMonitor, RecordingPlugin};

/// Install a test-friendly `tracing` subscriber once per process.
///
/// Honours `RUST_LOG`; defaults to `warn`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Poll `condition` every millisecond until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ── MockPhysics ──────────────────────────────────────────────────

/// Everything a [`MockPhysics`] has been asked to do.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhysicsLog {
    pub steps: u64,
    pub last_step_ms: f64,
    pub gravity: Vector3,
    pub erp: f64,
    pub cfm: f64,
    pub draw_contacts: bool,
    pub resets: u32,
    pub clears: u32,
    pub joints: Vec<(NodeId, NodeId)>,
    pending_failure: Option<PhysicsError>,
    step_delay: Duration,
}

/// Physics engine double that records calls and can be told to fail.
pub struct MockPhysics {
    log: Arc<Mutex<PhysicsLog>>,
    last_error: Option<PhysicsError>,
}

/// Handle for inspecting and steering a [`MockPhysics`] after it has been
/// moved into a simulator.
#[derive(Clone)]
pub struct PhysicsMonitor {
    log: Arc<Mutex<PhysicsLog>>,
}

impl MockPhysics {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(PhysicsLog::default())),
            last_error: None,
        }
    }

    pub fn monitor(&self) -> PhysicsMonitor {
        PhysicsMonitor {
            log: Arc::clone(&self.log),
        }
    }

    /// Sleep this long inside every step.
    pub fn with_step_delay(self, delay: Duration) -> Self {
        lock(&self.log).step_delay = delay;
        self
    }
}

impl Default for MockPhysics {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsMonitor {
    pub fn log(&self) -> PhysicsLog {
        lock(&self.log).clone()
    }

    pub fn steps(&self) -> u64 {
        lock(&self.log).steps
    }

    pub fn gravity(&self) -> Vector3 {
        lock(&self.log).gravity
    }

    /// Make the next step return `error`. Fatal or not depends on its
    /// severity.
    pub fn fail_next(&self, error: PhysicsError) {
        lock(&self.log).pending_failure = Some(error);
    }

    pub fn set_step_delay(&self, delay: Duration) {
        lock(&self.log).step_delay = delay;
    }
}

impl PhysicsEngine for MockPhysics {
    fn step_tick(&mut self, step_ms: f64) -> Result<(), PhysicsError> {
        let (delay, failure) = {
            let mut log = lock(&self.log);
            (log.step_delay, log.pending_failure.take())
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if let Some(error) = failure {
            self.last_error = Some(error.clone());
            if error.is_fatal() {
                return Err(error);
            }
            let mut log = lock(&self.log);
            log.steps += 1;
            log.last_step_ms = step_ms;
            return Err(error);
        }
        let mut log = lock(&self.log);
        log.steps += 1;
        log.last_step_ms = step_ms;
        Ok(())
    }

    fn last_error(&self) -> Option<PhysicsError> {
        self.last_error.clone()
    }

    fn set_gravity(&mut self, gravity: Vector3) {
        lock(&self.log).gravity = gravity;
    }

    fn set_world_constants(&mut self, erp: f64, cfm: f64) {
        let mut log = lock(&self.log);
        log.erp = erp;
        log.cfm = cfm;
    }

    fn set_draw_contacts(&mut self, enabled: bool) {
        lock(&self.log).draw_contacts = enabled;
    }

    fn reset(&mut self) {
        self.last_error = None;
        lock(&self.log).resets += 1;
    }

    fn clear_world(&mut self) {
        let mut log = lock(&self.log);
        log.clears += 1;
        log.joints.clear();
    }

    fn connect_nodes(&mut self, a: NodeId, b: NodeId) -> Result<(), PhysicsError> {
        let mut log = lock(&self.log);
        if a == b {
            return Err(PhysicsError::fatal(format!("cannot join node {a} to itself")));
        }
        log.joints.push((a, b));
        Ok(())
    }

    fn disconnect_nodes(&mut self, a: NodeId, b: NodeId) -> Result<(), PhysicsError> {
        let mut log = lock(&self.log);
        match log.joints.iter().position(|j| *j == (a, b)) {
            Some(i) => {
                log.joints.remove(i);
                Ok(())
            }
            None => Err(PhysicsError::fatal(format!("no joint between {a} and {b}"))),
        }
    }
}

// ── RecordingBus ─────────────────────────────────────────────────

/// Data bus that keeps every publication for later assertions.
#[derive(Default)]
pub struct RecordingBus {
    publications: Mutex<Vec<Publication>>,
    published: Condvar,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publications(&self) -> Vec<Publication> {
        lock(&self.publications).clone()
    }

    pub fn physics_updates(&self) -> Vec<PhysicsUpdate> {
        lock(&self.publications)
            .iter()
            .filter_map(|p| match p {
                Publication::PhysicsUpdate(u) => Some(*u),
                _ => None,
            })
            .collect()
    }

    pub fn plugin_faults(&self) -> Vec<(PluginId, String, PluginError)> {
        lock(&self.publications)
            .iter()
            .filter_map(|p| match p {
                Publication::PluginFault {
                    plugin,
                    name,
                    error,
                } => Some((*plugin, name.clone(), error.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn tick_failures(&self) -> Vec<(TickId, PhysicsError)> {
        lock(&self.publications)
            .iter()
            .filter_map(|p| match p {
                Publication::TickFailed { tick, error } => Some((*tick, error.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn request_failures(&self) -> Vec<(RequestKind, RequestError)> {
        lock(&self.publications)
            .iter()
            .filter_map(|p| match p {
                Publication::RequestFailed { kind, error } => Some((*kind, error.clone())),
                _ => None,
            })
            .collect()
    }

    /// Block until `condition` holds over the publications so far.
    pub fn wait_for(&self, timeout: Duration, condition: impl Fn(&[Publication]) -> bool) -> bool {
        let guard = lock(&self.publications);
        let (guard, _) = self
            .published
            .wait_timeout_while(guard, timeout, |pubs| !condition(pubs))
            .unwrap_or_else(|e| e.into_inner());
        condition(&guard)
    }
}

impl DataBus for RecordingBus {
    fn publish(&self, publication: Publication) {
        lock(&self.publications).push(publication);
        self.published.notify_all();
    }
}

// ── MemorySceneStore ─────────────────────────────────────────────

/// In-memory scene store keyed by path.
#[derive(Default)]
pub struct MemorySceneStore {
    scenes: Mutex<HashMap<String, SceneState>>,
    fail_saves: AtomicBool,
}

impl MemorySceneStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, scene: SceneState) {
        lock(&self.scenes).insert(path.into(), scene);
    }

    pub fn get(&self, path: &str) -> Option<SceneState> {
        lock(&self.scenes).get(path).cloned()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl SceneStore for MemorySceneStore {
    fn load(&self, path: &str, robot_name: Option<&str>) -> Result<SceneState, SceneError> {
        let mut scene = lock(&self.scenes)
            .get(path)
            .cloned()
            .ok_or_else(|| SceneError::new(format!("no scene at '{path}'")))?;
        if let Some(name) = robot_name {
            scene.robot_name = Some(name.to_string());
        }
        Ok(scene)
    }

    fn save(&self, path: &str, scene: &SceneState) -> Result<(), SceneError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(SceneError::new("disk full"));
        }
        lock(&self.scenes).insert(path.to_string(), scene.clone());
        Ok(())
    }
}

// ── RecordingGraphics ────────────────────────────────────────────

/// Graphics sink that records frame notifications.
#[derive(Default)]
pub struct RecordingGraphics {
    frames: Mutex<Vec<u64>>,
    visual_rep: AtomicU32,
}

impl RecordingGraphics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<u64> {
        lock(&self.frames).clone()
    }

    pub fn visual_rep(&self) -> u32 {
        self.visual_rep.load(Ordering::SeqCst)
    }
}

impl GraphicsUpdate for RecordingGraphics {
    fn scene_updated(&self, frame: u64) {
        lock(&self.frames).push(frame);
    }

    fn set_visual_rep(&self, mode: u32) {
        self.visual_rep.store(mode, Ordering::SeqCst);
    }
}
