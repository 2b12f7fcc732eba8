//! Queued scene requests: FIFO delivery, tick-boundary atomicity,
//! blocking vs. published failures, and save/load round trips.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use marlin_core::{
    Publication, RequestError, RequestKind, SceneError, SceneState, SceneStore, SimulationStatus,
    Vector3,
};
use marlin_engine::{shared, Collaborators, SimConfig, SimRequest, Simulator};
use marlin_test_utils::{
    init_tracing, wait_until, MemorySceneStore, MockPhysics, PhysicsMonitor, RecordingBus,
    RecordingPlugin,
};

const WAIT: Duration = Duration::from_secs(10);

/// Scene store that records, for each load, the path and how many physics
/// steps had run at the time.
struct LoggingStore {
    inner: MemorySceneStore,
    physics: PhysicsMonitor,
    loads: Mutex<Vec<(String, u64)>>,
}

impl LoggingStore {
    fn loads(&self) -> Vec<(String, u64)> {
        self.loads.lock().unwrap().clone()
    }
}

impl SceneStore for LoggingStore {
    fn load(&self, path: &str, robot_name: Option<&str>) -> Result<SceneState, SceneError> {
        self.loads
            .lock()
            .unwrap()
            .push((path.to_string(), self.physics.steps()));
        self.inner.load(path, robot_name)
    }

    fn save(&self, path: &str, scene: &SceneState) -> Result<(), SceneError> {
        self.inner.save(path, scene)
    }
}

struct Rig {
    sim: Simulator,
    physics: PhysicsMonitor,
    bus: Arc<RecordingBus>,
    store: Arc<LoggingStore>,
}

fn rig() -> Rig {
    init_tracing();
    let physics = MockPhysics::new();
    let monitor = physics.monitor();
    let bus = Arc::new(RecordingBus::new());
    let store = Arc::new(LoggingStore {
        inner: MemorySceneStore::new(),
        physics: monitor.clone(),
        loads: Mutex::new(Vec::new()),
    });
    let collaborators = Collaborators::new(Box::new(physics))
        .with_bus(bus.clone())
        .with_scenes(store.clone());
    let sim = Simulator::spawn(SimConfig::default(), collaborators).expect("spawn");
    Rig {
        sim,
        physics: monitor,
        bus,
        store,
    }
}

fn scene_with_gravity(z: f64) -> SceneState {
    SceneState {
        gravity: Vector3::new(0.0, 0.0, z),
        ..SceneState::default()
    }
}

#[test]
fn queued_loads_run_in_order_before_the_next_tick() {
    let rig = rig();
    for i in 0..5 {
        rig.store
            .inner
            .insert(format!("s{i}.scn"), scene_with_gravity(-(i as f64)));
    }
    for i in 0..5 {
        rig.sim.load_scene(format!("s{i}.scn"), None, false).unwrap();
    }
    rig.sim.single_step().unwrap();
    assert!(rig.sim.wait_for_ticks(1, WAIT));

    let loads = rig.store.loads();
    let paths: Vec<&str> = loads.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(paths, ["s0.scn", "s1.scn", "s2.scn", "s3.scn", "s4.scn"]);
    assert!(loads.iter().all(|(_, steps)| *steps == 0));
    assert_eq!(rig.physics.gravity(), Vector3::new(0.0, 0.0, -4.0));
}

#[test]
fn loads_are_serviced_while_stopped() {
    let rig = rig();
    rig.store.inner.insert("idle.scn", scene_with_gravity(-1.0));
    rig.sim.load_scene("idle.scn", None, false).unwrap();
    assert!(wait_until(WAIT, || rig.store.loads().len() == 1));
    assert!(wait_until(WAIT, || rig.physics.gravity().z == -1.0));
    assert_eq!(rig.sim.status(), SimulationStatus::Stopped);
    assert_eq!(rig.physics.steps(), 0);
}

#[test]
fn blocking_load_reports_failure_to_caller() {
    let rig = rig();
    let err = rig.sim.load_scene("missing.scn", None, true).unwrap_err();
    assert!(matches!(err, RequestError::SceneLoad { ref path, .. } if path == "missing.scn"));
    // Blocking failures are not also published.
    assert!(rig.bus.request_failures().is_empty());
}

#[test]
fn detached_load_failure_is_published() {
    let rig = rig();
    rig.sim.load_scene("missing.scn", None, false).unwrap();
    assert!(rig.bus.wait_for(WAIT, |pubs| pubs
        .iter()
        .any(|p| matches!(p, Publication::RequestFailed { .. }))));
    let failures = rig.bus.request_failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, RequestKind::LoadScene);
    assert!(wait_until(WAIT, || rig.sim.metrics().requests_failed == 1));
}

#[test]
fn load_resumes_only_if_it_was_running() {
    let rig = rig();
    rig.store.inner.insert("a.scn", SceneState::default());

    rig.sim.load_scene("a.scn", None, true).unwrap();
    assert_eq!(rig.sim.status(), SimulationStatus::Stopped);

    rig.sim.start().unwrap();
    rig.sim.load_scene("a.scn", Some("rover"), true).unwrap();
    assert!(rig.sim.is_running());
    let before = rig.sim.ticks_completed();
    assert!(rig.sim.wait_for_ticks(before + 2, WAIT));
}

#[test]
fn save_new_world_load_round_trip() {
    let rig = rig();
    let a = RecordingPlugin::new("controller");
    let b = RecordingPlugin::new("logger");
    let (a_monitor, b_monitor) = (a.monitor(), b.monitor());
    rig.sim.add_plugin(shared(a));
    rig.sim.add_plugin(shared(b));

    rig.sim.single_step().unwrap();
    assert!(rig.sim.wait_for_ticks(1, WAIT));
    assert_eq!(rig.sim.plugins().active_ids().len(), 2);

    rig.sim
        .set_gravity(Vector3::new(0.0, 0.0, -9.81))
        .unwrap();
    rig.sim.save_scene("world.scn", true).unwrap();
    let saved = rig.store.inner.get("world.scn").expect("saved scene");
    assert_eq!(saved.gravity, Vector3::new(0.0, 0.0, -9.81));
    assert_eq!(saved.active_plugins, vec!["controller", "logger"]);

    rig.sim
        .request(SimRequest::NewWorld { clear_all: true }, true)
        .unwrap();
    assert!(rig.sim.plugins().active_ids().is_empty());
    assert_eq!(rig.physics.log().clears, 1);
    rig.sim.set_gravity(Vector3::new(0.0, 0.0, -1.0)).unwrap();
    rig.sim.single_step().unwrap();
    assert!(rig.sim.wait_for_ticks(2, WAIT));
    assert_eq!(a_monitor.updates(), 1);
    assert_eq!(rig.physics.gravity(), Vector3::new(0.0, 0.0, -1.0));

    assert!(rig.sim.scene_has_changed(true));
    rig.sim.load_scene("world.scn", None, true).unwrap();
    assert!(rig.sim.scene_changed());
    assert_eq!(rig.physics.gravity(), Vector3::new(0.0, 0.0, -9.81));
    assert_eq!(rig.sim.properties().gravity, Vector3::new(0.0, 0.0, -9.81));

    rig.sim.single_step().unwrap();
    assert!(rig.sim.wait_for_ticks(3, WAIT));
    assert!(rig.sim.wait_until_stopped(WAIT));
    assert_eq!(a_monitor.updates(), 2);
    assert_eq!(b_monitor.updates(), 2);
    // init runs once per plugin lifetime, not per re-activation.
    assert_eq!(a_monitor.inits(), 1);
}

#[test]
fn save_failure_reaches_blocking_caller() {
    let rig = rig();
    rig.store.inner.set_fail_saves(true);
    let err = rig.sim.save_scene("full.scn", true).unwrap_err();
    assert!(matches!(err, RequestError::SceneSave { .. }));
}

#[test]
fn node_links_route_through_the_queue() {
    use marlin_core::NodeId;
    let rig = rig();
    rig.sim
        .request(SimRequest::ConnectNodes(NodeId(1), NodeId(2)), true)
        .unwrap();
    assert_eq!(rig.physics.log().joints, vec![(NodeId(1), NodeId(2))]);
    let err = rig
        .sim
        .request(SimRequest::DisconnectNodes(NodeId(3), NodeId(4)), true)
        .unwrap_err();
    assert!(matches!(err, RequestError::NodeLink { .. }));
    rig.sim.disconnect_nodes(NodeId(1), NodeId(2)).unwrap();
    assert!(wait_until(WAIT, || rig.physics.log().joints.is_empty()));
}

#[test]
fn requests_after_exit_are_refused() {
    let mut rig = rig();
    rig.sim.exit();
    assert_eq!(
        rig.sim.load_scene("a.scn", None, true),
        Err(RequestError::Shutdown)
    );
}
