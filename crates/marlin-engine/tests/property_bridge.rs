//! Property changes flowing from the outside world into a live loop, and
//! external holds on the physics lock.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use marlin_core::{RequestKind, Vector3};
use marlin_engine::{
    Collaborators, ConfigError, PropertyEffect, PropertyValue, SimConfig, Simulator,
};
use marlin_test_utils::{init_tracing, wait_until, MockPhysics, PhysicsMonitor, RecordingGraphics};

const WAIT: Duration = Duration::from_secs(10);

fn spawn(config: SimConfig) -> (Simulator, PhysicsMonitor, Arc<RecordingGraphics>) {
    init_tracing();
    let physics = MockPhysics::new();
    let monitor = physics.monitor();
    let graphics = Arc::new(RecordingGraphics::new());
    let collaborators = Collaborators::new(Box::new(physics)).with_graphics(graphics.clone());
    let sim = Simulator::spawn(config, collaborators).expect("spawn");
    (sim, monitor, graphics)
}

#[test]
fn gravity_component_reaches_a_stopped_engine() {
    let (sim, physics, _) = spawn(SimConfig::default());
    let effect = sim
        .on_property_changed("Simulator/Gravity z", &PropertyValue::Double(-1.62))
        .unwrap();
    assert_eq!(effect, PropertyEffect::WorldQueued(RequestKind::SetGravity));
    assert!(wait_until(WAIT, || physics.gravity().z == -1.62));
    assert_eq!(physics.gravity().x, 0.0);
    assert_eq!(sim.ticks_completed(), 0);
}

#[test]
fn timestep_change_applies_to_the_next_tick() {
    let (sim, physics, _) = spawn(SimConfig::default());
    sim.single_step().unwrap();
    assert!(sim.wait_for_ticks(1, WAIT));
    assert_eq!(physics.log().last_step_ms, 10.0);

    let effect = sim
        .on_property_changed("Simulator/calc_ms", &PropertyValue::Int(4))
        .unwrap();
    assert_eq!(effect, PropertyEffect::Mirrored);
    sim.single_step().unwrap();
    assert!(sim.wait_for_ticks(2, WAIT));
    assert_eq!(physics.log().last_step_ms, 4.0);
    assert_eq!(sim.sim_time_ms(), 14.0);
}

#[test]
fn rejected_values_keep_the_previous_setting() {
    let (sim, _, _) = spawn(SimConfig::default());
    let err = sim
        .on_property_changed("Simulator/calc_ms", &PropertyValue::Double(0.0))
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidTimestep { .. }));
    let err = sim
        .on_property_changed("Simulator/faststep", &PropertyValue::Double(1.0))
        .unwrap_err();
    assert!(matches!(err, ConfigError::TypeMismatch { .. }));

    let mirror = sim.properties();
    assert_eq!(mirror.timestep_ms, 10.0);
    assert!(!mirror.fast_step);
}

#[test]
fn unrelated_keys_are_ignored() {
    let (sim, _, _) = spawn(SimConfig::default());
    let before = sim.properties();
    let effect = sim
        .on_property_changed("Camera/fov", &PropertyValue::Double(60.0))
        .unwrap();
    assert_eq!(effect, PropertyEffect::Ignored);
    assert_eq!(sim.properties(), before);
}

#[test]
fn visual_rep_goes_to_the_renderer() {
    let (sim, _, graphics) = spawn(SimConfig::default());
    assert_eq!(graphics.visual_rep(), 1);
    let effect = sim
        .on_property_changed("Simulator/visual rep.", &PropertyValue::Int(2))
        .unwrap();
    assert_eq!(effect, PropertyEffect::Visual);
    assert_eq!(graphics.visual_rep(), 2);
}

#[test]
fn direct_setters_update_mirror_and_engine() {
    let (sim, physics, _) = spawn(SimConfig::default());
    sim.set_gravity(Vector3::new(0.0, 0.0, -3.7)).unwrap();
    sim.set_world_constants(0.4, 1e-6).unwrap();
    assert!(wait_until(WAIT, || {
        let log = physics.log();
        log.gravity.z == -3.7 && log.erp == 0.4
    }));
    let mirror = sim.properties();
    assert_eq!(mirror.gravity, Vector3::new(0.0, 0.0, -3.7));
    assert_eq!(mirror.world_cfm, 1e-6);
}

#[test]
fn physics_lock_pauses_ticking() {
    let (sim, physics, _) = spawn(SimConfig::default());
    sim.start().unwrap();
    assert!(sim.wait_for_ticks(2, WAIT));

    let hold = sim.physics_thread_lock();
    let nested = sim.physics_thread_lock();
    let frozen = physics.steps();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(physics.steps(), frozen);
    let gravity = nested.with_engine(|engine| {
        engine.set_gravity(Vector3::new(1.0, 0.0, 0.0));
        engine.last_error()
    });
    assert!(gravity.is_none());
    drop(nested);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(physics.steps(), frozen);

    drop(hold);
    assert!(wait_until(WAIT, || physics.steps() > frozen + 2));
    assert_eq!(physics.gravity(), Vector3::new(1.0, 0.0, 0.0));
    sim.stop();
    assert!(sim.wait_until_stopped(WAIT));
}
