//! Plugin activation and dispatch through the simulation thread.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use marlin_core::{Plugin, PluginError};
use marlin_engine::{shared, Collaborators, SimConfig, Simulator, UpdateMode};
use marlin_test_utils::{
    init_tracing, FailingPlugin, FailureMode, MockPhysics, OrderLog, RecordingBus,
    RecordingPlugin,
};

const WAIT: Duration = Duration::from_secs(10);

fn spawn() -> (Simulator, Arc<RecordingBus>) {
    init_tracing();
    let bus = Arc::new(RecordingBus::new());
    let collaborators = Collaborators::new(Box::new(MockPhysics::new())).with_bus(bus.clone());
    let sim = Simulator::spawn(SimConfig::default(), collaborators).expect("spawn");
    (sim, bus)
}

fn step(sim: &Simulator, ticks: u64) {
    let target = sim.ticks_completed() + ticks;
    for _ in 0..ticks {
        sim.single_step().unwrap();
    }
    assert!(sim.wait_for_ticks(target, WAIT));
    assert!(sim.wait_until_stopped(WAIT));
}

/// Signals when its update starts and blocks until released.
struct Gate {
    entered: Sender<()>,
    release: Receiver<()>,
}

impl Plugin for Gate {
    fn name(&self) -> &str {
        "gate"
    }

    fn update(&mut self, _dt_ms: f64) -> Result<(), PluginError> {
        let _ = self.entered.send(());
        let _ = self.release.recv_timeout(WAIT);
        Ok(())
    }
}

#[test]
fn plugin_added_mid_tick_waits_for_the_next_tick() {
    let (sim, _) = spawn();
    let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
    let (release_tx, release_rx) = crossbeam_channel::unbounded();
    sim.add_plugin(shared(Gate {
        entered: entered_tx,
        release: release_rx,
    }));

    sim.single_step().unwrap();
    entered_rx.recv_timeout(WAIT).expect("tick 1 dispatch started");

    let late = RecordingPlugin::new("late");
    let late_monitor = late.monitor();
    sim.add_plugin(shared(late));
    release_tx.send(()).unwrap();
    assert!(sim.wait_for_ticks(1, WAIT));
    assert!(sim.wait_until_stopped(WAIT));
    assert_eq!(late_monitor.updates(), 0);
    assert_eq!(late_monitor.inits(), 0);

    release_tx.send(()).unwrap();
    step(&sim, 1);
    assert_eq!(late_monitor.updates(), 1);
    assert_eq!(late_monitor.inits(), 1);
}

#[test]
fn dispatch_follows_registration_order() {
    let (sim, _) = spawn();
    let order: OrderLog = Arc::new(Mutex::new(Vec::new()));
    for name in ["c", "a", "b"] {
        sim.add_plugin(shared(
            RecordingPlugin::new(name).with_order_log(Arc::clone(&order)),
        ));
    }
    step(&sim, 2);
    assert_eq!(*order.lock().unwrap(), ["c", "a", "b", "c", "a", "b"]);
}

#[test]
fn faulted_plugin_is_skipped_from_the_next_tick() {
    let (sim, bus) = spawn();
    let order: OrderLog = Arc::new(Mutex::new(Vec::new()));
    let first = RecordingPlugin::new("first").with_order_log(Arc::clone(&order));
    let faulty = FailingPlugin::new("faulty", FailureMode::ErrorOnUpdate(2))
        .with_order_log(Arc::clone(&order));
    let last = RecordingPlugin::new("last").with_order_log(Arc::clone(&order));
    let faulty_monitor = faulty.monitor();
    let last_monitor = last.monitor();
    sim.add_plugin(shared(first));
    let faulty_id = sim.add_plugin(shared(faulty));
    sim.add_plugin(shared(last));

    step(&sim, 3);

    // Tick 2: the fault does not stop dispatch to "last".
    assert_eq!(
        *order.lock().unwrap(),
        ["first", "faulty", "last", "first", "faulty", "last", "first", "last"]
    );
    assert_eq!(faulty_monitor.updates(), 2);
    assert_eq!(last_monitor.updates(), 3);
    assert!(sim.plugins().is_faulted(faulty_id));
    assert!(sim.plugins().contains(faulty_id));

    let faults = bus.plugin_faults();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].0, faulty_id);
    assert_eq!(faults[0].1, "faulty");
    assert_eq!(sim.metrics().plugin_faults, 1);
    assert!(!sim.has_sim_fault());
}

#[test]
fn panicking_plugin_is_contained() {
    let (sim, bus) = spawn();
    let panicky = FailingPlugin::new("panicky", FailureMode::PanicOnUpdate(1));
    let steady = RecordingPlugin::new("steady");
    let steady_monitor = steady.monitor();
    let id = sim.add_plugin(shared(panicky));
    sim.add_plugin(shared(steady));

    step(&sim, 2);
    assert_eq!(steady_monitor.updates(), 2);
    assert!(sim.plugins().is_faulted(id));
    assert!(matches!(
        bus.plugin_faults()[0].2,
        PluginError::Panicked { .. }
    ));
}

#[test]
fn failed_init_never_activates() {
    let (sim, bus) = spawn();
    let broken = FailingPlugin::new("broken", FailureMode::Init);
    let monitor = broken.monitor();
    let id = sim.add_plugin(shared(broken));
    step(&sim, 2);
    assert_eq!(monitor.updates(), 0);
    assert!(!sim.plugins().active_ids().contains(&id));
    assert!(matches!(
        bus.plugin_faults()[0].2,
        PluginError::InitFailed { .. }
    ));
}

#[test]
fn re_enabling_a_faulted_plugin_reactivates_it() {
    let (sim, _) = spawn();
    let flaky = FailingPlugin::new("flaky", FailureMode::ErrorOnUpdate(1));
    let monitor = flaky.monitor();
    let id = sim.add_plugin(shared(flaky));
    step(&sim, 2);
    assert_eq!(monitor.updates(), 1);

    assert!(sim.switch_plugin_update_mode(id, UpdateMode::SIM));
    step(&sim, 2);
    assert_eq!(monitor.updates(), 3);
    assert!(!sim.plugins().is_faulted(id));
}

#[test]
fn removed_plugin_stops_receiving_updates() {
    let (sim, _) = spawn();
    let p = RecordingPlugin::new("gone");
    let monitor = p.monitor();
    let id = sim.add_plugin(shared(p));
    step(&sim, 1);
    assert!(sim.remove_plugin(id));
    assert!(!sim.remove_plugin(id));
    step(&sim, 2);
    assert_eq!(monitor.updates(), 1);
}

#[test]
fn gui_plugins_update_from_the_render_side() {
    let (sim, _) = spawn();
    let p = RecordingPlugin::new("overlay");
    let monitor = p.monitor();
    let id = sim.add_plugin(shared(p));
    assert!(sim.switch_plugin_update_mode(id, UpdateMode::GUI));
    // Nothing reaches a GUI plugin before its init has run.
    assert!(sim.post_graphics_update(16.0).is_empty());
    assert_eq!(monitor.inits(), 0);
    assert_eq!(monitor.updates(), 0);

    step(&sim, 2);
    assert_eq!(monitor.inits(), 1);
    assert_eq!(monitor.updates(), 0);

    let faults = sim.post_graphics_update(16.0);
    assert!(faults.is_empty());
    assert_eq!(monitor.log().dts, vec![16.0]);
    assert_eq!(monitor.inits(), 1);
}

#[test]
fn registering_one_handle_twice_dispatches_it_once() {
    let (sim, _) = spawn();
    let p = RecordingPlugin::new("twice");
    let monitor = p.monitor();
    let handle = shared(p);
    let first = sim.add_plugin(Arc::clone(&handle));
    let second = sim.add_plugin(handle);
    assert_eq!(first, second);

    step(&sim, 1);
    assert_eq!(monitor.inits(), 1);
    assert_eq!(monitor.updates(), 1);
}
