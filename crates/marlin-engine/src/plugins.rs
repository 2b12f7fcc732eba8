//! Plugin lifecycle across the all / new / active / GUI sets.
//!
//! Entries live in an insertion-ordered arena keyed by [`PluginId`]. The
//! four sets are views over that arena:
//!
//! - **all**: every registered plugin, until it is removed.
//! - **new**: waiting for the activation pass the simulation thread runs
//!   once per iteration, before the tick. A plugin added or re-enabled
//!   mid-tick therefore never sees a partial tick.
//! - **active**: receives `update()` every tick, in registration order.
//! - **gui**: updated from the rendering thread via
//!   [`dispatch_gui`](PluginRegistry::dispatch_gui).
//!
//! Dispatch copies the relevant set under the lock and calls plugins with
//! the lock released, so other threads may add or remove plugins while a
//! tick is in progress.

use std::any::Any;
use std::ops::BitOr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;
use tracing::{debug, warn};

use marlin_core::{PhysicsError, Plugin, PluginError, PluginId};

/// A plugin shared between its loader and the registry.
pub type SharedPlugin = Arc<Mutex<dyn Plugin>>;

/// Wrap a plugin for registration.
pub fn shared<P: Plugin + 'static>(plugin: P) -> SharedPlugin {
    Arc::new(Mutex::new(plugin))
}

/// Which dispatch sets a plugin belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct UpdateMode(u8);

impl UpdateMode {
    /// No updates.
    pub const NONE: Self = Self(0);
    /// Updated by the simulation thread every tick.
    pub const SIM: Self = Self(1);
    /// Updated by the rendering thread every frame.
    pub const GUI: Self = Self(2);

    /// Build from raw flag bits; unknown bits are dropped.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0b11)
    }

    /// Raw flag bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if every flag in `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for UpdateMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A contained plugin failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PluginFault {
    /// The plugin that faulted.
    pub plugin: PluginId,
    /// Its registered name.
    pub name: String,
    /// What went wrong.
    pub error: PluginError,
}

struct PluginEntry {
    name: String,
    plugin: SharedPlugin,
    mode: UpdateMode,
    initialised: bool,
    faulted: bool,
}

#[derive(Default)]
struct RegistryInner {
    all: IndexMap<PluginId, PluginEntry>,
    new: IndexSet<PluginId>,
    active: IndexSet<PluginId>,
    gui: IndexSet<PluginId>,
    next_id: u64,
}

type Batch = SmallVec<[(PluginId, SharedPlugin); 8]>;

/// Thread-safe registry of plugins and their dispatch sets.
#[derive(Default)]
pub struct PluginRegistry {
    inner: Mutex<RegistryInner>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run a plugin callback, converting a panic into [`PluginError::Panicked`].
fn guarded<F>(plugin: &SharedPlugin, f: F) -> Result<(), PluginError>
where
    F: FnOnce(&mut dyn Plugin) -> Result<(), PluginError>,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut guard = plugin.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }));
    match outcome {
        Ok(result) => result,
        Err(payload) => Err(PluginError::Panicked {
            message: panic_message(payload.as_ref()),
        }),
    }
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a plugin for simulation updates.
    ///
    /// It joins "all" and "new"; the next activation pass initialises it
    /// and moves it into "active". Adding a handle that is already
    /// registered returns its existing id.
    pub fn add(&self, plugin: SharedPlugin) -> PluginId {
        let name = plugin
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .name()
            .to_string();
        let mut inner = self.lock();
        if let Some((&id, _)) = inner
            .all
            .iter()
            .find(|(_, e)| Arc::ptr_eq(&e.plugin, &plugin))
        {
            debug!(plugin = %id, %name, "plugin already registered");
            return id;
        }
        let id = PluginId(inner.next_id);
        inner.next_id += 1;
        inner.all.insert(
            id,
            PluginEntry {
                name,
                plugin,
                mode: UpdateMode::SIM,
                initialised: false,
                faulted: false,
            },
        );
        inner.new.insert(id);
        id
    }

    /// Remove a plugin from every set. Returns `false` if it was unknown.
    pub fn remove(&self, id: PluginId) -> bool {
        let mut inner = self.lock();
        inner.new.shift_remove(&id);
        inner.active.shift_remove(&id);
        inner.gui.shift_remove(&id);
        inner.all.shift_remove(&id).is_some()
    }

    /// Change which dispatch sets a plugin belongs to, keeping it in "all".
    ///
    /// Enabling [`UpdateMode::SIM`] routes the plugin through "new", so it
    /// rejoins "active" at the next activation pass. Enabling
    /// [`UpdateMode::GUI`] on a plugin that was never initialised also
    /// routes it through "new"; it joins "gui" once `init` succeeds.
    /// Re-enabling clears a previous fault. Returns `false` if the plugin
    /// is unknown.
    pub fn switch_update_mode(&self, id: PluginId, mode: UpdateMode) -> bool {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let Some(entry) = inner.all.get_mut(&id) else {
            return false;
        };
        entry.mode = mode;
        let wants_sim = mode.contains(UpdateMode::SIM);
        let wants_gui = mode.contains(UpdateMode::GUI);
        let awaiting_init = wants_gui && !entry.initialised;
        if wants_sim || awaiting_init {
            entry.faulted = false;
        }

        if wants_sim {
            if !inner.active.contains(&id) {
                inner.new.insert(id);
            }
        } else {
            inner.active.shift_remove(&id);
        }

        if awaiting_init {
            inner.gui.shift_remove(&id);
            inner.new.insert(id);
        } else if wants_gui {
            inner.gui.insert(id);
            inner.gui.sort();
        } else {
            inner.gui.shift_remove(&id);
        }

        if !wants_sim && !awaiting_init {
            inner.new.shift_remove(&id);
        }
        true
    }

    /// Run the activation pass: initialise each entry in "new" (once per
    /// plugin lifetime), merge successes into "active" in registration
    /// order, and clear "new".
    ///
    /// Must be called on the simulation thread between ticks.
    pub fn activate_new(&self) -> Vec<PluginFault> {
        let pending: SmallVec<[(PluginId, SharedPlugin, bool); 4]> = {
            let mut inner = self.lock();
            let ids: SmallVec<[PluginId; 4]> = inner.new.drain(..).collect();
            ids.into_iter()
                .filter_map(|id| {
                    inner
                        .all
                        .get(&id)
                        .map(|e| (id, Arc::clone(&e.plugin), e.initialised))
                })
                .collect()
        };

        let mut faults = Vec::new();
        for (id, plugin, initialised) in pending {
            let result = if initialised {
                Ok(())
            } else {
                guarded(&plugin, |p| p.init())
            };
            let mut guard = self.lock();
            let inner = &mut *guard;
            let Some(entry) = inner.all.get_mut(&id) else {
                continue;
            };
            match result {
                Ok(()) => {
                    entry.initialised = true;
                    if entry.mode.contains(UpdateMode::SIM) {
                        debug!(plugin = %id, name = %entry.name, "plugin activated");
                        inner.active.insert(id);
                        inner.active.sort();
                    }
                    if entry.mode.contains(UpdateMode::GUI) {
                        inner.gui.insert(id);
                        inner.gui.sort();
                    }
                }
                Err(error) => {
                    let error = match error {
                        PluginError::UpdateFailed { reason } => PluginError::InitFailed { reason },
                        other => other,
                    };
                    entry.faulted = true;
                    warn!(plugin = %id, name = %entry.name, %error, "plugin failed to initialise");
                    faults.push(PluginFault {
                        plugin: id,
                        name: entry.name.clone(),
                        error,
                    });
                }
            }
        }
        faults
    }

    fn snapshot(&self, gui: bool) -> Batch {
        let inner = self.lock();
        let set = if gui { &inner.gui } else { &inner.active };
        set.iter()
            .filter_map(|id| inner.all.get(id).map(|e| (*id, Arc::clone(&e.plugin))))
            .collect()
    }

    fn isolate(&self, id: PluginId, error: PluginError, gui: bool) -> PluginFault {
        let mut inner = self.lock();
        if gui {
            inner.gui.shift_remove(&id);
        } else {
            inner.active.shift_remove(&id);
        }
        let name = match inner.all.get_mut(&id) {
            Some(entry) => {
                entry.faulted = true;
                entry.name.clone()
            }
            None => String::new(),
        };
        warn!(plugin = %id, %name, %error, "plugin faulted and was deactivated");
        PluginFault {
            plugin: id,
            name,
            error,
        }
    }

    fn dispatch(&self, dt_ms: f64, gui: bool) -> Vec<PluginFault> {
        let mut faults = Vec::new();
        for (id, plugin) in self.snapshot(gui) {
            if let Err(error) = guarded(&plugin, |p| p.update(dt_ms)) {
                faults.push(self.isolate(id, error, gui));
            }
        }
        faults
    }

    /// Update every active plugin in registration order.
    ///
    /// A faulting plugin is removed from "active" and the remaining
    /// plugins are still updated.
    pub fn dispatch_sim(&self, dt_ms: f64) -> Vec<PluginFault> {
        self.dispatch(dt_ms, false)
    }

    /// Update every GUI plugin. Called from the rendering thread.
    pub fn dispatch_gui(&self, dt_ms: f64) -> Vec<PluginFault> {
        self.dispatch(dt_ms, true)
    }

    /// Call `reset()` on every registered plugin.
    pub fn reset_all(&self) {
        let all: Batch = {
            let inner = self.lock();
            inner
                .all
                .iter()
                .map(|(id, e)| (*id, Arc::clone(&e.plugin)))
                .collect()
        };
        for (id, plugin) in all {
            if let Err(error) = guarded(&plugin, |p| {
                p.reset();
                Ok(())
            }) {
                warn!(plugin = %id, %error, "plugin reset failed");
            }
        }
    }

    /// Forward a physics fault to every active plugin.
    pub fn notify_fault(&self, fault: &PhysicsError) {
        for (id, plugin) in self.snapshot(false) {
            if let Err(error) = guarded(&plugin, |p| {
                p.receive_fault(fault);
                Ok(())
            }) {
                warn!(plugin = %id, %error, "plugin fault handler failed");
            }
        }
    }

    /// Take every plugin out of simulation dispatch, keeping it registered.
    ///
    /// GUI plugins still waiting for their first `init` stay queued.
    pub fn deactivate_all(&self) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.active.clear();
        for entry in inner.all.values_mut() {
            entry.mode = UpdateMode::from_bits(entry.mode.bits() & !UpdateMode::SIM.bits());
        }
        let all = &inner.all;
        inner.new.retain(|id| {
            all.get(id)
                .is_some_and(|e| e.mode.contains(UpdateMode::GUI) && !e.initialised)
        });
    }

    /// Make exactly the plugins named in `names` simulation-active.
    ///
    /// Named plugins are queued for activation; every other plugin leaves
    /// simulation dispatch. Returns how many named plugins were found.
    pub fn restore_active(&self, names: &[String]) -> usize {
        let ids: Vec<(PluginId, UpdateMode, bool)> = {
            let inner = self.lock();
            inner
                .all
                .iter()
                .map(|(id, e)| (*id, e.mode, names.contains(&e.name)))
                .collect()
        };
        let mut found = 0;
        for (id, mode, wanted) in ids {
            let gui = UpdateMode::from_bits(mode.bits() & UpdateMode::GUI.bits());
            let next = if wanted {
                found += 1;
                gui | UpdateMode::SIM
            } else {
                gui
            };
            self.switch_update_mode(id, next);
        }
        found
    }

    /// Names of the active plugins (plus those pending activation), in
    /// dispatch order.
    pub fn active_names(&self) -> Vec<String> {
        let inner = self.lock();
        let mut ids: Vec<PluginId> = inner.active.iter().chain(inner.new.iter()).copied().collect();
        ids.sort();
        ids.dedup();
        ids.iter()
            .filter_map(|id| inner.all.get(id).map(|e| e.name.clone()))
            .collect()
    }

    /// Every registered id, in registration order.
    pub fn ids(&self) -> Vec<PluginId> {
        self.lock().all.keys().copied().collect()
    }

    /// Ids in "active", in dispatch order.
    pub fn active_ids(&self) -> Vec<PluginId> {
        self.lock().active.iter().copied().collect()
    }

    /// Ids waiting in "new".
    pub fn pending_ids(&self) -> Vec<PluginId> {
        self.lock().new.iter().copied().collect()
    }

    /// Ids in "gui".
    pub fn gui_ids(&self) -> Vec<PluginId> {
        self.lock().gui.iter().copied().collect()
    }

    /// True if `id` is registered.
    pub fn contains(&self, id: PluginId) -> bool {
        self.lock().all.contains_key(&id)
    }

    /// True if `id` faulted and has not been re-enabled since.
    pub fn is_faulted(&self, id: PluginId) -> bool {
        self.lock().all.get(&id).is_some_and(|e| e.faulted)
    }

    /// True once `init` has succeeded for `id`.
    pub fn is_initialised(&self, id: PluginId) -> bool {
        self.lock().all.get(&id).is_some_and(|e| e.initialised)
    }

    /// Registered name of `id`.
    pub fn name(&self, id: PluginId) -> Option<String> {
        self.lock().all.get(&id).map(|e| e.name.clone())
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.lock().all.len()
    }

    /// True if no plugins are registered.
    pub fn is_empty(&self) -> bool {
        self.lock().all.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        name: String,
        updates: Arc<AtomicUsize>,
        fail_on: Option<usize>,
        panic_on: Option<usize>,
    }

    impl Counter {
        fn new(name: &str) -> (Self, Arc<AtomicUsize>) {
            let updates = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    name: name.to_string(),
                    updates: Arc::clone(&updates),
                    fail_on: None,
                    panic_on: None,
                },
                updates,
            )
        }
    }

    impl Plugin for Counter {
        fn name(&self) -> &str {
            &self.name
        }

        fn update(&mut self, _dt_ms: f64) -> Result<(), PluginError> {
            let n = self.updates.fetch_add(1, Ordering::SeqCst) + 1;
            if self.panic_on == Some(n) {
                panic!("boom at {n}");
            }
            if self.fail_on == Some(n) {
                return Err(PluginError::UpdateFailed {
                    reason: format!("failed at {n}"),
                });
            }
            Ok(())
        }
    }

    struct BadInit;

    impl Plugin for BadInit {
        fn name(&self) -> &str {
            "bad_init"
        }

        fn init(&mut self) -> Result<(), PluginError> {
            Err(PluginError::InitFailed {
                reason: "missing config".into(),
            })
        }

        fn update(&mut self, _dt_ms: f64) -> Result<(), PluginError> {
            Ok(())
        }
    }

    #[test]
    fn added_plugin_waits_for_activation() {
        let reg = PluginRegistry::new();
        let (p, updates) = Counter::new("a");
        let id = reg.add(shared(p));
        assert_eq!(reg.pending_ids(), vec![id]);
        assert!(reg.dispatch_sim(10.0).is_empty());
        assert_eq!(updates.load(Ordering::SeqCst), 0);

        assert!(reg.activate_new().is_empty());
        assert!(reg.pending_ids().is_empty());
        reg.dispatch_sim(10.0);
        assert_eq!(updates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispatch_follows_registration_order() {
        let reg = PluginRegistry::new();
        let ids: Vec<PluginId> = ["a", "b", "c"]
            .iter()
            .map(|n| reg.add(shared(Counter::new(n).0)))
            .collect();
        reg.activate_new();
        // Toggle the first one off and on; it must return to its rank.
        reg.switch_update_mode(ids[0], UpdateMode::NONE);
        reg.switch_update_mode(ids[0], UpdateMode::SIM);
        reg.activate_new();
        assert_eq!(reg.active_ids(), ids);
    }

    #[test]
    fn faulting_plugin_is_isolated() {
        let reg = PluginRegistry::new();
        let (mut bad, bad_updates) = Counter::new("bad");
        bad.fail_on = Some(1);
        let (good, good_updates) = Counter::new("good");
        let bad_id = reg.add(shared(bad));
        let good_id = reg.add(shared(good));
        reg.activate_new();

        let faults = reg.dispatch_sim(10.0);
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].plugin, bad_id);
        assert_eq!(good_updates.load(Ordering::SeqCst), 1);

        reg.dispatch_sim(10.0);
        assert_eq!(bad_updates.load(Ordering::SeqCst), 1);
        assert_eq!(good_updates.load(Ordering::SeqCst), 2);
        assert!(reg.is_faulted(bad_id));
        assert_eq!(reg.active_ids(), vec![good_id]);
        assert!(reg.contains(bad_id));
    }

    #[test]
    fn panicking_plugin_is_isolated() {
        let reg = PluginRegistry::new();
        let (mut p, _) = Counter::new("panicky");
        p.panic_on = Some(1);
        let id = reg.add(shared(p));
        reg.activate_new();
        let faults = reg.dispatch_sim(1.0);
        assert_eq!(faults.len(), 1);
        assert!(matches!(faults[0].error, PluginError::Panicked { .. }));
        assert!(reg.active_ids().is_empty());
        assert!(reg.is_faulted(id));
    }

    #[test]
    fn failed_init_never_activates() {
        let reg = PluginRegistry::new();
        let id = reg.add(shared(BadInit));
        let faults = reg.activate_new();
        assert_eq!(faults.len(), 1);
        assert!(matches!(faults[0].error, PluginError::InitFailed { .. }));
        assert!(reg.active_ids().is_empty());
        assert!(reg.contains(id));
    }

    #[test]
    fn remove_is_idempotent() {
        let reg = PluginRegistry::new();
        let id = reg.add(shared(Counter::new("a").0));
        reg.activate_new();
        reg.switch_update_mode(id, UpdateMode::SIM | UpdateMode::GUI);
        assert!(reg.remove(id));
        assert!(!reg.remove(id));
        assert!(reg.active_ids().is_empty());
        assert!(reg.gui_ids().is_empty());
        assert!(reg.is_empty());
    }

    #[test]
    fn gui_mode_keeps_plugin_in_all() {
        let reg = PluginRegistry::new();
        let (p, updates) = Counter::new("hud");
        let id = reg.add(shared(p));
        reg.activate_new();
        reg.switch_update_mode(id, UpdateMode::GUI);
        assert!(reg.active_ids().is_empty());
        assert_eq!(reg.gui_ids(), vec![id]);
        reg.dispatch_gui(16.0);
        assert_eq!(updates.load(Ordering::SeqCst), 1);
        assert_eq!(reg.ids(), vec![id]);
    }

    struct Lifecycle {
        events: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Plugin for Lifecycle {
        fn name(&self) -> &str {
            "lifecycle"
        }

        fn init(&mut self) -> Result<(), PluginError> {
            self.events.lock().unwrap().push("init");
            Ok(())
        }

        fn update(&mut self, _dt_ms: f64) -> Result<(), PluginError> {
            self.events.lock().unwrap().push("update");
            Ok(())
        }
    }

    #[test]
    fn gui_only_plugin_is_initialised_before_first_update() {
        let reg = PluginRegistry::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let id = reg.add(shared(Lifecycle {
            events: Arc::clone(&events),
        }));
        reg.switch_update_mode(id, UpdateMode::GUI);

        // Not in "gui" until the activation pass has run init.
        assert!(reg.gui_ids().is_empty());
        assert!(reg.dispatch_gui(16.0).is_empty());
        assert!(events.lock().unwrap().is_empty());

        assert!(reg.activate_new().is_empty());
        assert_eq!(reg.gui_ids(), vec![id]);
        assert!(reg.active_ids().is_empty());
        reg.dispatch_gui(16.0);
        reg.dispatch_gui(16.0);
        assert_eq!(*events.lock().unwrap(), vec!["init", "update", "update"]);
    }

    #[test]
    fn gui_plugin_waiting_for_init_survives_deactivate_all() {
        let reg = PluginRegistry::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let id = reg.add(shared(Lifecycle {
            events: Arc::clone(&events),
        }));
        reg.switch_update_mode(id, UpdateMode::GUI);
        reg.deactivate_all();
        reg.activate_new();
        assert_eq!(reg.gui_ids(), vec![id]);
        assert_eq!(*events.lock().unwrap(), vec!["init"]);
    }

    #[test]
    fn adding_the_same_handle_twice_registers_once() {
        let reg = PluginRegistry::new();
        let (p, updates) = Counter::new("once");
        let handle = shared(p);
        let first = reg.add(Arc::clone(&handle));
        let second = reg.add(handle);
        assert_eq!(first, second);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.pending_ids(), vec![first]);

        reg.activate_new();
        reg.dispatch_sim(10.0);
        assert_eq!(updates.load(Ordering::SeqCst), 1);
        assert_eq!(reg.active_ids(), vec![first]);
    }

    #[test]
    fn restore_active_by_name() {
        let reg = PluginRegistry::new();
        let a = reg.add(shared(Counter::new("a").0));
        let b = reg.add(shared(Counter::new("b").0));
        reg.activate_new();
        reg.deactivate_all();
        assert!(reg.active_names().is_empty());
        assert_eq!(reg.restore_active(&["b".to_string()]), 1);
        reg.activate_new();
        assert_eq!(reg.active_ids(), vec![b]);
        assert!(!reg.active_ids().contains(&a));
    }

    #[derive(Clone, Debug)]
    enum Op {
        Add,
        Remove(usize),
        Switch(usize, u8),
        Activate,
        Dispatch,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Add),
            (0usize..8).prop_map(Op::Remove),
            (0usize..8, 0u8..4).prop_map(|(i, m)| Op::Switch(i, m)),
            Just(Op::Activate),
            Just(Op::Dispatch),
        ]
    }

    proptest! {
        #[test]
        fn sets_stay_consistent(ops in prop::collection::vec(op(), 0..80)) {
            let reg = PluginRegistry::new();
            let mut known: Vec<PluginId> = Vec::new();
            for op in ops {
                match op {
                    Op::Add => known.push(reg.add(shared(Counter::new("p").0))),
                    Op::Remove(i) => {
                        if let Some(id) = known.get(i) {
                            reg.remove(*id);
                        }
                    }
                    Op::Switch(i, m) => {
                        if let Some(id) = known.get(i) {
                            reg.switch_update_mode(*id, UpdateMode::from_bits(m));
                        }
                    }
                    Op::Activate => { reg.activate_new(); }
                    Op::Dispatch => { reg.dispatch_sim(1.0); }
                }
                let all = reg.ids();
                let active = reg.active_ids();
                let pending = reg.pending_ids();
                let gui = reg.gui_ids();
                prop_assert!(active.iter().all(|id| all.contains(id)));
                prop_assert!(pending.iter().all(|id| all.contains(id)));
                prop_assert!(gui.iter().all(|id| all.contains(id)));
                prop_assert!(active.iter().all(|id| !pending.contains(id)));
                prop_assert!(active.windows(2).all(|w| w[0] < w[1]));
                prop_assert!(gui.iter().all(|id| reg.is_initialised(*id)));
            }
        }
    }
}
