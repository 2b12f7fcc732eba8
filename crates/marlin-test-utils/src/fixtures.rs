//! Reusable plugin test fixtures.
//!
//! - [`RecordingPlugin`]: records every callback and always succeeds.
//! - [`FailingPlugin`]: records like `RecordingPlugin` but faults
//!   deterministically, by error or by panic, on a chosen call.

use std::sync::{Arc, Mutex};

use marlin_core::{PhysicsError, Plugin, PluginError};

use crate::lock;

/// Callbacks a fixture plugin has received.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PluginLog {
    pub inits: u32,
    pub updates: u64,
    pub dts: Vec<f64>,
    pub resets: u32,
    pub faults: Vec<PhysicsError>,
}

/// Handle for inspecting a fixture plugin after registration.
#[derive(Clone, Default)]
pub struct PluginMonitor {
    log: Arc<Mutex<PluginLog>>,
}

impl PluginMonitor {
    pub fn log(&self) -> PluginLog {
        lock(&self.log).clone()
    }

    pub fn updates(&self) -> u64 {
        lock(&self.log).updates
    }

    pub fn inits(&self) -> u32 {
        lock(&self.log).inits
    }
}

/// Shared, ordered record of which plugin updated when.
pub type OrderLog = Arc<Mutex<Vec<String>>>;

/// A plugin that records every callback.
pub struct RecordingPlugin {
    name: String,
    monitor: PluginMonitor,
    order: Option<OrderLog>,
}

impl RecordingPlugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            monitor: PluginMonitor::default(),
            order: None,
        }
    }

    /// Also append this plugin's name to `order` on every update.
    pub fn with_order_log(mut self, order: OrderLog) -> Self {
        self.order = Some(order);
        self
    }

    pub fn monitor(&self) -> PluginMonitor {
        self.monitor.clone()
    }
}

impl Plugin for RecordingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self) -> Result<(), PluginError> {
        lock(&self.monitor.log).inits += 1;
        Ok(())
    }

    fn update(&mut self, dt_ms: f64) -> Result<(), PluginError> {
        {
            let mut log = lock(&self.monitor.log);
            log.updates += 1;
            log.dts.push(dt_ms);
        }
        if let Some(order) = &self.order {
            lock(order).push(self.name.clone());
        }
        Ok(())
    }

    fn reset(&mut self) {
        lock(&self.monitor.log).resets += 1;
    }

    fn receive_fault(&mut self, error: &PhysicsError) {
        lock(&self.monitor.log).faults.push(error.clone());
    }
}

/// How a [`FailingPlugin`] faults.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureMode {
    /// `init()` returns an error.
    Init,
    /// The nth `update()` (1-based) returns an error.
    ErrorOnUpdate(u64),
    /// The nth `update()` (1-based) panics.
    PanicOnUpdate(u64),
}

/// A plugin that faults deterministically.
pub struct FailingPlugin {
    inner: RecordingPlugin,
    mode: FailureMode,
}

impl FailingPlugin {
    pub fn new(name: impl Into<String>, mode: FailureMode) -> Self {
        Self {
            inner: RecordingPlugin::new(name),
            mode,
        }
    }

    pub fn with_order_log(mut self, order: OrderLog) -> Self {
        self.inner = self.inner.with_order_log(order);
        self
    }

    pub fn monitor(&self) -> PluginMonitor {
        self.inner.monitor()
    }
}

impl Plugin for FailingPlugin {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn init(&mut self) -> Result<(), PluginError> {
        self.inner.init()?;
        if self.mode == FailureMode::Init {
            return Err(PluginError::InitFailed {
                reason: format!("{} refused to start", self.inner.name()),
            });
        }
        Ok(())
    }

    fn update(&mut self, dt_ms: f64) -> Result<(), PluginError> {
        self.inner.update(dt_ms)?;
        let n = self.inner.monitor.updates();
        match self.mode {
            FailureMode::ErrorOnUpdate(at) if n == at => Err(PluginError::UpdateFailed {
                reason: format!("{} failed on update {n}", self.inner.name()),
            }),
            FailureMode::PanicOnUpdate(at) if n == at => {
                panic!("{} panicked on update {n}", self.inner.name())
            }
            _ => Ok(()),
        }
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn receive_fault(&mut self, error: &PhysicsError) {
        self.inner.receive_fault(error);
    }
}
