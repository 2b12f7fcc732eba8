//! The simulation thread's main loop.
//!
//! One iteration:
//!
//! ```text
//! WAIT -> DRAIN_REQUESTS -> MERGE_NEW_PLUGINS -> PHYSICS_TICK
//!      -> PLUGIN_DISPATCH -> PUBLISH_STATE -> GRAPHICS_SYNC -> (pace) -> WAIT
//! ```
//!
//! The loop blocks in the stepping controller while stopped, but a
//! submitted request kicks it awake so the queue is serviced regardless
//! of run state. Exit is observed at the top of an iteration; a tick in
//! progress always completes.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing::{debug, info};

use crate::config::GraphicsSyncPolicy;
use crate::context::SimShared;
use crate::metrics::ms_to_us;
use crate::pacing::RealtimePacer;
use crate::stepping::{TickMode, Wake};
use crate::tick::TickEngine;

/// State held by the simulation thread's main loop.
pub(crate) struct SimThreadState {
    engine: TickEngine,
    shared: Arc<SimShared>,
    pacer: RealtimePacer,
    max_catchup_ticks: u32,
}

impl SimThreadState {
    pub fn new(engine: TickEngine, shared: Arc<SimShared>, max_catchup_ticks: u32) -> Self {
        Self {
            engine,
            shared,
            pacer: RealtimePacer::new(),
            max_catchup_ticks,
        }
    }

    /// Main loop. Runs until exit is requested.
    ///
    /// Returns the number of queued requests abandoned at shutdown.
    pub fn run(mut self) -> usize {
        self.shared.requests.bind_owner();
        info!(status = %self.shared.stepping.status(), "simulation thread started");

        let mut free_running = false;
        loop {
            let mode = match self.shared.stepping.wait_for_work() {
                Wake::Exit => break,
                Wake::Service => {
                    free_running = false;
                    self.engine.process_requests();
                    continue;
                }
                Wake::Tick(mode) => mode,
            };
            if mode != TickMode::Running || !free_running {
                self.pacer.reset_lag();
            }
            free_running = mode == TickMode::Running;

            // 1. Drain requests. A load or save may have stopped us.
            self.engine.process_requests();
            if !self.shared.stepping.is_running() {
                continue;
            }

            // 2. Activate plugins added since the last tick.
            self.engine.merge_new_plugins();

            // 3. Tick, dispatch, publish, sync graphics.
            self.run_batch(mode);
        }

        let abandoned = self.shared.requests.close();
        self.shared.gate.close();
        info!(
            tick = %self.engine.current_tick(),
            sim_time_ms = self.engine.sim_time_ms(),
            abandoned,
            "simulation thread exiting"
        );
        abandoned
    }

    fn run_batch(&mut self, mode: TickMode) {
        let mirror = self.shared.properties.snapshot();
        let planned = match mode {
            TickMode::Running => self.pacer.plan(&mirror, self.max_catchup_ticks),
            TickMode::Stepping => 1,
        };
        let every_tick = self.engine.graphics_policy() == GraphicsSyncPolicy::EveryTick;

        let batch_start = Instant::now();
        let mut ran = 0u32;
        for i in 0..planned {
            // A stop mid-batch ends catch-up at the tick boundary.
            if i > 0 && !self.shared.stepping.is_free_running() {
                break;
            }
            if self.engine.execute_tick(mirror.timestep_ms).is_err() {
                break;
            }
            self.shared.stepping.finish_tick(mode);
            ran += 1;
            if every_tick {
                self.engine.sync_graphics(&mirror);
            }
        }
        if ran > 0 && !every_tick {
            self.engine.sync_graphics(&mirror);
        }
        if ran > 1 {
            debug!(ticks = ran, "fast-step catch-up");
        }

        if mode == TickMode::Running && ran > 0 {
            let sleep = self.pacer.settle(
                &mirror,
                ran,
                batch_start.elapsed(),
                self.max_catchup_ticks,
            );
            let (drift_ms, lag_ms) = (self.pacer.drift_ms(), self.pacer.lag_ms());
            self.shared.metrics.update(|m| {
                m.catchup_ticks += u64::from(ran - 1);
                m.drift_us = ms_to_us(drift_ms);
                m.lag_us = ms_to_us(lag_ms);
            });
            // park_timeout rather than sleep so exit can unpark us.
            if let Some(remaining) = sleep {
                let deadline = Instant::now() + remaining;
                while !self.shared.stepping.exit_requested() {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    thread::park_timeout(deadline - now);
                }
            }
        }
    }
}
