use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::Simulation;

/// Simulation plus the run flag, guarded together so that a step and a
/// control command never interleave.
pub struct SimState {
    pub sim: Simulation,
    running: bool,
    // Bumped on every start so a stale loop can tell it has been replaced.
    epoch: u64,
}

impl SimState {
    pub fn new(sim: Simulation) -> Self {
        Self {
            sim,
            running: false,
            epoch: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

pub type SharedState = Arc<Mutex<SimState>>;

/// Locks the shared state. A panic in a previous holder leaves the
/// simulation usable, so poisoning is ignored.
pub fn lock(state: &SharedState) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives `Simulation::step` at a fixed period on the tokio runtime.
pub struct Scheduler {
    period: Duration,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            handle: None,
        }
    }

    /// Starts stepping. Returns false if it was already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, state: &SharedState) -> bool {
        let epoch = {
            let mut guard = lock(state);
            if guard.running {
                return false;
            }
            guard.running = true;
            guard.epoch += 1;
            guard.epoch
        };

        if let Some(old) = self.handle.take() {
            old.abort();
        }

        let state = Arc::clone(state);
        let period = self.period;
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                {
                    let mut guard = lock(&state);
                    if !guard.running || guard.epoch != epoch {
                        break;
                    }
                    guard.sim.step();
                }
            }
            debug!("Scheduler loop for epoch {epoch} exited");
        }));

        debug!("Scheduler started with period {:?}", self.period);
        true
    }

    /// Stops stepping. Once this returns no further step will run.
    /// Returns false if it was not running.
    pub fn stop(&mut self, state: &SharedState) -> bool {
        let was_running = {
            let mut guard = lock(state);
            std::mem::replace(&mut guard.running, false)
        };

        if let Some(handle) = self.handle.take() {
            handle.abort();
        }

        if was_running {
            debug!("Scheduler stopped");
        }
        was_running
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
