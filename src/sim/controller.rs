use std::sync::{Arc, Mutex};

use log::info;

use super::scheduler::{lock, Scheduler, SharedState, SimState};
use super::{Simulation, Snapshot};
use crate::config::SimConfig;
use crate::raft::{NodeId, NodeRole, RaftError};

/// Owner of a running simulation and its scheduler.
///
/// Every method takes the same lock the scheduler uses for a step, so control
/// commands always land between steps.
pub struct Controller {
    state: SharedState,
    scheduler: Scheduler,
}

impl Controller {
    pub fn new(config: SimConfig) -> Result<Self, RaftError> {
        Ok(Self::from_simulation(Simulation::new(config)?))
    }

    pub fn from_simulation(sim: Simulation) -> Self {
        let scheduler = Scheduler::new(sim.config().tick_period());
        Self {
            state: Arc::new(Mutex::new(SimState::new(sim))),
            scheduler,
        }
    }

    /// Starts the scheduler. Needs a tokio runtime.
    pub fn start(&mut self) -> bool {
        let started = self.scheduler.start(&self.state);
        if started {
            info!("Simulation running");
        }
        started
    }

    pub fn pause(&mut self) -> bool {
        let paused = self.scheduler.stop(&self.state);
        if paused {
            info!("Simulation paused");
        }
        paused
    }

    pub fn is_running(&self) -> bool {
        lock(&self.state).is_running()
    }

    /// Runs `n` steps immediately, regardless of the scheduler. Returns the
    /// tick reached.
    ///
    /// The lock is taken per step, so scheduled steps and other commands can
    /// interleave with a long run.
    pub fn step(&self, n: u64) -> u64 {
        let mut tick = lock(&self.state).sim.tick();
        for _ in 0..n {
            let mut guard = lock(&self.state);
            guard.sim.step();
            tick = guard.sim.tick();
        }
        tick
    }

    /// Stops the scheduler and rebuilds the cluster, optionally resized.
    pub fn reset(&mut self, cluster_size: Option<usize>) -> Result<(), RaftError> {
        self.scheduler.stop(&self.state);
        let mut guard = lock(&self.state);
        let size = cluster_size.unwrap_or(guard.sim.config().cluster_size);
        guard.sim.initialize(size)
    }

    pub fn submit_client_command(&self, value: &str) -> Result<usize, RaftError> {
        lock(&self.state).sim.submit_client_command(value)
    }

    pub fn toggle_power(&self, id: NodeId) -> Result<NodeRole, RaftError> {
        lock(&self.state).sim.toggle_power(id)
    }

    pub fn snapshot(&self) -> Snapshot {
        let guard = lock(&self.state);
        guard.sim.snapshot(guard.is_running())
    }

    /// Runs `f` against the simulation while holding the step lock.
    pub fn inspect<R>(&self, f: impl FnOnce(&Simulation) -> R) -> R {
        f(&lock(&self.state).sim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raft::FixedTimeouts;

    fn controller() -> Controller {
        let sim = Simulation::with_timeouts(SimConfig::default(), Box::new(FixedTimeouts::new()))
            .expect("simulation");
        Controller::from_simulation(sim)
    }

    #[test]
    fn manual_steps_advance_tick() {
        let ctl = controller();
        assert_eq!(ctl.step(3), 3);
        assert_eq!(ctl.snapshot().tick, 3);
        assert!(!ctl.is_running());
    }

    #[test]
    fn concurrent_reader_gets_the_lock_during_long_run() {
        let ctl = controller();
        let state = Arc::clone(&ctl.state);

        let observer = std::thread::spawn(move || {
            let mut seen = 0;
            while seen == 0 {
                seen = lock(&state).sim.tick();
            }
            seen
        });
        assert_eq!(ctl.step(20_000), 20_000);

        let seen = observer.join().expect("observer thread");
        assert!((1..=20_000).contains(&seen));
    }

    #[test]
    fn reset_can_resize_cluster() {
        let mut ctl = controller();
        ctl.step(60);
        ctl.reset(Some(3)).unwrap();

        let snap = ctl.snapshot();
        assert_eq!(snap.tick, 0);
        assert_eq!(snap.nodes.len(), 3);
        assert!(snap.messages.is_empty());
        assert_eq!(snap.events.len(), 1);
        assert_eq!(ctl.inspect(|sim| sim.config().cluster_size), 3);
    }

    #[test]
    fn control_commands_pass_through() {
        let ctl = controller();
        assert_eq!(ctl.submit_client_command("x=1").unwrap(), 0);
        assert_eq!(ctl.toggle_power(2).unwrap(), NodeRole::Stopped);
        assert_eq!(ctl.toggle_power(2).unwrap(), NodeRole::Follower);
    }
}
