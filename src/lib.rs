// Consensus core: node state machine, log, messages
pub mod raft;

// Cluster engine: transit, event log, scheduler, control surface
pub mod sim;

pub mod config;
pub mod repl;

// Public exports
pub use config::SimConfig;
pub use sim::{Controller, Simulation, Snapshot};
