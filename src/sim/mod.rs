mod controller;
mod engine;
mod event_log;
mod scheduler;
mod snapshot;
mod transit;

pub use self::controller::Controller;
pub use self::engine::Simulation;
pub use self::event_log::{EventLog, EventLogEntry, Severity, DEFAULT_EVENT_CAPACITY};
pub use self::scheduler::{Scheduler, SharedState, SimState};
pub use self::snapshot::{NodeView, Snapshot};
pub use self::transit::Transit;
