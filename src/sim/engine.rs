use log::{debug, info, warn};

use super::{EventLog, Severity, Snapshot, Transit};
use crate::config::SimConfig;
use crate::raft::{
    ClusterView, Destination, Effects, Message, NodeEvent, NodeId, NodeRole, RaftConfig,
    RaftError, RaftNode, TimeoutSource,
};

/// Display name used in narration, 1-based like a cluster diagram.
fn label(id: NodeId) -> String {
    format!("S{}", id + 1)
}

/// The whole simulated cluster: nodes, messages in flight and narration.
///
/// All mutation goes through `step` and the control methods; readers take
/// a `Snapshot`.
pub struct Simulation {
    config: SimConfig,
    raft: RaftConfig,
    nodes: Vec<RaftNode>,
    transit: Transit,
    events: EventLog,
    timeouts: Box<dyn TimeoutSource>,
    tick: u64,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Result<Self, RaftError> {
        let timeouts = config.timeouts();
        Self::with_timeouts(config, timeouts)
    }

    pub fn with_timeouts(
        config: SimConfig,
        timeouts: Box<dyn TimeoutSource>,
    ) -> Result<Self, RaftError> {
        config.validate()?;

        let mut sim = Self {
            raft: config.raft(),
            transit: Transit::new(config.message_speed),
            events: EventLog::new(config.event_log_capacity),
            nodes: Vec::new(),
            timeouts,
            tick: 0,
            config,
        };
        sim.initialize(sim.config.cluster_size)?;
        Ok(sim)
    }

    /// Rebuilds the cluster: node 0 leads term 1, everyone else follows.
    pub fn initialize(&mut self, cluster_size: usize) -> Result<(), RaftError> {
        if cluster_size == 0 {
            return Err(RaftError::InvalidConfig(
                "cluster_size must be at least 1".to_string(),
            ));
        }

        self.config.cluster_size = cluster_size;
        self.nodes = (0..cluster_size)
            .map(|id| {
                let role = if id == 0 {
                    NodeRole::Leader
                } else {
                    NodeRole::Follower
                };
                let timeout = self.timeouts.next_timeout(
                    id,
                    self.raft.election_timeout_min,
                    self.raft.election_timeout_max,
                );
                RaftNode::new(id, role, 1, timeout)
            })
            .collect();
        self.transit.clear();
        self.events.clear();
        self.tick = 0;

        info!("Initialized cluster of {cluster_size} nodes");
        self.narrate(
            Severity::Info,
            format!("Cluster initialized. Node {} started as Leader.", label(0)),
        );
        Ok(())
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn nodes(&self) -> &[RaftNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&RaftNode> {
        self.nodes.get(id)
    }

    pub fn messages(&self) -> &[Message] {
        self.transit.in_flight()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// The live leader with the highest term, if any.
    pub fn leader(&self) -> Option<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.is_leader())
            .max_by_key(|n| n.current_term())
            .map(RaftNode::id)
    }

    fn liveness(&self) -> Vec<bool> {
        self.nodes.iter().map(RaftNode::is_active).collect()
    }

    fn narrate(&mut self, severity: Severity, message: impl Into<String>) {
        self.events.push(self.tick, severity, message);
    }

    /// Runs one indivisible simulation step.
    pub fn step(&mut self) {
        self.tick += 1;
        // Power state never changes inside a step
        let live = self.liveness();

        for msg in self.transit.advance() {
            let Some(target) = self.nodes.get_mut(msg.to) else {
                continue;
            };
            if !target.is_active() {
                debug!("Dropping {} to stopped node {}", msg.kind(), msg.to);
                continue;
            }

            debug!(
                "Delivering {} #{} from {} to {} (term {})",
                msg.kind(),
                msg.id,
                msg.from,
                msg.to,
                msg.term
            );
            let view = ClusterView {
                config: &self.raft,
                live: &live,
            };
            let mut fx = Effects::default();
            target.handle_message(&msg, &view, &mut fx);
            self.apply_effects(fx, &live);
        }

        for id in 0..self.nodes.len() {
            let view = ClusterView {
                config: &self.raft,
                live: &live,
            };
            let mut fx = Effects::default();
            self.nodes[id].tick(&view, self.timeouts.as_mut(), &mut fx);
            self.apply_effects(fx, &live);
        }
    }

    /// Runs `n` steps back to back.
    pub fn run_steps(&mut self, n: u64) {
        for _ in 0..n {
            self.step();
        }
    }

    fn apply_effects(&mut self, fx: Effects, live: &[bool]) {
        for out in fx.outbound {
            match out.to {
                Destination::Node(to) => {
                    self.transit.send(out.from, to, out.term, out.payload);
                }
                Destination::Broadcast => {
                    self.transit.broadcast(out.from, out.term, out.payload, live);
                }
            }
        }

        for event in fx.events {
            match event {
                NodeEvent::ElectionTimeout { node, term } => self.narrate(
                    Severity::Warning,
                    format!("{} timed out. Starting election (term {term}).", label(node)),
                ),
                NodeEvent::BecameLeader { node, term } => self.narrate(
                    Severity::Success,
                    format!("Node {} becomes LEADER (term {term}).", label(node)),
                ),
                NodeEvent::SteppedDown { node, from, term } => self.narrate(
                    Severity::Info,
                    format!("{} stepped down from {from} (term {term}).", label(node)),
                ),
                NodeEvent::Committed { node, index } => self.narrate(
                    Severity::Success,
                    format!("Leader {} committed entries through index {index}.", label(node)),
                ),
            }
        }
    }

    /// Appends a client value to the current leader's log.
    ///
    /// Returns the new entry's index on the leader. Without a leader the
    /// command is dropped and narrated as an error.
    pub fn submit_client_command(&mut self, value: &str) -> Result<usize, RaftError> {
        if value.is_empty() {
            return Err(RaftError::EmptyCommand);
        }

        let Some(leader_id) = self.leader() else {
            warn!("Rejected client command {value:?}: no leader");
            self.narrate(Severity::Error, "Write failed: no leader.");
            return Err(RaftError::NoLeader);
        };

        let interval = self.raft.heartbeat_interval;
        let index = self.nodes[leader_id]
            .append_client_value(value, interval)
            .ok_or(RaftError::NoLeader)?;

        info!("Client command {value:?} appended at index {index} on node {leader_id}");
        self.narrate(
            Severity::Info,
            format!("Client sent \"{value}\" to Leader {}.", label(leader_id)),
        );
        Ok(index)
    }

    /// Flips a node between stopped and follower. Returns its new role.
    pub fn toggle_power(&mut self, id: NodeId) -> Result<NodeRole, RaftError> {
        let node = self.nodes.get_mut(id).ok_or(RaftError::UnknownNode(id))?;

        let powering_on = !node.is_active();
        if powering_on {
            node.power_on(&self.raft, self.timeouts.as_mut());
        } else {
            node.power_off();
        }
        let role = node.role();

        info!("Node {id} power toggled, now {role}");
        let verb = if powering_on { "on" } else { "off" };
        self.narrate(
            Severity::Warning,
            format!("Node {} powered {verb}.", label(id)),
        );
        Ok(role)
    }

    pub fn snapshot(&self, running: bool) -> Snapshot {
        Snapshot {
            tick: self.tick,
            running,
            leader: self.leader(),
            nodes: self.nodes.iter().map(Into::into).collect(),
            messages: self.transit.in_flight().to_vec(),
            events: self.events.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raft::{FixedTimeouts, MessageKind};

    fn sim_with(config: SimConfig, timeouts: FixedTimeouts) -> Simulation {
        Simulation::with_timeouts(config, Box::new(timeouts)).expect("simulation")
    }

    #[test]
    fn initialize_builds_leader_and_followers() {
        let sim = sim_with(SimConfig::default(), FixedTimeouts::new());

        assert_eq!(sim.nodes().len(), 5);
        assert_eq!(sim.leader(), Some(0));
        for node in sim.nodes() {
            assert_eq!(node.current_term(), 1);
            assert!(node.log().is_empty());
            assert_eq!(node.commit_index(), -1);
        }
        assert_eq!(sim.events().len(), 1);
        assert!(sim.messages().is_empty());
    }

    #[test]
    fn initialize_rejects_empty_cluster() {
        let mut sim = sim_with(SimConfig::default(), FixedTimeouts::new());
        assert!(matches!(sim.initialize(0), Err(RaftError::InvalidConfig(_))));
    }

    #[test]
    fn first_heartbeat_leaves_at_interval() {
        let mut sim = sim_with(SimConfig::default(), FixedTimeouts::new());

        sim.run_steps(49);
        assert!(sim.messages().is_empty());

        sim.step();
        assert_eq!(sim.messages().len(), 4);
        assert!(sim
            .messages()
            .iter()
            .all(|m| m.kind() == MessageKind::Heartbeat && m.from == 0));
    }

    #[test]
    fn messages_to_stopped_nodes_are_dropped() {
        let config = SimConfig {
            cluster_size: 2,
            ..SimConfig::default()
        };
        let mut sim = sim_with(config, FixedTimeouts::new());

        sim.run_steps(50);
        assert_eq!(sim.messages().len(), 1);
        assert_eq!(sim.toggle_power(1).unwrap(), NodeRole::Stopped);
        let frozen = sim.node(1).unwrap().election_timer();

        sim.run_steps(40);
        assert!(sim.messages().is_empty());
        assert_eq!(sim.node(1).unwrap().election_timer(), frozen);
        assert_eq!(sim.node(1).unwrap().current_term(), 1);
    }

    #[test]
    fn toggle_unknown_node_is_an_error() {
        let mut sim = sim_with(SimConfig::default(), FixedTimeouts::new());
        assert!(matches!(sim.toggle_power(9), Err(RaftError::UnknownNode(9))));
    }

    #[test]
    fn empty_client_command_is_rejected() {
        let mut sim = sim_with(SimConfig::default(), FixedTimeouts::new());
        assert!(matches!(
            sim.submit_client_command(""),
            Err(RaftError::EmptyCommand)
        ));
        assert!(sim.node(0).unwrap().log().is_empty());
    }

    #[test]
    fn snapshot_is_detached_copy() {
        let mut sim = sim_with(SimConfig::default(), FixedTimeouts::new());
        sim.submit_client_command("x=1").unwrap();
        let snap = sim.snapshot(false);

        sim.run_steps(5);

        assert_eq!(snap.tick, 0);
        assert_eq!(snap.leader, Some(0));
        assert_eq!(snap.nodes[0].log.len(), 1);
        assert_eq!(snap.events[0].message, "Client sent \"x=1\" to Leader S1.");
        assert!(snap.to_json().unwrap().contains("\"role\": \"Leader\""));
    }
}
