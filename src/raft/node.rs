use std::collections::HashMap;
// Use external log crate, not our own log module
use ::log::{debug, info, warn};

use super::{
    CommitPolicy, Destination, Log, LogEntry, Message, NodeId, NodeRole, Outbound, Payload,
    RaftConfig, RoleEvent, TimeoutSource,
};

/// What a node can see of the cluster while handling a message or a tick.
pub struct ClusterView<'a> {
    pub config: &'a RaftConfig,
    /// Liveness of every node, indexed by id.
    pub live: &'a [bool],
}

impl ClusterView<'_> {
    pub fn cluster_size(&self) -> usize {
        self.live.len()
    }

    pub fn active(&self) -> usize {
        self.live.iter().filter(|&&up| up).count()
    }

    pub fn majority(&self) -> usize {
        self.config.quorum.majority(self.cluster_size(), self.active())
    }

    fn is_live(&self, id: NodeId) -> bool {
        self.live.get(id).copied().unwrap_or(false)
    }
}

/// Notable transitions worth narrating to whoever watches the simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    ElectionTimeout { node: NodeId, term: u64 },
    BecameLeader { node: NodeId, term: u64 },
    SteppedDown { node: NodeId, from: NodeRole, term: u64 },
    Committed { node: NodeId, index: i64 },
}

/// Messages and narration produced while processing one input.
#[derive(Debug, Default)]
pub struct Effects {
    pub outbound: Vec<Outbound>,
    pub events: Vec<NodeEvent>,
}

#[derive(Debug, Clone)]
pub struct RaftNode {
    id: NodeId,
    role: NodeRole,
    current_term: u64,
    voted_for: Option<NodeId>,
    log: Log,
    vote_count: usize,

    // Timers, in ticks
    election_timer: u64,
    election_timeout: u64,
    heartbeat_ticks: u64,

    // Leader bookkeeping: follower id -> highest acknowledged index
    match_index: HashMap<NodeId, i64>,
}

impl RaftNode {
    pub fn new(id: NodeId, role: NodeRole, term: u64, election_timeout: u64) -> Self {
        Self {
            id,
            role,
            current_term: term,
            voted_for: None,
            log: Log::new(),
            vote_count: 0,
            election_timer: 0,
            election_timeout,
            heartbeat_ticks: 0,
            match_index: HashMap::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn current_term(&self) -> u64 {
        self.current_term
    }

    pub fn voted_for(&self) -> Option<NodeId> {
        self.voted_for
    }

    pub fn log(&self) -> &Log {
        &self.log
    }

    pub fn commit_index(&self) -> i64 {
        self.log.commit_index()
    }

    pub fn vote_count(&self) -> usize {
        self.vote_count
    }

    pub fn election_timer(&self) -> u64 {
        self.election_timer
    }

    pub fn election_timeout(&self) -> u64 {
        self.election_timeout
    }

    pub fn heartbeat_ticks(&self) -> u64 {
        self.heartbeat_ticks
    }

    pub fn is_leader(&self) -> bool {
        matches!(self.role, NodeRole::Leader)
    }

    pub fn is_active(&self) -> bool {
        self.role.is_active()
    }

    fn transition(&mut self, event: RoleEvent) {
        self.role = self.role.on(event);
    }

    fn outbound(&self, to: Destination, payload: Payload) -> Outbound {
        Outbound {
            from: self.id,
            to,
            term: self.current_term,
            payload,
        }
    }

    fn replication_payload(&self, heartbeat: bool) -> Payload {
        let log = self.log.entries().to_vec();
        let commit_index = self.log.commit_index();
        if heartbeat {
            Payload::Heartbeat { log, commit_index }
        } else {
            Payload::AppendEntries { log, commit_index }
        }
    }

    /// Handles one delivered message. Stopped nodes ignore everything.
    pub fn handle_message(&mut self, msg: &Message, view: &ClusterView<'_>, fx: &mut Effects) {
        if !self.is_active() {
            return;
        }

        // Any message from a newer term demotes us before anything else.
        if msg.term > self.current_term {
            let previous = self.role;
            self.current_term = msg.term;
            self.voted_for = None;
            self.election_timer = 0;
            self.match_index.clear();
            self.transition(RoleEvent::HigherTerm);

            if previous != NodeRole::Follower {
                info!(
                    "Node {} stepping down from {previous} on term {}",
                    self.id, self.current_term
                );
                fx.events.push(NodeEvent::SteppedDown {
                    node: self.id,
                    from: previous,
                    term: self.current_term,
                });
            }
        }

        match &msg.payload {
            Payload::Heartbeat { log, commit_index }
            | Payload::AppendEntries { log, commit_index } => {
                self.handle_append_entries(msg, log, *commit_index, fx)
            }
            Payload::RequestVote => self.handle_request_vote(msg, fx),
            Payload::VoteResponse { granted } => {
                self.handle_vote_response(msg.term, *granted, view, fx)
            }
            Payload::AppendEntriesResponse {
                success,
                match_index,
            } => self.handle_append_entries_response(msg, *success, *match_index, view, fx),
        }
    }

    fn handle_append_entries(
        &mut self,
        msg: &Message,
        log: &[LogEntry],
        leader_commit: i64,
        fx: &mut Effects,
    ) {
        // Stale leader, ignore
        if msg.term < self.current_term {
            debug!(
                "Node {} ignoring {} from {} (term {} < {})",
                self.id,
                msg.kind(),
                msg.from,
                msg.term,
                self.current_term
            );
            return;
        }

        self.transition(RoleEvent::LeaderContact);
        self.election_timer = 0;

        // Highest index we hold that is identical to the sender's entry
        let matched = match self.log.adopt_if_longer(log) {
            Some(divergent) => {
                debug!(
                    "Node {} adopted log of {} entries from {}",
                    self.id,
                    log.len(),
                    msg.from
                );
                if divergent > 0 {
                    debug!(
                        "Node {} overwrote {divergent} divergent entries without reconciliation",
                        self.id
                    );
                }
                self.log.last_index()
            }
            None => self.log.matching_prefix(log) as i64 - 1,
        };

        // Never commit past what we share with the sender
        let target = leader_commit.min(matched);
        if target > self.log.commit_index() {
            self.log.commit_to(target);
        }

        let reply = self.outbound(
            Destination::Node(msg.from),
            Payload::AppendEntriesResponse {
                success: true,
                match_index: matched,
            },
        );
        fx.outbound.push(reply);
    }

    fn handle_request_vote(&mut self, msg: &Message, fx: &mut Effects) {
        let can_vote = match self.voted_for {
            None => true,
            Some(candidate) => candidate == msg.from,
        };
        let granted = msg.term >= self.current_term && can_vote;

        if granted {
            self.voted_for = Some(msg.from);
            self.election_timer = 0;
            debug!(
                "Node {} granted vote to {} for term {}",
                self.id, msg.from, self.current_term
            );
        }

        let reply = self.outbound(Destination::Node(msg.from), Payload::VoteResponse { granted });
        fx.outbound.push(reply);
    }

    fn handle_vote_response(
        &mut self,
        term: u64,
        granted: bool,
        view: &ClusterView<'_>,
        fx: &mut Effects,
    ) {
        if self.role != NodeRole::Candidate || term != self.current_term || !granted {
            return;
        }

        self.vote_count += 1;
        if self.vote_count >= view.majority() {
            self.become_leader(fx);
        }
    }

    fn handle_append_entries_response(
        &mut self,
        msg: &Message,
        success: bool,
        match_index: i64,
        view: &ClusterView<'_>,
        fx: &mut Effects,
    ) {
        if self.role != NodeRole::Leader || msg.term != self.current_term || !success {
            return;
        }

        match view.config.commit_policy {
            CommitPolicy::Legacy => {}
            CommitPolicy::Majority => {
                self.match_index.insert(msg.from, match_index);
                self.advance_commit(view, fx);
            }
        }
    }

    /// Moves the leader's commit index to the highest index a majority holds.
    ///
    /// Only entries from the current term are committed this way; earlier
    /// ones ride along.
    fn advance_commit(&mut self, view: &ClusterView<'_>, fx: &mut Effects) {
        let majority = view.majority();
        let mut index = self.log.last_index();

        while index > self.log.commit_index() {
            if self.log.term_at(index) != Some(self.current_term) {
                break;
            }

            let replicas = 1 + self
                .match_index
                .iter()
                .filter(|&(&peer, &acked)| peer != self.id && view.is_live(peer) && acked >= index)
                .count();

            if replicas >= majority {
                self.log.commit_to(index);
                info!("Leader {} committed through index {index}", self.id);
                fx.events.push(NodeEvent::Committed {
                    node: self.id,
                    index,
                });
                return;
            }
            index -= 1;
        }
    }

    fn become_leader(&mut self, fx: &mut Effects) {
        self.transition(RoleEvent::MajorityReached);
        if self.role != NodeRole::Leader {
            return;
        }

        info!(
            "Node {} becoming leader for term {}",
            self.id, self.current_term
        );

        self.heartbeat_ticks = 0;
        self.match_index.clear();
        fx.events.push(NodeEvent::BecameLeader {
            node: self.id,
            term: self.current_term,
        });

        // Assert authority right away
        let heartbeat = self.outbound(Destination::Broadcast, self.replication_payload(true));
        fx.outbound.push(heartbeat);
    }

    /// Advances this node's timers by one tick.
    pub fn tick(
        &mut self,
        view: &ClusterView<'_>,
        timeouts: &mut dyn TimeoutSource,
        fx: &mut Effects,
    ) {
        match self.role {
            NodeRole::Stopped => {}
            NodeRole::Leader => {
                if view.config.commit_policy == CommitPolicy::Majority {
                    self.advance_commit(view, fx);
                }

                self.heartbeat_ticks += 1;
                if self.heartbeat_ticks >= view.config.heartbeat_interval {
                    self.heartbeat_ticks = 0;
                    let pending = self.log.last_index() > self.log.commit_index();
                    let payload = self.replication_payload(!pending);
                    fx.outbound.push(self.outbound(Destination::Broadcast, payload));
                }
            }
            NodeRole::Follower | NodeRole::Candidate => {
                self.election_timer += 1;
                if self.election_timer >= self.election_timeout {
                    self.start_election(view, timeouts, fx);
                }
            }
        }
    }

    fn start_election(
        &mut self,
        view: &ClusterView<'_>,
        timeouts: &mut dyn TimeoutSource,
        fx: &mut Effects,
    ) {
        warn!(
            "Node {} election timeout elapsed, starting election for term {}",
            self.id,
            self.current_term + 1
        );

        self.transition(RoleEvent::ElectionTimeout);
        self.current_term += 1;
        self.voted_for = Some(self.id);
        self.vote_count = 1;
        self.election_timer = 0;
        self.election_timeout = timeouts.next_timeout(
            self.id,
            view.config.election_timeout_min,
            view.config.election_timeout_max,
        );

        fx.events.push(NodeEvent::ElectionTimeout {
            node: self.id,
            term: self.current_term,
        });
        fx.outbound
            .push(self.outbound(Destination::Broadcast, Payload::RequestVote));

        // A lone live node is its own majority
        if self.vote_count >= view.majority() {
            self.become_leader(fx);
        }
    }

    /// Appends a client value to a leader's log and schedules replication on
    /// the next tick. Returns the new entry's index.
    pub fn append_client_value(&mut self, value: &str, heartbeat_interval: u64) -> Option<usize> {
        if !self.is_leader() {
            return None;
        }

        let index = self.log.append(self.current_term, value);
        self.heartbeat_ticks = heartbeat_interval;
        Some(index)
    }

    /// Freezes the node in place. Term, vote and log survive.
    pub fn power_off(&mut self) {
        self.transition(RoleEvent::PowerOff);
        self.vote_count = 0;
        self.match_index.clear();
    }

    /// Brings a stopped node back as a follower with a fresh timeout.
    pub fn power_on(&mut self, config: &RaftConfig, timeouts: &mut dyn TimeoutSource) {
        if self.is_active() {
            return;
        }

        self.transition(RoleEvent::PowerOn);
        self.election_timer = 0;
        self.heartbeat_ticks = 0;
        self.election_timeout = timeouts.next_timeout(
            self.id,
            config.election_timeout_min,
            config.election_timeout_max,
        );
    }
}
