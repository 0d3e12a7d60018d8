use log::trace;

use crate::raft::{Message, NodeId, Payload};

/// In-flight messages and their progress towards delivery.
#[derive(Debug, Clone)]
pub struct Transit {
    in_flight: Vec<Message>,
    speed: f64,
    next_id: u64,
}

impl Transit {
    pub fn new(speed: f64) -> Self {
        Self {
            in_flight: Vec::new(),
            speed,
            next_id: 1,
        }
    }

    pub fn in_flight(&self) -> &[Message] {
        &self.in_flight
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    pub fn clear(&mut self) {
        self.in_flight.clear();
    }

    /// Enqueues one message at progress 0 and returns its id.
    pub fn send(&mut self, from: NodeId, to: NodeId, term: u64, payload: Payload) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.in_flight.push(Message {
            id,
            from,
            to,
            term,
            payload,
            progress: 0.0,
            speed: self.speed,
        });
        id
    }

    /// Sends a copy of `payload` to every live node except the sender.
    ///
    /// `live` is indexed by node id. Returns how many messages were queued.
    pub fn broadcast(&mut self, from: NodeId, term: u64, payload: Payload, live: &[bool]) -> usize {
        let mut sent = 0;
        for (to, &up) in live.iter().enumerate() {
            if to == from || !up {
                continue;
            }
            self.send(from, to, term, payload.clone());
            sent += 1;
        }
        sent
    }

    /// Moves every message forward one tick and returns those that arrived,
    /// in enqueue order. The rest keep their relative order.
    pub fn advance(&mut self) -> Vec<Message> {
        let (arrived, remaining): (Vec<Message>, Vec<Message>) = self
            .in_flight
            .drain(..)
            .map(|mut msg| {
                msg.progress += msg.speed;
                msg
            })
            .partition(Message::has_arrived);

        self.in_flight = remaining;
        trace!(
            "Transit advanced: {} arrived, {} in flight",
            arrived.len(),
            self.in_flight.len()
        );
        arrived
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_skips_sender_and_stopped_nodes() {
        let mut transit = Transit::new(2.5);
        let live = [true, true, false, true];

        let sent = transit.broadcast(0, 1, Payload::RequestVote, &live);

        assert_eq!(sent, 2);
        let targets: Vec<NodeId> = transit.in_flight().iter().map(|m| m.to).collect();
        assert_eq!(targets, vec![1, 3]);
        assert!(transit.in_flight().iter().all(|m| m.progress == 0.0 && m.term == 1));
    }

    #[test]
    fn message_arrives_after_hundred_over_speed_ticks() {
        let mut transit = Transit::new(25.0);
        transit.send(0, 1, 1, Payload::RequestVote);

        for _ in 0..3 {
            assert!(transit.advance().is_empty());
        }
        let arrived = transit.advance();
        assert_eq!(arrived.len(), 1);
        assert_eq!(arrived[0].progress, 100.0);
        assert!(transit.is_empty());
    }

    #[test]
    fn arrivals_keep_enqueue_order() {
        let mut transit = Transit::new(50.0);
        let a = transit.send(0, 1, 1, Payload::RequestVote);
        let b = transit.send(2, 1, 1, Payload::RequestVote);
        transit.advance();
        let c = transit.send(3, 1, 1, Payload::RequestVote);

        let arrived: Vec<u64> = transit.advance().iter().map(|m| m.id).collect();
        assert_eq!(arrived, vec![a, b]);
        assert_eq!(transit.in_flight()[0].id, c);
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let mut transit = Transit::new(2.5);
        let first = transit.send(0, 1, 1, Payload::RequestVote);
        let second = transit.send(1, 0, 1, Payload::VoteResponse { granted: true });
        assert!(second > first);
    }
}
