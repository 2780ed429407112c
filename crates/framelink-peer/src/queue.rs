use std::collections::VecDeque;

use serde_json::Value;

use crate::handshake::HandshakeState;
use crate::identity::Role;

/// Whether a link may transmit queued messages right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Open,
    Closed,
}

impl Gate {
    /// Parents transmit only once established; children always transmit.
    pub fn for_link(role: Role, state: HandshakeState) -> Self {
        match (role, state) {
            (Role::Child, _) | (Role::Parent, HandshakeState::Established) => Gate::Open,
            (Role::Parent, HandshakeState::Pending) => Gate::Closed,
        }
    }

    pub fn is_open(self) -> bool {
        self == Gate::Open
    }
}

/// One application message awaiting transmission.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMessage {
    /// Submission sequence number, unique within its queue.
    pub seq: u64,
    /// The serialized message.
    pub payload: Value,
}

/// Ordered per-link outbound queue.
///
/// Entries leave in submission order, one at a time, and only through an open
/// gate. Nothing is reordered, merged, or deduplicated.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    entries: VecDeque<QueuedMessage>,
    next_seq: u64,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message. Never fails and never blocks.
    pub fn push(&mut self, payload: Value) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_back(QueuedMessage { seq, payload });
        seq
    }

    /// Remove the head entry if the gate is open.
    pub fn pop_ready(&mut self, gate: Gate) -> Option<QueuedMessage> {
        if gate.is_open() {
            self.entries.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every pending entry, returning how many were discarded.
    pub fn discard(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn gate_by_role_and_state() {
        assert_eq!(
            Gate::for_link(Role::Parent, HandshakeState::Pending),
            Gate::Closed
        );
        assert_eq!(
            Gate::for_link(Role::Parent, HandshakeState::Established),
            Gate::Open
        );
        assert_eq!(
            Gate::for_link(Role::Child, HandshakeState::Pending),
            Gate::Open
        );
    }

    #[test]
    fn closed_gate_holds_everything() {
        let mut queue = OutboundQueue::new();
        for n in 0..5 {
            queue.push(json!(n));
        }
        assert!(queue.pop_ready(Gate::Closed).is_none());
        assert_eq!(queue.len(), 5);
    }

    #[test]
    fn drains_in_submission_order() {
        let mut queue = OutboundQueue::new();
        queue.push(json!("a"));
        queue.push(json!("b"));
        queue.push(json!("a"));

        let drained: Vec<Value> = std::iter::from_fn(|| queue.pop_ready(Gate::Open))
            .map(|entry| entry.payload)
            .collect();
        assert_eq!(drained, vec![json!("a"), json!("b"), json!("a")]);
        assert!(queue.is_empty());
    }

    #[test]
    fn sequence_numbers_keep_increasing_after_drain() {
        let mut queue = OutboundQueue::new();
        assert_eq!(queue.push(json!(1)), 0);
        queue.pop_ready(Gate::Open);
        assert_eq!(queue.push(json!(2)), 1);
        assert_eq!(queue.pop_ready(Gate::Open).map(|entry| entry.seq), Some(1));
    }

    #[test]
    fn discard_reports_count() {
        let mut queue = OutboundQueue::new();
        queue.push(json!(1));
        queue.push(json!(2));
        assert_eq!(queue.discard(), 2);
        assert_eq!(queue.discard(), 0);
    }
}
