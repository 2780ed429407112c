use std::fmt;

use framelink_transport::Transport;
use framelink_wire::{encode, PrivateMessage};

use crate::error::Result;
use crate::identity::LinkIdentity;

/// Handshake progress of one link. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    /// The peer's identity is not yet confirmed.
    Pending,
    /// Ordinary traffic may flow.
    Established,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeState::Pending => f.write_str("pending"),
            HandshakeState::Established => f.write_str("established"),
        }
    }
}

/// Per-link handshake state machine.
///
/// A child establishes itself optimistically once it has announced its
/// identifier. A parent establishes only when the child it is bound to
/// announces itself. There is no acknowledgement, retry, or timeout: a lost
/// announcement leaves the parent pending for the life of the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    state: HandshakeState,
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

impl Handshake {
    pub fn new() -> Self {
        Self {
            state: HandshakeState::Pending,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_established(&self) -> bool {
        self.state == HandshakeState::Established
    }

    /// Record that a child sent its announcement.
    ///
    /// Returns `true` if this call moved the link to `Established`.
    pub fn mark_announced(&mut self) -> bool {
        self.establish()
    }

    /// Observe a `mounted` announcement carrying `announced_id`.
    ///
    /// Only a parent whose expected identifier matches transitions; children
    /// and parents bound to other frames ignore it. Returns `true` if this call
    /// moved the link to `Established`.
    pub fn observe_mounted(&mut self, identity: &LinkIdentity, announced_id: &str) -> bool {
        match identity {
            LinkIdentity::Parent { expected_id } if expected_id == announced_id => self.establish(),
            _ => false,
        }
    }

    fn establish(&mut self) -> bool {
        let changed = self.state == HandshakeState::Pending;
        self.state = HandshakeState::Established;
        changed
    }
}

/// Send a child's `mounted` announcement directly on the transport.
///
/// Handshake traffic never waits in the outbound queue.
pub fn announce(transport: &dyn Transport, local_id: &str) -> Result<()> {
    let wire = encode(&PrivateMessage::mounted(local_id), Some(local_id))?;
    transport.send(&wire)?;
    Ok(())
}
