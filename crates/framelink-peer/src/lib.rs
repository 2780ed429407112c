//! Parent/child link management over a cross-document channel.
//!
//! This is the "just works" layer. A parent binds a [`Link`] to each embedded
//! frame it addresses; a child starts a single [`Link`] to its parent. Links
//! handle the identity handshake, hold outbound messages until the peer is
//! known, deliver them in order, and keep traffic for sibling frames apart.
//! [`SharedState`] layers a last-write-wins value on top of a link.

pub mod clock;
pub mod config;
pub mod error;
pub mod handshake;
pub mod identity;
pub mod link;
pub mod observers;
pub mod queue;
pub mod router;
pub mod shared_state;

pub use clock::{next_timestamp, Clock, ManualClock, SystemClock};
pub use config::{LinkConfig, DEFAULT_QUEUE_WARN_DEPTH};
pub use error::{LinkError, Result};
pub use handshake::{announce, Handshake, HandshakeState};
pub use identity::{discover_child, resolve_parent, LinkIdentity, Role};
pub use link::{Dispatcher, Link, LinkBuilder, MessageHandler};
pub use observers::{Subscribers, SubscriptionId};
pub use queue::{Gate, OutboundQueue, QueuedMessage};
pub use router::{route, route_wire, Discard, Route};
pub use shared_state::{SharedState, StateRecord};
