//! Structured messaging and shared state between a document and the frames it
//! embeds.
//!
//! A parent page binds one link per embedded frame; each framed document runs
//! a single link back to its parent. Links announce the child, hold outbound
//! messages until the parent knows who it is talking to, deliver them in
//! order, and keep sibling frames apart on the shared channel.
//!
//! # Crate Structure
//!
//! - [`transport`]: channel abstraction, host-document traits, in-memory bus,
//!   and the browser `postMessage` transport (behind `web`)
//! - [`wire`]: envelope codec and protocol control messages
//! - [`peer`]: links, handshake, ordered queue, routing, shared state (behind
//!   `peer`)

/// Re-export transport types.
pub mod transport {
    pub use framelink_transport::*;
}

/// Re-export wire types.
pub mod wire {
    pub use framelink_wire::*;
}

/// Re-export link types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use framelink_peer::*;
}
