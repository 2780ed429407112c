//! Cross-document channel abstraction.
//!
//! Provides a unified interface over the ways two documents can exchange
//! string packets:
//! - `window.postMessage` between a page and its embedded frames (`web` feature)
//! - A deterministic in-memory bus for tests and simulations
//!
//! This is the lowest layer of framelink. Everything else builds on top of
//! the [`Transport`] trait and the host-document traits provided here.

pub mod error;
pub mod host;
pub mod memory;
pub mod traits;

#[cfg(feature = "web")]
pub mod web;

pub use error::{Result, TransportError};
pub use host::{FrameCandidate, FrameElement, HostDocument};
pub use memory::{MemoryBus, MemoryDocument, MemoryFrame, MemoryTransport, PostedPacket, WindowId};
pub use traits::{ListenerId, ReceiveCallback, Transport};

#[cfg(feature = "web")]
pub use web::{IframeHandle, WindowDocument, WindowTransport, WILDCARD_ORIGIN};
