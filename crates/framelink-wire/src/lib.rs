//! Envelope framing for cross-document protocol packets.
//!
//! Every protocol packet on the shared channel is a JSON string:
//! - `fromId`: the sending child's identifier (absent when sent by a parent)
//! - `payload`: the inner message, itself JSON-encoded to a string
//! - a fixed marker key set to `true`
//!
//! Anything else seen on the channel is foreign traffic and decodes to `None`.

pub mod codec;
pub mod control;
pub mod error;

pub use codec::{decode, encode, to_payload, Envelope, Marker, Packet, MARKER_KEY};
pub use control::{
    is_internal, is_private, ControlMessage, PrivateMessage, StateMessage, Tagged, INTERNAL_KEY,
    KIND_MOUNTED, KIND_SET_STATE,
};
pub use error::{Result, WireError};
