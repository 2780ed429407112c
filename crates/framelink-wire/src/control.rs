//! Protocol-owned inner messages.
//!
//! These travel inside an [`crate::Envelope`] like application messages but
//! carry an internal tag so they can never be mistaken for caller payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::Marker;

/// Key of the internal tag carried by protocol-owned inner messages.
pub const INTERNAL_KEY: &str = "__framelinkInternal";

/// `kind` of the child's identity announcement.
pub const KIND_MOUNTED: &str = "mounted";

/// `kind` of a shared-state broadcast.
pub const KIND_SET_STATE: &str = "set-state";

/// An inner message carrying the internal tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tagged<T> {
    #[serde(rename = "__framelinkInternal")]
    pub marker: Marker,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Tagged<T> {
    pub fn new(body: T) -> Self {
        Self {
            marker: Marker,
            body,
        }
    }
}

/// Internal message kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ControlMessage<S = Value> {
    /// A child announcing its identifier to the parent.
    Mounted { id: String },
    /// A shared-state value stamped with the sender's wall-clock time.
    SetState { state: S, timestamp: u64 },
}

/// Handshake traffic. Only the `Mounted` variant is ever sent this way.
pub type PrivateMessage = Tagged<ControlMessage>;

/// Shared-state traffic carrying a typed state value.
pub type StateMessage<S> = Tagged<ControlMessage<S>>;

impl<S> Tagged<ControlMessage<S>> {
    /// A `mounted` announcement for `id`.
    pub fn mounted(id: impl Into<String>) -> Self {
        Self::new(ControlMessage::Mounted { id: id.into() })
    }

    /// A `set-state` broadcast.
    pub fn set_state(state: S, timestamp: u64) -> Self {
        Self::new(ControlMessage::SetState { state, timestamp })
    }
}

/// True if a decoded inner message carries the internal tag.
///
/// Tagged messages belong to the protocol and never reach application
/// handlers.
pub fn is_internal(message: &Value) -> bool {
    message.get(INTERNAL_KEY) == Some(&Value::Bool(true))
}

/// True if a decoded inner message is handshake traffic.
///
/// Both the internal tag and `kind: "mounted"` must be present; an application
/// payload that happens to use `kind: "mounted"` is not private.
pub fn is_private(message: &Value) -> bool {
    is_internal(message)
        && message.get("kind").and_then(Value::as_str) == Some(KIND_MOUNTED)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn mounted_wire_shape() {
        let value = serde_json::to_value(PrivateMessage::mounted("frame-1")).unwrap();
        assert_eq!(
            value,
            json!({"__framelinkInternal": true, "kind": "mounted", "id": "frame-1"})
        );
        assert!(is_private(&value));
    }

    #[test]
    fn set_state_wire_shape() {
        let value = serde_json::to_value(StateMessage::set_state(json!({"n": 1}), 42)).unwrap();
        assert_eq!(
            value,
            json!({
                "__framelinkInternal": true,
                "kind": "set-state",
                "state": {"n": 1},
                "timestamp": 42
            })
        );
        assert!(!is_private(&value));
        assert!(is_internal(&value));
    }

    #[test]
    fn typed_state_roundtrip() {
        let message = StateMessage::set_state(vec![1u8, 2, 3], 9);
        let text = serde_json::to_string(&message).unwrap();
        let parsed: StateMessage<Vec<u8>> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn untagged_kind_is_application_traffic() {
        assert!(!is_private(&json!({"kind": "mounted", "id": "x"})));
        assert!(!is_private(
            &json!({"__framelinkInternal": false, "kind": "mounted", "id": "x"})
        ));
        assert!(!is_private(&json!("mounted")));
        assert!(!is_internal(&json!({"kind": "set-state", "state": 1})));
    }

    #[test]
    fn untagged_object_does_not_parse_as_control() {
        let result = serde_json::from_value::<PrivateMessage>(json!({"kind": "mounted", "id": "x"}));
        assert!(result.is_err());
    }

    #[test]
    fn kind_constants_match_serde_names() {
        let mounted = serde_json::to_value(PrivateMessage::mounted("a")).unwrap();
        assert_eq!(mounted["kind"], json!(KIND_MOUNTED));
        let state = serde_json::to_value(StateMessage::set_state(0u8, 1)).unwrap();
        assert_eq!(state["kind"], json!(KIND_SET_STATE));
        assert!(state.get(INTERNAL_KEY).is_some());
    }
}
