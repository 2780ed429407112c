use framelink_wire::{decode, is_internal, ControlMessage, Packet, PrivateMessage};
use serde_json::Value;

use crate::identity::LinkIdentity;

/// Where an inbound packet goes.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// A child's `mounted` announcement, for the handshake controller only.
    Handshake { id: String },
    /// A `set-state` broadcast accepted by this link, for state links only.
    State(Value),
    /// An application message accepted by this link.
    Deliver(Value),
    /// Dropped without any report to the sender.
    Discard(Discard),
}

/// Why a packet was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discard {
    /// Not a protocol packet (foreign channel traffic or malformed).
    Foreign,
    /// Carries the internal tag but is not a valid control message.
    MalformedControl,
    /// Traffic from a frame this parent link is not bound to.
    Unaddressed { from_id: Option<String> },
}

/// Classify a decoded packet for one link.
///
/// Internally tagged messages never come back as [`Route::Deliver`]. A parent
/// accepts application and state traffic only from the child it is bound to;
/// this keeps sibling frames that share the parent's channel apart. A child
/// has a single parent and accepts everything.
pub fn route(identity: &LinkIdentity, packet: Packet<Value>) -> Route {
    let internal = is_internal(&packet.message);
    if internal {
        match serde_json::from_value::<PrivateMessage>(packet.message.clone()) {
            Ok(message) => match message.body {
                ControlMessage::Mounted { id } => return Route::Handshake { id },
                ControlMessage::SetState { .. } => {}
            },
            Err(_) => return Route::Discard(Discard::MalformedControl),
        }
    }

    if let LinkIdentity::Parent { expected_id } = identity {
        if packet.from_id.as_deref() != Some(expected_id.as_str()) {
            return Route::Discard(Discard::Unaddressed {
                from_id: packet.from_id,
            });
        }
    }

    if internal {
        Route::State(packet.message)
    } else {
        Route::Deliver(packet.message)
    }
}

/// Decode a raw channel string and classify it for one link.
pub fn route_wire(identity: &LinkIdentity, wire: &str) -> Route {
    match decode::<Value>(wire) {
        Some(packet) => route(identity, packet),
        None => Route::Discard(Discard::Foreign),
    }
}

#[cfg(test)]
mod tests {
    use framelink_wire::encode;
    use serde_json::json;

    use super::*;

    fn parent(id: &str) -> LinkIdentity {
        LinkIdentity::Parent {
            expected_id: id.to_string(),
        }
    }

    fn child(id: &str) -> LinkIdentity {
        LinkIdentity::Child {
            local_id: id.to_string(),
        }
    }

    #[test]
    fn announcement_goes_to_handshake() {
        let wire = encode(&PrivateMessage::mounted("b"), Some("b")).unwrap();
        assert_eq!(
            route_wire(&parent("a"), &wire),
            Route::Handshake {
                id: "b".to_string()
            }
        );
        assert_eq!(
            route_wire(&child("a"), &wire),
            Route::Handshake {
                id: "b".to_string()
            }
        );
    }

    #[test]
    fn parent_accepts_only_bound_child() {
        let from_a = encode(&json!({"type": "hi"}), Some("a")).unwrap();
        let from_b = encode(&json!({"type": "hi"}), Some("b")).unwrap();

        assert_eq!(
            route_wire(&parent("a"), &from_a),
            Route::Deliver(json!({"type": "hi"}))
        );
        assert_eq!(
            route_wire(&parent("a"), &from_b),
            Route::Discard(Discard::Unaddressed {
                from_id: Some("b".to_string())
            })
        );
    }

    #[test]
    fn parent_rejects_anonymous_application_traffic() {
        let anonymous = encode(&json!(1), None).unwrap();
        assert_eq!(
            route_wire(&parent("a"), &anonymous),
            Route::Discard(Discard::Unaddressed { from_id: None })
        );
    }

    #[test]
    fn child_accepts_any_application_traffic() {
        let anonymous = encode(&json!({"type": "ping"}), None).unwrap();
        let stamped = encode(&json!({"type": "ping"}), Some("elsewhere")).unwrap();
        assert_eq!(
            route_wire(&child("a"), &anonymous),
            Route::Deliver(json!({"type": "ping"}))
        );
        assert_eq!(
            route_wire(&child("a"), &stamped),
            Route::Deliver(json!({"type": "ping"}))
        );
    }

    #[test]
    fn malformed_announcement_is_discarded() {
        let wire = encode(
            &json!({"__framelinkInternal": true, "kind": "mounted"}),
            Some("a"),
        )
        .unwrap();
        assert_eq!(
            route_wire(&parent("a"), &wire),
            Route::Discard(Discard::MalformedControl)
        );
    }

    #[test]
    fn foreign_traffic_is_discarded() {
        assert_eq!(
            route_wire(&parent("a"), "webpackHotUpdate"),
            Route::Discard(Discard::Foreign)
        );
        assert_eq!(
            route_wire(&child("a"), r#"{"type":"ping"}"#),
            Route::Discard(Discard::Foreign)
        );
    }

    #[test]
    fn state_broadcast_is_state_traffic() {
        let wire = encode(
            &framelink_wire::StateMessage::set_state(json!(3), 10),
            Some("a"),
        )
        .unwrap();
        match route_wire(&parent("a"), &wire) {
            Route::State(value) => assert_eq!(value["state"], json!(3)),
            other => panic!("unexpected route {other:?}"),
        }
        assert!(matches!(route_wire(&child("a"), &wire), Route::State(_)));
    }

    #[test]
    fn state_broadcast_from_sibling_is_unaddressed() {
        let wire = encode(
            &framelink_wire::StateMessage::set_state(json!(3), 10),
            Some("b"),
        )
        .unwrap();
        assert_eq!(
            route_wire(&parent("a"), &wire),
            Route::Discard(Discard::Unaddressed {
                from_id: Some("b".to_string())
            })
        );
    }

    #[test]
    fn unknown_internal_kind_is_discarded() {
        let wire = encode(
            &json!({"__framelinkInternal": true, "kind": "resize", "height": 10}),
            None,
        )
        .unwrap();
        assert_eq!(
            route_wire(&child("a"), &wire),
            Route::Discard(Discard::MalformedControl)
        );
    }
}
