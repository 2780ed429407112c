use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::Result;

/// Key of the boolean marker identifying protocol packets on the channel.
pub const MARKER_KEY: &str = "__framelink";

/// A field that serializes as `true` and only deserializes from `true`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Marker;

impl Serialize for Marker {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bool(true)
    }
}

impl<'de> Deserialize<'de> for Marker {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if bool::deserialize(deserializer)? {
            Ok(Marker)
        } else {
            Err(de::Error::custom("protocol marker must be true"))
        }
    }
}

/// The wire-level wrapper around one protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Identifier of the sending child, absent when sent by a parent.
    #[serde(rename = "fromId", default, skip_serializing_if = "Option::is_none")]
    pub from_id: Option<String>,
    /// The inner message, JSON-encoded.
    pub payload: String,
    #[serde(rename = "__framelink")]
    marker: Marker,
}

impl Envelope {
    /// Wrap an already-encoded inner payload.
    pub fn new(from_id: Option<String>, payload: String) -> Self {
        Self {
            from_id,
            payload,
            marker: Marker,
        }
    }

    /// Parse a channel string as an envelope, or `None` for foreign traffic.
    pub fn parse(wire: &str) -> Option<Self> {
        match serde_json::from_str(wire) {
            Ok(envelope) => Some(envelope),
            Err(err) => {
                tracing::trace!(error = %err, size = wire.len(), "ignoring non-protocol packet");
                None
            }
        }
    }
}

/// A decoded inbound message with the sender identifier it carried.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet<M> {
    pub message: M,
    pub from_id: Option<String>,
}

/// Encode a message into the channel wire format.
///
/// Wire format:
/// ```text
/// {"fromId":"frame-1","payload":"{\"type\":\"ping\"}","__framelink":true}
/// ```
pub fn encode<M: Serialize + ?Sized>(message: &M, from_id: Option<&str>) -> Result<String> {
    let payload = serde_json::to_string(message)?;
    let envelope = Envelope::new(from_id.map(str::to_string), payload);
    Ok(serde_json::to_string(&envelope)?)
}

/// Decode a channel string.
///
/// Returns `None` (never an error) when the string is not JSON, lacks the
/// marker, carries a marker other than `true`, or its inner payload does not
/// parse as `M`. The channel carries unrelated traffic, so none of these are
/// reported.
pub fn decode<M: DeserializeOwned>(wire: &str) -> Option<Packet<M>> {
    let envelope = Envelope::parse(wire)?;
    match serde_json::from_str(&envelope.payload) {
        Ok(message) => Some(Packet {
            message,
            from_id: envelope.from_id,
        }),
        Err(err) => {
            tracing::trace!(error = %err, from_id = ?envelope.from_id, "ignoring undecodable payload");
            None
        }
    }
}

/// Serialize a message to a JSON value, surfacing serialization failures.
pub fn to_payload<M: Serialize + ?Sized>(message: &M) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(message)?)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::{json, Value};

    use super::*;
    use crate::error::WireError;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Ping {
        #[serde(rename = "type")]
        kind: String,
        seq: u32,
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let message = Ping {
            kind: "ping".to_string(),
            seq: 7,
        };

        let wire = encode(&message, Some("frame-1")).unwrap();
        let packet: Packet<Ping> = decode(&wire).unwrap();

        assert_eq!(packet.message, message);
        assert_eq!(packet.from_id.as_deref(), Some("frame-1"));
    }

    #[test]
    fn test_roundtrip_without_sender() {
        let wire = encode(&json!({"type": "ping"}), None).unwrap();
        let packet: Packet<Value> = decode(&wire).unwrap();

        assert_eq!(packet.message, json!({"type": "ping"}));
        assert!(packet.from_id.is_none());
    }

    #[test]
    fn test_wire_shape() {
        let wire = encode(&json!({"type": "ping"}), Some("a")).unwrap();
        let value: Value = serde_json::from_str(&wire).unwrap();

        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert_eq!(object["fromId"], json!("a"));
        assert_eq!(object[MARKER_KEY], json!(true));

        let inner = object["payload"].as_str().unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(inner).unwrap(),
            json!({"type": "ping"})
        );
    }

    #[test]
    fn test_absent_sender_is_omitted() {
        let wire = encode(&json!(1), None).unwrap();
        let value: Value = serde_json::from_str(&wire).unwrap();
        assert!(value.get("fromId").is_none());
    }

    #[test]
    fn test_foreign_traffic_is_ignored() {
        let foreign = [
            "",
            "hello",
            "42",
            "[]",
            "{}",
            r#"{"payload":"{}"}"#,
            r#"{"payload":"{}","__framelink":false}"#,
            r#"{"payload":"{}","__framelink":"true"}"#,
            r#"{"payload":"{}","__framelink":1}"#,
            r#"{"payload":{},"__framelink":true}"#,
            r#"{"payload":"not json","__framelink":true}"#,
            r#"{"fromId":5,"payload":"{}","__framelink":true}"#,
        ];
        for wire in foreign {
            assert!(decode::<Value>(wire).is_none(), "decoded {wire:?}");
        }
    }

    #[test]
    fn test_null_sender_and_extra_keys_accepted() {
        let wire = r#"{"fromId":null,"payload":"{\"x\":1}","__framelink":true,"extra":0}"#;
        let packet: Packet<Value> = decode(wire).unwrap();
        assert_eq!(packet.message, json!({"x": 1}));
        assert!(packet.from_id.is_none());
    }

    #[test]
    fn test_payload_type_mismatch_is_ignored() {
        let wire = encode(&json!({"type": "ping"}), None).unwrap();
        assert!(decode::<Ping>(&wire).is_none());
    }

    #[test]
    fn test_unserializable_message_fails() {
        let mut map = BTreeMap::new();
        map.insert((1u8, 2u8), "tuple keys are not JSON object keys");

        let result = encode(&map, None);
        assert!(matches!(result, Err(WireError::Encode(_))));
        assert!(matches!(to_payload(&map), Err(WireError::Encode(_))));
    }
}
