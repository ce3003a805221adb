//! Wire format of the change stream.
//!
//! One JSON object per frame:
//!
//! ```text
//! { "event": "INSERT" | "MODIFY" | "REMOVE",
//!   "keys": { <string:string, ...> },
//!   "item"?: { "projectId", "userId", "createdAt", "name" } }
//! ```
//!
//! Decoding is the validation boundary: a frame either becomes a well-formed
//! [`ChangeEvent`] or a [`FrameError`], never something the reducer has to
//! defend against.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{EventError, FrameError};
use crate::models::{ChangeEvent, Item, ItemPatch, Keys};

/// Untyped form of a change event as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEvent {
    pub event: String,
    #[serde(default)]
    pub keys: Keys,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<serde_json::Value>,
}

impl TryFrom<WireEvent> for ChangeEvent {
    type Error = EventError;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        let WireEvent { event, keys, item } = wire;
        match event.as_str() {
            ChangeEvent::INSERT => Ok(ChangeEvent::Insert {
                keys: require_keys(ChangeEvent::INSERT, keys)?,
                item: require_item::<Item>(ChangeEvent::INSERT, item)?,
            }),
            ChangeEvent::MODIFY => Ok(ChangeEvent::Modify {
                keys: require_keys(ChangeEvent::MODIFY, keys)?,
                item: require_item::<ItemPatch>(ChangeEvent::MODIFY, item)?,
            }),
            // a stray item on REMOVE is ignored
            ChangeEvent::REMOVE => Ok(ChangeEvent::Remove {
                keys: require_keys(ChangeEvent::REMOVE, keys)?,
            }),
            _ => Ok(ChangeEvent::Unknown { event, keys }),
        }
    }
}

impl From<ChangeEvent> for WireEvent {
    fn from(event: ChangeEvent) -> Self {
        match event {
            ChangeEvent::Insert { keys, item } => WireEvent {
                event: ChangeEvent::INSERT.to_string(),
                keys,
                item: serde_json::to_value(item).ok(),
            },
            ChangeEvent::Modify { keys, item } => WireEvent {
                event: ChangeEvent::MODIFY.to_string(),
                keys,
                item: serde_json::to_value(item).ok(),
            },
            ChangeEvent::Remove { keys } => WireEvent {
                event: ChangeEvent::REMOVE.to_string(),
                keys,
                item: None,
            },
            ChangeEvent::Unknown { event, keys } => WireEvent {
                event,
                keys,
                item: None,
            },
        }
    }
}

fn require_keys(event: &'static str, keys: Keys) -> Result<Keys, EventError> {
    if keys.is_empty() {
        return Err(EventError::MissingKeys { event });
    }
    Ok(keys)
}

fn require_item<T: DeserializeOwned>(
    event: &'static str,
    item: Option<serde_json::Value>,
) -> Result<T, EventError> {
    let value = item.ok_or(EventError::MissingItem { event })?;
    serde_json::from_value(value).map_err(|e| EventError::InvalidItem {
        event,
        reason: e.to_string(),
    })
}

/// Types a transport can decode its inbound frames into.
pub trait Decode: Sized {
    fn decode(frame: &[u8]) -> Result<Self, FrameError>;
}

impl Decode for ChangeEvent {
    fn decode(frame: &[u8]) -> Result<Self, FrameError> {
        decode_event(frame)
    }
}

impl Decode for serde_json::Value {
    fn decode(frame: &[u8]) -> Result<Self, FrameError> {
        decode_frame(frame)
    }
}

/// UTF-8 decode then JSON parse a frame.
pub fn decode_frame<T: DeserializeOwned>(frame: &[u8]) -> Result<T, FrameError> {
    let text = std::str::from_utf8(frame)?;
    Ok(serde_json::from_str(text)?)
}

/// Decode and validate one change-event frame.
pub fn decode_event(frame: &[u8]) -> Result<ChangeEvent, FrameError> {
    let wire: WireEvent = decode_frame(frame)?;
    Ok(ChangeEvent::try_from(wire)?)
}

/// Serialize an outbound payload to a text frame.
pub fn encode<T: Serialize + ?Sized>(payload: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::keys;
    use serde_json::json;

    fn frame(value: serde_json::Value) -> Vec<u8> {
        value.to_string().into_bytes()
    }

    #[test]
    fn decodes_insert() {
        let event = decode_event(&frame(json!({
            "event": "INSERT",
            "keys": {"projectId": "p1", "userId": "u1"},
            "item": {"projectId": "p1", "userId": "u1", "createdAt": "t1", "name": "A"}
        })))
        .unwrap();

        assert_eq!(
            event,
            ChangeEvent::Insert {
                keys: keys([("projectId", "p1"), ("userId", "u1")]),
                item: Item::new("p1", "u1", "t1", "A"),
            }
        );
    }

    #[test]
    fn decodes_partial_modify() {
        let event = decode_event(&frame(json!({
            "event": "MODIFY",
            "keys": {"projectId": "p1", "userId": "u1"},
            "item": {"name": "B"}
        })))
        .unwrap();

        assert_eq!(
            event,
            ChangeEvent::modify(
                keys([("projectId", "p1"), ("userId", "u1")]),
                ItemPatch::name("B")
            )
        );
    }

    #[test]
    fn remove_ignores_item() {
        let event = decode_event(&frame(json!({
            "event": "REMOVE",
            "keys": {"projectId": "p1", "userId": "u1"},
            "item": {"name": "ignored"}
        })))
        .unwrap();

        assert_eq!(
            event,
            ChangeEvent::remove(keys([("projectId", "p1"), ("userId", "u1")]))
        );
    }

    #[test]
    fn unknown_discriminant_is_kept() {
        let event = decode_event(&frame(json!({"event": "TRUNCATE"}))).unwrap();
        assert_eq!(event.kind(), "TRUNCATE");
        assert!(event.keys().is_empty());
    }

    #[test]
    fn insert_without_item_is_rejected() {
        let err = decode_event(&frame(json!({
            "event": "INSERT",
            "keys": {"projectId": "p1"}
        })))
        .unwrap_err();
        assert!(matches!(
            err,
            FrameError::Invalid(EventError::MissingItem { event: "INSERT" })
        ));
    }

    #[test]
    fn incomplete_insert_item_is_rejected() {
        let err = decode_event(&frame(json!({
            "event": "INSERT",
            "keys": {"projectId": "p1"},
            "item": {"projectId": "p1"}
        })))
        .unwrap_err();
        assert!(matches!(
            err,
            FrameError::Invalid(EventError::InvalidItem { event: "INSERT", .. })
        ));
    }

    #[test]
    fn empty_keys_are_rejected() {
        let err = decode_event(&frame(json!({"event": "REMOVE", "keys": {}}))).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Invalid(EventError::MissingKeys { event: "REMOVE" })
        ));
    }

    #[test]
    fn non_string_keys_are_a_json_error() {
        let err = decode_event(&frame(json!({"event": "REMOVE", "keys": {"projectId": 7}})))
            .unwrap_err();
        assert_eq!(err.kind(), "json");
    }

    #[test]
    fn garbage_frames_are_rejected() {
        assert_eq!(decode_event(b"not json").unwrap_err().kind(), "json");
        assert_eq!(decode_event(&[0xff, 0xfe]).unwrap_err().kind(), "utf8");
    }

    #[test]
    fn serializes_with_event_tag() {
        let event = ChangeEvent::remove(keys([("projectId", "p1"), ("userId", "u1")]));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"event": "REMOVE", "keys": {"projectId": "p1", "userId": "u1"}})
        );
        assert_eq!(decode_event(&frame(value)).unwrap(), event);
    }

    #[test]
    fn value_decoder_accepts_any_json() {
        let value = serde_json::Value::decode(br#"{"type":"ping"}"#).unwrap();
        assert_eq!(value["type"], "ping");
    }
}
