//! Shared wire model for the realtime room channel.
//!
//! This crate owns the JSON frames exchanged between `client` and `server`.
//! Clients send [`ControlFrame`]s to announce room interest; the relay pushes
//! [`InboundEvent`]s, one JSON object per websocket text frame.
//!
//! SCOPING
//! =======
//! Events are filtered client-side by room. The scoping field differs by
//! event type on the wire and is kept that way for compatibility:
//! - `new-message` is scoped by `data.thread_id`
//! - `delete-message` and `delete-thread` are scoped by top-level `room_id`
//!
//! [`InboundEvent::room_id`] is the single place that knows this.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a room. Rooms are threads, so this is a thread id.
pub type RoomId = i64;

/// Error returned by [`decode_event`] and [`decode_control`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload is not JSON, or a known `type` carries a bad body.
    #[error("invalid frame json: {0}")]
    Json(#[from] serde_json::Error),
    /// The payload is a JSON value without a string `type` field.
    #[error("frame has no `type` field")]
    MissingType,
}

/// A chat message posted in a thread.
///
/// The channel passes this through untouched; only `thread_id` is read.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image: String,
    pub thread_id: RoomId,
    #[serde(default)]
    pub reported: i64,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub user_image: String,
    /// RFC 3339 timestamp as sent by the API.
    #[serde(default)]
    pub created_at: String,
    /// Marks the message that opened the thread.
    #[serde(default)]
    pub is_first: bool,
}

/// Client → relay frame announcing interest in a room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ControlFrame {
    Join { room_id: RoomId },
    Leave { room_id: RoomId },
}

impl ControlFrame {
    #[must_use]
    pub fn room_id(&self) -> RoomId {
        match self {
            Self::Join { room_id } | Self::Leave { room_id } => *room_id,
        }
    }
}

/// Relay → client event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundEvent {
    /// A message was posted. The relay also stamps `room_id`; clients ignore it.
    NewMessage {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
        data: Message,
    },
    DeleteMessage { room_id: RoomId, data: Message },
    DeleteThread { room_id: RoomId },
}

impl InboundEvent {
    /// Build a `new-message` event the way the relay emits it.
    #[must_use]
    pub fn new_message(message: Message) -> Self {
        Self::NewMessage { room_id: Some(message.thread_id), data: message }
    }

    /// Build a `delete-message` event scoped to the message's thread.
    #[must_use]
    pub fn delete_message(message: Message) -> Self {
        Self::DeleteMessage { room_id: message.thread_id, data: message }
    }

    #[must_use]
    pub fn delete_thread(room_id: RoomId) -> Self {
        Self::DeleteThread { room_id }
    }

    /// The room this event belongs to, read from the field each type is
    /// scoped by on the wire.
    #[must_use]
    pub fn room_id(&self) -> RoomId {
        match self {
            Self::NewMessage { data, .. } => data.thread_id,
            Self::DeleteMessage { room_id, .. } | Self::DeleteThread { room_id } => *room_id,
        }
    }

    /// Wire name of the event type.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewMessage { .. } => EVENT_NEW_MESSAGE,
            Self::DeleteMessage { .. } => EVENT_DELETE_MESSAGE,
            Self::DeleteThread { .. } => EVENT_DELETE_THREAD,
        }
    }
}

pub const EVENT_NEW_MESSAGE: &str = "new-message";
pub const EVENT_DELETE_MESSAGE: &str = "delete-message";
pub const EVENT_DELETE_THREAD: &str = "delete-thread";

/// Encode a value as a single JSON text frame.
#[must_use]
pub fn encode<T: Serialize>(frame: &T) -> String {
    // Serialising these derive-only types cannot fail: no maps with
    // non-string keys and no custom serializers.
    serde_json::to_string(frame).unwrap_or_default()
}

/// Decode one inbound text frame.
///
/// Returns `Ok(None)` for a well-formed frame whose `type` is not an event
/// this client understands.
///
/// # Errors
///
/// Returns [`CodecError::Json`] when the text is not JSON or a known event
/// has a malformed body, and [`CodecError::MissingType`] when `type` is absent.
pub fn decode_event(text: &str) -> Result<Option<InboundEvent>, CodecError> {
    let value: Value = serde_json::from_str(text)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(CodecError::MissingType)?;

    match kind {
        EVENT_NEW_MESSAGE | EVENT_DELETE_MESSAGE | EVENT_DELETE_THREAD => {
            Ok(Some(serde_json::from_value(value)?))
        }
        _ => Ok(None),
    }
}

/// Decode one control frame received by the relay.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for invalid JSON or an unknown `type`.
pub fn decode_control(text: &str) -> Result<ControlFrame, CodecError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
