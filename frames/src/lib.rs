//! Wire envelope and protobuf codec for board topics.
//!
//! Every message that crosses a broadcast topic is a [`Frame`]: a small
//! routing header (topic, sender, event name) plus a free-form JSON payload.
//! Clients type the payload on their side; the relay never looks inside it.
//! On the wire the frame is a protobuf message with the payload carried as a
//! `google.protobuf.Value`.

use std::time::{SystemTime, UNIX_EPOCH};

use prost::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Largest integer an `f64` carries exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Error returned by [`decode_frame`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The raw bytes are not a protobuf `WireFrame`.
    #[error("failed to decode protobuf frame: {0}")]
    Decode(#[from] prost::DecodeError),
    /// The frame has no topic to route on.
    #[error("frame has no topic")]
    MissingTopic,
    /// The frame has no event name to dispatch on.
    #[error("frame has no event name")]
    MissingEvent,
}

/// A single message on a board topic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Unique identifier for this frame (UUID string).
    pub id: String,
    /// Milliseconds since the Unix epoch when the frame was created.
    pub ts: i64,
    /// Topic the frame is published on, e.g. `board:<uuid>`.
    pub topic: String,
    /// Sending actor, if the sender chose to stamp one.
    pub from: Option<String>,
    /// Event name, e.g. `element_update`.
    pub event: String,
    /// Event payload.
    pub data: Value,
}

impl Frame {
    /// Fresh frame with a random id and the current time.
    #[must_use]
    pub fn new(topic: impl Into<String>, event: impl Into<String>, data: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            ts: now_ms(),
            topic: topic.into(),
            from: None,
            event: event.into(),
            data,
        }
    }

    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }
}

/// Milliseconds since the Unix epoch, saturating on clock errors.
#[must_use]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

/// Encode a frame into protobuf bytes.
#[must_use]
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let wire = WireFrame {
        id: frame.id.clone(),
        ts: frame.ts,
        topic: frame.topic.clone(),
        from: frame.from.clone(),
        event: frame.event.clone(),
        data: Some(json_to_proto_value(&frame.data)),
    };
    // `encode_to_vec` sizes the buffer up front, so encoding cannot fail.
    wire.encode_to_vec()
}

/// Decode protobuf bytes into a frame.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed bytes, and
/// [`CodecError::MissingTopic`] / [`CodecError::MissingEvent`] for frames
/// that cannot be routed.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    let wire = WireFrame::decode(bytes)?;
    if wire.topic.is_empty() {
        return Err(CodecError::MissingTopic);
    }
    if wire.event.is_empty() {
        return Err(CodecError::MissingEvent);
    }
    Ok(Frame {
        id: wire.id,
        ts: wire.ts,
        topic: wire.topic,
        from: wire.from,
        event: wire.event,
        data: wire.data.map_or(Value::Object(Map::new()), |v| proto_to_json_value(&v)),
    })
}

// =============================================================================
// JSON <-> google.protobuf.Value
// =============================================================================

fn json_to_proto_value(value: &Value) -> prost_types::Value {
    use prost_types::value::Kind;

    let kind = match value {
        Value::Null => Kind::NullValue(prost_types::NullValue::NullValue as i32),
        Value::Bool(v) => Kind::BoolValue(*v),
        Value::Number(v) => Kind::NumberValue(v.as_f64().unwrap_or(0.0)),
        Value::String(v) => Kind::StringValue(v.clone()),
        Value::Array(v) => {
            Kind::ListValue(prost_types::ListValue { values: v.iter().map(json_to_proto_value).collect() })
        }
        Value::Object(v) => Kind::StructValue(prost_types::Struct {
            fields: v.iter().map(|(k, v)| (k.clone(), json_to_proto_value(v))).collect(),
        }),
    };
    prost_types::Value { kind: Some(kind) }
}

fn proto_to_json_value(value: &prost_types::Value) -> Value {
    use prost_types::value::Kind;

    let Some(kind) = &value.kind else {
        return Value::Null;
    };
    match kind {
        Kind::NullValue(_) => Value::Null,
        Kind::NumberValue(v) => number_to_json(*v),
        Kind::StringValue(v) => Value::String(v.clone()),
        Kind::BoolValue(v) => Value::Bool(*v),
        Kind::StructValue(v) => {
            Value::Object(v.fields.iter().map(|(k, v)| (k.clone(), proto_to_json_value(v))).collect())
        }
        Kind::ListValue(v) => Value::Array(v.values.iter().map(proto_to_json_value).collect()),
    }
}

/// Protobuf numbers are all doubles. Whole values come back as JSON
/// integers so integer fields on the receiving side still deserialize.
#[allow(clippy::cast_possible_truncation)]
fn number_to_json(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() <= MAX_SAFE_INTEGER {
        return Value::from(v as i64);
    }
    serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
}

#[derive(Clone, PartialEq, Message)]
struct WireFrame {
    #[prost(string, tag = "1")]
    id: String,
    #[prost(int64, tag = "2")]
    ts: i64,
    #[prost(string, tag = "3")]
    topic: String,
    #[prost(string, optional, tag = "4")]
    from: Option<String>,
    #[prost(string, tag = "5")]
    event: String,
    #[prost(message, optional, tag = "6")]
    data: Option<prost_types::Value>,
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
