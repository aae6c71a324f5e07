//! Message values and their wire encoding.
//!
//! Frames travel over the mock wire as text. With the JSON protocol enabled
//! every outbound [`Message`] is serialized and every inbound frame that parses
//! as JSON comes back as [`Message::Json`]; anything else stays text.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A decoded message as seen by the server and the matchers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    /// Raw text frame
    Text(String),
    /// Structured value parsed from a JSON frame
    Json(Value),
}

impl Message {
    /// Create a text message
    #[must_use]
    pub fn text(data: impl Into<String>) -> Self {
        Self::Text(data.into())
    }

    /// Create a structured message from any serializable value
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::Json)
    }

    /// Check if this is a text message
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Check if this is a structured message
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self, Self::Json(_))
    }

    /// Borrow the text, if this is a text message
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Json(_) => None,
        }
    }

    /// Borrow the structured value, if any
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            Self::Text(_) => None,
        }
    }

    /// View this message as a JSON value; text becomes a JSON string
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Json(v) => v.clone(),
        }
    }

    /// Multi-line rendering used in failure reports
    #[must_use]
    pub fn pretty(&self) -> String {
        serde_json::to_string_pretty(&self.to_value()).unwrap_or_else(|_| self.to_string())
    }
}

// Deep equality: a text frame equals a JSON string holding the same text.
impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Json(a), Self::Json(b)) => a == b,
            (Self::Text(s), Self::Json(Value::String(t)))
            | (Self::Json(Value::String(t)), Self::Text(s)) => s == t,
            _ => false,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Value> for Message {
    fn from(v: Value) -> Self {
        Self::Json(v)
    }
}

impl From<&Message> for Message {
    fn from(m: &Message) -> Self {
        m.clone()
    }
}

/// Encoder/decoder between [`Message`] and wire text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageCodec {
    json_protocol: bool,
}

impl MessageCodec {
    /// Create a codec
    #[must_use]
    pub const fn new(json_protocol: bool) -> Self {
        Self { json_protocol }
    }

    /// Whether the JSON protocol is active
    #[must_use]
    pub const fn json_protocol(&self) -> bool {
        self.json_protocol
    }

    /// Encode a message to wire text.
    ///
    /// With the JSON protocol every message is serialized, so text becomes a
    /// JSON string literal. Without it, text passes through unchanged.
    #[must_use]
    pub fn encode(&self, message: &Message) -> String {
        match message {
            Message::Text(s) if !self.json_protocol => s.clone(),
            Message::Text(s) => Value::String(s.clone()).to_string(),
            Message::Json(v) => v.to_string(),
        }
    }

    /// Decode wire text. Malformed JSON is kept as text, never reported.
    #[must_use]
    pub fn decode(&self, frame: &str) -> Message {
        if self.json_protocol {
            if let Ok(value) = serde_json::from_str::<Value>(frame) {
                return Message::Json(value);
            }
        }
        Message::Text(frame.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod message_tests {
        use super::*;

        #[test]
        fn test_text_equals_json_string() {
            assert_eq!(Message::text("hi"), Message::Json(json!("hi")));
            assert_eq!(Message::Json(json!("hi")), Message::text("hi"));
            assert_ne!(Message::text("1"), Message::Json(json!(1)));
        }

        #[test]
        fn test_deep_equality() {
            let a = Message::from(json!({"type": "GREETING", "payload": {"n": [1, 2]}}));
            let b = Message::from(json!({"payload": {"n": [1, 2]}, "type": "GREETING"}));
            assert_eq!(a, b);
            let c = Message::from(json!({"type": "GREETING", "payload": {"n": [2, 1]}}));
            assert_ne!(a, c);
        }

        #[test]
        fn test_json_constructor() {
            #[derive(Serialize)]
            struct Greeting {
                payload: &'static str,
            }
            let msg = Message::json(&Greeting { payload: "hello" }).unwrap();
            assert!(msg.is_json());
            assert_eq!(msg, Message::from(json!({"payload": "hello"})));
        }

        #[test]
        fn test_untagged_deserialize() {
            let msgs: Vec<Message> = serde_json::from_str(r#"["a", {"x": 1}, 3]"#).unwrap();
            assert!(msgs[0].is_text());
            assert!(msgs[1].is_json());
            assert_eq!(msgs[2], Message::Json(json!(3)));
        }

        #[test]
        fn test_pretty() {
            assert_eq!(Message::text("hi").pretty(), "\"hi\"");
            assert!(Message::from(json!({"x": 1})).pretty().contains("\n"));
        }
    }

    mod codec_tests {
        use super::*;

        #[test]
        fn test_plain_codec_passes_text_through() {
            let codec = MessageCodec::new(false);
            assert_eq!(codec.encode(&Message::text("hello")), "hello");
            assert_eq!(codec.decode(r#"{"x":1}"#), Message::text(r#"{"x":1}"#));
        }

        #[test]
        fn test_plain_codec_serializes_values() {
            let codec = MessageCodec::new(false);
            assert_eq!(codec.encode(&Message::from(json!({"x": 1}))), r#"{"x":1}"#);
        }

        #[test]
        fn test_json_codec_parses_objects() {
            let codec = MessageCodec::new(true);
            let decoded = codec.decode(r#"{"x":1}"#);
            assert!(decoded.is_json());
            assert_eq!(decoded, Message::from(json!({"x": 1})));
        }

        #[test]
        fn test_json_codec_keeps_malformed_text() {
            let codec = MessageCodec::new(true);
            let decoded = codec.decode("{not json");
            assert_eq!(decoded.as_text(), Some("{not json"));
        }

        #[test]
        fn test_json_codec_quotes_text() {
            let codec = MessageCodec::new(true);
            let wire = codec.encode(&Message::text("hello"));
            assert_eq!(wire, "\"hello\"");
            assert_eq!(codec.decode(&wire), Message::text("hello"));
        }
    }
}
