//! Wire envelope.
//!
//! Every frame on the socket is a JSON object with a `type` string. The
//! session layer only routes on `type`; the rest of the object is kept as an
//! opaque payload map that feature adapters decode into their own shapes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::EnvelopeError;

/// Envelope type sent on every (re)connect to announce the nickname.
pub const JOIN: &str = "join";

/// A typed JSON message exchanged over the transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Routing key (`"join"`, `"chat"`, `"users"`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Everything except `type`.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Envelope {
    /// Create an envelope with an empty payload.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Map::new(),
        }
    }

    /// Builder: add a payload field.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self.payload.insert(key.into(), value.into());
        self
    }

    /// The identity announcement `{"type":"join","nickname":...}`.
    pub fn join(nickname: &str) -> Self {
        Self::new(JOIN).with("nickname", nickname)
    }

    /// Parse a text frame.
    ///
    /// Fails for anything that is not a JSON object with a string `type`.
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        serde_json::from_str(text).map_err(EnvelopeError::Malformed)
    }

    /// Serialize to a text frame.
    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(EnvelopeError::Encode)
    }

    /// Whether this envelope has the given `type`.
    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }

    /// Look up a payload field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Decode the payload (without `type`) into a caller-defined shape.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, EnvelopeError> {
        serde_json::from_value(Value::Object(self.payload.clone())).map_err(EnvelopeError::Shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn join_serializes_exactly() {
        let json = Envelope::join("nik").to_json().unwrap();
        assert_eq!(json, r#"{"type":"join","nickname":"nik"}"#);
    }

    #[test]
    fn parse_keeps_payload_opaque() {
        let env = Envelope::parse(r#"{"type":"status","listeners":12,"extra":{"a":[1,2]}}"#)
            .unwrap();
        assert_eq!(env.kind, "status");
        assert_eq!(env.get("listeners"), Some(&json!(12)));
        assert_eq!(env.get("extra"), Some(&json!({"a": [1, 2]})));
        assert!(env.get("type").is_none());
    }

    #[test]
    fn parse_rejects_missing_type() {
        assert_matches!(
            Envelope::parse(r#"{"listeners":3}"#),
            Err(EnvelopeError::Malformed(_))
        );
    }

    #[test]
    fn parse_rejects_non_string_type() {
        assert_matches!(
            Envelope::parse(r#"{"type":7}"#),
            Err(EnvelopeError::Malformed(_))
        );
    }

    #[test]
    fn parse_rejects_non_objects() {
        for text in ["[1,2]", "\"chat\"", "not json", ""] {
            assert_matches!(Envelope::parse(text), Err(EnvelopeError::Malformed(_)), "{text}");
        }
    }

    #[test]
    fn decode_payload_shape() {
        #[derive(Deserialize)]
        struct Chat {
            nickname: String,
            text: String,
        }

        let env = Envelope::new("chat").with("nickname", "a").with("text", "hi");
        let chat: Chat = env.decode().unwrap();
        assert_eq!(chat.nickname, "a");
        assert_eq!(chat.text, "hi");
    }

    #[test]
    fn decode_shape_mismatch() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Users {
            users: Vec<String>,
        }

        let env = Envelope::new("users").with("users", "not-a-list");
        assert_matches!(env.decode::<Users>(), Err(EnvelopeError::Shape(_)));
    }

    #[test]
    fn is_matches_kind() {
        let env = Envelope::new("color");
        assert!(env.is("color"));
        assert!(!env.is("chat"));
    }
}
