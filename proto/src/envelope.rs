// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Wire envelope shared by all transports
//!
//! ```json
//! {"event": "request:sign-message", "data": {...}, "requestId": "5f0c..."}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtoError;

/// Serialized message exchanged between channel ends
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Event name, resolved against an [EventMap][crate::EventMap]
    pub event: String,

    /// Event payload, omitted for events without data
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,

    /// Correlation id attached by `send_action` and echoed on the reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl Envelope {
    /// Create a new envelope without a correlation id
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            request_id: None,
        }
    }

    /// Attach (or clear) a correlation id
    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    /// Parse an envelope from a serialized message
    pub fn parse(s: &str) -> Result<Self, ProtoError> {
        serde_json::from_str(s).map_err(|e| ProtoError::Envelope(e.to_string()))
    }

    /// Interpret an already-deserialized message as an envelope
    pub fn from_value(v: &Value) -> Result<Self, ProtoError> {
        Self::deserialize(v).map_err(|e| ProtoError::Envelope(e.to_string()))
    }

    /// Serialize the envelope for transmission
    pub fn to_json(&self) -> String {
        // Serializing a struct of strings and values cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Fetch the envelope as a JSON value
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn omits_empty_fields() {
        let e = Envelope::new("request:get-public-key", Value::Null);
        assert_eq!(e.to_json(), r#"{"event":"request:get-public-key"}"#);
    }

    #[test]
    fn request_id_camel_case() {
        let e = Envelope::new("x", json!({"a": 1})).with_request_id(Some("abc".into()));
        let v = e.to_value();

        assert_eq!(v["requestId"], "abc");
        assert_eq!(Envelope::from_value(&v).unwrap(), e);
    }

    #[test]
    fn rejects_non_envelopes() {
        assert!(Envelope::parse("frame-ready").is_err());
        assert!(Envelope::from_value(&json!({"type": "console.log", "data": []})).is_err());
    }
}
