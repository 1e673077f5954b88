// Copyright (c) 2022-2023 The MobileCoin Foundation

/// Protocol encoding / decoding errors
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ProtoError {
    /// Message is not a valid envelope
    #[error("Invalid envelope: {0}")]
    Envelope(String),

    /// Event name not declared by the receiving map
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    /// Payload does not match the schema declared for the event
    #[error("Invalid payload for event '{event}': {reason}")]
    Schema { event: String, reason: String },

    /// Event could not be encoded
    #[error("Failed to encode event '{event}': {reason}")]
    Encode { event: String, reason: String },

    /// Invalid base58 / base64 / hex data
    #[error("Invalid {encoding} data: {reason}")]
    Encoding {
        encoding: &'static str,
        reason: String,
    },
}
