// Copyright (c) 2022-2023 The MobileCoin Foundation

use std::time::Duration;

use frame_signer_proto::{ErrorResponse, ProtoError, RemoteError};
use tokio::time::error::Elapsed;

use crate::{webview::globals::GlobalsError, AttestationError};

/// Frame signer API Error Type
///
/// Errors are [Clone] so a single-flight outcome can be handed to every
/// waiting caller.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    /// No response received before the deadline
    #[error("Timeout waiting for {event} after {timeout:?}")]
    Timeout { event: String, timeout: Duration },

    /// Handshake did not complete before the deadline
    #[error("Handshake timeout")]
    HandshakeTimeout,

    /// Inbound payload failed schema validation
    #[error("Invalid {event} payload: {reason}")]
    Schema { event: String, reason: String },

    /// Remote reported an error event
    #[error("Remote error {code}: {message}")]
    Remote { code: i64, message: String },

    /// Remote returned an error result
    #[error("Request rejected: {error} (code: {code:?})")]
    Rejected { code: Option<String>, error: String },

    /// Incoming and outgoing event maps declare the same event
    #[error("Event {0} declared by more than one map on this transport")]
    EventMapConflict(&'static str),

    /// Operation requires a connected channel
    #[error("Channel not connected")]
    NotConnected,

    /// Service not initialized
    #[error("Service not initialized, call init() first")]
    NotInitialized,

    /// Frame or WebView reference unavailable
    #[error("Frame not available: {0}")]
    MissingFrame(String),

    /// Caller credentials not configured
    #[error("Missing authentication credentials (JWT or API key)")]
    MissingCredentials,

    /// Address not yet fetched
    #[error("Signer address unavailable")]
    AddressUnavailable,

    /// Attestation gate failed
    #[error(transparent)]
    Attestation(#[from] AttestationError),

    /// Cryptographic operation failed
    #[error("Crypto error: {0}")]
    Crypto(#[from] frame_signer_core::crypto::Error),

    /// Injected globals rejected
    #[error(transparent)]
    Globals(#[from] GlobalsError),

    /// Invalid target origin
    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),

    /// Invalid encoding in a response or argument
    #[error("Invalid encoding: {0}")]
    Encoding(String),

    /// Service disposed
    #[error("Service disposed")]
    Disposed,

    /// Response did not match the request
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Protocol encode / decode error
    #[error("Protocol error: {0}")]
    Proto(ProtoError),
}

impl Error {
    /// Application error code carried by a remote failure, if any
    pub fn code(&self) -> Option<String> {
        match self {
            Error::Remote { code, .. } => Some(code.to_string()),
            Error::Rejected { code, .. } => code.clone(),
            _ => None,
        }
    }

    /// Check whether this error is a response or handshake timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::HandshakeTimeout)
    }
}

impl From<ProtoError> for Error {
    fn from(e: ProtoError) -> Self {
        match e {
            ProtoError::Schema { event, reason } => Error::Schema { event, reason },
            e => Error::Proto(e),
        }
    }
}

impl From<RemoteError> for Error {
    fn from(e: RemoteError) -> Self {
        Error::Remote {
            code: e.code,
            message: e.message,
        }
    }
}

impl From<ErrorResponse> for Error {
    fn from(e: ErrorResponse) -> Self {
        Error::Rejected {
            code: e.code,
            error: e.error,
        }
    }
}

impl From<frame_signer_core::solana::Error> for Error {
    fn from(e: frame_signer_core::solana::Error) -> Self {
        Error::Encoding(e.to_string())
    }
}

impl From<Elapsed> for Error {
    fn from(_: Elapsed) -> Self {
        Error::Timeout {
            event: "response".to_string(),
            timeout: Duration::ZERO,
        }
    }
}
