// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Handshake events
//!
//! 1. parent -> child `handshakeRequest {requestVerificationId}`,
//!    re-sent every [HandshakeOptions::interval] until answered
//! 2. child -> parent `handshakeResponse` echoing the id
//! 3. parent -> child `handshakeComplete` echoing the id
//!
//! Both ends are connected once step 3 is sent / received.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default overall handshake ceiling
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default interval between handshake probes
pub const DEFAULT_HANDSHAKE_INTERVAL: Duration = Duration::from_secs(5);

/// Verification id echoed through all handshake stages
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakePayload {
    pub request_verification_id: String,
}

impl HandshakePayload {
    pub fn new(request_verification_id: impl Into<String>) -> Self {
        Self {
            request_verification_id: request_verification_id.into(),
        }
    }
}

event_map! {
    /// Handshake events sent by the parent
    pub enum HandshakeFromParent {
        "handshakeRequest" => Request(HandshakePayload),
        "handshakeComplete" => Complete(HandshakePayload),
    }
}

event_map! {
    /// Handshake events sent by the child
    pub enum HandshakeFromChild {
        "handshakeResponse" => Response(HandshakePayload),
    }
}

/// Handshake timing options
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeOptions {
    /// Overall handshake ceiling
    #[serde(with = "millis")]
    pub timeout: Duration,

    /// Probe re-send interval
    #[serde(with = "millis")]
    pub interval: Duration,
}

impl Default for HandshakeOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            interval: DEFAULT_HANDSHAKE_INTERVAL,
        }
    }
}

/// Durations as integer milliseconds, matching `timeoutMs` / `intervalMs` config fields
pub mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
