// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Protocol / event definitions for cross-context signer communication
//!
//! A parent context (browser page or native host) talks to an isolated
//! child context (iframe or WebView holding key material) by exchanging
//! JSON [Envelope]s. Each channel end declares the events it sends and
//! receives as [EventMap] enums, so every event name maps to exactly one
//! payload type and every inbound payload is checked against that type
//! before it reaches a handler.
//!
//! Maps provided here:
//!
//! - [handshake]: `handshakeRequest` / `handshakeResponse` / `handshakeComplete`
//! - [frame]: the Solana iframe signer channel
//! - [recovery]: the recovery-key WebView signer channel
//!
//! Maps for one channel are split by direction: the parent's outgoing
//! map is the child's incoming map and vice versa.

pub mod encoding;
pub mod envelope;
pub mod error;
#[macro_use]
pub mod event_map;
pub mod frame;
pub mod handshake;
pub mod recovery;
pub mod result;

pub use envelope::Envelope;
pub use error::ProtoError;
pub use event_map::{EventMap, ERROR_EVENT};
pub use result::{ErrorEvent, ErrorResponse, RemoteError, ResultResponse};

/// Message sent by a WebView page once its bridge script is loaded,
/// this is not an [Envelope] and is dropped by transports.
pub const FRAME_READY: &str = "frame-ready";

/// Return the first event name declared by both maps, if any.
///
/// Maps sharing one transport must be disjoint so an inbound event
/// always resolves to a single payload type.
pub fn overlapping_event<A: EventMap, B: EventMap>() -> Option<&'static str> {
    A::EVENTS.iter().find(|e| B::declares(e)).copied()
}
