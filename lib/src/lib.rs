// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Cross-context signer library
//!
//! Parent and child plumbing for talking to an isolated signing context
//! (an iframe or a WebView holding key material) over a message transport.
//!
//! - [transport]: the raw channel, with window (postMessage), WebView
//!   (injected script bridge) and in-memory implementations
//! - [EventEmitter]: typed events over a [Transport], with correlated
//!   `send_action` request / response round-trips
//! - [handshake]: probe / ack exchange gating traffic until both ends are
//!   connected
//! - [webview]: the WebView parent with reload-and-retry recovery, and the
//!   injected globals allow-list
//! - [AttestationValidator]: gates signing on a validated attestation
//! - [signer]: Solana iframe signer and recovery-key signer services

pub mod transport;
pub use transport::{ListenerId, MessageEvent, Transport};

mod origin;
pub use origin::TargetOrigin;

mod error;
pub use error::Error;

pub mod emitter;
pub use emitter::{EventEmitter, SendActionOptions};

mod flight;
pub use flight::SingleFlight;

pub mod handshake;

pub mod webview;

mod attestation;
pub use attestation::{AttestationError, AttestationState, AttestationValidator};

pub mod signer;

/// Re-export protocol definitions for consumers
pub use frame_signer_proto as proto;

/// Re-export core primitives for consumers
pub use frame_signer_core as core;
