// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Parent-side signer services
//!
//! - [SolanaFrameSigner] talks to a signer iframe over `postMessage`
//! - [RecoveryKeySigner] talks to a recovery-key WebView over the native bridge
//!
//! Both gate signing on a validated attestation and own exactly one
//! channel to their child context.

use std::time::Duration;

use strum::Display;

mod frame;
pub use frame::{Frame, FrameHost, FrameSignerConfig, SolanaFrameSigner};

mod recovery;
pub use recovery::{
    email_auth_id, RecoveryKeySigner, RecoveryKeySignerConfig, RecoveryKeyStatus,
    DEFAULT_SECURE_ENDPOINT_URL,
};

/// Default per-request timeout for signer operations
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Signer service lifecycle
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ServiceState {
    #[default]
    NotInitialized,
    Initializing,
    /// Channel constructed, handshake pending
    Initialized,
    Connected,
    Error,
}
