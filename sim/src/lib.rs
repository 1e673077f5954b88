// Copyright (c) 2022-2023 The MobileCoin Foundation

//! In-process simulator for cross-context signers.
//!
//! Hosts signer child contexts (iframes and a recovery-key WebView) in
//! tokio tasks, each running a [frame_signer_core::engine::Engine] over a
//! shared [MemoryDriver] so key material survives frame remounts and
//! WebView reloads.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use frame_signer::{
    handshake::HandshakeOptions,
    proto::handshake::millis,
    signer::{FrameSignerConfig, RecoveryKeySignerConfig, DEFAULT_REQUEST_TIMEOUT},
};

mod driver;
pub use driver::MemoryDriver;

mod child;
pub use child::{serve_frame, serve_recovery};

mod frame;
pub use frame::{SimFrame, SimFrameHost};

mod webview;
pub use webview::SimWebView;

/// Simulator options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimOptions {
    /// Origin of the simulated parent document
    pub parent_origin: String,

    /// URL the signer iframe is loaded from
    pub frame_url: String,

    /// Handshake options for both ends of each channel
    pub handshake: HandshakeOptions,

    /// Per-request timeout
    #[serde(rename = "timeoutMs", with = "millis")]
    pub request_timeout: Duration,

    /// Email used for the recovery-key signer
    pub email: String,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            parent_origin: "https://app.example.com".to_string(),
            frame_url: "https://signer.example.com/solana".to_string(),
            handshake: HandshakeOptions::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            email: "user@example.com".to_string(),
        }
    }
}

impl SimOptions {
    /// Frame signer configuration for these options
    pub fn frame_config(&self) -> FrameSignerConfig {
        FrameSignerConfig {
            handshake: self.handshake,
            request_timeout: self.request_timeout,
            ..FrameSignerConfig::new(&self.frame_url)
        }
    }

    /// Recovery-key signer configuration for these options
    pub fn recovery_config(&self) -> RecoveryKeySignerConfig {
        let mut c = RecoveryKeySignerConfig {
            request_timeout: self.request_timeout,
            ..Default::default()
        };
        c.webview.handshake = self.handshake;
        c
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn options_from_toml() {
        let o: SimOptions = toml::from_str(
            r#"
            frameUrl = "https://frames.test/solana"
            timeoutMs = 2500

            [handshake]
            timeout = 500
            "#,
        )
        .unwrap();

        assert_eq!(o.frame_url, "https://frames.test/solana");
        assert_eq!(o.request_timeout, Duration::from_millis(2500));
        assert_eq!(o.handshake.timeout, Duration::from_millis(500));
        assert_eq!(o.parent_origin, SimOptions::default().parent_origin);

        let c = o.frame_config();
        assert_eq!(c.iframe_url, "https://frames.test/solana");
        assert_eq!(c.request_timeout, Duration::from_millis(2500));
    }
}
