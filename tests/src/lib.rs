// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Signer scenarios shared between the simulator and integration tests.
//!
//! Generic over [frame_signer::signer::FrameHost] and
//! [frame_signer::transport::WebViewHandle] for reuse against other hosts.
//!

pub mod frame;

pub mod recovery;
pub use recovery::RecoveryHarness;
