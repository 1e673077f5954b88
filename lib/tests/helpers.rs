// Copyright (c) 2022-2023 The MobileCoin Foundation

#![allow(dead_code)]

use std::{str::FromStr, time::Duration};

use log::LevelFilter;
use simplelog::SimpleLogger;

use frame_signer::handshake::HandshakeOptions;
use frame_signer_sim::SimOptions;

/// Setup logging and simulator options for a test
pub fn setup() -> SimOptions {
    // Setup logging
    let log_level = match std::env::var("LOG_LEVEL").map(|v| LevelFilter::from_str(&v)) {
        Ok(Ok(l)) => l,
        _ => LevelFilter::Info,
    };

    let _ = SimpleLogger::init(log_level, simplelog::Config::default());

    SimOptions {
        handshake: HandshakeOptions {
            timeout: Duration::from_secs(2),
            interval: Duration::from_millis(100),
        },
        request_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}
