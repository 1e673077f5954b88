// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Child context runtimes serving an [Engine] over a transport

use std::sync::Arc;

use log::{debug, warn};

use frame_signer::{
    handshake::{HandshakeChild, HandshakeOptions},
    Error, Transport,
};
use frame_signer_core::engine::{Driver, Engine};
use frame_signer_proto::{
    frame::{FrameRequest, FrameResponse},
    recovery::{RecoveryRequest, RecoveryResponse},
};

/// Serve the Solana frame signer channel, runs until the task is dropped
pub async fn serve_frame<T, D>(
    transport: Arc<T>,
    driver: D,
    options: HandshakeOptions,
) -> Result<(), Error>
where
    T: Transport,
    D: Driver,
{
    let child = HandshakeChild::<FrameRequest, FrameResponse, T>::new(transport, options)?;
    let mut engine = Engine::new(driver);

    debug!("Serving frame signer");

    child
        .serve(|r| match r {
            Ok(req) => Some(engine.frame_request(&req)),
            Err(e) => {
                warn!("Dropping invalid request: {e}");
                None
            }
        })
        .await;

    Ok(())
}

/// Serve the recovery-key channel, runs until the task is dropped
pub async fn serve_recovery<T, D>(
    transport: Arc<T>,
    driver: D,
    options: HandshakeOptions,
) -> Result<(), Error>
where
    T: Transport,
    D: Driver,
{
    let child = HandshakeChild::<RecoveryRequest, RecoveryResponse, T>::new(transport, options)?;
    let mut engine = Engine::new(driver);

    debug!("Serving recovery signer");

    child
        .serve(|r| match r {
            Ok(req) => Some(engine.recovery_request(&req)),
            Err(e) => {
                warn!("Dropping invalid request: {e}");
                None
            }
        })
        .await;

    Ok(())
}
