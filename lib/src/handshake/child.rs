// Copyright (c) 2022-2023 The MobileCoin Foundation

use std::{collections::VecDeque, sync::Arc};

use log::{debug, info, warn};
use tokio::sync::watch;

use frame_signer_proto::{overlapping_event, EventMap};

use super::{HandshakeFromChild, HandshakeFromParent, HandshakeOptions, HandshakeState};
use crate::{emitter::Inbound, Error, EventEmitter, Transport};

/// Child channel end, receiving `In` requests and answering with `Out`
pub struct HandshakeChild<In: EventMap, Out: EventMap, T: Transport> {
    emitter: EventEmitter<In, Out, T>,
    handshake: EventEmitter<HandshakeFromParent, HandshakeFromChild, T>,
    options: HandshakeOptions,
    state: watch::Sender<HandshakeState>,
}

/// Handshake progress tracked while serving
#[derive(Default)]
struct Progress {
    pending: Option<String>,
}

impl<In: EventMap, Out: EventMap, T: Transport> HandshakeChild<In, Out, T> {
    pub fn new(transport: Arc<T>, options: HandshakeOptions) -> Result<Self, Error> {
        if let Some(e) = overlapping_event::<In, HandshakeFromParent>()
            .or_else(overlapping_event::<Out, HandshakeFromChild>)
        {
            return Err(Error::EventMapConflict(e));
        }

        let (state, _) = watch::channel(HandshakeState::NotStarted);

        Ok(Self {
            emitter: EventEmitter::new(transport.clone())?,
            handshake: EventEmitter::new(transport)?,
            options,
            state,
        })
    }

    pub fn emitter(&self) -> &EventEmitter<In, Out, T> {
        &self.emitter
    }

    pub fn state(&self) -> HandshakeState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == HandshakeState::Connected
    }

    /// Answer handshake probes until the parent completes the handshake,
    /// bounded by the handshake timeout
    pub async fn handshake_with_parent(&self) -> Result<(), Error> {
        let mut sub = self.handshake.subscribe();
        let mut progress = Progress::default();

        let wait = async {
            while let Some(i) = sub.recv().await {
                if self.on_handshake(i, &mut progress) {
                    return Ok(());
                }
            }
            Err(Error::Disposed)
        };

        match tokio::time::timeout(self.options.timeout, wait).await {
            Ok(r) => r,
            Err(_) => Err(Error::HandshakeTimeout),
        }
    }

    /// Serve requests with `handler`, answering with the returned event.
    ///
    /// Handshake probes are answered throughout so the parent may
    /// re-handshake at any time. Requests arriving before the handshake
    /// completes are queued until it does.
    pub async fn serve<F>(&self, mut handler: F)
    where
        F: FnMut(Result<In, Error>) -> Option<Out>,
    {
        // Subscribe before anything else so early requests are buffered
        let mut hs = self.handshake.subscribe();
        let mut requests = self.emitter.subscribe();

        let mut progress = Progress::default();
        let mut queued = VecDeque::new();

        loop {
            tokio::select! {
                Some(i) = hs.recv() => {
                    if self.on_handshake(i, &mut progress) {
                        while let Some(r) = queued.pop_front() {
                            self.handle(r, &mut handler);
                        }
                    }
                }
                Some(r) = requests.recv() => {
                    if self.is_connected() {
                        self.handle(r, &mut handler);
                    } else {
                        debug!("Queueing {} until connected", r.name);
                        queued.push_back(r);
                    }
                }
                else => break,
            }
        }
    }

    fn handle<F>(&self, r: Inbound<In>, handler: &mut F)
    where
        F: FnMut(Result<In, Error>) -> Option<Out>,
    {
        debug!("Request: {}", r.name);

        if let Some(resp) = handler(r.event) {
            if let Err(e) = self.emitter.send_with_request_id(&resp, r.request_id) {
                warn!("Failed to send response: {e}");
            }
        }
    }

    /// Process a handshake event, returning true once connected
    fn on_handshake(&self, i: Inbound<HandshakeFromParent>, p: &mut Progress) -> bool {
        match i.event {
            Ok(HandshakeFromParent::Request(payload)) => {
                debug!("Handshake request {}", payload.request_verification_id);

                if !self.is_connected() {
                    self.state.send_replace(HandshakeState::InProgress);
                }
                p.pending = Some(payload.request_verification_id.clone());

                let r = HandshakeFromChild::Response(payload);
                if let Err(e) = self.handshake.send_with_request_id(&r, i.request_id) {
                    warn!("Failed to answer handshake: {e}");
                }
                false
            }
            Ok(HandshakeFromParent::Complete(payload)) => {
                if p.pending.as_deref() != Some(payload.request_verification_id.as_str()) {
                    warn!(
                        "Ignoring handshake completion for unknown id {}",
                        payload.request_verification_id
                    );
                    return false;
                }

                p.pending = None;
                self.state.send_replace(HandshakeState::Connected);

                info!("Connected to parent");
                true
            }
            Err(e) => {
                warn!("Invalid handshake event: {e}");
                false
            }
        }
    }
}
