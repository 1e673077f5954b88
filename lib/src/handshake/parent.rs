// Copyright (c) 2022-2023 The MobileCoin Foundation

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::{sync::watch, time::Instant};

use frame_signer_proto::{overlapping_event, EventMap};

use super::{
    HandshakeFromChild, HandshakeFromParent, HandshakeOptions, HandshakePayload, HandshakeState,
    HANDSHAKE_RESPONSE,
};
use crate::{
    emitter::{new_request_id, Inbound, Subscription},
    Error, EventEmitter, ListenerId, SendActionOptions, SingleFlight, Transport,
};

/// Parent channel end, receiving `In` and sending `Out` once connected
pub struct HandshakeParent<In: EventMap, Out: EventMap, T: Transport> {
    inner: Arc<Inner<In, Out, T>>,
}

struct Inner<In: EventMap, Out: EventMap, T: Transport> {
    emitter: EventEmitter<In, Out, T>,
    handshake: EventEmitter<HandshakeFromChild, HandshakeFromParent, T>,
    options: HandshakeOptions,
    state: watch::Sender<HandshakeState>,
    flight: SingleFlight<Result<(), Error>>,
}

impl<In: EventMap, Out: EventMap, T: Transport> Clone for HandshakeParent<In, Out, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<In: EventMap, Out: EventMap, T: Transport> HandshakeParent<In, Out, T> {
    /// Create a parent channel end over `transport`.
    ///
    /// Channel and handshake maps share the transport so must not
    /// declare the same events.
    pub fn new(transport: Arc<T>, options: HandshakeOptions) -> Result<Self, Error> {
        if let Some(e) = overlapping_event::<In, HandshakeFromChild>()
            .or_else(overlapping_event::<Out, HandshakeFromParent>)
        {
            return Err(Error::EventMapConflict(e));
        }

        let (state, _) = watch::channel(HandshakeState::NotStarted);

        Ok(Self {
            inner: Arc::new(Inner {
                emitter: EventEmitter::new(transport.clone())?,
                handshake: EventEmitter::new(transport)?,
                options,
                state,
                flight: SingleFlight::new(),
            }),
        })
    }

    /// Access the channel emitter (not connection gated)
    pub fn emitter(&self) -> &EventEmitter<In, Out, T> {
        &self.inner.emitter
    }

    /// Access the underlying transport
    pub fn transport(&self) -> &Arc<T> {
        self.inner.emitter.transport()
    }

    pub fn options(&self) -> &HandshakeOptions {
        &self.inner.options
    }

    /// Current handshake state
    pub fn state(&self) -> HandshakeState {
        *self.inner.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == HandshakeState::Connected
    }

    /// Watch handshake state changes
    pub fn state_changes(&self) -> watch::Receiver<HandshakeState> {
        self.inner.state.subscribe()
    }

    /// Mark the channel disconnected, requiring a new handshake
    pub fn reset(&self) {
        debug!("Handshake reset");
        self.inner.state.send_replace(HandshakeState::NotStarted);
    }

    /// Handshake with the child.
    ///
    /// Returns immediately when connected. Concurrent callers share a
    /// single probe exchange.
    pub async fn handshake_with_child(&self) -> Result<(), Error> {
        if self.is_connected() {
            return Ok(());
        }

        let inner = self.inner.clone();
        self.inner
            .flight
            .run(move || async move { inner.handshake().await })
            .await
    }

    /// Send an event, failing if the channel is not connected
    pub fn send(&self, event: &Out) -> Result<(), Error> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        self.inner.emitter.send(event)
    }

    /// Send a request and await its response.
    ///
    /// Waits for the channel to connect first, the whole exchange is
    /// bounded by the `opts.timeout` deadline.
    pub async fn send_action(
        &self,
        event: &Out,
        response: &str,
        opts: SendActionOptions<In>,
    ) -> Result<In, Error> {
        let deadline = Instant::now() + opts.timeout;

        self.wait_connected(deadline).await?;

        let remaining = deadline.saturating_duration_since(Instant::now());
        self.inner
            .emitter
            .send_action(event, response, opts.with_timeout(remaining))
            .await
    }

    /// Register a handler for inbound channel events
    pub fn on(&self, handler: impl Fn(Inbound<In>) + Send + Sync + 'static) -> ListenerId {
        self.inner.emitter.on(handler)
    }

    pub fn off(&self, id: ListenerId) {
        self.inner.emitter.off(id)
    }

    /// Subscribe to inbound channel events
    pub fn subscribe(&self) -> Subscription<In, T> {
        self.inner.emitter.subscribe()
    }

    async fn wait_connected(&self, deadline: Instant) -> Result<(), Error> {
        let mut rx = self.inner.state.subscribe();

        let result = match tokio::time::timeout_at(deadline, rx.wait_for(|s| *s == HandshakeState::Connected))
            .await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(Error::Disposed),
            Err(_) => {
                warn!("Channel not connected before deadline");
                Err(Error::HandshakeTimeout)
            }
        };
        result
    }
}

impl<In: EventMap, Out: EventMap, T: Transport> Inner<In, Out, T> {
    async fn handshake(&self) -> Result<(), Error> {
        self.state.send_replace(HandshakeState::InProgress);

        let id = new_request_id();
        debug!("Starting handshake {id}");

        let expected = id.clone();
        let opts = SendActionOptions::default()
            .with_timeout(self.options.timeout)
            .with_interval(self.options.interval)
            .with_condition(move |r: &HandshakeFromChild| match r {
                HandshakeFromChild::Response(p) => p.request_verification_id == expected,
            });

        let r = self
            .handshake
            .send_action(
                &HandshakeFromParent::Request(HandshakePayload::new(id.clone())),
                HANDSHAKE_RESPONSE,
                opts,
            )
            .await;

        match r {
            Ok(_) => {
                self.handshake
                    .send(&HandshakeFromParent::Complete(HandshakePayload::new(id)))?;
                self.state.send_replace(HandshakeState::Connected);

                info!("Handshake complete");
                Ok(())
            }
            Err(e) => {
                self.state.send_replace(HandshakeState::NotStarted);

                warn!("Handshake failed: {e}");
                match e {
                    Error::Timeout { .. } => Err(Error::HandshakeTimeout),
                    e => Err(e),
                }
            }
        }
    }
}
