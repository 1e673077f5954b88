// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Typed event emitter over a [Transport]
//!
//! Outbound events are encoded from the `Out` map, inbound messages are
//! decoded and validated against the `In` map before they reach a handler
//! or waiter. Messages for events the `In` map does not declare are
//! ignored, so several emitters may share one transport.

use std::{marker::PhantomData, sync::Arc, time::Duration};

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver},
    time::{Instant, Interval, MissedTickBehavior},
};

use frame_signer_proto::{
    handshake::millis, overlapping_event, Envelope, ErrorEvent, EventMap, ERROR_EVENT,
};

use crate::{
    transport::{ListenerId, MessageEvent},
    Error, Transport,
};

/// Default `send_action` response timeout
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Predicate over a candidate response
pub type Condition<In> = Arc<dyn Fn(&In) -> bool + Send + Sync>;

/// Options for [EventEmitter::send_action]
#[derive(Serialize, Deserialize)]
#[serde(default, bound = "")]
pub struct SendActionOptions<In> {
    /// Deadline for a matching response, measured from the call
    #[serde(with = "millis")]
    pub timeout: Duration,

    /// Re-send the request at this interval until answered
    #[serde(default, with = "opt_millis")]
    pub interval: Option<Duration>,

    /// Only accept responses matching this predicate
    #[serde(skip)]
    pub condition: Option<Condition<In>>,
}

impl<In> Default for SendActionOptions<In> {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_ACTION_TIMEOUT,
            interval: None,
            condition: None,
        }
    }
}

impl<In> Clone for SendActionOptions<In> {
    fn clone(&self) -> Self {
        Self {
            timeout: self.timeout,
            interval: self.interval,
            condition: self.condition.clone(),
        }
    }
}

impl<In> std::fmt::Debug for SendActionOptions<In> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendActionOptions")
            .field("timeout", &self.timeout)
            .field("interval", &self.interval)
            .field("condition", &self.condition.is_some())
            .finish()
    }
}

impl<In> SendActionOptions<In> {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_condition(mut self, c: impl Fn(&In) -> bool + Send + Sync + 'static) -> Self {
        self.condition = Some(Arc::new(c));
        self
    }
}

/// Optional durations as integer milliseconds
pub mod opt_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

/// Decoded inbound event
#[derive(Clone, Debug, PartialEq)]
pub struct Inbound<In> {
    /// Event name from the envelope
    pub name: String,
    /// Correlation id, if the sender attached one
    pub request_id: Option<String>,
    /// Decoded payload, or the schema error
    pub event: Result<In, Error>,
}

/// Removes a transport listener on drop
pub struct ListenerGuard<T: Transport> {
    transport: Arc<T>,
    id: ListenerId,
}

impl<T: Transport> ListenerGuard<T> {
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl<T: Transport> Drop for ListenerGuard<T> {
    fn drop(&mut self) {
        self.transport.remove_message_listener(self.id);
    }
}

/// Stream of inbound events, unsubscribed on drop
pub struct Subscription<In: EventMap, T: Transport> {
    rx: UnboundedReceiver<Inbound<In>>,
    _guard: ListenerGuard<T>,
}

impl<In: EventMap, T: Transport> Subscription<In, T> {
    /// Await the next inbound event
    pub async fn recv(&mut self) -> Option<Inbound<In>> {
        self.rx.recv().await
    }
}

/// Typed emitter receiving `In` events and sending `Out` events
pub struct EventEmitter<In: EventMap, Out: EventMap, T: Transport> {
    transport: Arc<T>,
    _maps: PhantomData<fn() -> (In, Out)>,
}

impl<In: EventMap, Out: EventMap, T: Transport> Clone for EventEmitter<In, Out, T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            _maps: PhantomData,
        }
    }
}

/// Parse a message as an envelope, ignoring anything else
fn parse(e: &MessageEvent) -> Option<Envelope> {
    match Envelope::from_value(&e.data) {
        Ok(env) => Some(env),
        Err(err) => {
            trace!("Ignoring non-envelope message: {err}");
            None
        }
    }
}

/// Decode an envelope declared by the `In` map
fn decode<In: EventMap>(env: Envelope) -> Option<Inbound<In>> {
    if !In::declares(&env.event) {
        return None;
    }

    let event = In::from_envelope(&env).map_err(Error::from);
    if let Err(e) = &event {
        warn!("Invalid inbound event: {e}");
    }

    Some(Inbound {
        name: env.event,
        request_id: env.request_id,
        event,
    })
}

/// Generate a random correlation id
pub fn new_request_id() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

async fn tick(i: &mut Option<Interval>) {
    match i {
        Some(i) => {
            i.tick().await;
        }
        None => std::future::pending().await,
    }
}

impl<In: EventMap, Out: EventMap, T: Transport> EventEmitter<In, Out, T> {
    /// Create an emitter, checking the incoming and outgoing maps are disjoint
    pub fn new(transport: Arc<T>) -> Result<Self, Error> {
        if let Some(e) = overlapping_event::<In, Out>() {
            return Err(Error::EventMapConflict(e));
        }

        Ok(Self {
            transport,
            _maps: PhantomData,
        })
    }

    /// Access the underlying transport
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Send an event without awaiting a response
    pub fn send(&self, event: &Out) -> Result<(), Error> {
        self.send_with_request_id(event, None)
    }

    /// Send an event, attaching a correlation id (used to answer a request)
    pub fn send_with_request_id(
        &self,
        event: &Out,
        request_id: Option<String>,
    ) -> Result<(), Error> {
        let env = event.to_envelope()?.with_request_id(request_id);

        debug!("Send: {}", env.event);
        self.transport.send(&env);

        Ok(())
    }

    /// Register a handler for inbound events
    pub fn on(&self, handler: impl Fn(Inbound<In>) + Send + Sync + 'static) -> ListenerId {
        self.transport
            .add_message_listener(Arc::new(move |e: &MessageEvent| {
                if let Some(i) = parse(e).and_then(decode::<In>) {
                    handler(i);
                }
            }))
    }

    /// Remove a handler registered with [EventEmitter::on]
    pub fn off(&self, id: ListenerId) {
        self.transport.remove_message_listener(id);
    }

    /// Subscribe to inbound events
    pub fn subscribe(&self) -> Subscription<In, T> {
        let (tx, rx) = unbounded_channel();

        let id = self.on(move |i| {
            let _ = tx.send(i);
        });

        Subscription {
            rx,
            _guard: ListenerGuard {
                transport: self.transport.clone(),
                id,
            },
        }
    }

    /// Await a single inbound event by name
    pub async fn on_action(&self, event: &str, timeout: Duration) -> Result<Inbound<In>, Error> {
        let mut sub = self.subscribe();

        let wait = async {
            while let Some(i) = sub.recv().await {
                if i.name == event {
                    return Ok(i);
                }
            }
            Err(Error::Disposed)
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(r) => r,
            Err(_) => Err(Error::Timeout {
                event: event.to_string(),
                timeout,
            }),
        }
    }

    /// Send a request and await the correlated `response` event.
    ///
    /// Replies are matched by event name and by request id when the reply
    /// carries one. An `error` event with a matching (or no) request id
    /// fails the request with [Error::Remote].
    pub async fn send_action(
        &self,
        event: &Out,
        response: &str,
        opts: SendActionOptions<In>,
    ) -> Result<In, Error> {
        let request_id = new_request_id();
        let env = event
            .to_envelope()?
            .with_request_id(Some(request_id.clone()));

        let deadline = Instant::now() + opts.timeout;

        let (tx, mut rx) = unbounded_channel::<Result<In, Error>>();
        let expected = response.to_string();
        let condition = opts.condition.clone();

        let id = self
            .transport
            .add_message_listener(Arc::new(move |e: &MessageEvent| {
                let Some(env) = parse(e) else {
                    return;
                };

                if let Some(r) = &env.request_id {
                    if r != &request_id {
                        return;
                    }
                }

                if env.event == ERROR_EVENT {
                    let r = match serde_json::from_value::<ErrorEvent>(env.data) {
                        Ok(e) => Error::Remote {
                            code: e.code,
                            message: e.message,
                        },
                        Err(e) => Error::Schema {
                            event: ERROR_EVENT.to_string(),
                            reason: e.to_string(),
                        },
                    };
                    let _ = tx.send(Err(r));
                    return;
                }

                if env.event != expected {
                    return;
                }

                match decode::<In>(env).map(|i| i.event) {
                    Some(Ok(v)) => {
                        if let Some(c) = &condition {
                            if !c(&v) {
                                trace!("Response rejected by condition");
                                return;
                            }
                        }
                        let _ = tx.send(Ok(v));
                    }
                    Some(Err(e)) => {
                        let _ = tx.send(Err(e));
                    }
                    None => {
                        let _ = tx.send(Err(Error::UnexpectedResponse(expected.clone())));
                    }
                }
            }));
        let _guard = ListenerGuard {
            transport: self.transport.clone(),
            id,
        };

        debug!("Send action: {} (awaiting {response})", env.event);
        self.transport.send(&env);

        let mut resend = opts.interval.map(|i| {
            let mut i = tokio::time::interval_at(Instant::now() + i, i);
            i.set_missed_tick_behavior(MissedTickBehavior::Delay);
            i
        });

        loop {
            tokio::select! {
                r = rx.recv() => return r.unwrap_or(Err(Error::Disposed)),
                _ = tick(&mut resend) => {
                    trace!("Re-sending {}", env.event);
                    self.transport.send(&env);
                }
                _ = tokio::time::sleep_until(deadline) => {
                    debug!("Timeout awaiting {response}");
                    return Err(Error::Timeout {
                        event: response.to_string(),
                        timeout: opts.timeout,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use frame_signer_proto::event_map;
    use serde_json::json;

    use super::*;
    use crate::{
        transport::{memory::window_pair, WindowTransport},
        TargetOrigin,
    };

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct Num {
        pub n: u32,
    }

    event_map! {
        pub enum Asks {
            "ask" => Ask(Num),
        }
    }

    event_map! {
        pub enum Answers {
            "answer" => Answer(Num),
            "error" => Error(ErrorEvent),
        }
    }

    type Memory = WindowTransport<crate::transport::memory::MemoryWindow>;

    fn pair() -> (
        EventEmitter<Answers, Asks, Memory>,
        EventEmitter<Asks, Answers, Memory>,
    ) {
        let (p, c) = window_pair("https://app.example", "https://signer.example");

        let p = WindowTransport::new(p, TargetOrigin::Exact("https://signer.example".into()));
        let c = WindowTransport::new(c, TargetOrigin::Exact("https://app.example".into()));

        (
            EventEmitter::new(Arc::new(p)).unwrap(),
            EventEmitter::new(Arc::new(c)).unwrap(),
        )
    }

    /// Answer every ask with n + 1, echoing the request id
    fn echo(child: &EventEmitter<Asks, Answers, Memory>) -> ListenerId {
        let c = child.clone();
        child.on(move |i| {
            if let Ok(Asks::Ask(Num { n })) = i.event {
                c.send_with_request_id(&Answers::Answer(Num { n: n + 1 }), i.request_id)
                    .unwrap();
            }
        })
    }

    #[tokio::test]
    async fn action_round_trip() {
        let (parent, child) = pair();
        echo(&child);

        let r = parent
            .send_action(&Asks::Ask(Num { n: 1 }), "answer", Default::default())
            .await
            .unwrap();
        assert_eq!(r, Answers::Answer(Num { n: 2 }));

        // Listener removed once resolved
        assert!(!parent.transport().is_attached());
    }

    #[tokio::test]
    async fn concurrent_actions_correlated() {
        let (parent, child) = pair();
        echo(&child);

        let (a, b) = tokio::join!(
            parent.send_action(&Asks::Ask(Num { n: 10 }), "answer", Default::default()),
            parent.send_action(&Asks::Ask(Num { n: 20 }), "answer", Default::default()),
        );

        assert_eq!(a.unwrap(), Answers::Answer(Num { n: 11 }));
        assert_eq!(b.unwrap(), Answers::Answer(Num { n: 21 }));
    }

    #[tokio::test(start_paused = true)]
    async fn action_timeout() {
        let (parent, _child) = pair();

        let r = parent
            .send_action(
                &Asks::Ask(Num { n: 1 }),
                "answer",
                SendActionOptions::default().with_timeout(Duration::from_secs(3)),
            )
            .await;

        assert_eq!(
            r,
            Err(Error::Timeout {
                event: "answer".into(),
                timeout: Duration::from_secs(3)
            })
        );
    }

    #[tokio::test]
    async fn error_event_rejects() {
        let (parent, child) = pair();

        let c = child.clone();
        child.on(move |i| {
            c.send_with_request_id(
                &Answers::Error(ErrorEvent {
                    code: 11,
                    message: "storage fatal".into(),
                }),
                i.request_id,
            )
            .unwrap();
        });

        let r = parent
            .send_action(&Asks::Ask(Num { n: 1 }), "answer", Default::default())
            .await;
        assert_eq!(
            r,
            Err(Error::Remote {
                code: 11,
                message: "storage fatal".into()
            })
        );
    }

    #[tokio::test]
    async fn schema_mismatch_rejects() {
        let (parent, child) = pair();

        let t = child.transport().clone();
        child.on(move |i| {
            t.send(
                &Envelope::new("answer", json!({"n": "not a number"}))
                    .with_request_id(i.request_id),
            );
        });

        let r = parent
            .send_action(&Asks::Ask(Num { n: 1 }), "answer", Default::default())
            .await;
        assert!(matches!(r, Err(Error::Schema { event, .. }) if event == "answer"));
    }

    #[tokio::test(start_paused = true)]
    async fn interval_resends() {
        let (parent, child) = pair();

        // Only answer the third attempt
        let seen = Arc::new(AtomicUsize::new(0));
        let c = child.clone();
        let s = seen.clone();
        child.on(move |i| {
            if s.fetch_add(1, Ordering::SeqCst) == 2 {
                c.send_with_request_id(&Answers::Answer(Num { n: 0 }), i.request_id)
                    .unwrap();
            }
        });

        let r = parent
            .send_action(
                &Asks::Ask(Num { n: 1 }),
                "answer",
                SendActionOptions::default()
                    .with_timeout(Duration::from_secs(10))
                    .with_interval(Duration::from_secs(1)),
            )
            .await;

        assert!(r.is_ok());
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn condition_filters() {
        let (parent, child) = pair();

        let c = child.clone();
        child.on(move |i| {
            for n in [1, 2, 3] {
                c.send_with_request_id(&Answers::Answer(Num { n }), i.request_id.clone())
                    .unwrap();
            }
        });

        let r = parent
            .send_action(
                &Asks::Ask(Num { n: 0 }),
                "answer",
                SendActionOptions::default()
                    .with_condition(|a| matches!(a, Answers::Answer(Num { n: 3 }))),
            )
            .await;
        assert_eq!(r, Ok(Answers::Answer(Num { n: 3 })));
    }

    #[test]
    fn overlapping_maps_rejected() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let _g = rt.enter();

        let (p, _c) = window_pair("https://a.example", "https://b.example");
        let t = Arc::new(WindowTransport::new(p, TargetOrigin::Any));

        let r = EventEmitter::<Answers, Answers, _>::new(t);
        assert!(matches!(r, Err(Error::EventMapConflict("answer"))));
    }

    #[test]
    fn options_from_config() {
        let o: SendActionOptions<Answers> =
            serde_json::from_value(json!({"timeout": 1500, "interval": 500})).unwrap();

        assert_eq!(o.timeout, Duration::from_millis(1500));
        assert_eq!(o.interval, Some(Duration::from_millis(500)));
        assert!(o.condition.is_none());
    }
}
