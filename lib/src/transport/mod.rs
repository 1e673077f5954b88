// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Message transports
//!
//! A [Transport] delivers serialized [Envelope]s to the other channel end
//! and notifies registered listeners of inbound messages. Sending never
//! fails synchronously: a missing or closed peer is logged and surfaces
//! through the normal response timeout path.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use serde_json::Value;

use frame_signer_proto::Envelope;

pub mod memory;

mod window;
pub use window::{MessageWindow, WindowTransport};

mod webview;
pub use webview::{
    bridge_call, js_string_literal, parse_bridge_call, NativeBridge, WebViewChildTransport,
    WebViewHandle, WebViewTransport,
};

/// Inbound message as seen by transport listeners
#[derive(Clone, Debug, PartialEq)]
pub struct MessageEvent {
    /// Sender origin, where the transport provides one
    pub origin: Option<String>,
    /// Message payload
    pub data: Value,
}

impl MessageEvent {
    pub fn new(origin: Option<String>, data: Value) -> Self {
        Self { origin, data }
    }
}

/// Transport listener identifier
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Transport message listener
pub type Listener = Arc<dyn Fn(&MessageEvent) + Send + Sync>;

/// Raw message channel between a parent and a child context
pub trait Transport: Send + Sync + 'static {
    /// Serialize and write an envelope to the channel
    fn send(&self, envelope: &Envelope);

    /// Register a listener for inbound messages
    fn add_message_listener(&self, listener: Listener) -> ListenerId;

    /// Remove a previously registered listener
    fn remove_message_listener(&self, id: ListenerId);
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, envelope: &Envelope) {
        T::send(self, envelope)
    }

    fn add_message_listener(&self, listener: Listener) -> ListenerId {
        T::add_message_listener(self, listener)
    }

    fn remove_message_listener(&self, id: ListenerId) {
        T::remove_message_listener(self, id)
    }
}

/// Listener registry shared by transport implementations
#[derive(Default)]
pub struct Listeners {
    inner: Mutex<ListenersInner>,
}

#[derive(Default)]
struct ListenersInner {
    next: u64,
    listeners: BTreeMap<ListenerId, Listener>,
}

impl Listeners {
    fn lock(&self) -> MutexGuard<'_, ListenersInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a listener, returning its id
    pub fn add(&self, listener: Listener) -> ListenerId {
        let mut inner = self.lock();

        let id = ListenerId(inner.next);
        inner.next += 1;
        inner.listeners.insert(id, listener);

        id
    }

    /// Remove a listener, returning true if it was registered
    pub fn remove(&self, id: ListenerId) -> bool {
        self.lock().listeners.remove(&id).is_some()
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver a message to every registered listener.
    ///
    /// Listeners are snapshotted first so a listener may add or remove
    /// listeners while handling a message.
    pub fn dispatch(&self, event: &MessageEvent) {
        let listeners: Vec<_> = self.lock().listeners.values().cloned().collect();

        for l in listeners {
            l(event);
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    #[test]
    fn dispatch_to_all() {
        let l = Listeners::default();
        let n = Arc::new(AtomicUsize::new(0));

        let a = {
            let n = n.clone();
            l.add(Arc::new(move |_: &MessageEvent| {
                n.fetch_add(1, Ordering::SeqCst);
            }))
        };
        let _b = {
            let n = n.clone();
            l.add(Arc::new(move |_: &MessageEvent| {
                n.fetch_add(10, Ordering::SeqCst);
            }))
        };

        l.dispatch(&MessageEvent::new(None, json!({})));
        assert_eq!(n.load(Ordering::SeqCst), 11);

        assert!(l.remove(a));
        assert!(!l.remove(a));
        assert_eq!(l.len(), 1);

        l.dispatch(&MessageEvent::new(None, json!({})));
        assert_eq!(n.load(Ordering::SeqCst), 21);
    }

    #[test]
    fn listener_may_remove_itself() {
        let l = Arc::new(Listeners::default());
        let id = Arc::new(Mutex::new(None));

        let inner = {
            let l = l.clone();
            let id = id.clone();
            Arc::new(move |_: &MessageEvent| {
                if let Some(id) = id.lock().unwrap().take() {
                    l.remove(id);
                }
            })
        };
        *id.lock().unwrap() = Some(l.add(inner));

        l.dispatch(&MessageEvent::new(None, json!(null)));
        assert!(l.is_empty());
    }
}
