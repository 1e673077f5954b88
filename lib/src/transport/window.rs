// Copyright (c) 2022-2023 The MobileCoin Foundation

//! `postMessage` window transport
//!
//! A single handler is installed on the local window when the first
//! listener is added and removed with the last one.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use log::{debug, trace};
use serde_json::Value;

use frame_signer_proto::Envelope;

use super::{Listener, ListenerId, Listeners, MessageEvent, Transport};
use crate::TargetOrigin;

/// Window endpoint, posting to the counterpart window (the child frame's
/// content window, or the parent) and receiving this window's message events
pub trait MessageWindow: Send + Sync + 'static {
    /// Post a message to the counterpart window
    fn post_message(&self, message: Value, target_origin: &str);

    /// Install a `message` event handler on the local window
    fn add_message_handler(&self, handler: Listener) -> ListenerId;

    /// Remove a `message` event handler
    fn remove_message_handler(&self, id: ListenerId);
}

impl<W: MessageWindow> MessageWindow for Arc<W> {
    fn post_message(&self, message: Value, target_origin: &str) {
        W::post_message(self, message, target_origin)
    }

    fn add_message_handler(&self, handler: Listener) -> ListenerId {
        W::add_message_handler(self, handler)
    }

    fn remove_message_handler(&self, id: ListenerId) {
        W::remove_message_handler(self, id)
    }
}

/// [Transport] over a [MessageWindow]
pub struct WindowTransport<W: MessageWindow> {
    inner: Arc<Inner<W>>,
}

struct Inner<W: MessageWindow> {
    window: W,
    target: TargetOrigin,
    listeners: Listeners,
    global: Mutex<Option<ListenerId>>,
}

impl<W: MessageWindow> WindowTransport<W> {
    /// Create a window transport posting to and accepting messages from `target`
    pub fn new(window: W, target: TargetOrigin) -> Self {
        Self {
            inner: Arc::new(Inner {
                window,
                target,
                listeners: Listeners::default(),
                global: Mutex::new(None),
            }),
        }
    }

    /// Access the underlying window
    pub fn window(&self) -> &W {
        &self.inner.window
    }

    /// Configured target origin
    pub fn target_origin(&self) -> &TargetOrigin {
        &self.inner.target
    }

    /// Check whether the global window handler is installed
    pub fn is_attached(&self) -> bool {
        self.inner.global().is_some()
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

impl<W: MessageWindow> Inner<W> {
    fn global(&self) -> MutexGuard<'_, Option<ListenerId>> {
        self.global.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn on_message(&self, event: &MessageEvent) {
        if !self.target.allows(event.origin.as_deref()) {
            debug!(
                "Dropping message from untrusted origin {:?} (expected {})",
                event.origin, self.target
            );
            return;
        }

        trace!("Window message: {}", event.data);

        self.listeners.dispatch(event);
    }
}

impl<W: MessageWindow> Transport for WindowTransport<W> {
    fn send(&self, envelope: &Envelope) {
        let v = envelope.to_value();

        for t in self.inner.target.targets() {
            self.inner.window.post_message(v.clone(), t);
        }
    }

    fn add_message_listener(&self, listener: Listener) -> ListenerId {
        let mut global = self.inner.global();

        let id = self.inner.listeners.add(listener);

        if global.is_none() {
            debug!("Attaching window message handler");

            let weak: Weak<Inner<W>> = Arc::downgrade(&self.inner);
            let h = self
                .inner
                .window
                .add_message_handler(Arc::new(move |e: &MessageEvent| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_message(e);
                    }
                }));

            *global = Some(h);
        }

        id
    }

    fn remove_message_listener(&self, id: ListenerId) {
        let mut global = self.inner.global();

        self.inner.listeners.remove(id);

        if self.inner.listeners.is_empty() {
            if let Some(h) = global.take() {
                debug!("Detaching window message handler");
                self.inner.window.remove_message_handler(h);
            }
        }
    }
}

impl<W: MessageWindow> Drop for WindowTransport<W> {
    fn drop(&mut self) {
        if let Some(h) = self.inner.global().take() {
            self.inner.window.remove_message_handler(h);
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    /// Window recording posted messages, with directly dispatched events
    #[derive(Default)]
    struct FakeWindow {
        posted: Mutex<Vec<(Value, String)>>,
        handlers: Listeners,
    }

    impl MessageWindow for FakeWindow {
        fn post_message(&self, message: Value, target_origin: &str) {
            self.posted
                .lock()
                .unwrap()
                .push((message, target_origin.to_string()));
        }

        fn add_message_handler(&self, handler: Listener) -> ListenerId {
            self.handlers.add(handler)
        }

        fn remove_message_handler(&self, id: ListenerId) {
            self.handlers.remove(id);
        }
    }

    fn counter() -> (Arc<AtomicUsize>, Listener) {
        let n = Arc::new(AtomicUsize::new(0));
        let l = {
            let n = n.clone();
            Arc::new(move |_: &MessageEvent| {
                n.fetch_add(1, Ordering::SeqCst);
            })
        };
        (n, l)
    }

    #[test]
    fn global_handler_ref_counted() {
        let w = Arc::new(FakeWindow::default());
        let t = WindowTransport::new(w.clone(), TargetOrigin::Exact("https://a.example".into()));

        assert!(!t.is_attached());

        let (_, la) = counter();
        let (_, lb) = counter();
        let a = t.add_message_listener(la);
        let b = t.add_message_listener(lb);

        // One window handler regardless of listener count
        assert!(t.is_attached());
        assert_eq!(w.handlers.len(), 1);

        t.remove_message_listener(a);
        assert_eq!(w.handlers.len(), 1);

        t.remove_message_listener(b);
        assert!(!t.is_attached());
        assert_eq!(w.handlers.len(), 0);
    }

    #[test]
    fn origin_filter() {
        let w = Arc::new(FakeWindow::default());
        let t = WindowTransport::new(w.clone(), TargetOrigin::Exact("https://a.example".into()));

        let (n, l) = counter();
        t.add_message_listener(l);

        w.handlers.dispatch(&MessageEvent::new(
            Some("https://a.example".into()),
            json!({"event": "x"}),
        ));
        w.handlers.dispatch(&MessageEvent::new(
            Some("https://evil.example".into()),
            json!({"event": "x"}),
        ));
        w.handlers
            .dispatch(&MessageEvent::new(None, json!({"event": "x"})));

        assert_eq!(n.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn send_posts_per_origin() {
        let w = Arc::new(FakeWindow::default());
        let t = WindowTransport::new(
            w.clone(),
            TargetOrigin::list(&["https://a.example", "https://b.example"]).unwrap(),
        );

        t.send(&Envelope::new("ping", json!({"n": 1})));

        let posted = w.posted.lock().unwrap();
        assert_eq!(posted.len(), 2);
        assert_eq!(posted[0].0, json!({"event": "ping", "data": {"n": 1}}));
        assert_eq!(posted[1].1, "https://b.example");
    }
}
