// Copyright (c) 2022-2023 The MobileCoin Foundation

//! In-memory window pair with browser `postMessage` semantics
//!
//! Messages are delivered asynchronously and in order, and a message is
//! dropped unless its target origin is `"*"` or the receiving window's
//! origin. Receivers see the sender's origin on each event.

use std::sync::Arc;

use log::{debug, trace};
use serde_json::Value;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

use super::{Listener, ListenerId, Listeners, MessageEvent, MessageWindow};
use crate::origin::WILDCARD;

struct Posted {
    target: String,
    data: Value,
}

/// One end of an in-memory window pair
pub struct MemoryWindow {
    origin: String,
    tx: UnboundedSender<Posted>,
    handlers: Arc<Listeners>,
}

/// Create a connected parent / child window pair.
///
/// Must be called from within a tokio runtime.
pub fn window_pair(parent_origin: &str, child_origin: &str) -> (MemoryWindow, MemoryWindow) {
    let parent_handlers = Arc::new(Listeners::default());
    let child_handlers = Arc::new(Listeners::default());

    let to_child = pump(child_origin, parent_origin, child_handlers.clone());
    let to_parent = pump(parent_origin, child_origin, parent_handlers.clone());

    (
        MemoryWindow {
            origin: parent_origin.to_string(),
            tx: to_child,
            handlers: parent_handlers,
        },
        MemoryWindow {
            origin: child_origin.to_string(),
            tx: to_parent,
            handlers: child_handlers,
        },
    )
}

/// Spawn a delivery task for messages posted to the `dest` window
fn pump(dest: &str, source: &str, handlers: Arc<Listeners>) -> UnboundedSender<Posted> {
    let (tx, mut rx) = unbounded_channel::<Posted>();
    let (dest, source) = (dest.to_string(), source.to_string());

    tokio::spawn(async move {
        while let Some(p) = rx.recv().await {
            if p.target != WILDCARD && p.target != dest {
                debug!("Dropping message for {} (window origin {dest})", p.target);
                continue;
            }

            trace!("Deliver {source} -> {dest}: {}", p.data);

            handlers.dispatch(&MessageEvent::new(Some(source.clone()), p.data));
        }
    });

    tx
}

impl MemoryWindow {
    /// Origin of this window
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Number of installed message handlers
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl MessageWindow for MemoryWindow {
    fn post_message(&self, message: Value, target_origin: &str) {
        let p = Posted {
            target: target_origin.to_string(),
            data: message,
        };

        if self.tx.send(p).is_err() {
            debug!("Counterpart window closed, dropping message");
        }
    }

    fn add_message_handler(&self, handler: Listener) -> ListenerId {
        self.handlers.add(handler)
    }

    fn remove_message_handler(&self, id: ListenerId) {
        self.handlers.remove(id);
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;

    #[tokio::test]
    async fn origin_semantics() {
        let (parent, child) = window_pair("https://app.example", "https://signer.example");

        let (tx, mut rx) = mpsc::unbounded_channel();
        child.add_message_handler(Arc::new(move |e: &MessageEvent| {
            let _ = tx.send(e.clone());
        }));

        parent.post_message(json!(1), "https://other.example");
        parent.post_message(json!(2), "https://signer.example");
        parent.post_message(json!(3), "*");

        let a = rx.recv().await.unwrap();
        assert_eq!(a.data, json!(2));
        assert_eq!(a.origin.as_deref(), Some("https://app.example"));

        let b = rx.recv().await.unwrap();
        assert_eq!(b.data, json!(3));

        assert!(tokio::time::timeout(Duration::from_millis(20), rx.recv())
            .await
            .is_err());
    }
}
