// Copyright (c) 2022-2023 The MobileCoin Foundation

//! WebView parent with reload-and-retry recovery
//!
//! Some child failures (storage lost after the OS evicts the page's
//! database, for example) only clear when the page is reloaded. A request
//! answered with an error code from the recoverable set triggers one
//! reload and re-handshake, shared by all concurrent callers, then the
//! request is retried once. The retry's outcome is returned as is.

use std::{collections::BTreeSet, sync::Arc};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use frame_signer_proto::{recovery::INDEXEDDB_FATAL, EventMap};

use crate::{
    emitter::{Inbound, Subscription},
    handshake::{HandshakeOptions, HandshakeParent, HandshakeState},
    transport::{WebViewHandle, WebViewTransport},
    Error, ListenerId, SendActionOptions, SingleFlight,
};

pub mod globals;
use globals::GlobalsSchema;

/// Bridge script installed in the page before content loads.
///
/// Defines `window.onMessageFromRN`, re-dispatching native messages as
/// window `message` events, and forwards console output to the host as
/// `{type: "console.<level>", data: [...]}`.
pub const BRIDGE_SCRIPT: &str = r#"(function() {
    var post = function(type, args) {
        try {
            var data = Array.prototype.map.call(args, function(a) {
                if (typeof a === 'string') { return a; }
                try { return JSON.stringify(a); } catch (e) { return '[Unserializable Object]'; }
            });
            if (window.ReactNativeWebView && window.ReactNativeWebView.postMessage) {
                window.ReactNativeWebView.postMessage(JSON.stringify({ type: 'console.' + type, data: data }));
            }
        } catch (e) {}
    };
    ['log', 'info', 'warn', 'error'].forEach(function(level) {
        var orig = console[level];
        console[level] = function() { orig.apply(console, arguments); post(level, arguments); };
    });
    window.onMessageFromRN = function(messageStr) {
        try {
            var message = JSON.parse(typeof messageStr === 'string' ? messageStr : JSON.stringify(messageStr));
            window.dispatchEvent(new MessageEvent('message', { data: message }));
        } catch (e) {}
    };
})();"#;

/// Build the script injected before content load, bridge first
pub fn injected_javascript(
    schema: &GlobalsSchema,
    globals: &serde_json::Map<String, serde_json::Value>,
) -> Result<String, Error> {
    let g = schema.script(globals)?;
    Ok(format!("{BRIDGE_SCRIPT}\n{g}"))
}

/// [WebViewParent] options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebViewParentOptions {
    pub handshake: HandshakeOptions,

    /// Error codes triggering reload and retry
    pub recoverable_error_codes: BTreeSet<String>,
}

impl Default for WebViewParentOptions {
    fn default() -> Self {
        Self {
            handshake: HandshakeOptions::default(),
            recoverable_error_codes: [INDEXEDDB_FATAL.to_string()].into_iter().collect(),
        }
    }
}

/// Native parent of a WebView-hosted child
pub struct WebViewParent<In: EventMap, Out: EventMap, W: WebViewHandle> {
    parent: HandshakeParent<In, Out, WebViewTransport<W>>,
    recoverable: Arc<BTreeSet<String>>,
    recovery: Arc<SingleFlight<Result<(), Error>>>,
}

impl<In: EventMap, Out: EventMap, W: WebViewHandle> Clone for WebViewParent<In, Out, W> {
    fn clone(&self) -> Self {
        Self {
            parent: self.parent.clone(),
            recoverable: self.recoverable.clone(),
            recovery: self.recovery.clone(),
        }
    }
}

impl<In: EventMap, Out: EventMap, W: WebViewHandle> WebViewParent<In, Out, W> {
    pub fn new(webview: W, options: WebViewParentOptions) -> Result<Self, Error> {
        let transport = Arc::new(WebViewTransport::new(webview));

        Ok(Self {
            parent: HandshakeParent::new(transport, options.handshake)?,
            recoverable: Arc::new(options.recoverable_error_codes),
            recovery: Arc::new(SingleFlight::new()),
        })
    }

    /// Access the WebView transport
    pub fn transport(&self) -> &Arc<WebViewTransport<W>> {
        self.parent.transport()
    }

    /// Forward a raw message from the WebView `onMessage` callback
    pub fn handle_message(&self, raw: &str) {
        self.transport().handle_message(raw)
    }

    pub async fn handshake_with_child(&self) -> Result<(), Error> {
        self.parent.handshake_with_child().await
    }

    pub fn state(&self) -> HandshakeState {
        self.parent.state()
    }

    pub fn is_connected(&self) -> bool {
        self.parent.is_connected()
    }

    pub fn reset(&self) {
        self.parent.reset()
    }

    pub fn send(&self, event: &Out) -> Result<(), Error> {
        self.parent.send(event)
    }

    pub fn on(&self, handler: impl Fn(Inbound<In>) + Send + Sync + 'static) -> ListenerId {
        self.parent.on(handler)
    }

    pub fn off(&self, id: ListenerId) {
        self.parent.off(id)
    }

    pub fn subscribe(&self) -> Subscription<In, WebViewTransport<W>> {
        self.parent.subscribe()
    }

    /// Check whether an error code triggers recovery
    pub fn is_recoverable(&self, code: &str) -> bool {
        self.recoverable.contains(code)
    }

    /// Send a request, reloading the WebView and retrying once when the
    /// child answers with a recoverable error code
    pub async fn send_action(
        &self,
        event: &Out,
        response: &str,
        opts: SendActionOptions<In>,
    ) -> Result<In, Error> {
        let first = self
            .parent
            .send_action(event, response, opts.clone())
            .await;

        let code = match &first {
            Ok(r) => r.error_code(),
            Err(e) => e.code(),
        };
        let code = match code {
            Some(c) if self.is_recoverable(&c) => c,
            _ => return first,
        };

        warn!(
            "Recoverable error '{code}' for {}, reloading WebView",
            event.event()
        );

        self.recover().await?;

        debug!("Retrying {}", event.event());
        self.parent.send_action(event, response, opts).await
    }

    /// Reload the WebView and re-handshake, concurrent callers share one reload
    pub async fn recover(&self) -> Result<(), Error> {
        let parent = self.parent.clone();

        self.recovery
            .run(move || async move {
                parent.reset();
                parent.transport().reload();
                parent.handshake_with_child().await
            })
            .await
    }
}
