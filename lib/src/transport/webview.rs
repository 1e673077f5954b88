// Copyright (c) 2022-2023 The MobileCoin Foundation

//! WebView bridge transports
//!
//! The native host reaches the page by injecting a script that calls
//! `window.onMessageFromRN(<serialized envelope>)`; the page answers via
//! `window.ReactNativeWebView.postMessage(<serialized envelope>)`, which the
//! embedding app must forward to [WebViewTransport::handle_message].

use log::{debug, error, info, trace, warn};
use serde_json::Value;

use frame_signer_proto::{Envelope, FRAME_READY};

use super::{Listener, ListenerId, Listeners, MessageEvent, Transport};

/// Native handle to a hosted WebView
pub trait WebViewHandle: Send + Sync + 'static {
    /// Evaluate a script in the page
    fn inject_javascript(&self, script: &str);

    /// Reload the page, discarding its state
    fn reload(&self);
}

impl<W: WebViewHandle> WebViewHandle for std::sync::Arc<W> {
    fn inject_javascript(&self, script: &str) {
        W::inject_javascript(self, script)
    }

    fn reload(&self) {
        W::reload(self)
    }
}

/// Native-side [Transport] for a hosted WebView
pub struct WebViewTransport<W: WebViewHandle> {
    webview: W,
    listeners: Listeners,
}

impl<W: WebViewHandle> WebViewTransport<W> {
    pub fn new(webview: W) -> Self {
        Self {
            webview,
            listeners: Listeners::default(),
        }
    }

    /// Access the underlying WebView
    pub fn webview(&self) -> &W {
        &self.webview
    }

    /// Reload the WebView
    pub fn reload(&self) {
        debug!("Reloading WebView");
        self.webview.reload();
    }

    /// Handle a raw message posted by the page.
    ///
    /// The embedding app wires the WebView `onMessage` callback here.
    pub fn handle_message(&self, raw: &str) {
        if raw == FRAME_READY {
            debug!("WebView frame ready");
            return;
        }

        let data: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                error!("Failed to parse WebView message: {e} (raw: {raw})");
                return;
            }
        };

        if forward_console(&data) {
            return;
        }

        if let Some(event) = data.get("event").and_then(Value::as_str) {
            debug!("Received from WebView: {event}");
        }

        self.listeners.dispatch(&MessageEvent::new(None, data));
    }
}

impl<W: WebViewHandle> Transport for WebViewTransport<W> {
    fn send(&self, envelope: &Envelope) {
        let script = bridge_call(&envelope.to_json());
        self.webview.inject_javascript(&script);
    }

    fn add_message_listener(&self, listener: Listener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_message_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }
}

/// Log console output forwarded by the bridge script, returning true if
/// the message was a console message
fn forward_console(data: &Value) -> bool {
    let Some(level) = data
        .get("type")
        .and_then(Value::as_str)
        .and_then(|t| t.strip_prefix("console."))
    else {
        return false;
    };

    let args = match data.get("data") {
        Some(Value::Array(a)) => a
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                v => v.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" "),
        Some(v) => v.to_string(),
        None => String::new(),
    };

    let tag = level.to_uppercase();
    match level {
        "error" => error!("[WebView:{tag}] {args}"),
        "warn" => warn!("[WebView:{tag}] {args}"),
        "info" => info!("[WebView:{tag}] {args}"),
        _ => debug!("[WebView:{tag}] {args}"),
    }

    true
}

/// Encode a string as a JavaScript string literal safe for inline scripts.
///
/// Output is a valid JSON string with `<`, `>`, `&` and the U+2028 /
/// U+2029 line separators escaped.
pub fn js_string_literal(s: &str) -> String {
    let json = Value::String(s.to_string()).to_string();

    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }

    out
}

const BRIDGE_CALL: &str = "window.onMessageFromRN(";

/// Build the script delivering a serialized message to the page bridge
pub fn bridge_call(message: &str) -> String {
    format!(
        "(function() {{ if (window.onMessageFromRN) {{ {BRIDGE_CALL}{}); }} else {{ console.error(\"[RN] onMessageFromRN not found\"); }} true; }})()",
        js_string_literal(message)
    )
}

/// Extract the serialized message from a [bridge_call] script
pub fn parse_bridge_call(script: &str) -> Option<String> {
    let start = script.find(BRIDGE_CALL)? + BRIDGE_CALL.len();

    serde_json::Deserializer::from_str(&script[start..])
        .into_iter::<String>()
        .next()?
        .ok()
}

/// Page-side outbound bridge (`window.ReactNativeWebView`)
pub trait NativeBridge: Send + Sync + 'static {
    fn post_message(&self, message: &str);
}

/// Page-side [Transport] running inside the WebView
pub struct WebViewChildTransport<B: NativeBridge> {
    bridge: B,
    listeners: Listeners,
}

impl<B: NativeBridge> WebViewChildTransport<B> {
    pub fn new(bridge: B) -> Self {
        Self {
            bridge,
            listeners: Listeners::default(),
        }
    }

    /// Entry point for `window.onMessageFromRN`
    pub fn on_message_from_native(&self, raw: &str) {
        match serde_json::from_str::<Value>(raw) {
            Ok(data) => {
                trace!("Message from native: {data}");
                self.listeners.dispatch(&MessageEvent::new(None, data));
            }
            Err(e) => error!("[Bridge] Error handling message from RN: {e}"),
        }
    }
}

impl<B: NativeBridge> Transport for WebViewChildTransport<B> {
    fn send(&self, envelope: &Envelope) {
        self.bridge.post_message(&envelope.to_json());
    }

    fn add_message_listener(&self, listener: Listener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_message_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        scripts: Mutex<Vec<String>>,
        reloads: Mutex<usize>,
    }

    impl WebViewHandle for Recorder {
        fn inject_javascript(&self, script: &str) {
            self.scripts.lock().unwrap().push(script.to_string());
        }

        fn reload(&self) {
            *self.reloads.lock().unwrap() += 1;
        }
    }

    #[test]
    fn literal_escapes_script_breakout() {
        let s = js_string_literal("</script><script>alert(1)</script> & \u{2028}");

        assert!(!s.contains('<'));
        assert!(!s.contains('>'));
        assert!(!s.contains('&'));
        assert!(!s.contains('\u{2028}'));

        // Still a JSON string decoding to the input
        let v: String = serde_json::from_str(&s).unwrap();
        assert_eq!(v, "</script><script>alert(1)</script> & \u{2028}");
    }

    #[test]
    fn send_injects_bridge_call() {
        let w = Arc::new(Recorder::default());
        let t = WebViewTransport::new(w.clone());

        let e = Envelope::new("request:sign", json!({"quote": "\"; alert(1); //"}));
        t.send(&e);

        let scripts = w.scripts.lock().unwrap();
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].starts_with("(function() { if (window.onMessageFromRN)"));

        let msg = parse_bridge_call(&scripts[0]).unwrap();
        assert_eq!(Envelope::parse(&msg).unwrap(), e);
    }

    #[test]
    fn handle_message_filters() {
        let t = WebViewTransport::new(Recorder::default());

        let seen = Arc::new(Mutex::new(vec![]));
        let s = seen.clone();
        t.add_message_listener(Arc::new(move |e: &MessageEvent| {
            s.lock().unwrap().push(e.data.clone())
        }));

        t.handle_message(FRAME_READY);
        t.handle_message("{not json");
        t.handle_message(r#"{"type":"console.warn","data":["low battery", 3]}"#);
        t.handle_message(r#"{"event":"handshakeResponse","data":{"requestVerificationId":"x"}}"#);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["event"], "handshakeResponse");
    }

    #[test]
    fn child_transport() {
        #[derive(Default)]
        struct Bridge(Mutex<Vec<String>>);

        impl NativeBridge for Arc<Bridge> {
            fn post_message(&self, message: &str) {
                self.0.lock().unwrap().push(message.to_string());
            }
        }

        let b = Arc::new(Bridge::default());
        let t = WebViewChildTransport::new(b.clone());

        let seen = Arc::new(Mutex::new(0));
        let s = seen.clone();
        t.add_message_listener(Arc::new(move |_: &MessageEvent| *s.lock().unwrap() += 1));

        t.on_message_from_native(r#"{"event":"handshakeRequest"}"#);
        t.on_message_from_native("garbage");
        assert_eq!(*seen.lock().unwrap(), 1);

        t.send(&Envelope::new("handshakeResponse", json!({"requestVerificationId": "a"})));
        assert_eq!(
            b.0.lock().unwrap()[0],
            r#"{"event":"handshakeResponse","data":{"requestVerificationId":"a"}}"#
        );
    }
}
