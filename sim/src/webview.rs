// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Simulated WebView hosting the recovery-key signer page
//!
//! Scripts injected by the native side are parsed for bridge calls and
//! delivered to the page in order, page messages are delivered to the
//! handler registered with [SimWebView::set_message_handler]. A reload
//! replaces the page (and its engine) while storage persists.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, MutexGuard,
};

use log::{debug, error, warn};
use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedSender},
    task::AbortHandle,
};

use frame_signer::{
    handshake::HandshakeOptions,
    transport::{parse_bridge_call, NativeBridge, WebViewChildTransport, WebViewHandle},
};
use frame_signer_proto::FRAME_READY;
use frame_signer_tests::RecoveryHarness;

use crate::{child::serve_recovery, MemoryDriver};

type Handler = Arc<dyn Fn(&str) + Send + Sync>;

/// Simulated native WebView
#[derive(Clone)]
pub struct SimWebView {
    inner: Arc<Inner>,
}

struct Inner {
    driver: MemoryDriver,
    options: HandshakeOptions,
    handler: Mutex<Option<Handler>>,
    to_native: UnboundedSender<String>,
    page: Mutex<Option<Page>>,
    reloads: AtomicUsize,
    scripts: AtomicUsize,
}

/// Loaded page instance
struct Page {
    to_page: UnboundedSender<String>,
    task: AbortHandle,
}

impl Drop for Page {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Page side of the `ReactNativeWebView.postMessage` bridge
struct PageBridge {
    to_native: UnboundedSender<String>,
}

impl NativeBridge for PageBridge {
    fn post_message(&self, message: &str) {
        if self.to_native.send(message.to_string()).is_err() {
            debug!("WebView closed, dropping page message");
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl SimWebView {
    /// Create a WebView and load the signer page.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(driver: MemoryDriver, options: HandshakeOptions) -> Self {
        let (to_native, mut rx) = unbounded_channel::<String>();

        let inner = Arc::new(Inner {
            driver,
            options,
            handler: Mutex::new(None),
            to_native,
            page: Mutex::new(None),
            reloads: AtomicUsize::new(0),
            scripts: AtomicUsize::new(0),
        });

        // Deliver page messages to the native handler
        let weak = Arc::downgrade(&inner);
        tokio::spawn(async move {
            while let Some(m) = rx.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };

                let handler = lock(&inner.handler).clone();
                match handler {
                    Some(h) => h(&m),
                    None => debug!("No WebView message handler, dropping page message"),
                }
            }
        });

        inner.load();

        Self { inner }
    }

    /// Register the native `onMessage` handler
    pub fn set_message_handler(&self, handler: impl Fn(&str) + Send + Sync + 'static) {
        *lock(&self.inner.handler) = Some(Arc::new(handler));
    }

    pub fn driver(&self) -> &MemoryDriver {
        &self.inner.driver
    }

    /// Number of reloads performed
    pub fn reloads(&self) -> usize {
        self.inner.reloads.load(Ordering::SeqCst)
    }

    /// Number of scripts injected
    pub fn injected_scripts(&self) -> usize {
        self.inner.scripts.load(Ordering::SeqCst)
    }
}

impl Inner {
    /// Replace the page with a freshly loaded instance
    fn load(&self) {
        let bridge = PageBridge {
            to_native: self.to_native.clone(),
        };
        let transport = Arc::new(WebViewChildTransport::new(bridge));

        let (to_page, mut rx) = unbounded_channel::<String>();

        let t = transport.clone();
        let inbound = async move {
            while let Some(m) = rx.recv().await {
                t.on_message_from_native(&m);
            }
        };

        let driver = self.driver.clone();
        let options = self.options;
        let task = tokio::spawn(async move {
            // Serve is polled first so it is listening before any delivery
            let (r, _) = tokio::join!(serve_recovery(transport, driver, options), inbound);
            if let Err(e) = r {
                error!("Recovery page failed: {e}");
            }
        });

        *lock(&self.page) = Some(Page {
            to_page,
            task: task.abort_handle(),
        });

        if self.to_native.send(FRAME_READY.to_string()).is_err() {
            debug!("WebView closed");
        }
    }
}

impl WebViewHandle for SimWebView {
    fn inject_javascript(&self, script: &str) {
        self.inner.scripts.fetch_add(1, Ordering::SeqCst);

        let Some(m) = parse_bridge_call(script) else {
            debug!("Ignoring non-bridge script");
            return;
        };

        match lock(&self.inner.page).as_ref() {
            Some(p) => {
                if p.to_page.send(m).is_err() {
                    warn!("Page closed, dropping message");
                }
            }
            None => warn!("No page loaded, dropping message"),
        }
    }

    fn reload(&self) {
        self.inner.reloads.fetch_add(1, Ordering::SeqCst);
        debug!("Reloading page");

        // Old page is aborted on drop
        let old = lock(&self.inner.page).take();
        drop(old);

        self.inner.load();
    }
}

impl RecoveryHarness for SimWebView {
    fn otp_for(&self, auth_id: &str) -> Option<String> {
        self.inner.driver.last_otp(auth_id)
    }

    fn fail_storage(&self, n: usize) {
        self.inner.driver.fail_storage(n)
    }

    fn reloads(&self) -> usize {
        self.inner.reloads.load(Ordering::SeqCst)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        lock(&self.page).take();
    }
}
