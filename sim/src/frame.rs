// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Simulated document hosting signer iframes

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, MutexGuard,
};

use async_trait::async_trait;
use log::{debug, error, info};
use tokio::task::AbortHandle;

use frame_signer::{
    handshake::HandshakeOptions,
    signer::{Frame, FrameHost},
    transport::{
        memory::{window_pair, MemoryWindow},
        WindowTransport,
    },
    Error, TargetOrigin,
};

use crate::{child::serve_frame, MemoryDriver};

/// Simulated signer iframe
#[derive(Clone)]
pub struct SimFrame {
    src: String,
    window: Arc<MemoryWindow>,
    task: AbortHandle,
}

impl Frame for SimFrame {
    type Window = Arc<MemoryWindow>;

    fn src(&self) -> &str {
        &self.src
    }

    fn content_window(&self) -> Self::Window {
        self.window.clone()
    }
}

/// Simulated parent document
pub struct SimFrameHost {
    origin: String,
    driver: MemoryDriver,
    options: HandshakeOptions,
    frames: Mutex<Vec<SimFrame>>,
    mount_failures: AtomicUsize,
}

fn origin_of(url: &str) -> Result<String, Error> {
    match TargetOrigin::from_url(url)? {
        TargetOrigin::Exact(o) => Ok(o),
        o => Err(Error::InvalidOrigin(o.to_string())),
    }
}

impl SimFrameHost {
    /// Create a host document at `origin`, frames share `driver` storage
    pub fn new(origin: &str, driver: MemoryDriver, options: HandshakeOptions) -> Self {
        Self {
            origin: origin.to_string(),
            driver,
            options,
            frames: Mutex::new(Vec::new()),
            mount_failures: AtomicUsize::new(0),
        }
    }

    fn frames(&self) -> MutexGuard<'_, Vec<SimFrame>> {
        self.frames.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn driver(&self) -> &MemoryDriver {
        &self.driver
    }

    /// Fail the next `n` mount attempts
    pub fn fail_mounts(&self, n: usize) {
        self.mount_failures.store(n, Ordering::SeqCst);
    }

    /// Number of mounted frames
    pub fn frame_count(&self) -> usize {
        self.frames().len()
    }

    /// Mount a frame running a signer, as if mounted by an earlier session
    pub async fn preload(&self, url: &str) -> Result<SimFrame, Error> {
        self.load(url).await
    }

    async fn load(&self, url: &str) -> Result<SimFrame, Error> {
        let child_origin = origin_of(url)?;
        let (parent, child) = window_pair(&self.origin, &child_origin);
        let child = Arc::new(child);

        let transport = Arc::new(WindowTransport::new(
            child.clone(),
            TargetOrigin::Exact(self.origin.clone()),
        ));

        let driver = self.driver.clone();
        let options = self.options;
        let task = tokio::spawn(async move {
            if let Err(e) = serve_frame(transport, driver, options).await {
                error!("Frame child failed: {e}");
            }
        });

        // Loaded once the child is listening
        while child.handler_count() == 0 {
            tokio::task::yield_now().await;
        }

        let frame = SimFrame {
            src: url.to_string(),
            window: Arc::new(parent),
            task: task.abort_handle(),
        };

        self.frames().push(frame.clone());
        info!("Mounted frame {url}");

        Ok(frame)
    }
}

#[async_trait]
impl FrameHost for SimFrameHost {
    type Frame = SimFrame;

    async fn mount(&self, url: &str) -> Result<SimFrame, Error> {
        let failing = self
            .mount_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            debug!("Injected mount failure for {url}");
            return Err(Error::MissingFrame(url.to_string()));
        }

        self.load(url).await
    }

    fn find(&self, url: &str) -> Option<SimFrame> {
        self.frames().iter().find(|f| f.src == url).cloned()
    }

    fn unmount(&self, frame: &SimFrame) {
        let mut frames = self.frames();

        frames.retain(|f| !Arc::ptr_eq(&f.window, &frame.window));

        frame.task.abort();
        debug!("Unmounted frame {}", frame.src);
    }
}
