// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Solana iframe signer service

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use ed25519_dalek::Signature;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use frame_signer_core::solana::{self, Transaction};
use frame_signer_proto::{
    encoding::Encoding,
    frame::{FrameRequest, FrameResponse, SignMessageRequest, SignTransactionRequest},
    handshake::millis,
    EventMap,
};

use super::{ServiceState, DEFAULT_REQUEST_TIMEOUT};
use crate::{
    handshake::{HandshakeOptions, HandshakeParent},
    transport::{MessageWindow, WindowTransport},
    AttestationState, AttestationValidator, Error, SendActionOptions, TargetOrigin,
};

/// A mounted signer frame
pub trait Frame: Clone + Send + Sync + 'static {
    type Window: MessageWindow;

    /// URL the frame was loaded from
    fn src(&self) -> &str;

    /// Handle to the frame's content window
    fn content_window(&self) -> Self::Window;
}

/// Document hosting signer frames
#[async_trait]
pub trait FrameHost: Send + Sync + 'static {
    type Frame: Frame;

    /// Create a hidden frame loading `url`, resolving once loaded
    async fn mount(&self, url: &str) -> Result<Self::Frame, Error>;

    /// Locate an already mounted frame loaded from `url`
    fn find(&self, url: &str) -> Option<Self::Frame>;

    /// Remove a frame from the document
    fn unmount(&self, frame: &Self::Frame);
}

/// [SolanaFrameSigner] configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FrameSignerConfig {
    /// Signer frame URL
    pub iframe_url: String,

    /// Origin messages are posted to and accepted from,
    /// derived from `iframe_url` when unset
    pub target_origin: Option<String>,

    /// Permit a `"*"` target origin, for controlled test contexts only
    pub allow_wildcard: bool,

    pub handshake: HandshakeOptions,

    #[serde(rename = "timeoutMs", with = "millis")]
    pub request_timeout: Duration,
}

impl Default for FrameSignerConfig {
    fn default() -> Self {
        Self {
            iframe_url: String::new(),
            target_origin: None,
            allow_wildcard: false,
            handshake: HandshakeOptions::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl FrameSignerConfig {
    pub fn new(iframe_url: impl Into<String>) -> Self {
        Self {
            iframe_url: iframe_url.into(),
            ..Default::default()
        }
    }

    /// Resolve the channel target origin
    pub fn target_origin(&self) -> Result<TargetOrigin, Error> {
        match &self.target_origin {
            Some(o) => TargetOrigin::parse(o, self.allow_wildcard),
            None => TargetOrigin::from_url(&self.iframe_url),
        }
    }
}

type FrameTransport<H> = WindowTransport<<<H as FrameHost>::Frame as Frame>::Window>;

type FrameChannel<H> = HandshakeParent<FrameResponse, FrameRequest, FrameTransport<H>>;

struct Mounted<H: FrameHost> {
    frame: H::Frame,
    channel: FrameChannel<H>,
}

/// Solana signer backed by an isolated iframe
pub struct SolanaFrameSigner<H: FrameHost> {
    host: H,
    config: FrameSignerConfig,
    state: Mutex<ServiceState>,
    mounted: Mutex<Option<Mounted<H>>>,
    address: Mutex<Option<String>>,
    attestation: AttestationValidator,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Map a response of the wrong kind to an error
fn unexpected(r: FrameResponse) -> Error {
    match r.remote_error() {
        Some(e) => e.into(),
        None => Error::UnexpectedResponse(r.event().to_string()),
    }
}

fn decode(s: &str) -> Result<Vec<u8>, Error> {
    Encoding::Base58
        .decode(s)
        .map_err(|e| Error::Encoding(e.to_string()))
}

impl<H: FrameHost> SolanaFrameSigner<H> {
    pub fn new(host: H, config: FrameSignerConfig) -> Self {
        Self {
            host,
            config,
            state: Mutex::new(ServiceState::NotInitialized),
            mounted: Mutex::new(None),
            address: Mutex::new(None),
            attestation: AttestationValidator::new(),
        }
    }

    pub fn config(&self) -> &FrameSignerConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn state(&self) -> ServiceState {
        *lock(&self.state)
    }

    fn set_state(&self, s: ServiceState) {
        debug!("Frame signer state: {s}");
        *lock(&self.state) = s;
    }

    /// Cached signer address, set by [Self::get_public_key]
    pub fn address(&self) -> Option<String> {
        lock(&self.address).clone()
    }

    pub fn attestation_state(&self) -> AttestationState {
        self.attestation.state()
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.mounted)
            .as_ref()
            .map(|m| m.channel.is_connected())
            .unwrap_or(false)
    }

    /// Mount the signer frame and handshake with it.
    ///
    /// When mounting or the handshake fails, an already mounted frame
    /// loaded from the configured URL is adopted instead. Calling this on
    /// a connected signer is a no-op.
    pub async fn init(&self) -> Result<(), Error> {
        if self.is_connected() {
            debug!("Frame signer already connected");
            return Ok(());
        }

        // Drop a frame left from an earlier failed or reset connection
        let stale = lock(&self.mounted).take();
        if let Some(m) = stale {
            m.channel.reset();
            self.host.unmount(&m.frame);
        }

        self.attestation.reset_attestation_state();
        self.set_state(ServiceState::Initializing);

        let r = self.mount_and_connect().await;

        match r {
            Ok(()) => {
                self.set_state(ServiceState::Connected);
                info!("Frame signer connected to {}", self.config.iframe_url);
                Ok(())
            }
            Err(e) => {
                self.set_state(ServiceState::Error);
                error!("Frame signer init failed: {e}");
                Err(e)
            }
        }
    }

    async fn mount_and_connect(&self) -> Result<(), Error> {
        let url = &self.config.iframe_url;
        let target = self.config.target_origin()?;

        let e = match self.host.mount(url).await {
            Ok(frame) => match self.connect(frame.clone(), target.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    self.host.unmount(&frame);
                    e
                }
            },
            Err(e) => e,
        };

        warn!("Mounting signer frame failed ({e}), looking for an existing frame");

        match self.host.find(url) {
            Some(frame) => {
                info!("Adopting existing signer frame {}", frame.src());
                self.connect(frame, target).await
            }
            None => Err(e),
        }
    }

    async fn connect(&self, frame: H::Frame, target: TargetOrigin) -> Result<(), Error> {
        let transport = Arc::new(WindowTransport::new(frame.content_window(), target));
        let channel = HandshakeParent::new(transport, self.config.handshake)?;

        self.set_state(ServiceState::Initialized);

        channel.handshake_with_child().await?;

        *lock(&self.mounted) = Some(Mounted { frame, channel });

        Ok(())
    }

    fn channel(&self) -> Result<FrameChannel<H>, Error> {
        lock(&self.mounted)
            .as_ref()
            .map(|m| m.channel.clone())
            .ok_or(Error::NotInitialized)
    }

    async fn request(&self, req: FrameRequest) -> Result<FrameResponse, Error> {
        let channel = self.channel()?;
        let opts = SendActionOptions::default().with_timeout(self.config.request_timeout);

        channel
            .send_action(&req, req.response_event(), opts)
            .await
            .map_err(|e| {
                error!("{} failed: {e}", req.event());
                e
            })
    }

    /// Fetch the signer address, caching it
    pub async fn get_public_key(&self) -> Result<String, Error> {
        let r = match self.request(FrameRequest::GetPublicKey).await? {
            FrameResponse::PublicKey(r) => r,
            r => return Err(unexpected(r)),
        };

        solana::parse_address(&r.public_key)?;

        *lock(&self.address) = Some(r.public_key.clone());

        Ok(r.public_key)
    }

    /// Request and check the frame's attestation document
    pub async fn validate_attestation(&self) -> Result<bool, Error> {
        self.attestation
            .validate_attestation(async {
                match self.request(FrameRequest::Attestation).await? {
                    FrameResponse::Attestation(r) => Ok(r.attestation),
                    r => Err(unexpected(r)),
                }
            })
            .await
    }

    /// Attested public key, only while the attestation is valid
    pub fn attestation_public_key(&self) -> Option<String> {
        self.attestation.attestation_public_key()
    }

    async fn signer_address(&self) -> Result<String, Error> {
        match self.address() {
            Some(a) => Ok(a),
            None => self.get_public_key().await,
        }
    }

    /// Sign an arbitrary message
    pub async fn sign_message(&self, message: &[u8]) -> Result<Signature, Error> {
        self.attestation.ensure_attestation_validated()?;

        let signer_address = self.signer_address().await?;

        let req = FrameRequest::SignMessage(SignMessageRequest {
            signer_address,
            message: Encoding::Base58.encode(message),
        });

        let r = match self.request(req).await? {
            FrameResponse::SignMessage(r) => r,
            r => return Err(unexpected(r)),
        };

        Ok(solana::parse_signature(&decode(&r.signature)?)?)
    }

    /// Sign a transaction, returning it with the signer's slot filled
    pub async fn sign_transaction(&self, tx: &Transaction) -> Result<Transaction, Error> {
        self.attestation.ensure_attestation_validated()?;

        let signer_address = self.signer_address().await?;

        let req = FrameRequest::SignTransaction(SignTransactionRequest {
            signer_address,
            transaction: Encoding::Base58.encode(tx.to_bytes()),
        });

        let r = match self.request(req).await? {
            FrameResponse::SignTransaction(r) => r,
            r => return Err(unexpected(r)),
        };

        Ok(Transaction::from_bytes(&decode(&r.transaction)?)?)
    }

    /// Remove the frame and clear cached state, safe to call repeatedly
    pub fn dispose(&self) {
        let mounted = lock(&self.mounted).take();

        if let Some(m) = mounted {
            m.channel.reset();
            self.host.unmount(&m.frame);
            info!("Frame signer disposed");
        }

        *lock(&self.address) = None;
        self.attestation.reset_attestation_state();
        self.set_state(ServiceState::NotInitialized);
    }
}
