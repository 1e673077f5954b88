// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Recovery-key signer hosted in a WebView
//!
//! The WebView holds the recovery key. Signer creation either returns an
//! existing signer for the user or dispatches an email OTP, which is then
//! submitted FF1-encrypted under a key shared with the attested WebView.
//! Storage failures inside the WebView are handled by [WebViewParent]
//! with a reload and a single retry.

use std::{
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use ed25519_dalek::Signature;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

use frame_signer_core::{
    crypto::{derive_symmetric_key, fpe::Fpe, keys::public_key_from_base64, KeyPair},
    solana::{self, Transaction},
};
use frame_signer_proto::{
    encoding::Encoding,
    handshake::millis,
    recovery::{
        AttestationRequest, AuthData, ChainLayer, CreateSignerData, CreateSignerRequest,
        GetStatusRequest, KeyType, RecoveryRequest, RecoveryResponse, SendOtpData, SendOtpRequest,
        SignData, SignRequest, SignerState, EMAIL_AUTH_PREFIX,
    },
    EventMap,
};

use super::DEFAULT_REQUEST_TIMEOUT;
use crate::{
    emitter::{new_request_id, opt_millis},
    transport::WebViewHandle,
    webview::{
        globals::{GlobalsSchema, APP_ID_GLOBAL},
        injected_javascript, WebViewParent, WebViewParentOptions,
    },
    AttestationError, AttestationState, AttestationValidator, Error, SendActionOptions,
};

/// Default recovery-key WebView endpoint
pub const DEFAULT_SECURE_ENDPOINT_URL: &str = "https://crossmint-signer-frames.onrender.com";

/// Recovery signer progress
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RecoveryKeyStatus {
    #[default]
    NotLoaded,
    /// WebView loaded and handshake complete
    FrameLoaded,
    /// Signer creation dispatched an OTP
    AwaitingOtpValidation,
    /// Signer available
    Loaded,
}

/// [RecoveryKeySigner] configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecoveryKeySignerConfig {
    /// Secure endpoint loaded in the WebView
    pub secure_endpoint_url: String,

    /// Application id injected as `window.crossmintAppId`
    pub app_id: Option<String>,

    pub webview: WebViewParentOptions,

    #[serde(rename = "timeoutMs", with = "millis")]
    pub request_timeout: Duration,

    /// Resend interval for requests, unset to send once
    #[serde(rename = "intervalMs", with = "opt_millis")]
    pub request_interval: Option<Duration>,
}

impl Default for RecoveryKeySignerConfig {
    fn default() -> Self {
        Self {
            secure_endpoint_url: DEFAULT_SECURE_ENDPOINT_URL.to_string(),
            app_id: None,
            webview: WebViewParentOptions::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            request_interval: None,
        }
    }
}

/// Solana signer backed by a recovery key held in a WebView
pub struct RecoveryKeySigner<W: WebViewHandle> {
    parent: WebViewParent<RecoveryResponse, RecoveryRequest, W>,
    config: RecoveryKeySignerConfig,
    auth: Mutex<Option<AuthData>>,
    status: Mutex<RecoveryKeyStatus>,
    address: Mutex<Option<String>>,
    attestation: AttestationValidator,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn unexpected(r: RecoveryResponse) -> Error {
    Error::UnexpectedResponse(r.event().to_string())
}

/// Prefix an email address to form an auth id, existing prefixes are kept
pub fn email_auth_id(email: &str) -> String {
    if email.starts_with(EMAIL_AUTH_PREFIX) {
        email.to_string()
    } else {
        format!("{EMAIL_AUTH_PREFIX}{email}")
    }
}

impl<W: WebViewHandle> RecoveryKeySigner<W> {
    pub fn new(webview: W, config: RecoveryKeySignerConfig) -> Result<Self, Error> {
        Ok(Self {
            parent: WebViewParent::new(webview, config.webview.clone())?,
            config,
            auth: Mutex::new(None),
            status: Mutex::new(RecoveryKeyStatus::NotLoaded),
            address: Mutex::new(None),
            attestation: AttestationValidator::new(),
        })
    }

    pub fn config(&self) -> &RecoveryKeySignerConfig {
        &self.config
    }

    /// Access the underlying WebView channel
    pub fn parent(&self) -> &WebViewParent<RecoveryResponse, RecoveryRequest, W> {
        &self.parent
    }

    /// Set the caller credentials attached to each request
    pub fn set_auth(&self, jwt: impl Into<String>, api_key: impl Into<String>) {
        *lock(&self.auth) = Some(AuthData {
            jwt: jwt.into(),
            api_key: api_key.into(),
        });
    }

    pub fn status(&self) -> RecoveryKeyStatus {
        *lock(&self.status)
    }

    fn set_status(&self, s: RecoveryKeyStatus) {
        debug!("Recovery key status: {s}");
        *lock(&self.status) = s;
    }

    /// Loaded signer address
    pub fn address(&self) -> Option<String> {
        lock(&self.address).clone()
    }

    pub fn attestation_state(&self) -> AttestationState {
        self.attestation.state()
    }

    /// Script to inject before the WebView content loads
    pub fn injected_javascript(&self) -> Result<String, Error> {
        let mut globals = Map::new();
        if let Some(id) = &self.config.app_id {
            globals.insert(APP_ID_GLOBAL.to_string(), Value::String(id.clone()));
        }

        injected_javascript(&GlobalsSchema::default(), &globals)
    }

    /// Handler for raw messages from the WebView `onMessage` callback
    pub fn message_handler(&self) -> impl Fn(&str) + Send + Sync + 'static {
        let parent = self.parent.clone();
        move |raw: &str| parent.handle_message(raw)
    }

    /// Handshake once the WebView has loaded
    pub async fn on_load(&self) -> Result<(), Error> {
        match self.parent.handshake_with_child().await {
            Ok(()) => {
                self.set_status(RecoveryKeyStatus::FrameLoaded);
                info!("Recovery key WebView loaded");
                Ok(())
            }
            Err(e) => {
                self.set_status(RecoveryKeyStatus::NotLoaded);
                error!("Recovery key handshake failed: {e}");
                Err(e)
            }
        }
    }

    fn ensure_ready(&self) -> Result<AuthData, Error> {
        // Gated on the handshake rather than status, a rejected OTP may be retried
        if !self.parent.is_connected() {
            return Err(Error::NotConnected);
        }

        lock(&self.auth).clone().ok_or(Error::MissingCredentials)
    }

    async fn request(&self, req: RecoveryRequest) -> Result<RecoveryResponse, Error> {
        let mut opts = SendActionOptions::default().with_timeout(self.config.request_timeout);
        if let Some(i) = self.config.request_interval {
            opts = opts.with_interval(i);
        }

        self.parent
            .send_action(&req, req.response_event(), opts)
            .await
            .map_err(|e| {
                error!("{} failed: {e}", req.event());
                e
            })
    }

    /// Request and check the WebView's attestation document,
    /// bound to a fresh random challenge
    pub async fn validate_attestation(&self) -> Result<bool, Error> {
        let req = RecoveryRequest::Attestation(AttestationRequest {
            challenge: new_request_id(),
        });

        self.attestation
            .validate_attestation(async {
                match self.request(req).await? {
                    RecoveryResponse::Attestation(r) => Ok(r.into_result()?.attestation_document),
                    r => Err(unexpected(r)),
                }
            })
            .await
    }

    /// Check whether a signer exists on this device
    pub async fn get_status(&self) -> Result<SignerState, Error> {
        let auth_data = self.ensure_ready()?;

        let req = RecoveryRequest::GetStatus(GetStatusRequest { auth_data });

        match self.request(req).await? {
            RecoveryResponse::GetStatus(r) => Ok(r.into_result()?.signer_status),
            r => Err(unexpected(r)),
        }
    }

    /// Create or load the signer for an email address.
    ///
    /// Returns the signer address when one exists, or `None` when an OTP
    /// was dispatched and must be passed to [Self::validate_email_otp].
    pub async fn create_signer(&self, email: &str) -> Result<Option<String>, Error> {
        let auth_data = self.ensure_ready()?;

        let req = RecoveryRequest::CreateSigner(CreateSignerRequest {
            auth_data,
            data: CreateSignerData {
                auth_id: email_auth_id(email),
                chain_layer: ChainLayer::Solana,
            },
        });

        let r = match self.request(req).await {
            Ok(RecoveryResponse::CreateSigner(r)) => r.into_result().map_err(Error::from),
            Ok(r) => Err(unexpected(r)),
            Err(e) => Err(e),
        };

        match r {
            Ok(a) => match a.address {
                Some(address) => {
                    self.load(address.clone());
                    Ok(Some(address))
                }
                None => {
                    self.set_status(RecoveryKeyStatus::AwaitingOtpValidation);
                    Ok(None)
                }
            },
            Err(e) => {
                self.set_status(RecoveryKeyStatus::NotLoaded);
                Err(e)
            }
        }
    }

    /// Submit the emailed OTP, returning the new signer address.
    ///
    /// The OTP is FF1-encrypted under a key derived from a fresh key pair
    /// and the attested WebView public key.
    pub async fn validate_email_otp(&self, otp: &str) -> Result<String, Error> {
        *lock(&self.address) = None;

        let r = self.submit_otp(otp).await;

        match r {
            Ok(address) => {
                self.load(address.clone());
                Ok(address)
            }
            Err(e) => {
                self.set_status(RecoveryKeyStatus::NotLoaded);
                Err(e)
            }
        }
    }

    async fn submit_otp(&self, otp: &str) -> Result<String, Error> {
        let auth_data = self.ensure_ready()?;
        self.attestation.ensure_attestation_validated()?;

        let attested = self
            .attestation
            .attestation_public_key()
            .ok_or(AttestationError::NotValidated)?;
        let remote = public_key_from_base64(&attested)?;

        let local = KeyPair::generate();
        let key = derive_symmetric_key(Some(&local), Some(&remote))?;
        let encrypted_otp = Fpe::default().encrypt_str(otp, &key)?;

        let req = RecoveryRequest::SendOtp(SendOtpRequest {
            auth_data,
            data: SendOtpData {
                chain_layer: ChainLayer::Solana,
                encrypted_otp,
                sender_public_key: local.public_key_base64(),
            },
        });

        let a = match self.request(req).await? {
            RecoveryResponse::SendOtp(r) => r.into_result()?,
            r => return Err(unexpected(r)),
        };

        a.address
            .ok_or_else(|| Error::UnexpectedResponse("send-otp without address".to_string()))
    }

    fn load(&self, address: String) {
        info!("Recovery signer loaded: {address}");
        *lock(&self.address) = Some(address);
        self.set_status(RecoveryKeyStatus::Loaded);
    }

    /// Sign an arbitrary message with the recovery signer
    pub async fn sign_message(&self, message: &[u8]) -> Result<Signature, Error> {
        self.attestation.ensure_attestation_validated()?;
        let auth_data = self.ensure_ready()?;

        if self.address().is_none() {
            return Err(Error::AddressUnavailable);
        }

        let req = RecoveryRequest::Sign(SignRequest {
            auth_data,
            data: SignData {
                bytes: Encoding::Base58.encode(message),
                key_type: KeyType::Ed25519,
                encoding: Encoding::Base58,
            },
        });

        let r = match self.request(req).await? {
            RecoveryResponse::Sign(r) => r.into_result()?,
            r => return Err(unexpected(r)),
        };

        let b = Encoding::Base58
            .decode(&r.signature)
            .map_err(|e| Error::Encoding(e.to_string()))?;

        Ok(solana::parse_signature(&b)?)
    }

    /// Sign a transaction's message and add the signature to its slot
    pub async fn sign_transaction(&self, mut tx: Transaction) -> Result<Transaction, Error> {
        let signature = self.sign_message(tx.message()).await?;

        let address = self.address().ok_or(Error::AddressUnavailable)?;
        let key = solana::parse_address(&address)?;

        tx.add_signature(&key, &signature)?;

        Ok(tx)
    }

    /// Drop the signer and channel state, safe to call repeatedly
    pub fn dispose(&self) {
        self.parent.reset();
        *lock(&self.address) = None;
        self.attestation.reset_attestation_state();
        self.set_status(RecoveryKeyStatus::NotLoaded);
    }
}
