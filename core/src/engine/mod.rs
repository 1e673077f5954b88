// Copyright (c) 2022-2023 The MobileCoin Foundation

//! The [Engine] runs inside the isolated child context and holds the key
//! material.
//!
//! It handles [FrameRequest]s from the Solana iframe signer channel and
//! [RecoveryRequest]s from the recovery-key WebView channel, returning the
//! matching response event. Failures are folded into the channel's error
//! shape so the parent always receives an answer.
//!
//! Persistent state (signing keys, the attested encryption key, the active
//! signer) lives behind the [Driver] so it survives a context reload.

use ed25519_dalek::SigningKey;
use log::debug;
use rand_core::{CryptoRngCore, OsRng};
use serde_json::{Map, Value};
use strum::{Display, EnumIter, EnumString, EnumVariantNames};
use zeroize::Zeroize;

use frame_signer_proto::{
    frame::{FrameRequest, FrameResponse},
    recovery::{RecoveryRequest, RecoveryResponse},
    EventMap,
};

use crate::crypto::{fpe::Fpe, KeyPair};

mod error;
pub use error::Error;

mod frame;

mod recovery;

/// Storage slot for the attested X25519 encryption key
pub const ENCRYPTION_KEY_SLOT: &str = "encryption-key";

/// Storage slot for the frame signer's ed25519 key
pub const FRAME_SIGNER_SLOT: &str = "frame-signer";

/// Storage slot recording the auth id of the active recovery signer
pub const ACTIVE_SIGNER_SLOT: &str = "active-signer";

/// Number of digits in generated OTPs
pub const OTP_DIGITS: usize = 6;

/// Failed OTP submissions before the pending request is discarded
pub const MAX_OTP_ATTEMPTS: usize = 3;

/// Engine internal state enumeration
#[derive(Copy, Clone, PartialEq, Debug, EnumString, Display, EnumVariantNames, EnumIter)]
pub enum State {
    /// No signer loaded
    Init,
    /// OTP dispatched, awaiting validation
    AwaitingOtp,
    /// Signer loaded and ready for signing
    Ready,
}

/// Key storage errors reported by a [Driver]
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum StorageError {
    /// Storage is unusable until the context is reloaded
    #[error("storage fatal: {0}")]
    Fatal(String),

    /// Stored value is corrupt
    #[error("storage corrupt: {0}")]
    Corrupt(String),
}

impl From<StorageError> for Error {
    fn from(_: StorageError) -> Self {
        Error::StorageFatal
    }
}

/// [`Driver`] trait provides platform support for [`Engine`] instances
pub trait Driver {
    /// Load a stored value
    fn load(&mut self, slot: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store a value
    fn store(&mut self, slot: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Build an attestation document for this context, binding the
    /// provided encryption public key (base64) and optional challenge
    fn attest(&self, public_key: &str, challenge: Option<&str>) -> Map<String, Value>;

    /// Deliver an OTP to the user out of band
    fn deliver_otp(&mut self, auth_id: &str, otp: &str);
}

impl<T: Driver> Driver for &mut T {
    fn load(&mut self, slot: &str) -> Result<Option<Vec<u8>>, StorageError> {
        T::load(self, slot)
    }

    fn store(&mut self, slot: &str, value: &[u8]) -> Result<(), StorageError> {
        T::store(self, slot, value)
    }

    fn attest(&self, public_key: &str, challenge: Option<&str>) -> Map<String, Value> {
        T::attest(self, public_key, challenge)
    }

    fn deliver_otp(&mut self, auth_id: &str, otp: &str) {
        T::deliver_otp(self, auth_id, otp)
    }
}

/// OTP awaiting validation
struct PendingOtp {
    auth_id: String,
    otp: String,
    attempts: usize,
}

impl Drop for PendingOtp {
    fn drop(&mut self) {
        self.otp.zeroize();
    }
}

/// [Engine] provides platform-independent signer support for child contexts
pub struct Engine<DRV: Driver, RNG: CryptoRngCore = OsRng> {
    state: State,

    /// Loaded recovery signer and its auth id
    signer: Option<(String, SigningKey)>,

    /// Pending OTP for signer creation
    pending: Option<PendingOtp>,

    fpe: Fpe,

    drv: DRV,
    rng: RNG,
}

impl<DRV: Driver> Engine<DRV> {
    /// Create a new engine instance with the provided driver,
    /// using the default [OsRng]
    pub fn new(drv: DRV) -> Self {
        Self::new_with_rng(drv, OsRng {})
    }
}

impl<DRV: Driver, RNG: CryptoRngCore> Engine<DRV, RNG> {
    /// Create a new engine instance with the provided driver and rng
    pub fn new_with_rng(drv: DRV, rng: RNG) -> Self {
        Self {
            state: State::Init,
            signer: None,
            pending: None,
            fpe: Fpe::default(),
            drv,
            rng,
        }
    }

    /// Fetch engine state
    pub fn state(&self) -> State {
        self.state
    }

    /// Access the platform driver
    pub fn driver(&self) -> &DRV {
        &self.drv
    }

    /// Handle a frame signer channel request
    pub fn frame_request(&mut self, req: &FrameRequest) -> FrameResponse {
        debug!("frame request: {}", req.event());

        match self.update_frame(req) {
            Ok(r) => r,
            Err(e) => {
                debug!("frame request {} failed: {e}", req.event());
                FrameResponse::Error(e.into())
            }
        }
    }

    /// Handle a recovery-key channel request
    pub fn recovery_request(&mut self, req: &RecoveryRequest) -> RecoveryResponse {
        debug!("recovery request: {}", req.event());

        match self.update_recovery(req) {
            Ok(r) => r,
            Err(e) => {
                debug!("recovery request {} failed: {e}", req.event());
                recovery::error_response(req, e)
            }
        }
    }

    /// Load or create the attested encryption key
    fn encryption_key(&mut self) -> Result<KeyPair, Error> {
        if let Some(mut b) = self.drv.load(ENCRYPTION_KEY_SLOT)? {
            let k: [u8; 32] = b.as_slice().try_into().map_err(|_| Error::StorageFatal)?;
            b.zeroize();
            return Ok(KeyPair::from_secret_bytes(k));
        }

        let k = KeyPair::generate_with_rng(&mut self.rng);
        self.drv.store(ENCRYPTION_KEY_SLOT, &k.secret_bytes())?;

        Ok(k)
    }

    /// Load a stored signing key
    fn load_signing_key(&mut self, slot: &str) -> Result<Option<SigningKey>, Error> {
        let Some(mut b) = self.drv.load(slot)? else {
            return Ok(None);
        };

        let k: [u8; 32] = b.as_slice().try_into().map_err(|_| Error::StorageFatal)?;
        b.zeroize();

        Ok(Some(SigningKey::from_bytes(&k)))
    }

    /// Create and store a new signing key
    fn create_signing_key(&mut self, slot: &str) -> Result<SigningKey, Error> {
        let k = SigningKey::generate(&mut self.rng);
        self.drv.store(slot, k.as_bytes())?;
        Ok(k)
    }

    /// Generate a uniformly distributed numeric OTP
    fn generate_otp(&mut self) -> String {
        const LIMIT: u32 = u32::MAX - (u32::MAX % 1_000_000);

        let v = loop {
            let v = self.rng.next_u32();
            if v < LIMIT {
                break v % 1_000_000;
            }
        };

        format!("{v:0width$}", width = OTP_DIGITS)
    }
}

/// Render a digest of `data` for attestation claims
pub fn claim_digest(data: &[&[u8]]) -> String {
    use sha2::{Digest, Sha256};

    let mut h = Sha256::new();
    for d in data {
        h.update(d);
    }
    hex::encode(h.finalize())
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    #[derive(Default)]
    pub struct MapDriver {
        pub slots: HashMap<String, Vec<u8>>,
        pub otps: Vec<(String, String)>,
    }

    impl Driver for MapDriver {
        fn load(&mut self, slot: &str) -> Result<Option<Vec<u8>>, StorageError> {
            Ok(self.slots.get(slot).cloned())
        }

        fn store(&mut self, slot: &str, value: &[u8]) -> Result<(), StorageError> {
            self.slots.insert(slot.to_string(), value.to_vec());
            Ok(())
        }

        fn attest(&self, public_key: &str, _challenge: Option<&str>) -> Map<String, Value> {
            let mut m = Map::new();
            m.insert("publicKey".into(), public_key.into());
            m
        }

        fn deliver_otp(&mut self, auth_id: &str, otp: &str) {
            self.otps.push((auth_id.to_string(), otp.to_string()));
        }
    }

    #[test]
    fn otp_format() {
        let mut e = Engine::new(MapDriver::default());

        for _ in 0..100 {
            let otp = e.generate_otp();
            assert_eq!(otp.len(), OTP_DIGITS);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn encryption_key_persisted() {
        let mut d = MapDriver::default();

        let a = Engine::new(&mut d).encryption_key().unwrap();
        let b = Engine::new(&mut d).encryption_key().unwrap();

        assert_eq!(a.public_key(), b.public_key());
    }
}
