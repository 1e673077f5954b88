// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Asymmetric key pairs and derived symmetric keys

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::error;
use rand_core::{CryptoRngCore, OsRng, RngCore};
use zeroize::Zeroize;

pub use x25519_dalek::PublicKey;
use x25519_dalek::StaticSecret;

use super::Error;

/// AES-GCM nonce length
pub const NONCE_LEN: usize = 12;

/// X25519 key pair used for key agreement and HPKE
#[derive(Clone)]
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new key pair using [OsRng]
    pub fn generate() -> Self {
        Self::generate_with_rng(&mut OsRng)
    }

    /// Generate a new key pair with the provided rng
    pub fn generate_with_rng(rng: &mut impl CryptoRngCore) -> Self {
        let secret = StaticSecret::random_from_rng(rng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Restore a key pair from private key bytes
    pub fn from_secret_bytes(b: [u8; 32]) -> Self {
        let secret = StaticSecret::from(b);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Public key as standard base64, the serialized form carried in
    /// attestation documents and encryption contexts
    pub fn public_key_base64(&self) -> String {
        STANDARD.encode(self.public.as_bytes())
    }

    pub(crate) fn secret(&self) -> &StaticSecret {
        &self.secret
    }

    /// Private key bytes, for handing to external suites
    pub(crate) fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }
}

impl core::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_key_base64())
            .finish_non_exhaustive()
    }
}

/// Parse a base64 encoded X25519 public key
pub fn public_key_from_base64(s: &str) -> Result<PublicKey, Error> {
    let b = STANDARD
        .decode(s)
        .map_err(|e| Error::InvalidKey(format!("base64: {e}")))?;

    let b: [u8; 32] = b
        .try_into()
        .map_err(|v: Vec<u8>| Error::InvalidKey(format!("expected 32 bytes, found {}", v.len())))?;

    Ok(PublicKey::from(b))
}

/// 256-bit symmetric key derived from a key agreement.
///
/// Never transmitted, both sides derive it independently.
#[derive(Clone)]
pub struct SymmetricKey([u8; 32]);

impl SymmetricKey {
    pub(crate) fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    /// Raw key bytes, as exported for FF1
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Seal `plaintext` with AES-256-GCM under a random nonce,
    /// returning `nonce || ciphertext || tag`
    pub fn seal(&self, plaintext: &[u8], rng: &mut impl CryptoRngCore) -> Result<Vec<u8>, Error> {
        let cipher = Aes256Gcm::new_from_slice(&self.0).map_err(|e| {
            error!("[AEAD] invalid key: {e}");
            Error::EncryptFailed
        })?;

        let mut nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| {
                error!("[AEAD] seal failed: {e}");
                Error::EncryptFailed
            })?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Open a buffer produced by [SymmetricKey::seal]
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, Error> {
        if sealed.len() < NONCE_LEN {
            return Err(Error::DecryptFailed);
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new_from_slice(&self.0).map_err(|e| {
            error!("[AEAD] invalid key: {e}");
            Error::DecryptFailed
        })?;

        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| {
                error!("[AEAD] open failed: {e}");
                Error::DecryptFailed
            })
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl core::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Random bytes helper for nonces and challenges
pub fn random_bytes<const N: usize>(rng: &mut impl RngCore) -> [u8; N] {
    let mut b = [0u8; N];
    rng.fill_bytes(&mut b);
    b
}
