// Copyright (c) 2022-2023 The MobileCoin Foundation

//! HPKE sealing of structured payloads
//!
//! Suite: DHKEM(X25519, HKDF-SHA256) / HKDF-SHA256 / AES-256-GCM, base mode.
//! The sealed plaintext is JSON carrying the payload alongside the sender's
//! public key:
//!
//! ```json
//! {"data": ..., "encryptionContext": {"senderPublicKey": "<base64>"}}
//! ```
//!
//! A fresh sender context is set up for every call so each result carries
//! its own encapsulated key.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hpke::{
    aead::AesGcm256, kdf::HkdfSha256, kem::X25519HkdfSha256, Deserializable, Kem as KemTrait,
    OpModeR, OpModeS, Serializable,
};
use log::error;
use rand_core::{CryptoRngCore, OsRng};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use zeroize::Zeroize;

use super::{Error, KeyPair, PublicKey};

type Kem = X25519HkdfSha256;

/// HPKE info string binding contexts to this protocol
pub const HPKE_INFO: &[u8] = b"frame-signer/hpke";

/// Output of an HPKE seal, both fields are required to open
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionResult<T> {
    pub ciphertext: T,
    pub encapsulated_key: T,
}

impl EncryptionResult<Vec<u8>> {
    /// Convert to the base64 presentation
    pub fn to_base64(&self) -> EncryptionResult<String> {
        EncryptionResult {
            ciphertext: STANDARD.encode(&self.ciphertext),
            encapsulated_key: STANDARD.encode(&self.encapsulated_key),
        }
    }
}

/// Context sealed alongside the payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionContext {
    /// Sender X25519 public key, base64
    pub sender_public_key: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    data: T,
    encryption_context: EncryptionContext,
}

/// Ciphertext or encapsulated key input, binary or base64
#[derive(Clone, Debug, PartialEq)]
pub enum CipherInput {
    Bytes(Vec<u8>),
    Base64(String),
}

impl CipherInput {
    fn into_bytes(self) -> Result<Vec<u8>, String> {
        match self {
            CipherInput::Bytes(b) => Ok(b),
            CipherInput::Base64(s) => STANDARD.decode(s).map_err(|e| format!("base64: {e}")),
        }
    }
}

impl From<Vec<u8>> for CipherInput {
    fn from(b: Vec<u8>) -> Self {
        CipherInput::Bytes(b)
    }
}

impl From<&[u8]> for CipherInput {
    fn from(b: &[u8]) -> Self {
        CipherInput::Bytes(b.to_vec())
    }
}

impl From<String> for CipherInput {
    fn from(s: String) -> Self {
        CipherInput::Base64(s)
    }
}

impl From<&str> for CipherInput {
    fn from(s: &str) -> Self {
        CipherInput::Base64(s.to_string())
    }
}

/// Seal `data` for `recipient`, tagging it with the sender's public key
pub fn encrypt<T: Serialize>(
    data: &T,
    recipient: &PublicKey,
    sender: &KeyPair,
) -> Result<EncryptionResult<Vec<u8>>, Error> {
    encrypt_with_rng(data, recipient, sender, &mut OsRng)
}

/// [encrypt] returning base64 encoded fields
pub fn encrypt_base64<T: Serialize>(
    data: &T,
    recipient: &PublicKey,
    sender: &KeyPair,
) -> Result<EncryptionResult<String>, Error> {
    encrypt(data, recipient, sender).map(|r| r.to_base64())
}

/// [encrypt] with the provided rng
pub fn encrypt_with_rng<T: Serialize>(
    data: &T,
    recipient: &PublicKey,
    sender: &KeyPair,
    rng: &mut impl CryptoRngCore,
) -> Result<EncryptionResult<Vec<u8>>, Error> {
    seal(data, recipient, sender, rng).map_err(|e| {
        error!("[HPKE] encryption failed: {e}");
        Error::EncryptFailed
    })
}

/// Open a sealed payload and return its `data` field.
///
/// When `sender_public_key` is provided the sealed encryption context
/// must name the same key.
pub fn decrypt<T: DeserializeOwned>(
    ciphertext: impl Into<CipherInput>,
    encapsulated_key: impl Into<CipherInput>,
    recipient: &KeyPair,
    sender_public_key: Option<&PublicKey>,
) -> Result<T, Error> {
    open(
        ciphertext.into(),
        encapsulated_key.into(),
        recipient,
        sender_public_key,
    )
    .map_err(|e| {
        error!("[HPKE] decryption failed: {e}");
        Error::DecryptFailed
    })
}

fn seal<T: Serialize>(
    data: &T,
    recipient: &PublicKey,
    sender: &KeyPair,
    rng: &mut impl CryptoRngCore,
) -> Result<EncryptionResult<Vec<u8>>, String> {
    let plaintext = serde_json::to_vec(&Envelope {
        data,
        encryption_context: EncryptionContext {
            sender_public_key: sender.public_key_base64(),
        },
    })
    .map_err(|e| format!("serialize: {e}"))?;

    let pk = <Kem as KemTrait>::PublicKey::from_bytes(recipient.as_bytes())
        .map_err(|e| format!("recipient key: {e:?}"))?;

    let (encapped, mut ctx) =
        hpke::setup_sender::<AesGcm256, HkdfSha256, Kem, _>(&OpModeS::Base, &pk, HPKE_INFO, rng)
            .map_err(|e| format!("sender context: {e:?}"))?;

    let ciphertext = ctx
        .seal(&plaintext, &[])
        .map_err(|e| format!("seal: {e:?}"))?;

    Ok(EncryptionResult {
        ciphertext,
        encapsulated_key: encapped.to_bytes().to_vec(),
    })
}

fn open<T: DeserializeOwned>(
    ciphertext: CipherInput,
    encapsulated_key: CipherInput,
    recipient: &KeyPair,
    sender_public_key: Option<&PublicKey>,
) -> Result<T, String> {
    let ciphertext = ciphertext.into_bytes()?;
    let encapsulated_key = encapsulated_key.into_bytes()?;

    let mut sk_bytes = recipient.secret_bytes();
    let sk = <Kem as KemTrait>::PrivateKey::from_bytes(&sk_bytes);
    sk_bytes.zeroize();
    let sk = sk.map_err(|e| format!("recipient key: {e:?}"))?;

    let encapped = <Kem as KemTrait>::EncappedKey::from_bytes(&encapsulated_key)
        .map_err(|e| format!("encapsulated key: {e:?}"))?;

    let mut ctx =
        hpke::setup_receiver::<AesGcm256, HkdfSha256, Kem>(&OpModeR::Base, &sk, &encapped, HPKE_INFO)
            .map_err(|e| format!("recipient context: {e:?}"))?;

    let plaintext = ctx
        .open(&ciphertext, &[])
        .map_err(|e| format!("open: {e:?}"))?;

    let sealed: Envelope<T> =
        serde_json::from_slice(&plaintext).map_err(|e| format!("deserialize: {e}"))?;

    if let Some(expected) = sender_public_key {
        if sealed.encryption_context.sender_public_key != STANDARD.encode(expected.as_bytes()) {
            return Err("sender public key mismatch".to_string());
        }
    }

    Ok(sealed.data)
}
