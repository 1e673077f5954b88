// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Cryptographic primitives securing the signer channel
//!
//! - [keys]: X25519 key pairs and derived AES-256-GCM [SymmetricKey]s
//! - [ecdh]: key agreement + HKDF-SHA256 symmetric key derivation
//! - [hpke]: HPKE sealing of structured payloads
//! - [fpe]: FF1 format-preserving encryption of digit sequences (OTPs)
//!
//! Failures inside the underlying cipher libraries are logged with a
//! component tag and surfaced as generic [Error]s.

pub mod ecdh;
pub mod fpe;
pub mod hpke;
pub mod keys;

pub use ecdh::derive_symmetric_key;
pub use keys::{KeyPair, PublicKey, SymmetricKey};

/// Cryptographic errors
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    /// Required key not provided
    #[error("Missing {0} key")]
    MissingKey(&'static str),

    /// Key bytes could not be parsed
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Key agreement produced a non-contributory shared secret
    #[error("Key agreement failed")]
    KeyAgreement,

    /// Sealing failed (detail logged only)
    #[error("Failed to encrypt data")]
    EncryptFailed,

    /// Opening failed (detail logged only)
    #[error("Failed to decrypt data")]
    DecryptFailed,

    /// FF1 input contains a digit outside the configured radix
    #[error("Data contains values greater than the radix")]
    DigitOutOfRange,

    /// FF1 input shorter than the minimum domain for the radix
    #[error("Data too short for radix {radix}, minimum length {min_len}")]
    DataTooShort { radix: u32, min_len: usize },

    /// FF1 radix outside `2..=65536`
    #[error("Invalid radix: {0}")]
    InvalidRadix(u32),

    /// Invalid base64 / digit string input
    #[error("Invalid encoding: {0}")]
    Encoding(String),
}
