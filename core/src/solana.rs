// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Solana wire helpers
//!
//! Addresses are base58 encoded ed25519 public keys. Transactions are
//! handled at the wire level only:
//!
//! ```text
//! compact_u16(num_signatures) || signatures[64 * n] || message
//! message = [version prefix] || header[3] || compact_u16(num_keys) || keys[32 * k] || ...
//! ```
//!
//! The first `header[0]` account keys are the required signers, in the
//! same order as the signature slots.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey, SIGNATURE_LENGTH};

/// Solana wire errors
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Invalid base58 address")]
    InvalidAddress,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Transaction truncated")]
    Truncated,

    #[error("Invalid compact-u16 encoding")]
    InvalidCompactU16,

    #[error("Signature slot count ({slots}) does not match required signers ({signers})")]
    SlotMismatch { slots: usize, signers: usize },

    #[error("Key is not a required signer for this transaction")]
    NotASigner,
}

/// Encode a public key as a Solana address
pub fn address(key: &VerifyingKey) -> String {
    bs58::encode(key.as_bytes()).into_string()
}

/// Parse a Solana address
pub fn parse_address(s: &str) -> Result<VerifyingKey, Error> {
    let b = bs58::decode(s)
        .into_vec()
        .map_err(|_| Error::InvalidAddress)?;
    let b: [u8; 32] = b.try_into().map_err(|_| Error::InvalidAddress)?;

    VerifyingKey::from_bytes(&b).map_err(|_| Error::InvalidAddress)
}

/// Parse a signature from raw bytes
pub fn parse_signature(b: &[u8]) -> Result<Signature, Error> {
    Signature::from_slice(b).map_err(|_| Error::InvalidSignature)
}

/// Verify a message signature against an address
pub fn verify(address: &str, message: &[u8], signature: &Signature) -> Result<(), Error> {
    let key = parse_address(address)?;
    key.verify(message, signature)
        .map_err(|_| Error::InvalidSignature)
}

/// Decode a compact-u16, returning the value and bytes consumed
pub fn decode_compact_u16(b: &[u8]) -> Result<(u16, usize), Error> {
    let mut v: u32 = 0;

    for i in 0..3 {
        let byte = *b.get(i).ok_or(Error::Truncated)?;
        v |= ((byte & 0x7f) as u32) << (i * 7);

        if byte & 0x80 == 0 {
            // Reject non-canonical trailing zero bytes
            if i > 0 && byte == 0 {
                return Err(Error::InvalidCompactU16);
            }
            return u16::try_from(v)
                .map(|v| (v, i + 1))
                .map_err(|_| Error::InvalidCompactU16);
        }
    }

    Err(Error::InvalidCompactU16)
}

/// Encode a compact-u16
pub fn encode_compact_u16(mut v: u16, buff: &mut Vec<u8>) {
    loop {
        let mut byte = (v & 0x7f) as u8;
        v >>= 7;
        if v != 0 {
            byte |= 0x80;
        }
        buff.push(byte);
        if v == 0 {
            break;
        }
    }
}

/// Wire level transaction, signature slots plus opaque message bytes
#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    signatures: Vec<[u8; SIGNATURE_LENGTH]>,
    message: Vec<u8>,
}

impl Transaction {
    /// Create an unsigned transaction for a message, allocating one
    /// empty slot per required signer
    pub fn new_unsigned(message: Vec<u8>) -> Result<Self, Error> {
        let signers = message_signers(&message)?.len();

        Ok(Self {
            signatures: vec![[0u8; SIGNATURE_LENGTH]; signers],
            message,
        })
    }

    /// Parse a serialized transaction
    pub fn from_bytes(b: &[u8]) -> Result<Self, Error> {
        let (n, mut index) = decode_compact_u16(b)?;

        let mut signatures = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let s = b
                .get(index..index + SIGNATURE_LENGTH)
                .ok_or(Error::Truncated)?;

            let mut sig = [0u8; SIGNATURE_LENGTH];
            sig.copy_from_slice(s);
            signatures.push(sig);

            index += SIGNATURE_LENGTH;
        }

        let message = b[index..].to_vec();

        let signers = message_signers(&message)?.len();
        if signers != signatures.len() {
            return Err(Error::SlotMismatch {
                slots: signatures.len(),
                signers,
            });
        }

        Ok(Self {
            signatures,
            message,
        })
    }

    /// Serialize the transaction
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut b = Vec::with_capacity(3 + self.signatures.len() * SIGNATURE_LENGTH + self.message.len());

        encode_compact_u16(self.signatures.len() as u16, &mut b);
        for s in &self.signatures {
            b.extend_from_slice(s);
        }
        b.extend_from_slice(&self.message);

        b
    }

    /// Message bytes covered by signatures
    pub fn message(&self) -> &[u8] {
        &self.message
    }

    /// Required signer keys, in slot order
    pub fn signers(&self) -> Result<Vec<[u8; 32]>, Error> {
        message_signers(&self.message)
    }

    /// Signature in the slot for `key`, if present and non-empty
    pub fn signature_for(&self, key: &VerifyingKey) -> Option<Signature> {
        let index = self.slot(key).ok()?;
        let s = &self.signatures[index];

        if s.iter().all(|b| *b == 0) {
            return None;
        }

        Some(Signature::from_bytes(s))
    }

    /// Place a signature in the slot belonging to `key`
    pub fn add_signature(&mut self, key: &VerifyingKey, signature: &Signature) -> Result<(), Error> {
        let index = self.slot(key)?;
        self.signatures[index] = signature.to_bytes();
        Ok(())
    }

    /// Sign the message with `key` and place the signature in its slot
    pub fn sign(&mut self, key: &SigningKey) -> Result<Signature, Error> {
        let signature = key.sign(&self.message);
        self.add_signature(&key.verifying_key(), &signature)?;
        Ok(signature)
    }

    fn slot(&self, key: &VerifyingKey) -> Result<usize, Error> {
        self.signers()?
            .iter()
            .position(|k| k == key.as_bytes())
            .ok_or(Error::NotASigner)
    }
}

/// Parse required signer keys from a message
fn message_signers(message: &[u8]) -> Result<Vec<[u8; 32]>, Error> {
    let mut index = 0;

    // Versioned messages are prefixed with `0x80 | version`
    if *message.first().ok_or(Error::Truncated)? & 0x80 != 0 {
        index += 1;
    }

    let header = message.get(index..index + 3).ok_or(Error::Truncated)?;
    let num_signers = header[0] as usize;
    index += 3;

    let (num_keys, n) = decode_compact_u16(&message[index..])?;
    index += n;

    if num_signers > num_keys as usize {
        return Err(Error::Truncated);
    }

    let mut keys = Vec::with_capacity(num_signers);
    for _ in 0..num_signers {
        let k = message.get(index..index + 32).ok_or(Error::Truncated)?;

        let mut key = [0u8; 32];
        key.copy_from_slice(k);
        keys.push(key);

        index += 32;
    }

    Ok(keys)
}

/// Helpers for building minimal messages in tests
pub mod test_helpers {
    use super::encode_compact_u16;

    /// Build a legacy message with the provided signer keys,
    /// a zero blockhash and no instructions
    pub fn legacy_message(signers: &[[u8; 32]], extra_keys: &[[u8; 32]]) -> Vec<u8> {
        let mut m = vec![signers.len() as u8, 0, extra_keys.len() as u8];

        encode_compact_u16((signers.len() + extra_keys.len()) as u16, &mut m);
        for k in signers.iter().chain(extra_keys) {
            m.extend_from_slice(k);
        }

        // Recent blockhash
        m.extend_from_slice(&[0u8; 32]);
        // Instructions
        encode_compact_u16(0, &mut m);

        m
    }

    /// Build a v0 message with the provided signer keys
    pub fn v0_message(signers: &[[u8; 32]]) -> Vec<u8> {
        let mut m = vec![0x80];
        m.extend(legacy_message(signers, &[]));
        // Address table lookups
        encode_compact_u16(0, &mut m);
        m
    }
}
