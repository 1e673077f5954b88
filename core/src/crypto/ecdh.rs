// Copyright (c) 2022-2023 The MobileCoin Foundation

//! ECDH key agreement and symmetric key derivation

use hkdf::Hkdf;
use log::error;
use sha2::Sha256;

use super::{Error, KeyPair, PublicKey, SymmetricKey};

/// HKDF info label binding derived keys to this protocol
pub const HKDF_INFO: &[u8] = b"frame-signer/ecdh/aes-256";

/// Derive a [SymmetricKey] from a local key pair and a remote public key.
///
/// X25519 agreement followed by HKDF-SHA256 expansion to 32 bytes, both
/// parties derive the same key from their own private key and the peer's
/// public key. Fails if either key is absent or if the shared secret is
/// non-contributory (low order remote key).
pub fn derive_symmetric_key(
    local: Option<&KeyPair>,
    remote: Option<&PublicKey>,
) -> Result<SymmetricKey, Error> {
    let local = local.ok_or(Error::MissingKey("local"))?;
    let remote = remote.ok_or(Error::MissingKey("remote"))?;

    let shared = local.secret().diffie_hellman(remote);
    if !shared.was_contributory() {
        error!("[ECDH] non-contributory shared secret");
        return Err(Error::KeyAgreement);
    }

    let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
    let mut okm = [0u8; 32];
    hk.expand(HKDF_INFO, &mut okm).map_err(|e| {
        error!("[ECDH] HKDF expand failed: {e}");
        Error::KeyAgreement
    })?;

    Ok(SymmetricKey::from_bytes(okm))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn both_sides_agree() {
        let (a, b) = (KeyPair::generate(), KeyPair::generate());

        let ka = derive_symmetric_key(Some(&a), Some(b.public_key())).unwrap();
        let kb = derive_symmetric_key(Some(&b), Some(a.public_key())).unwrap();

        assert_eq!(ka.as_bytes(), kb.as_bytes());
    }

    #[test]
    fn distinct_peers_distinct_keys() {
        let (a, b, c) = (KeyPair::generate(), KeyPair::generate(), KeyPair::generate());

        let ab = derive_symmetric_key(Some(&a), Some(b.public_key())).unwrap();
        let ac = derive_symmetric_key(Some(&a), Some(c.public_key())).unwrap();

        assert_ne!(ab.as_bytes(), ac.as_bytes());
    }

    #[test]
    fn missing_keys() {
        let a = KeyPair::generate();

        assert!(matches!(
            derive_symmetric_key(None, Some(a.public_key())),
            Err(Error::MissingKey("local"))
        ));
        assert!(matches!(
            derive_symmetric_key(Some(&a), None),
            Err(Error::MissingKey("remote"))
        ));
    }

    #[test]
    fn low_order_point_rejected() {
        let a = KeyPair::generate();
        let zero = PublicKey::from([0u8; 32]);

        assert!(matches!(
            derive_symmetric_key(Some(&a), Some(&zero)),
            Err(Error::KeyAgreement)
        ));
    }
}
