// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Solana iframe signer channel handling

use ed25519_dalek::{Signer, SigningKey};
use log::debug;
use rand_core::CryptoRngCore;

use frame_signer_proto::{
    encoding::Encoding,
    frame::{
        AttestationResponse, FrameRequest, FrameResponse, PublicKeyResponse, SignMessageResponse,
        SignTransactionResponse,
    },
};

use super::{Driver, Engine, Error, State, FRAME_SIGNER_SLOT};
use crate::solana::{self, Transaction};

impl<DRV: Driver, RNG: CryptoRngCore> Engine<DRV, RNG> {
    pub(super) fn update_frame(&mut self, req: &FrameRequest) -> Result<FrameResponse, Error> {
        match req {
            FrameRequest::GetPublicKey => {
                let k = self.frame_signer()?;
                let public_key = solana::address(&k.verifying_key());

                Ok(FrameResponse::PublicKey(PublicKeyResponse { public_key }))
            }
            FrameRequest::Attestation => {
                let k = self.encryption_key()?;
                let attestation = self.drv.attest(&k.public_key_base64(), None);

                Ok(FrameResponse::Attestation(AttestationResponse { attestation }))
            }
            FrameRequest::SignMessage(r) => {
                let k = self.frame_signer_for(&r.signer_address)?;
                let message = Encoding::Base58
                    .decode(&r.message)
                    .map_err(|_| Error::InvalidEncoding)?;

                let signature = k.sign(&message);

                Ok(FrameResponse::SignMessage(SignMessageResponse {
                    address: r.signer_address.clone(),
                    signature: Encoding::Base58.encode(signature.to_bytes()),
                }))
            }
            FrameRequest::SignTransaction(r) => {
                let k = self.frame_signer_for(&r.signer_address)?;
                let b = Encoding::Base58
                    .decode(&r.transaction)
                    .map_err(|_| Error::InvalidEncoding)?;

                let mut tx = Transaction::from_bytes(&b)?;
                tx.sign(&k)?;

                Ok(FrameResponse::SignTransaction(SignTransactionResponse {
                    transaction: Encoding::Base58.encode(tx.to_bytes()),
                }))
            }
        }
    }

    /// Load or create the frame signer key
    fn frame_signer(&mut self) -> Result<SigningKey, Error> {
        let k = match self.load_signing_key(FRAME_SIGNER_SLOT)? {
            Some(k) => k,
            None => {
                debug!("creating frame signer key");
                self.create_signing_key(FRAME_SIGNER_SLOT)?
            }
        };

        self.state = State::Ready;

        Ok(k)
    }

    /// Fetch the frame signer, checking it matches the requested address
    fn frame_signer_for(&mut self, address: &str) -> Result<SigningKey, Error> {
        let k = self
            .load_signing_key(FRAME_SIGNER_SLOT)?
            .ok_or(Error::SignerNotLoaded)?;

        if solana::address(&k.verifying_key()) != address {
            return Err(Error::AddressMismatch);
        }

        Ok(k)
    }
}

#[cfg(test)]
mod test {
    use ed25519_dalek::Signature;

    use frame_signer_proto::frame::{SignMessageRequest, SignTransactionRequest};

    use super::*;
    use crate::{engine::test::MapDriver, solana::test_helpers::legacy_message};

    fn public_key(e: &mut Engine<MapDriver>) -> String {
        match e.frame_request(&FrameRequest::GetPublicKey) {
            FrameResponse::PublicKey(r) => r.public_key,
            r => panic!("unexpected response: {r:?}"),
        }
    }

    #[test]
    fn public_key_stable() {
        let mut e = Engine::new(MapDriver::default());

        let a = public_key(&mut e);
        let b = public_key(&mut e);

        assert_eq!(a, b);
        assert_eq!(e.state(), State::Ready);
        solana::parse_address(&a).unwrap();
    }

    #[test]
    fn attestation_carries_public_key() {
        let mut e = Engine::new(MapDriver::default());

        match e.frame_request(&FrameRequest::Attestation) {
            FrameResponse::Attestation(r) => assert!(r.attestation.contains_key("publicKey")),
            r => panic!("unexpected response: {r:?}"),
        }
    }

    #[test]
    fn sign_message() {
        let mut e = Engine::new(MapDriver::default());
        let address = public_key(&mut e);

        let r = e.frame_request(&FrameRequest::SignMessage(SignMessageRequest {
            signer_address: address.clone(),
            message: Encoding::Base58.encode(b"hello"),
        }));

        let FrameResponse::SignMessage(r) = r else {
            panic!("unexpected response: {r:?}");
        };

        let sig = Encoding::Base58.decode(&r.signature).unwrap();
        let sig = Signature::from_slice(&sig).unwrap();
        solana::verify(&address, b"hello", &sig).unwrap();
    }

    #[test]
    fn sign_message_wrong_address() {
        let mut e = Engine::new(MapDriver::default());
        let _ = public_key(&mut e);

        let other = SigningKey::from_bytes(&[7u8; 32]);
        let r = e.frame_request(&FrameRequest::SignMessage(SignMessageRequest {
            signer_address: solana::address(&other.verifying_key()),
            message: Encoding::Base58.encode(b"hello"),
        }));

        assert_eq!(r, FrameResponse::Error(Error::AddressMismatch.into()));
    }

    #[test]
    fn sign_before_key() {
        let mut e = Engine::new(MapDriver::default());

        let r = e.frame_request(&FrameRequest::SignMessage(SignMessageRequest {
            signer_address: "11111111111111111111111111111111".into(),
            message: Encoding::Base58.encode(b"hello"),
        }));

        assert_eq!(r, FrameResponse::Error(Error::SignerNotLoaded.into()));
    }

    #[test]
    fn sign_transaction() {
        let mut e = Engine::new(MapDriver::default());
        let address = public_key(&mut e);
        let key = solana::parse_address(&address).unwrap();

        let tx = Transaction::new_unsigned(legacy_message(&[key.to_bytes()], &[])).unwrap();

        let r = e.frame_request(&FrameRequest::SignTransaction(SignTransactionRequest {
            signer_address: address.clone(),
            transaction: Encoding::Base58.encode(tx.to_bytes()),
        }));

        let FrameResponse::SignTransaction(r) = r else {
            panic!("unexpected response: {r:?}");
        };

        let signed = Transaction::from_bytes(&Encoding::Base58.decode(&r.transaction).unwrap())
            .unwrap();
        let sig = signed.signature_for(&key).unwrap();

        solana::verify(&address, signed.message(), &sig).unwrap();
    }
}
