// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Recovery-key WebView channel handling
//!
//! Signer creation is a two step flow: `request:create-signer` loads an
//! existing signer for the auth id or dispatches an OTP, `request:send-otp`
//! carries the OTP FF1-encrypted under a key derived from the attested
//! encryption key and the parent's ephemeral public key.

use ed25519_dalek::{Signer, SigningKey};
use log::{debug, warn};
use rand_core::CryptoRngCore;
use subtle::ConstantTimeEq;

use frame_signer_proto::{
    recovery::{
        AttestationDocument, AuthData, ChainLayer, CreateSignerRequest, KeyType, RecoveryRequest,
        RecoveryResponse, SendOtpRequest, SignRequest, SignatureResult, SignerAddress, SignerState,
        SignerStatus,
    },
    ErrorResponse, ResultResponse,
};

use super::{Driver, Engine, Error, PendingOtp, State, ACTIVE_SIGNER_SLOT, MAX_OTP_ATTEMPTS};
use crate::{
    crypto::{derive_symmetric_key, keys::public_key_from_base64},
    solana,
};

/// Storage slot for a recovery signer key
fn signer_slot(auth_id: &str) -> String {
    format!("signer:{auth_id}")
}

/// Build the error response matching a request
pub(super) fn error_response(req: &RecoveryRequest, e: Error) -> RecoveryResponse {
    let r: ErrorResponse = e.into();

    match req {
        RecoveryRequest::Attestation(_) => RecoveryResponse::Attestation(ResultResponse::Error(r)),
        RecoveryRequest::GetStatus(_) => RecoveryResponse::GetStatus(ResultResponse::Error(r)),
        RecoveryRequest::CreateSigner(_) => {
            RecoveryResponse::CreateSigner(ResultResponse::Error(r))
        }
        RecoveryRequest::SendOtp(_) => RecoveryResponse::SendOtp(ResultResponse::Error(r)),
        RecoveryRequest::Sign(_) => RecoveryResponse::Sign(ResultResponse::Error(r)),
    }
}

fn check_auth(auth: &AuthData) -> Result<(), Error> {
    if auth.jwt.is_empty() || auth.api_key.is_empty() {
        return Err(Error::Unauthorized);
    }
    Ok(())
}

impl<DRV: Driver, RNG: CryptoRngCore> Engine<DRV, RNG> {
    pub(super) fn update_recovery(
        &mut self,
        req: &RecoveryRequest,
    ) -> Result<RecoveryResponse, Error> {
        match req {
            RecoveryRequest::Attestation(r) => {
                let k = self.encryption_key()?;
                let attestation_document = self.drv.attest(&k.public_key_base64(), Some(&r.challenge));

                Ok(RecoveryResponse::Attestation(ResultResponse::Success(
                    AttestationDocument {
                        attestation_document,
                    },
                )))
            }
            RecoveryRequest::GetStatus(r) => {
                check_auth(&r.auth_data)?;

                let signer_status = match self.restore_signer()? {
                    Some(_) => SignerState::Ready,
                    None => SignerState::NewDevice,
                };

                Ok(RecoveryResponse::GetStatus(ResultResponse::Success(
                    SignerStatus { signer_status },
                )))
            }
            RecoveryRequest::CreateSigner(r) => self.create_signer(r),
            RecoveryRequest::SendOtp(r) => self.send_otp(r),
            RecoveryRequest::Sign(r) => self.sign(r),
        }
    }

    fn create_signer(&mut self, r: &CreateSignerRequest) -> Result<RecoveryResponse, Error> {
        check_auth(&r.auth_data)?;

        if r.data.chain_layer != ChainLayer::Solana {
            return Err(Error::Unsupported);
        }

        let auth_id = r.data.auth_id.clone();

        // Existing signer for this user
        if let Some(k) = self.load_signing_key(&signer_slot(&auth_id))? {
            debug!("loaded existing signer for {auth_id}");

            let address = solana::address(&k.verifying_key());
            self.activate(auth_id, k)?;

            return Ok(RecoveryResponse::CreateSigner(ResultResponse::Success(
                SignerAddress {
                    address: Some(address),
                },
            )));
        }

        // Otherwise dispatch an OTP
        let otp = self.generate_otp();
        self.drv.deliver_otp(&auth_id, &otp);
        self.pending = Some(PendingOtp {
            auth_id,
            otp,
            attempts: 0,
        });
        self.state = State::AwaitingOtp;

        Ok(RecoveryResponse::CreateSigner(ResultResponse::Success(
            SignerAddress { address: None },
        )))
    }

    fn send_otp(&mut self, r: &SendOtpRequest) -> Result<RecoveryResponse, Error> {
        check_auth(&r.auth_data)?;

        if self.state != State::AwaitingOtp {
            return Err(Error::OtpNotRequested);
        }
        let Some(pending) = &self.pending else {
            return Err(Error::OtpNotRequested);
        };
        let auth_id = pending.auth_id.clone();
        let expected = pending.otp.clone();

        let sender = public_key_from_base64(&r.data.sender_public_key)?;
        let local = self.encryption_key()?;
        let key = derive_symmetric_key(Some(&local), Some(&sender))?;

        let otp = self.fpe.decrypt_str(&r.data.encrypted_otp, &key)?;
        if !bool::from(otp.as_bytes().ct_eq(expected.as_bytes())) {
            warn!("invalid OTP for {auth_id}");
            self.otp_failed();
            return Err(Error::InvalidOtp);
        }

        let k = self.create_signing_key(&signer_slot(&auth_id))?;
        let address = solana::address(&k.verifying_key());

        self.activate(auth_id, k)?;
        self.pending = None;

        Ok(RecoveryResponse::SendOtp(ResultResponse::Success(
            SignerAddress {
                address: Some(address),
            },
        )))
    }

    fn sign(&mut self, r: &SignRequest) -> Result<RecoveryResponse, Error> {
        check_auth(&r.auth_data)?;

        if r.data.key_type != KeyType::Ed25519 {
            return Err(Error::Unsupported);
        }

        let k = self.restore_signer()?.ok_or(Error::SignerNotLoaded)?;

        let bytes = r
            .data
            .encoding
            .decode(&r.data.bytes)
            .map_err(|_| Error::InvalidEncoding)?;
        let signature = k.sign(&bytes);

        Ok(RecoveryResponse::Sign(ResultResponse::Success(
            SignatureResult {
                signature: r.data.encoding.encode(signature.to_bytes()),
            },
        )))
    }

    /// Count a failed OTP, discarding the request once attempts run out
    fn otp_failed(&mut self) {
        let Some(p) = self.pending.as_mut() else {
            return;
        };

        p.attempts += 1;
        if p.attempts < MAX_OTP_ATTEMPTS {
            return;
        }

        warn!("OTP attempts exhausted for {}", p.auth_id);
        self.pending = None;
        self.state = match self.signer {
            Some(_) => State::Ready,
            None => State::Init,
        };
    }

    /// Mark a signer active, persisting the choice for future reloads
    fn activate(&mut self, auth_id: String, k: SigningKey) -> Result<(), Error> {
        self.drv.store(ACTIVE_SIGNER_SLOT, auth_id.as_bytes())?;
        self.signer = Some((auth_id, k));
        self.state = State::Ready;
        Ok(())
    }

    /// Fetch the active signer, reading it back from storage.
    ///
    /// Keys live in storage rather than memory so storage failures
    /// surface on every signing request.
    fn restore_signer(&mut self) -> Result<Option<SigningKey>, Error> {
        let auth_id = match &self.signer {
            Some((auth_id, _)) => auth_id.clone(),
            None => match self.drv.load(ACTIVE_SIGNER_SLOT)? {
                Some(b) => String::from_utf8(b).map_err(|_| Error::StorageFatal)?,
                None => return Ok(None),
            },
        };

        let Some(k) = self.load_signing_key(&signer_slot(&auth_id))? else {
            return Ok(None);
        };

        self.signer = Some((auth_id, k.clone()));
        self.state = State::Ready;

        Ok(Some(k))
    }
}
