// Copyright (c) 2022-2023 The MobileCoin Foundation

use frame_signer_proto::{ErrorEvent, ErrorResponse};
use strum::IntoStaticStr;

/// [Engine][super::Engine] errors
///
/// Each variant has a stable numeric code (reported in `error` events)
/// and a string code (reported in result responses).
#[derive(Copy, Clone, PartialEq, Debug, thiserror::Error, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
#[repr(u8)]
pub enum Error {
    /// Request not valid in the current engine state
    #[error("invalid engine state")]
    InvalidState = 0x01,

    /// Payload field could not be decoded
    #[error("invalid encoding")]
    InvalidEncoding = 0x02,

    /// Public key could not be parsed
    #[error("invalid key")]
    InvalidKey = 0x03,

    /// Requested signer address does not match the loaded signer
    #[error("signer address mismatch")]
    AddressMismatch = 0x04,

    /// Transaction could not be parsed or signed
    #[error("invalid transaction")]
    InvalidTransaction = 0x05,

    /// Missing or malformed credentials
    #[error("unauthorized")]
    Unauthorized = 0x06,

    /// Chain layer or key type not supported
    #[error("unsupported chain or key type")]
    Unsupported = 0x07,

    /// OTP submitted without a pending request
    #[error("no OTP requested")]
    OtpNotRequested = 0x08,

    /// OTP did not match
    #[error("invalid OTP")]
    InvalidOtp = 0x09,

    /// Encryption / decryption failure
    #[error("cryptographic operation failed")]
    Crypto = 0x0a,

    /// Key storage unusable, recoverable by reloading the context
    #[error("key storage failed")]
    #[strum(serialize = "indexeddb-fatal")]
    StorageFatal = 0x0b,

    /// No signer loaded for signing requests
    #[error("signer not loaded")]
    SignerNotLoaded = 0x0c,

    /// Unknown / not-yet defined error (placeholder)
    #[error("unknown")]
    Unknown = 0xf0,
}

impl Error {
    /// Numeric error code
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// String error code
    pub fn code_str(&self) -> &'static str {
        self.into()
    }
}

impl From<Error> for ErrorEvent {
    fn from(e: Error) -> Self {
        ErrorEvent {
            code: e.code() as i64,
            message: e.to_string(),
        }
    }
}

impl From<Error> for ErrorResponse {
    fn from(e: Error) -> Self {
        ErrorResponse::new(e.to_string()).with_code(e.code_str())
    }
}

impl From<crate::crypto::Error> for Error {
    fn from(e: crate::crypto::Error) -> Self {
        use crate::crypto::Error as E;

        match e {
            E::InvalidKey(_) | E::MissingKey(_) | E::KeyAgreement => Error::InvalidKey,
            E::DigitOutOfRange | E::DataTooShort { .. } | E::Encoding(_) => Error::InvalidEncoding,
            _ => Error::Crypto,
        }
    }
}

impl From<crate::solana::Error> for Error {
    fn from(e: crate::solana::Error) -> Self {
        use crate::solana::Error as E;

        match e {
            E::InvalidAddress => Error::InvalidKey,
            E::NotASigner => Error::AddressMismatch,
            _ => Error::InvalidTransaction,
        }
    }
}
