// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Recovery-key WebView signer channel
//!
//! Requests carry the caller's [AuthData], responses use the
//! [ResultResponse] shape so storage failures inside the WebView can be
//! reported with a recoverable `code` (see [INDEXEDDB_FATAL]).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

use crate::{encoding::Encoding, ResultResponse};

/// Error code reported when the WebView's key storage is unusable,
/// recovered by reloading the WebView and retrying once.
pub const INDEXEDDB_FATAL: &str = "indexeddb-fatal";

/// Error code reported when an OTP does not match the pending request
pub const INVALID_OTP: &str = "invalid-otp";

/// Prefix applied to email addresses to form an auth id
pub const EMAIL_AUTH_PREFIX: &str = "email:";

/// Chain layer a signer is created for
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChainLayer {
    Solana,
    Evm,
}

/// Signing key type
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum KeyType {
    Ed25519,
    Secp256k1,
}

/// Caller credentials attached to every request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthData {
    pub jwt: String,
    pub api_key: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttestationRequest {
    /// Random challenge bound into the attestation document
    pub challenge: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStatusRequest {
    pub auth_data: AuthData,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSignerData {
    /// User identifier, `email:<address>` for email auth
    pub auth_id: String,
    pub chain_layer: ChainLayer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSignerRequest {
    pub auth_data: AuthData,
    pub data: CreateSignerData,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpData {
    pub chain_layer: ChainLayer,

    /// FF1 encrypted OTP digits, as a digit string of the same length
    pub encrypted_otp: String,

    /// Parent X25519 public key (base64) used to derive the FF1 key
    pub sender_public_key: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpRequest {
    pub auth_data: AuthData,
    pub data: SendOtpData,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignData {
    /// Encoded bytes to sign
    pub bytes: String,
    pub key_type: KeyType,
    pub encoding: Encoding,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    pub auth_data: AuthData,
    pub data: SignData,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationDocument {
    /// Attestation claims, expected to carry at least `publicKey`
    pub attestation_document: Map<String, Value>,
}

/// Signer availability on this device
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SignerState {
    /// A signer is loaded and ready for use
    Ready,
    /// No signer on this device, one must be created
    NewDevice,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerStatus {
    pub signer_status: SignerState,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignerAddress {
    /// Signer address, absent while an OTP is pending
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignatureResult {
    pub signature: String,
}

event_map! {
    /// Requests sent by the parent to the recovery-key WebView
    pub enum RecoveryRequest {
        "request:attestation" => Attestation(AttestationRequest),
        "request:get-status" => GetStatus(GetStatusRequest),
        "request:create-signer" => CreateSigner(CreateSignerRequest),
        "request:send-otp" => SendOtp(SendOtpRequest),
        "request:sign" => Sign(SignRequest),
    }
}

event_map! {
    /// Responses sent by the recovery-key WebView to the parent
    pub enum RecoveryResponse {
        "response:attestation" => Attestation(ResultResponse<AttestationDocument>),
        "response:get-status" => GetStatus(ResultResponse<SignerStatus>),
        "response:create-signer" => CreateSigner(ResultResponse<SignerAddress>),
        "response:send-otp" => SendOtp(ResultResponse<SignerAddress>),
        "response:sign" => Sign(ResultResponse<SignatureResult>),
    }
}

impl RecoveryRequest {
    /// Response event expected for this request
    pub fn response_event(&self) -> &'static str {
        match self {
            RecoveryRequest::Attestation(_) => "response:attestation",
            RecoveryRequest::GetStatus(_) => "response:get-status",
            RecoveryRequest::CreateSigner(_) => "response:create-signer",
            RecoveryRequest::SendOtp(_) => "response:send-otp",
            RecoveryRequest::Sign(_) => "response:sign",
        }
    }
}
