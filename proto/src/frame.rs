// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Solana iframe signer channel
//!
//! | Request | Response |
//! |---------|----------|
//! | `request:get-public-key` | `response:get-public-key {publicKey}` |
//! | `request:attestation` | `response:attestation {attestation}` |
//! | `request:sign-message {signerAddress, message}` | `response:sign-message {address, signature}` |
//! | `request:sign-transaction {signerAddress, transaction}` | `response:sign-transaction {transaction}` |
//!
//! The child may answer any request with `error {code, message}`.
//! Messages, signatures and transactions are base58 encoded.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ErrorEvent;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignMessageRequest {
    pub signer_address: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignTransactionRequest {
    pub signer_address: String,
    pub transaction: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    pub public_key: String,
}

/// Attestation document, expected to carry at least `publicKey`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttestationResponse {
    pub attestation: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignMessageResponse {
    pub address: String,
    pub signature: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignTransactionResponse {
    pub transaction: String,
}

event_map! {
    /// Requests sent by the parent to the signer frame
    pub enum FrameRequest {
        "request:get-public-key" => GetPublicKey,
        "request:attestation" => Attestation,
        "request:sign-message" => SignMessage(SignMessageRequest),
        "request:sign-transaction" => SignTransaction(SignTransactionRequest),
    }
}

event_map! {
    /// Responses sent by the signer frame to the parent
    pub enum FrameResponse {
        "response:get-public-key" => PublicKey(PublicKeyResponse),
        "response:attestation" => Attestation(AttestationResponse),
        "response:sign-message" => SignMessage(SignMessageResponse),
        "response:sign-transaction" => SignTransaction(SignTransactionResponse),
        "error" => Error(ErrorEvent),
    }
}

impl FrameRequest {
    /// Response event expected for this request
    pub fn response_event(&self) -> &'static str {
        match self {
            FrameRequest::GetPublicKey => "response:get-public-key",
            FrameRequest::Attestation => "response:attestation",
            FrameRequest::SignMessage(_) => "response:sign-message",
            FrameRequest::SignTransaction(_) => "response:sign-transaction",
        }
    }
}
