// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Result and error payloads

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload of the `error` event, which may arrive in place of any response
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub code: i64,
    pub message: String,
}

/// Decoded [ErrorEvent] reported by the remote context
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteError {
    pub code: i64,
    pub message: String,
}

impl From<ErrorEvent> for RemoteError {
    fn from(e: ErrorEvent) -> Self {
        Self {
            code: e.code,
            message: e.message,
        }
    }
}

/// Error half of a [ResultResponse]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human readable description
    pub error: String,

    /// Application error code, matched against recoverable code sets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Optional structured detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            data: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Response shape used by result-style channels,
/// `{"status": "success", ...}` or `{"status": "error", "error": ..., "code": ...}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ResultResponse<T> {
    Success(T),
    Error(ErrorResponse),
}

impl<T> ResultResponse<T> {
    /// Convert into a [Result] for `?` use
    pub fn into_result(self) -> Result<T, ErrorResponse> {
        match self {
            ResultResponse::Success(v) => Ok(v),
            ResultResponse::Error(e) => Err(e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResultResponse::Success(_))
    }
}

impl<T> From<Result<T, ErrorResponse>> for ResultResponse<T> {
    fn from(r: Result<T, ErrorResponse>) -> Self {
        match r {
            Ok(v) => ResultResponse::Success(v),
            Err(e) => ResultResponse::Error(e),
        }
    }
}
