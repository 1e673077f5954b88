// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Attestation gate for signing operations
//!
//! An attestation document is accepted when it is non-empty and carries a
//! `publicKey` string. No quote verification is performed on the document.

use std::{
    future::Future,
    sync::{Mutex, MutexGuard},
};

use log::{debug, error, warn};
use serde_json::{Map, Value};

/// Attestation document field carrying the remote public key
pub const PUBLIC_KEY_FIELD: &str = "publicKey";

/// Attestation validation state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AttestationState {
    #[default]
    Unvalidated,
    Validated {
        public_key: String,
    },
    Invalid,
}

/// Attestation gate errors
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AttestationError {
    #[error("Attestation not validated. Call validate_attestation() first")]
    NotValidated,
}

/// Tracks whether the remote context has presented a valid attestation
#[derive(Debug, Default)]
pub struct AttestationValidator {
    state: Mutex<AttestationState>,
}

impl AttestationValidator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AttestationState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current validation state
    pub fn state(&self) -> AttestationState {
        self.lock().clone()
    }

    /// Validate the attestation document returned by `request`.
    ///
    /// Returns `Ok(false)` and marks the state invalid when the document
    /// is empty or lacks a public key. Errors from `request` are returned
    /// after marking the state invalid.
    pub async fn validate_attestation<F, E>(&self, request: F) -> Result<bool, E>
    where
        F: Future<Output = Result<Map<String, Value>, E>>,
        E: std::fmt::Display,
    {
        let doc = match request.await {
            Ok(d) => d,
            Err(e) => {
                error!("Attestation request failed: {e}");
                *self.lock() = AttestationState::Invalid;
                return Err(e);
            }
        };

        let public_key = doc
            .get(PUBLIC_KEY_FIELD)
            .and_then(Value::as_str)
            .filter(|k| !k.is_empty());

        let mut state = self.lock();
        match public_key {
            Some(k) if !doc.is_empty() => {
                debug!("Attestation validated");
                *state = AttestationState::Validated {
                    public_key: k.to_string(),
                };
                Ok(true)
            }
            _ => {
                warn!("Attestation missing {PUBLIC_KEY_FIELD}");
                *state = AttestationState::Invalid;
                Ok(false)
            }
        }
    }

    /// Fail unless the attestation has been validated
    pub fn ensure_attestation_validated(&self) -> Result<(), AttestationError> {
        match &*self.lock() {
            AttestationState::Validated { .. } => Ok(()),
            _ => Err(AttestationError::NotValidated),
        }
    }

    /// Attested public key, only while validated
    pub fn attestation_public_key(&self) -> Option<String> {
        match &*self.lock() {
            AttestationState::Validated { public_key } => Some(public_key.clone()),
            _ => None,
        }
    }

    /// Return to the unvalidated state
    pub fn reset_attestation_state(&self) {
        *self.lock() = AttestationState::Unvalidated;
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn doc(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn validate_and_reset() {
        let a = AttestationValidator::new();
        assert_eq!(
            a.ensure_attestation_validated(),
            Err(AttestationError::NotValidated)
        );

        let r = a
            .validate_attestation(async { Ok::<_, String>(doc(json!({"publicKey": "pk"}))) })
            .await;
        assert_eq!(r, Ok(true));
        assert_eq!(a.ensure_attestation_validated(), Ok(()));
        assert_eq!(a.attestation_public_key().as_deref(), Some("pk"));

        a.reset_attestation_state();
        a.reset_attestation_state();
        assert_eq!(a.state(), AttestationState::Unvalidated);
        assert_eq!(a.attestation_public_key(), None);
    }

    #[tokio::test]
    async fn missing_public_key_invalidates() {
        let a = AttestationValidator::new();

        a.validate_attestation(async { Ok::<_, String>(doc(json!({"publicKey": "pk"}))) })
            .await
            .unwrap();

        let r = a
            .validate_attestation(async { Ok::<_, String>(doc(json!({"quote": "abc"}))) })
            .await;
        assert_eq!(r, Ok(false));
        assert_eq!(a.state(), AttestationState::Invalid);
        assert_eq!(a.attestation_public_key(), None);

        let r = a
            .validate_attestation(async { Ok::<_, String>(Map::new()) })
            .await;
        assert_eq!(r, Ok(false));
    }

    #[tokio::test]
    async fn request_failure_propagates() {
        let a = AttestationValidator::new();

        let r = a
            .validate_attestation(async { Err::<Map<String, Value>, _>("timeout".to_string()) })
            .await;
        assert_eq!(r, Err("timeout".to_string()));
        assert_eq!(a.state(), AttestationState::Invalid);
        assert!(a.ensure_attestation_validated().is_err());
    }
}
