// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Memory-backed engine driver
//!
//! Clones share one store, so key material outlives the simulated
//! context and a reloaded page sees the keys written before the reload.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use log::{debug, warn};
use serde_json::{Map, Value};

use frame_signer_core::engine::{claim_digest, Driver, StorageError};

#[derive(Default)]
struct Store {
    slots: HashMap<String, Vec<u8>>,
    otps: Vec<(String, String)>,
    fail_storage: usize,
}

/// Shared in-memory storage with fault injection and an OTP outbox
#[derive(Clone, Default)]
pub struct MemoryDriver {
    store: Arc<Mutex<Store>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fail the next `n` storage operations as fatal
    pub fn fail_storage(&self, n: usize) {
        debug!("Failing next {n} storage operations");
        self.lock().fail_storage = n;
    }

    /// Latest OTP delivered to `auth_id`
    pub fn last_otp(&self, auth_id: &str) -> Option<String> {
        self.lock()
            .otps
            .iter()
            .rev()
            .find(|(a, _)| a == auth_id)
            .map(|(_, o)| o.clone())
    }

    /// Number of OTPs delivered
    pub fn otp_count(&self) -> usize {
        self.lock().otps.len()
    }

    fn check(s: &mut Store) -> Result<(), StorageError> {
        if s.fail_storage > 0 {
            s.fail_storage -= 1;
            warn!("Injected storage failure");
            return Err(StorageError::Fatal("database connection is closing".into()));
        }
        Ok(())
    }
}

impl Driver for MemoryDriver {
    fn load(&mut self, slot: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let mut s = self.lock();
        Self::check(&mut s)?;

        Ok(s.slots.get(slot).cloned())
    }

    fn store(&mut self, slot: &str, value: &[u8]) -> Result<(), StorageError> {
        let mut s = self.lock();
        Self::check(&mut s)?;

        s.slots.insert(slot.to_string(), value.to_vec());
        Ok(())
    }

    fn attest(&self, public_key: &str, challenge: Option<&str>) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("publicKey".into(), public_key.into());

        let quote = match challenge {
            Some(c) => {
                m.insert("challenge".into(), c.into());
                claim_digest(&[public_key.as_bytes(), c.as_bytes()])
            }
            None => claim_digest(&[public_key.as_bytes()]),
        };
        m.insert("quote".into(), quote.into());

        m
    }

    fn deliver_otp(&mut self, auth_id: &str, otp: &str) {
        debug!("Delivering OTP to {auth_id}");
        self.lock()
            .otps
            .push((auth_id.to_string(), otp.to_string()));
    }
}
