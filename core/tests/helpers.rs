// Copyright (c) 2022-2023 The MobileCoin Foundation

#![allow(unused)]

use std::collections::HashMap;

use log::{debug, trace};
use serde_json::{Map, Value};

use frame_signer_core::engine::{claim_digest, Driver, Engine, StorageError};
use frame_signer_proto::{
    frame::{FrameRequest, FrameResponse},
    recovery::{RecoveryRequest, RecoveryResponse},
    Envelope, EventMap,
};

/// Engine wrapper passing requests through the wire encoding
pub struct TestEngine {
    pub engine: Engine<TestDriver>,
}

impl TestEngine {
    pub fn new(drv: TestDriver) -> Self {
        Self {
            engine: Engine::new(drv),
        }
    }

    /// Encode a request, decode it on the child side, handle it and
    /// return the decoded response
    pub fn frame(&mut self, req: FrameRequest) -> FrameResponse {
        let req = roundtrip::<FrameRequest>(&req);
        let resp = self.engine.frame_request(&req);
        roundtrip::<FrameResponse>(&resp)
    }

    pub fn recovery(&mut self, req: RecoveryRequest) -> RecoveryResponse {
        let req = roundtrip::<RecoveryRequest>(&req);
        let resp = self.engine.recovery_request(&req);
        roundtrip::<RecoveryResponse>(&resp)
    }
}

fn roundtrip<M: EventMap>(m: &M) -> M {
    let json = m.to_envelope().unwrap().to_json();
    trace!("wire: {json}");

    let env = Envelope::parse(&json).unwrap();
    M::from_envelope(&env).unwrap()
}

/// Driver implementation for test use
#[derive(Default)]
pub struct TestDriver {
    pub slots: HashMap<String, Vec<u8>>,
    pub otps: Vec<(String, String)>,
    /// Fail the next N storage operations
    pub fail_storage: usize,
}

impl Driver for TestDriver {
    fn load(&mut self, slot: &str) -> Result<Option<Vec<u8>>, StorageError> {
        if self.fail_storage > 0 {
            self.fail_storage -= 1;
            return Err(StorageError::Fatal("database closed".into()));
        }

        Ok(self.slots.get(slot).cloned())
    }

    fn store(&mut self, slot: &str, value: &[u8]) -> Result<(), StorageError> {
        if self.fail_storage > 0 {
            self.fail_storage -= 1;
            return Err(StorageError::Fatal("database closed".into()));
        }

        self.slots.insert(slot.to_string(), value.to_vec());
        Ok(())
    }

    fn attest(&self, public_key: &str, challenge: Option<&str>) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("publicKey".into(), public_key.into());
        if let Some(c) = challenge {
            m.insert("challenge".into(), c.into());
            m.insert(
                "quote".into(),
                claim_digest(&[public_key.as_bytes(), c.as_bytes()]).into(),
            );
        }
        m
    }

    fn deliver_otp(&mut self, auth_id: &str, otp: &str) {
        debug!("OTP for {auth_id}: {otp}");
        self.otps.push((auth_id.to_string(), otp.to_string()));
    }
}
