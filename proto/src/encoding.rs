// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Binary encodings used on the wire

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::ProtoError;

/// Encoding applied to binary payload fields
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Encoding {
    Base58,
    Base64,
    Hex,
}

impl Encoding {
    /// Encode bytes using this encoding
    pub fn encode(&self, b: impl AsRef<[u8]>) -> String {
        match self {
            Encoding::Base58 => bs58::encode(b).into_string(),
            Encoding::Base64 => STANDARD.encode(b),
            Encoding::Hex => hex::encode(b),
        }
    }

    /// Decode a string using this encoding
    pub fn decode(&self, s: &str) -> Result<Vec<u8>, ProtoError> {
        match self {
            Encoding::Base58 => bs58::decode(s).into_vec().map_err(|e| ProtoError::Encoding {
                encoding: "base58",
                reason: e.to_string(),
            }),
            Encoding::Base64 => STANDARD.decode(s).map_err(|e| ProtoError::Encoding {
                encoding: "base64",
                reason: e.to_string(),
            }),
            Encoding::Hex => hex::decode(s).map_err(|e| ProtoError::Encoding {
                encoding: "hex",
                reason: e.to_string(),
            }),
        }
    }
}
