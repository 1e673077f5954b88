// Copyright (c) 2022-2023 The MobileCoin Foundation

//! FF1 format-preserving encryption (NIST SP 800-38G) over AES-256
//!
//! Used to protect numeric codes such as OTPs in transit while keeping
//! their digit-string shape: the output has the same length as the input
//! and every output digit is `< radix`.

use aes::Aes256;
use fpe::ff1::{FlexibleNumeralString, FF1};
use log::error;
use serde::{Deserialize, Serialize};

use super::{Error, SymmetricKey};

/// Default radix (decimal digits)
pub const DEFAULT_RADIX: u32 = 10;

/// Minimum FF1 domain size, `radix ^ len` must reach this
const MIN_DOMAIN: u128 = 1_000_000;

/// FF1 configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ff1Config {
    pub radix: u32,
    pub tweak: Vec<u8>,
}

impl Default for Ff1Config {
    fn default() -> Self {
        Self {
            radix: DEFAULT_RADIX,
            tweak: Vec::new(),
        }
    }
}

/// FF1 cipher configuration, the cipher itself is built per call from
/// the raw key bytes
#[derive(Clone, Debug, PartialEq)]
pub struct Fpe {
    radix: u32,
    tweak: Vec<u8>,
}

impl Default for Fpe {
    fn default() -> Self {
        Self {
            radix: DEFAULT_RADIX,
            tweak: Vec::new(),
        }
    }
}

impl Fpe {
    /// Create an FF1 instance for the provided configuration
    pub fn new(config: Ff1Config) -> Result<Self, Error> {
        if !(2..=65536).contains(&config.radix) {
            return Err(Error::InvalidRadix(config.radix));
        }

        Ok(Self {
            radix: config.radix,
            tweak: config.tweak,
        })
    }

    pub fn radix(&self) -> u32 {
        self.radix
    }

    /// Encrypt a digit sequence
    pub fn encrypt(&self, digits: &[u16], key: &SymmetricKey) -> Result<Vec<u16>, Error> {
        self.validate(digits)?;

        let ff1 = self.cipher(key).map_err(|_| Error::EncryptFailed)?;
        let out = ff1
            .encrypt(&self.tweak, &FlexibleNumeralString::from(digits.to_vec()))
            .map_err(|e| {
                error!("[FPE] encryption failed: {e:?}");
                Error::EncryptFailed
            })?;

        Ok(out.into())
    }

    /// Decrypt a digit sequence
    pub fn decrypt(&self, digits: &[u16], key: &SymmetricKey) -> Result<Vec<u16>, Error> {
        self.validate(digits)?;

        let ff1 = self.cipher(key).map_err(|_| Error::DecryptFailed)?;
        let out = ff1
            .decrypt(&self.tweak, &FlexibleNumeralString::from(digits.to_vec()))
            .map_err(|e| {
                error!("[FPE] decryption failed: {e:?}");
                Error::DecryptFailed
            })?;

        Ok(out.into())
    }

    /// Encrypt a digit string (radix <= 36), such as an OTP
    pub fn encrypt_str(&self, s: &str, key: &SymmetricKey) -> Result<String, Error> {
        let digits = self.digits_from_str(s)?;
        let out = self.encrypt(&digits, key)?;
        self.digits_to_string(&out)
    }

    /// Decrypt a digit string (radix <= 36)
    pub fn decrypt_str(&self, s: &str, key: &SymmetricKey) -> Result<String, Error> {
        let digits = self.digits_from_str(s)?;
        let out = self.decrypt(&digits, key)?;
        self.digits_to_string(&out)
    }

    /// Parse a string of digits in this radix
    pub fn digits_from_str(&self, s: &str) -> Result<Vec<u16>, Error> {
        if self.radix > 36 {
            return Err(Error::Encoding(format!(
                "radix {} has no string form",
                self.radix
            )));
        }

        s.chars()
            .map(|c| match c.to_digit(36) {
                Some(d) if d < self.radix => Ok(d as u16),
                Some(_) => Err(Error::DigitOutOfRange),
                None => Err(Error::Encoding(format!("invalid digit '{c}'"))),
            })
            .collect()
    }

    /// Render digits in this radix as a string
    pub fn digits_to_string(&self, digits: &[u16]) -> Result<String, Error> {
        if self.radix > 36 {
            return Err(Error::Encoding(format!(
                "radix {} has no string form",
                self.radix
            )));
        }

        digits
            .iter()
            .map(|d| char::from_digit(*d as u32, self.radix).ok_or(Error::DigitOutOfRange))
            .collect()
    }

    /// Check input against the radix before any cipher work
    fn validate(&self, digits: &[u16]) -> Result<(), Error> {
        if digits.iter().any(|d| *d as u32 >= self.radix) {
            return Err(Error::DigitOutOfRange);
        }

        let min_len = self.min_len();
        if digits.len() < min_len {
            return Err(Error::DataTooShort {
                radix: self.radix,
                min_len,
            });
        }

        Ok(())
    }

    /// Minimum input length such that `radix ^ len >= 1_000_000`
    pub fn min_len(&self) -> usize {
        let mut len = 0;
        let mut domain = 1u128;
        while domain < MIN_DOMAIN {
            domain *= self.radix as u128;
            len += 1;
        }
        len.max(2)
    }

    fn cipher(&self, key: &SymmetricKey) -> Result<FF1<Aes256>, ()> {
        FF1::<Aes256>::new(key.as_bytes(), self.radix).map_err(|e| {
            error!("[FPE] cipher init failed: {e:?}");
        })
    }
}
