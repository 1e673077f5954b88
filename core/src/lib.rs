// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Cross-context signer core
//!
//! This provides the cryptographic primitives shared by both ends of the
//! signer channel, along with the [Engine][engine::Engine] executed inside
//! the isolated child context (iframe or WebView) that holds key material.
//!
//! Interactions with the [Engine][engine::Engine] are performed via the
//! request / response event maps defined in [frame_signer_proto], see
//! `frame-signer` for the transports and handshake that carry them.
//!
//! ## Cryptography
//!
//! - [crypto::derive_symmetric_key]: X25519 + HKDF-SHA256, both parties derive
//!   the same [SymmetricKey][crypto::SymmetricKey] without transmitting it
//! - [crypto::hpke]: HPKE sealing of structured payloads, tagged with the
//!   sender's public key
//! - [crypto::fpe]: FF1 encryption of digit sequences, used to protect OTPs
//!
//! ## Operations
//!
//! ### Frame signer
//!
//! 1. `request:get-public-key` loads (or creates) the frame signing key and
//!    returns its base58 address
//! 2. `request:attestation` returns the platform attestation document
//!    carrying the context's encryption public key
//! 3. `request:sign-message` / `request:sign-transaction` sign with the
//!    frame key after checking the requested signer address
//!
//! ### Recovery-key signer
//!
//! 1. `request:attestation {challenge}` returns the attestation document
//! 2. `request:create-signer` returns an existing signer's address, or
//!    dispatches an OTP via the [Driver][engine::Driver]
//! 3. `request:send-otp` decrypts the FF1-encrypted OTP using a key derived
//!    from the attested encryption key and the parent's public key, creating
//!    the signer on success
//! 4. `request:sign` signs encoded bytes with the active signer
//!
//! Storage failures are reported with the `indexeddb-fatal` code, which the
//! parent treats as recoverable by reloading the context.

pub mod crypto;

pub mod engine;

pub mod solana;
