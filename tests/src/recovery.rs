// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Recovery-key WebView signer scenarios

use anyhow::anyhow;
use log::info;

use frame_signer::{
    signer::{email_auth_id, RecoveryKeySigner, RecoveryKeyStatus},
    transport::WebViewHandle,
    Error,
};
use frame_signer_core::solana::{self, test_helpers::v0_message, Transaction};
use frame_signer_proto::recovery::{SignerState, INDEXEDDB_FATAL, INVALID_OTP};

pub const JWT: &str = "test-jwt";
pub const API_KEY: &str = "test-api-key";

/// Access to the WebView host behind a [RecoveryKeySigner]
pub trait RecoveryHarness {
    /// Latest OTP delivered out of band for `auth_id`
    fn otp_for(&self, auth_id: &str) -> Option<String>;

    /// Fail the next `n` storage operations inside the WebView
    fn fail_storage(&self, n: usize);

    /// Number of WebView reloads so far
    fn reloads(&self) -> usize;
}

/// Load the WebView and create a signer for `email` via the OTP flow,
/// returning the new signer address
pub async fn onboard<W, H>(
    signer: &RecoveryKeySigner<W>,
    harness: &H,
    email: &str,
) -> anyhow::Result<String>
where
    W: WebViewHandle,
    H: RecoveryHarness,
{
    signer.on_load().await?;
    assert_eq!(signer.status(), RecoveryKeyStatus::FrameLoaded);

    // Credentials are required for signer requests
    assert_eq!(
        signer.create_signer(email).await,
        Err(Error::MissingCredentials)
    );
    signer.set_auth(JWT, API_KEY);

    assert!(signer.validate_attestation().await?);
    assert_eq!(signer.get_status().await?, SignerState::NewDevice);

    // No signer yet, an OTP is dispatched
    assert_eq!(signer.create_signer(email).await?, None);
    assert_eq!(signer.status(), RecoveryKeyStatus::AwaitingOtpValidation);

    let otp = harness
        .otp_for(&email_auth_id(email))
        .ok_or_else(|| anyhow!("no OTP delivered"))?;

    // A wrong code is rejected and may be retried
    let wrong = if otp == "000000" { "111111" } else { "000000" };
    let r = signer.validate_email_otp(wrong).await;
    assert_eq!(r.map_err(|e| e.code()), Err(Some(INVALID_OTP.to_string())));
    assert_eq!(signer.status(), RecoveryKeyStatus::NotLoaded);

    let address = signer.validate_email_otp(&otp).await?;
    info!("recovery signer address: {address}");

    assert_eq!(signer.status(), RecoveryKeyStatus::Loaded);
    assert_eq!(signer.address().as_deref(), Some(address.as_str()));
    assert_eq!(signer.get_status().await?, SignerState::Ready);

    sign(signer, &address).await?;

    Ok(address)
}

/// Sign a message and a transaction, checking both against `address`
pub async fn sign<W: WebViewHandle>(
    signer: &RecoveryKeySigner<W>,
    address: &str,
) -> anyhow::Result<()> {
    let msg = b"hello from the native app";
    let sig = signer.sign_message(msg).await?;
    solana::verify(address, msg, &sig)?;

    let key = solana::parse_address(address)?;
    let unsigned = Transaction::new_unsigned(v0_message(&[key.to_bytes()]))?;

    let signed = signer.sign_transaction(unsigned.clone()).await?;
    assert_eq!(signed.message(), unsigned.message());

    let sig = signed
        .signature_for(&key)
        .ok_or_else(|| anyhow!("missing transaction signature"))?;
    solana::verify(address, signed.message(), &sig)?;

    Ok(())
}

/// Reconnect after dispose, the existing signer is returned without an OTP
pub async fn restore<W: WebViewHandle>(
    signer: &RecoveryKeySigner<W>,
    email: &str,
    address: &str,
) -> anyhow::Result<()> {
    signer.dispose();
    assert_eq!(signer.status(), RecoveryKeyStatus::NotLoaded);
    assert_eq!(signer.address(), None);

    signer.on_load().await?;
    assert!(signer.validate_attestation().await?);

    assert_eq!(signer.create_signer(email).await?.as_deref(), Some(address));
    assert_eq!(signer.status(), RecoveryKeyStatus::Loaded);

    sign(signer, address).await
}

/// Storage failures inside the WebView reload it and retry once
pub async fn storage_recovery<W, H>(
    signer: &RecoveryKeySigner<W>,
    harness: &H,
    address: &str,
) -> anyhow::Result<()>
where
    W: WebViewHandle,
    H: RecoveryHarness,
{
    let reloads = harness.reloads();

    // A single failure is recovered transparently
    harness.fail_storage(1);

    let sig = signer.sign_message(b"after a storage failure").await?;
    solana::verify(address, b"after a storage failure", &sig)?;
    assert_eq!(harness.reloads(), reloads + 1);

    // A failure on the retry is returned, with no further reloads
    harness.fail_storage(2);

    let r = signer.sign_message(b"twice").await;
    assert_eq!(r.map_err(|e| e.code()), Err(Some(INDEXEDDB_FATAL.to_string())));
    assert_eq!(harness.reloads(), reloads + 2);

    // Channel is usable again afterwards
    let sig = signer.sign_message(b"recovered").await?;
    solana::verify(address, b"recovered", &sig)?;

    Ok(())
}
