// Copyright (c) 2022-2023 The MobileCoin Foundation

use frame_signer::{
    signer::{RecoveryKeySigner, RecoveryKeySignerConfig, RecoveryKeyStatus},
    AttestationError, Error,
};
use frame_signer_sim::{MemoryDriver, SimOptions, SimWebView};
use frame_signer_tests::{recovery, RecoveryHarness};

mod helpers;
use helpers::setup;

const EMAIL: &str = "user@example.com";

fn signer(opts: &SimOptions) -> anyhow::Result<(SimWebView, RecoveryKeySigner<SimWebView>)> {
    let webview = SimWebView::new(MemoryDriver::new(), opts.handshake);
    let signer = RecoveryKeySigner::new(webview.clone(), opts.recovery_config())?;

    webview.set_message_handler(signer.message_handler());

    Ok((webview, signer))
}

#[tokio::test(flavor = "multi_thread")]
async fn recovery_onboard() -> anyhow::Result<()> {
    let opts = setup();
    let (webview, signer) = signer(&opts)?;

    let address = recovery::onboard(&signer, &webview, EMAIL).await?;

    // Rejected OTPs are not recoverable errors
    assert_eq!(webview.reloads(), 0);
    assert_eq!(webview.driver().otp_count(), 1);

    // Existing signer is returned on reconnect without a new OTP
    recovery::restore(&signer, EMAIL, &address).await?;
    assert_eq!(webview.driver().otp_count(), 1);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn recovery_storage_failure() -> anyhow::Result<()> {
    let opts = setup();
    let (webview, signer) = signer(&opts)?;

    let address = recovery::onboard(&signer, &webview, EMAIL).await?;

    recovery::storage_recovery(&signer, &webview, &address).await?;
    assert_eq!(RecoveryHarness::reloads(&webview), 2);

    // Signer remains loaded across reloads
    assert_eq!(signer.status(), RecoveryKeyStatus::Loaded);
    assert_eq!(signer.address().as_deref(), Some(address.as_str()));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn recovery_requires_handshake() -> anyhow::Result<()> {
    let opts = setup();
    let (webview, signer) = signer(&opts)?;
    signer.set_auth(recovery::JWT, recovery::API_KEY);

    assert_eq!(signer.create_signer(EMAIL).await, Err(Error::NotConnected));
    assert_eq!(
        signer.sign_message(b"x").await,
        Err(Error::Attestation(AttestationError::NotValidated))
    );

    // Nothing reached the page
    assert_eq!(webview.injected_scripts(), 0);

    signer.on_load().await?;
    assert_eq!(signer.status(), RecoveryKeyStatus::FrameLoaded);

    // OTP validation requires a validated attestation
    assert_eq!(
        signer.validate_email_otp("123456").await,
        Err(Error::Attestation(AttestationError::NotValidated))
    );
    assert_eq!(signer.status(), RecoveryKeyStatus::NotLoaded);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn recovery_injected_globals() -> anyhow::Result<()> {
    let opts = setup();

    let webview = SimWebView::new(MemoryDriver::new(), opts.handshake);
    let signer = RecoveryKeySigner::new(
        webview,
        RecoveryKeySignerConfig {
            app_id: Some("app-123".to_string()),
            ..opts.recovery_config()
        },
    )?;

    let script = signer.injected_javascript()?;
    assert!(script.contains("ReactNativeWebView.postMessage"));
    assert!(script.contains(r#"window.crossmintAppId = "app-123";"#));

    Ok(())
}
