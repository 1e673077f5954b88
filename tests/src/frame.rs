// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Solana iframe signer scenarios

use anyhow::anyhow;
use log::info;

use frame_signer::{
    signer::{FrameHost, ServiceState, SolanaFrameSigner},
    AttestationError, AttestationState, Error,
};
use frame_signer_core::solana::{self, test_helpers::legacy_message, Transaction};

/// Connect, attest and sign a message and a transaction, checking the
/// signatures against the frame's address
pub async fn sign<H: FrameHost>(signer: &SolanaFrameSigner<H>) -> anyhow::Result<String> {
    signer.init().await?;
    assert_eq!(signer.state(), ServiceState::Connected);

    // Signing is gated on attestation
    let r = signer.sign_message(b"too early").await;
    assert_eq!(r, Err(Error::Attestation(AttestationError::NotValidated)));

    assert!(signer.validate_attestation().await?);
    let attested = signer
        .attestation_public_key()
        .ok_or_else(|| anyhow!("missing attested key"))?;
    info!("attested key: {attested}");

    let address = signer.get_public_key().await?;
    info!("frame signer address: {address}");
    assert_eq!(signer.address().as_deref(), Some(address.as_str()));

    // Sign a message
    let msg = b"hello from the parent document";
    let sig = signer.sign_message(msg).await?;
    solana::verify(&address, msg, &sig)?;

    // Sign a transaction with the frame signer as fee payer
    let key = solana::parse_address(&address)?;
    let unsigned = Transaction::new_unsigned(legacy_message(&[key.to_bytes()], &[]))?;

    let signed = signer.sign_transaction(&unsigned).await?;
    assert_eq!(signed.message(), unsigned.message());

    let sig = signed
        .signature_for(&key)
        .ok_or_else(|| anyhow!("missing transaction signature"))?;
    solana::verify(&address, signed.message(), &sig)?;

    Ok(address)
}

/// Dispose the signer and reconnect, the signer key must persist
pub async fn reconnect<H: FrameHost>(
    signer: &SolanaFrameSigner<H>,
    address: &str,
) -> anyhow::Result<()> {
    signer.dispose();

    assert_eq!(signer.state(), ServiceState::NotInitialized);
    assert_eq!(signer.attestation_state(), AttestationState::Unvalidated);
    assert_eq!(signer.address(), None);

    signer.init().await?;
    assert!(signer.validate_attestation().await?);

    let a = signer.get_public_key().await?;
    assert_eq!(a, address);

    let sig = signer.sign_message(b"again").await?;
    solana::verify(address, b"again", &sig)?;

    Ok(())
}
