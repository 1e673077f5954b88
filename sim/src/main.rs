// Copyright (c) 2022-2023 The MobileCoin Foundation

use std::path::PathBuf;

use clap::Parser;
use log::{debug, info, LevelFilter};
use strum::{Display, EnumString, EnumVariantNames};

use frame_signer::signer::{RecoveryKeySigner, SolanaFrameSigner};
use frame_signer_sim::*;
use frame_signer_tests::{frame, recovery};

/// Cross-context signer simulator
///
/// Runs the parent-side signer services against in-process child
/// contexts and checks the resulting signatures.
#[derive(Clone, Debug, Parser)]
pub struct Args {
    #[clap(subcommand)]
    scenario: Scenario,

    /// Simulator options (TOML)
    #[clap(long, env = "SIM_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[clap(long, default_value = "info", env)]
    log_level: LevelFilter,
}

/// Simulated scenarios
#[derive(Clone, PartialEq, Debug, Parser, Display, EnumString, EnumVariantNames)]
#[strum(serialize_all = "kebab-case")]
pub enum Scenario {
    /// Solana iframe signer: connect, attest, sign and reconnect
    Frame,
    /// Recovery-key WebView signer: OTP onboarding and storage recovery
    Recovery {
        /// Email to create the signer for
        #[clap(long)]
        email: Option<String>,
    },
    /// Run all scenarios
    All,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging
    let c = simplelog::ConfigBuilder::new().build();
    let _ = simplelog::SimpleLogger::init(args.log_level, c);

    // Load options
    let opts = match &args.config {
        Some(p) => {
            let s = std::fs::read_to_string(p)?;
            toml::from_str::<SimOptions>(&s)?
        }
        None => SimOptions::default(),
    };

    debug!("options: {:?}", opts);

    info!("Running scenario '{}'", args.scenario);

    match args.scenario {
        Scenario::Frame => run_frame(&opts).await?,
        Scenario::Recovery { email } => {
            let email = email.unwrap_or_else(|| opts.email.clone());
            run_recovery(&opts, &email).await?
        }
        Scenario::All => {
            run_frame(&opts).await?;
            run_recovery(&opts, &opts.email).await?;
        }
    }

    info!("Scenario OK!");

    Ok(())
}

async fn run_frame(opts: &SimOptions) -> anyhow::Result<()> {
    let host = SimFrameHost::new(&opts.parent_origin, MemoryDriver::new(), opts.handshake);
    let signer = SolanaFrameSigner::new(host, opts.frame_config());

    let address = frame::sign(&signer).await?;
    frame::reconnect(&signer, &address).await?;

    signer.dispose();

    Ok(())
}

async fn run_recovery(opts: &SimOptions, email: &str) -> anyhow::Result<()> {
    let webview = SimWebView::new(MemoryDriver::new(), opts.handshake);
    let signer = RecoveryKeySigner::new(webview.clone(), opts.recovery_config())?;
    webview.set_message_handler(signer.message_handler());

    let address = recovery::onboard(&signer, &webview, email).await?;
    recovery::storage_recovery(&signer, &webview, &address).await?;
    recovery::restore(&signer, email, &address).await?;

    signer.dispose();

    Ok(())
}
