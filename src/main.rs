//! Baitline CLI entry point.
//!
//! Wires the settings file, output layout, editor bridge and scanners into
//! a `CampaignController`, installs the ctrl-c cancellation handler, and
//! maps the outcome to the exit-code contract (0 completed, 2 interrupted,
//! 3 uncaught error).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use baitline::services::editor::BridgeEditorDriver;
use baitline::{
    CampaignController, CampaignOutcome, CampaignSettings, CheckpointStore, OutputLayout,
};
use baitline_core::CancellationToken;
use baitline_scanners::ScannerPair;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "baitline",
    about = "Red-team campaign orchestrator for LLM code assistants",
    version
)]
struct Cli {
    /// Campaign settings file (JSON). Ignored when resuming.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Output base directory (defaults to ~/.baitline/output)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Prompt template asset directory
    #[arg(long, default_value = "assets/prompt-template")]
    assets: PathBuf,

    /// Editor automation bridge executable
    #[arg(long, default_value = "baitline-bridge")]
    bridge: String,

    /// Per-scan analyzer timeout in seconds
    #[arg(long, default_value_t = 300)]
    scan_timeout: u64,

    /// Delete any stored campaign state and exit
    #[arg(long)]
    clear_checkpoint: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Build everything and run the campaign.
async fn run(cli: Cli) -> anyhow::Result<CampaignOutcome> {
    let layout = match cli.output.clone() {
        Some(base) => OutputLayout::new(base),
        None => OutputLayout::default_under_home().context("resolving default output layout")?,
    };

    if cli.clear_checkpoint {
        let mut store = CheckpointStore::open(layout.checkpoint_path())
            .context("opening checkpoint for clear")?;
        store.clear().context("clearing checkpoint")?;
        info!("checkpoint cleared");
        return Ok(CampaignOutcome::Completed);
    }

    let settings = cli
        .settings
        .as_deref()
        .map(CampaignSettings::from_file)
        .transpose()
        .context("loading campaign settings")?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt signal received, unwinding");
                cancel.cancel();
            }
        });
    }

    let driver = Arc::new(BridgeEditorDriver::new(cli.bridge.clone(), cancel.clone()));
    let scanners = Arc::new(ScannerPair::command_backed(cli.scan_timeout));
    let controller =
        CampaignController::new(layout, cli.assets.clone(), driver, scanners, cancel);

    controller.run(settings).await.context("running campaign")
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(CampaignOutcome::Completed) => ExitCode::SUCCESS,
        Ok(CampaignOutcome::Interrupted) => ExitCode::from(2),
        Err(e) => {
            error!("campaign aborted: {:#}", e);
            ExitCode::from(3)
        }
    }
}
