mod commands;
mod core;

use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::commands::{LaunchRequest, Outcome, Pipeline};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::launch::TokioClock;
use crate::core::prompt::{AlwaysYes, Prompt, TerminalPrompt};
use crate::core::state::{runtime_paths, AppState, GameVariant, SettingsFile};

/// Deliver an Archipelago patch to a local Minecraft Forge server and run it.
#[derive(Debug, Parser)]
#[command(name = "apmc-launcher")]
pub struct Cli {
    /// Patch file (.apmc or .apmcdig) to deliver to the server
    pub patch_file: Option<PathBuf>,

    /// Install Java and Forge, then exit
    #[arg(short, long)]
    pub install: bool,

    /// Manifest channel to resolve versions from
    #[arg(short, long)]
    pub release_channel: Option<String>,

    /// Java version to use
    #[arg(short, long)]
    pub java: Option<String>,

    /// Forge version token or installer URL
    #[arg(short, long)]
    pub forge: Option<String>,

    /// Download URL of the randomizer mod
    #[arg(short, long = "mod")]
    pub mod_url: Option<String>,

    /// Mod data version to resolve instead of the patch's
    #[arg(short = 'v', long = "version")]
    pub client_version: Option<String>,

    /// Game variant; guessed from the patch extension when omitted
    #[arg(long, value_enum)]
    pub variant: Option<GameVariant>,

    /// Settings file to use instead of the one in the data directory
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Point the delivered patch at HOST:PORT
    #[arg(long, value_name = "HOST:PORT", value_parser = parse_connect)]
    pub connect: Option<(String, u16)>,

    /// Answer yes to every question
    #[arg(short, long)]
    pub yes: bool,

    /// Do not wait for Enter before exiting
    #[arg(long)]
    pub no_pause: bool,

    /// Debug logging
    #[arg(long)]
    pub verbose: bool,
}

fn parse_connect(raw: &str) -> Result<(String, u16), String> {
    let (host, port) = raw
        .rsplit_once(':')
        .ok_or_else(|| format!("expected HOST:PORT, got {:?}", raw))?;
    if host.is_empty() {
        return Err(format!("missing host in {:?}", raw));
    }
    let port = port
        .parse::<u16>()
        .map_err(|e| format!("invalid port {:?}: {}", port, e))?;
    Ok((host.to_string(), port))
}

pub fn run() -> i32 {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    tracing::info!("apmc-launcher {} starting...", env!("CARGO_PKG_VERSION"));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Could not start async runtime: {}", err);
            return 1;
        }
    };

    let result = runtime.block_on(run_cli(&cli));
    let code = commands::finish(&result);
    if !cli.no_pause && !matches!(result, Err(LauncherError::Cancelled)) {
        runtime.block_on(commands::wait_for_enter());
    }
    // An abandoned prompt may still be blocked on stdin.
    runtime.shutdown_background();
    code
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,apmc_launcher_lib=debug"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_cli(cli: &Cli) -> LauncherResult<Outcome> {
    let paths = runtime_paths()?.clone();
    let settings_path = cli.settings.clone().unwrap_or_else(|| paths.settings_file());
    let variant = cli
        .variant
        .or_else(|| cli.patch_file.as_deref().and_then(GameVariant::from_patch_path))
        .unwrap_or(GameVariant::Standard);

    let mut settings = SettingsFile::load_or_init(&settings_path)
        .for_variant(variant)
        .clone();
    if let Some(channel) = &cli.release_channel {
        settings.release_channel = channel.clone();
    }

    if let Some(patch) = &cli.patch_file {
        if !patch.is_file() {
            return Err(LauncherError::MissingPatch(format!(
                "{:?} does not exist",
                patch
            )));
        }
    }

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());
    let state = AppState::new(paths, settings, variant, cancel.clone())?;

    let prompt: Box<dyn Prompt> = if cli.yes {
        Box::new(AlwaysYes)
    } else {
        Box::new(TerminalPrompt::new(cancel))
    };
    let request = LaunchRequest {
        patch_file: cli.patch_file.clone(),
        install_only: cli.install,
        client_version: cli.client_version.clone(),
        connect: cli.connect.clone(),
        runtime_version: cli.java.clone(),
        server_distribution: cli.forge.clone(),
        mod_url: cli.mod_url.clone(),
    };

    Pipeline::new(&state, prompt.as_ref(), &TokioClock)
        .run(&request)
        .await
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, shutting down...");
            cancel.cancel();
        }
    });
}
