//! # soundboar
//!
//! A networked soundboard: plays sounds from a local library through a
//! playlist, controlled over HTTP.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use parking_lot::Mutex;
use soundboar_app::config::{self, Config, DEVELOPMENT_ORIGIN};
use soundboar_app::install::{self, InstallOptions, InstallOutcome};
use soundboar_app::logging::{self, LogLevel};
use soundboar_app::services::autoplay;
use soundboar_app::{router, AppState};
use soundboar_audio::AudioEngine;
use soundboar_core::media::supported_suffixes;
use soundboar_extractor::MetaExtractor;
use soundboar_player::{Player, SharedPlayer};
use soundboar_repository::Repository;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "soundboar", version, about)]
struct Cli {
    #[arg(long, value_enum, default_value = "NOTSET", global = true)]
    log_level: LogLevel,

    /// Data directory holding `sounds/` and `static/`.
    #[arg(long, env = "SOUNDBOAR_DIRECTORY", global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the data directory.
    Install(InstallArgs),
    /// Delete the data directory and everything in it.
    Uninstall,
    /// Start the server (default).
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct InstallArgs {
    /// Install even if the directory is not empty.
    #[arg(long)]
    force: bool,
    /// Succeed without changes if the directory is not empty.
    #[arg(long)]
    exist_ok: bool,
    /// Do not create the directory if it is missing.
    #[arg(long)]
    no_mkdir: bool,
    /// Do not download and install the frontend.
    #[arg(long)]
    skip_head: bool,
    /// Replace frontend files even when they were customized.
    #[arg(long)]
    overwrite_head: bool,
    /// Frontend release to install, defaults to this version.
    #[arg(long)]
    head_version: Option<String>,
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    /// Do not install the data directory before starting.
    #[arg(long)]
    no_install: bool,
    /// Allow the frontend dev server as a CORS origin.
    #[arg(long)]
    development: bool,
    #[arg(long, env = "SOUNDBOAR_CORS_ORIGIN")]
    cors_origin: Option<String>,
    #[arg(long, env = "SOUNDBOAR_HOST")]
    host: Option<IpAddr>,
    #[arg(long, env = "SOUNDBOAR_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level);

    let directory = match cli.dir {
        Some(dir) => dir,
        None => config::default_directory().context("No data directory could be determined")?,
    };

    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Install(args) => {
            let options = InstallOptions {
                force: args.force,
                exist_ok: args.exist_ok,
                no_mkdir: args.no_mkdir,
            };
            let outcome = install::install(&directory, options)?;
            if outcome == InstallOutcome::Installed && !args.skip_head {
                let version = args.head_version.as_deref().unwrap_or(env!("CARGO_PKG_VERSION"));
                let http = MetaExtractor::new()?;
                install::install_head(&directory, &install::head_url(version), args.overwrite_head, &http)
                    .await?;
            }
        }
        Command::Uninstall => install::uninstall(&directory)?,
        Command::Run(args) => run(directory, args).await?,
    }

    Ok(())
}

async fn run(directory: PathBuf, args: RunArgs) -> Result<()> {
    info!("Starting soundboar v{}", env!("CARGO_PKG_VERSION"));

    if !args.no_install {
        let options = InstallOptions {
            exist_ok: true,
            ..InstallOptions::default()
        };
        let outcome = install::install(&directory, options)?;
        if outcome == InstallOutcome::Installed {
            let url = install::head_url(env!("CARGO_PKG_VERSION"));
            if let Err(e) = install::install_head(&directory, &url, false, &MetaExtractor::new()?).await {
                warn!("Serving the placeholder frontend: {e}");
            }
        }
    }

    let mut config = Config::new(directory);
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.cors_origin = args
        .cors_origin
        .or_else(|| args.development.then(|| DEVELOPMENT_ORIGIN.to_string()));

    let repository = Repository::new(config.sounds_dir(), supported_suffixes())
        .context("Sound library is not available")?;
    let engine = AudioEngine::new().context("Failed to start the audio engine")?;
    let player: SharedPlayer = Arc::new(Mutex::new(Player::new(engine)));

    // First subscriber, so it also sees anything emitted during startup.
    let events = player.lock().on_event();
    let autoplay = autoplay::spawn(Arc::clone(&player), events);

    let state = AppState {
        player: Arc::clone(&player),
        repository: Arc::new(repository),
        extractor: MetaExtractor::new()?,
    };
    let app = router(state, &config.static_dir(), config.cors_origin.as_deref());

    let address = config.address();
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Listening on http://{address}");

    let events = player.lock().events().clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutting down");
            events.close();
        })
        .await?;

    if let Err(e) = autoplay.await {
        warn!("Autoplay task failed: {e}");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
