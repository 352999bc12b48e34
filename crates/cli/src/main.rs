use std::path::PathBuf;

use cardaction_core::ActionConfig;
use cardaction_pcsc::{MonitorConfig, PcscDeviceManager, SessionConfig, event_channel};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

mod app;
mod config;
mod reader;
mod runner;

use app::App;
use runner::ShellRunner;

#[derive(Parser)]
#[command(version, about = "Run commands when smart cards are inserted or removed")]
struct Cli {
    /// Configuration file (defaults to the executable's path with a .toml extension)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug level output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Watch all readers and run the configured commands (default)
    Watch,

    /// List available readers
    List,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let manager = PcscDeviceManager::new()?;

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::List => reader::list_readers(&manager),
        Commands::Watch => {
            let path = match cli.config {
                Some(path) => path,
                None => config::default_config_path()?,
            };
            let config = config::load_config(&path)?;
            info!(config = %path.display(), apdus = config.insert_apdus.len(), "configuration loaded");
            watch(&manager, config).await
        }
    }
}

async fn watch(manager: &PcscDeviceManager, config: ActionConfig) -> eyre::Result<()> {
    let (tx, rx) = event_channel();
    let handle = manager
        .monitor(MonitorConfig::from(&config.monitor))
        .spawn(tx)?;

    let app = App::new(config, manager.transmitter(SessionConfig::default()), ShellRunner);
    let dispatcher = tokio::task::spawn_blocking(move || app.run(&rx));

    if let Err(e) = wait_for_shutdown_signal().await {
        error!(error = %e, "error waiting for shutdown signal");
    }
    info!("shutting down");

    tokio::task::spawn_blocking(move || handle.shutdown()).await?;
    dispatcher.await?;
    Ok(())
}

async fn wait_for_shutdown_signal() -> eyre::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("received Ctrl+C");
    }

    Ok(())
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_ansi(true)
        .init();
}
