//! crowdvm daemon entry point.
//!
//! Wires the pipeline together: chat poll client -> dispatcher ->
//! admission queue -> executor -> VBoxManage, with graceful drain on
//! SIGINT/SIGTERM.

use anyhow::Context;
use chat_poll_client::YouTubeChatClient;
use clap::Parser;
use crowdvm_core::{init_logging, ChatChannel, Config, ControlSurface, Paths, Visibility};
use crowdvm_dispatch::{Dispatcher, Executor, ExecutorSettings};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use user_store::UserStore;
use vbox_cli_ops::VboxSurface;
use vote_coordinator::VoteCoordinator;

/// crowdvm daemon command-line interface.
#[derive(Parser, Debug)]
#[command(name = "crowdvm-daemon")]
#[command(about = "Let a live chat crowd drive a VirtualBox VM")]
#[command(version)]
struct Args {
    /// Path to a config file. Defaults to ~/.crowdvm/config.json.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base directory for runtime files. Defaults to ~/.crowdvm.
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Write a default config file and exit.
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let paths = match args.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };

    if args.init_config {
        let config = Config::default();
        config.save(&paths)?;
        println!(
            "Wrote default config to {}. Fill in vm.vm_name and chat credentials.",
            paths.config_file().display()
        );
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load(&paths).context("loading config")?,
    };

    init_logging(args.log_level.as_deref().unwrap_or(&config.log_level));
    info!(version = env!("CARGO_PKG_VERSION"), "crowdvm daemon starting");

    config.validate().context("invalid configuration")?;
    info!(
        vm = %config.vm.vm_name,
        queue_max_size = config.queue_max_size,
        vote_quorum = config.vote_quorum,
        vote_duration_secs = config.vote_duration_secs,
        user_cooldown_secs = config.user_cooldown_secs,
        "configuration loaded"
    );

    run(config).await
}

async fn run(config: Config) -> anyhow::Result<()> {
    let surface: Arc<dyn ControlSurface> = Arc::new(VboxSurface::new(&config.vm));
    let channel: Arc<dyn ChatChannel> =
        Arc::new(YouTubeChatClient::new(&config.chat).context("building chat client")?);
    let users = Arc::new(UserStore::new());

    let (producer, consumer) = admission_queue::bounded(config.queue_max_size);
    let (votes, expired_rx) =
        VoteCoordinator::new(config.vote_quorum, config.vote_duration(), producer.clone());
    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // The VM should be up before the crowd arrives; a failure here is
    // degraded mode, not a startup error — the executor's recovery path
    // retries on the first command.
    match surface.query_running().await {
        Ok(true) => info!("VM already running"),
        Ok(false) => {
            info!("VM not running, starting it");
            if let Err(err) = surface.start().await {
                error!(error = %err, "initial VM start failed, continuing degraded");
            }
        }
        Err(err) => warn!(error = %err, "could not query VM state"),
    }

    let executor = Executor::new(
        surface,
        users.clone(),
        outcome_tx,
        ExecutorSettings {
            surface_timeout: config.surface_timeout(),
            points_per_command: config.points_per_command,
            shutdown_grace: config.shutdown_grace(),
        },
    );
    let executor_handle = executor.spawn(consumer, shutdown_rx.clone());

    let dispatcher = Arc::new(Dispatcher::new(
        config,
        channel.clone(),
        users,
        producer,
        votes,
    ));
    let inbound_handle = dispatcher.clone().spawn_inbound(shutdown_rx);
    let relay_handle = dispatcher.clone().spawn_relay(outcome_rx, expired_rx);

    let _ = channel
        .reply(
            "🤖 crowdvm is live! Type !help for commands. 🐧",
            Visibility::Public,
        )
        .await;

    shutdown_signal().await;
    info!("shutdown signal received");

    let _ = channel
        .reply("🤖 shutting down, thanks for playing! 👋", Visibility::Public)
        .await;

    // Stop accepting first; the executor then drains what was already
    // admitted, bounded by the grace period.
    let _ = shutdown_tx.send(true);
    let _ = inbound_handle.await;
    let _ = executor_handle.await;
    let _ = relay_handle.await;

    info!("crowdvm daemon stopped");
    Ok(())
}

/// Wait for SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
