//! Sprout - keeps a farm tended while you are away.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use sprout_core::scheduler::{
    FarmOrchestrator, FriendOrchestrator, HeartbeatWatchdog, TaskOrchestrator,
    WarehouseOrchestrator,
};
use sprout_core::{
    Catalog, Config, EventRouter, GameClient, GameData, NoRecommendation, NotificationKind,
    Overrides, Platform, QuotaBook, SeedRecommender, ServerClock, Session, UserState, WsConnector,
};

/// Unattended farm client.
#[derive(Parser, Debug)]
#[command(name = "sprout")]
#[command(about = "Log in with a one-time code and keep the farm tended")]
#[command(version)]
struct Cli {
    /// One-time login code.
    #[arg(long, env = "SPROUT_CODE")]
    code: String,

    /// Log in through the wx platform instead of qq.
    #[arg(long)]
    wx: bool,

    /// Seconds between own-farm checks.
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,

    /// Seconds between friend patrols.
    #[arg(long, value_name = "SECS")]
    friend_interval: Option<u64>,

    /// Seconds to wait before harvesting ripe plots.
    #[arg(long, value_name = "SECS")]
    harvest_delay: Option<u64>,

    /// Path to a TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            platform: self.wx.then_some(Platform::Wx),
            farm_interval: self.interval.map(Duration::from_secs),
            friend_interval: self.friend_interval.map(Duration::from_secs),
            harvest_delay: self.harvest_delay.map(Duration::from_secs),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    let config = Config::load(cli.config.as_deref(), &cli.overrides())
        .context("loading configuration")?;
    info!(
        platform = config.server.platform.as_str(),
        farm_interval = ?config.farm.interval,
        friend_interval = ?config.friend.interval,
        harvest_delay = ?config.farm.harvest_delay,
        "configuration loaded"
    );

    let (game_data, recommender) = load_catalog(&config)?;

    // ========================================================================
    // Session
    // ========================================================================

    let router = Arc::new(EventRouter::new());
    let user = Arc::new(UserState::new());
    let clock = Arc::new(ServerClock::new());
    let session = Session::new(router.clone(), user.clone());

    let connector = WsConnector::new(&config.server, &cli.code)?;
    info!(url = %connector.url().host_str().unwrap_or_default(), "connecting");
    let receive_loop = session.connect(&connector).await.context("connecting")?;

    let shutdown = CancellationToken::new();
    let disconnected = shutdown.clone();
    router.subscribe(NotificationKind::Disconnected, move |_| {
        let token = disconnected.clone();
        async move {
            warn!("connection closed");
            token.cancel();
        }
    });

    let client = GameClient::new(session.clone(), clock, &config);
    tokio::time::sleep(config.server.login_delay).await;
    let account = match client.login(&config.device).await {
        Ok(account) => account,
        Err(err) => {
            session.close().await;
            return Err(err).context("login failed");
        }
    };
    info!(
        name = %account.name,
        level = account.level,
        gold = account.gold,
        "ready"
    );

    // ========================================================================
    // Loops
    // ========================================================================

    let quota = Arc::new(QuotaBook::new(config.operations.clone()));

    let heartbeat = HeartbeatWatchdog::new(client.clone(), config.heartbeat.clone());
    let farm = FarmOrchestrator::new(
        client.clone(),
        quota.clone(),
        game_data.clone(),
        recommender,
        config.farm.clone(),
    );
    let friend = FriendOrchestrator::new(
        client.clone(),
        quota,
        game_data.clone(),
        config.friend.clone(),
    );
    let tasks = TaskOrchestrator::new(client.clone(), game_data.clone(), config.task.clone());
    let warehouse = WarehouseOrchestrator::new(client, game_data, config.warehouse.clone());

    let handles = vec![
        tokio::spawn(heartbeat.run(shutdown.clone())),
        tokio::spawn(farm.run(shutdown.clone())),
        tokio::spawn(friend.run(shutdown.clone())),
        tokio::spawn(tasks.run(shutdown.clone())),
        tokio::spawn(warehouse.run(shutdown.clone())),
    ];

    tokio::select! {
        () = shutdown_signal() => {}
        () = shutdown.cancelled() => {}
    }
    shutdown.cancel();

    session.close().await;
    for handle in handles {
        if let Err(err) = handle.await {
            error!(error = %err, "loop panicked");
        }
    }
    if let Err(err) = receive_loop.await {
        error!(error = %err, "receive loop panicked");
    }

    info!("shutdown complete");
    Ok(())
}

fn load_catalog(
    config: &Config,
) -> anyhow::Result<(Arc<dyn GameData>, Arc<dyn SeedRecommender>)> {
    match &config.catalog {
        Some(path) => {
            let catalog = Arc::new(
                Catalog::load(path)
                    .with_context(|| format!("loading catalog {}", path.display()))?,
            );
            info!(plants = catalog.plant_count(), "catalog loaded");
            let game_data: Arc<dyn GameData> = catalog.clone();
            let recommender: Arc<dyn SeedRecommender> = catalog;
            Ok((game_data, recommender))
        }
        None => {
            info!("no catalog configured, using id-based names");
            let game_data: Arc<dyn GameData> = Arc::new(Catalog::empty());
            let recommender: Arc<dyn SeedRecommender> = Arc::new(NoRecommendation);
            Ok((game_data, recommender))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("received Ctrl+C, shutting down");
}
