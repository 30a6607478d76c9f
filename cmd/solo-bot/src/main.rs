mod config;

use chrono::Utc;
use clap::Parser;
use pkg_api::health::{health_router, serve_health};
use pkg_api::shutdown::shutdown_signal;
use pkg_api::telemetry::{self, LogFormat};
use pkg_bot::activity::ActivityLog;
use pkg_bot::conversation::{Conversation, ConversationConfig};
use pkg_bot::dispatcher::{DispatchExit, Dispatcher};
use pkg_bot::transport::{ChatTransport, TelegramTransport};
use pkg_constants::bot::ACTIVITY_RETENTION_DAYS;
use pkg_constants::env;
use pkg_constants::network::{
    LEASE_STORE_REQUEST_TIMEOUT_SECS, TELEGRAM_API_BASE, UPDATE_POLL_TIMEOUT_SECS,
    UPDATE_RETRY_DELAY_SECS,
};
use pkg_leader::{
    InstanceIdentity, LeaderConfig, LeaderLifecycle, LeadershipStatus, StartOutcome, SystemClock,
};
use pkg_state::LeaseStore;
use pkg_state::client::StateStore;
use pkg_state::memory::MemoryLeaseStore;
use pkg_state::remote::RemoteLeaseStore;
use pkg_types::config::{BotConfigFile, load_config_file};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::{BotSettings, Cli};

/// How a leader run ended.
enum LeaderExit {
    Graceful,
    Lost,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let format: LogFormat = cli.log_format.parse()?;
    telemetry::init(format)?;

    // Load config file (returns defaults if file not found)
    let file_cfg: BotConfigFile = load_config_file(&cli.config)?;
    info!("Config file: {}", cli.config);
    let settings = BotSettings::merge(cli, file_cfg);

    let Some(bot_token) = settings.bot_token.clone() else {
        error!("{} is not set; refusing to start", env::BOT_TOKEN);
        return Ok(ExitCode::FAILURE);
    };
    if settings.owner_chat_id.is_none() {
        warn!(
            "{} is not set; contact requests will not be forwarded and /stats is disabled",
            env::OWNER_CHAT_ID
        );
    }

    let identity = InstanceIdentity::resolve(settings.instance_id.clone());
    info!("Starting solo-bot");
    info!("  Service:   {}", settings.service_id);
    info!("  Instance:  {} on {}", identity.instance_id, identity.host);
    info!("  Lease:     {}s ({:?})", settings.lease_duration.as_secs(), settings.wait);
    info!("  Data dir:  {}", settings.data_dir);

    let store = lease_store(&settings)?;
    let leader_config = LeaderConfig::new(
        settings.service_id.clone(),
        identity.clone(),
        settings.lease_duration,
    )
    .with_wait(settings.wait);
    let mut lifecycle = LeaderLifecycle::new(store, Arc::new(SystemClock), leader_config);

    // Up before acquisition so platform health checks pass while waiting.
    let (health_tx, health_rx) = watch::channel(false);
    let router = health_router(
        lifecycle.status(),
        settings.service_id.clone(),
        identity.instance_id.clone(),
    );
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let health = tokio::spawn(async move {
        if let Err(e) = serve_health(addr, router, health_rx).await {
            error!("Health server failed: {:#}", e);
        }
    });

    let code = run(&mut lifecycle, &settings, bot_token).await;
    lifecycle.shutdown().await;

    health_tx.send_replace(true);
    let _ = health.await;
    info!("solo-bot stopped ({})", lifecycle.status().state());
    Ok(code)
}

fn lease_store(settings: &BotSettings) -> anyhow::Result<Arc<dyn LeaseStore>> {
    match &settings.lease_store_url {
        Some(url) => {
            info!("  Leases:    {}", url);
            let store = RemoteLeaseStore::new(
                url,
                settings.lease_store_token.clone(),
                Duration::from_secs(LEASE_STORE_REQUEST_TIMEOUT_SECS),
            )?;
            Ok(Arc::new(store))
        }
        None => {
            warn!(
                "{} is not set; using an in-process lease store that excludes no other instance",
                env::LEASE_STORE_URL
            );
            Ok(Arc::new(MemoryLeaseStore::new()))
        }
    }
}

/// Acquire leadership and, if granted, serve until a signal or loss.
async fn run(lifecycle: &mut LeaderLifecycle, settings: &BotSettings, bot_token: String) -> ExitCode {
    let outcome = tokio::select! {
        outcome = lifecycle.start() => outcome,
        _ = shutdown_signal() => {
            info!("Interrupted while acquiring leadership");
            return ExitCode::SUCCESS;
        }
    };

    match outcome {
        StartOutcome::NotLeader { holder } => {
            info!(
                service_id = %settings.service_id,
                holder = holder.as_deref().unwrap_or("unknown"),
                "Another instance is the leader; exiting"
            );
            ExitCode::SUCCESS
        }
        StartOutcome::Failed(e) => {
            error!(service_id = %settings.service_id, "Could not become the leader: {}", e);
            ExitCode::FAILURE
        }
        StartOutcome::Leader(handle) => {
            info!(
                service_id = %handle.service_id,
                owner = %handle.owner,
                expires_at = %handle.expires_at,
                "This instance is the leader"
            );
            match serve_as_leader(lifecycle.status(), settings, bot_token).await {
                Ok(LeaderExit::Graceful) => ExitCode::SUCCESS,
                Ok(LeaderExit::Lost) => {
                    error!("Leadership lost; stopping so the new leader runs alone");
                    ExitCode::FAILURE
                }
                Err(e) => {
                    error!("Bot failed: {:#}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

async fn serve_as_leader(
    status: LeadershipStatus,
    settings: &BotSettings,
    bot_token: String,
) -> anyhow::Result<LeaderExit> {
    let poll_timeout = Duration::from_secs(UPDATE_POLL_TIMEOUT_SECS);
    let transport: Arc<dyn ChatTransport> =
        Arc::new(TelegramTransport::new(TELEGRAM_API_BASE, bot_token, poll_timeout)?);

    // Single writer: opened only once this process holds the lease.
    let state_store = StateStore::new(&settings.data_dir).await?;
    let activity = ActivityLog::new(state_store.clone(), settings.service_id.clone());
    if let Err(e) = activity.cleanup(ACTIVITY_RETENTION_DAYS, Utc::now()).await {
        warn!("Activity cleanup failed: {:#}", e);
    }

    let conversation = Conversation::new(
        Arc::clone(&transport),
        activity,
        ConversationConfig {
            owner_chat_id: settings.owner_chat_id,
            whatsapp_number: settings.whatsapp_number.clone(),
        },
    );
    let dispatcher = Dispatcher::new(
        transport,
        conversation,
        status,
        poll_timeout,
        Duration::from_secs(UPDATE_RETRY_DELAY_SECS),
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut task = tokio::spawn(dispatcher.run(stop_rx));

    let exit = tokio::select! {
        joined = &mut task => match joined {
            Ok(DispatchExit::SteppedDown) => Ok(LeaderExit::Lost),
            Ok(DispatchExit::Shutdown) => Ok(LeaderExit::Graceful),
            Err(e) => Err(anyhow::anyhow!("dispatcher task failed: {}", e)),
        },
        _ = shutdown_signal() => {
            stop_tx.send_replace(true);
            match task.await {
                Ok(_) => Ok(LeaderExit::Graceful),
                Err(e) => Err(anyhow::anyhow!("dispatcher task failed: {}", e)),
            }
        }
    };

    state_store.close().await?;
    exit
}
