//! Foulbot binary: Discord gateway, command router and poll timers.
//!
//! Configuration comes from `FOULBOT_CONFIG` (or the default config path) and
//! the bot token from `FOULBOT_DISCORD_TOKEN`. Runs until SIGINT/SIGTERM.

use foulbot::commands::CommandRouter;
use foulbot::platform::{DiscordGateway, DiscordRest};
use foulbot::{BotConfig, BotError, FatalReporter, PointsService, ServiceSettings};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BotConfig::load()?;
    let _log_guard = foulbot::logging::init(&config.storage.logs_dir());

    config.validate()?;
    if config.discord.bot_token.trim().is_empty() {
        return Err(BotError::Config(format!(
            "no bot token; set {} or discord.bot_token",
            foulbot::config::TOKEN_ENV
        ))
        .into());
    }

    info!("foulbot v{} starting", env!("CARGO_PKG_VERSION"));

    let rest = Arc::new(DiscordRest::new(
        config.discord.bot_token.clone(),
        config.discord.api_base.clone(),
    ));
    // Recovery tallies expired polls, so Discord must answer before it runs.
    let bot_user_id = rest.current_user_id().await?;

    let (fatal, mut fatal_rx) = FatalReporter::channel();
    let settings = ServiceSettings::from_config(&config, Some(bot_user_id.clone()))?;
    let service = Arc::new(PointsService::open(settings, rest.clone(), fatal.clone())?);

    // Expired polls are resolved before any command is read.
    let report = service.start().await?;
    info!(
        concluded = report.concluded.len(),
        armed = report.armed.len(),
        "recovered persisted polls"
    );

    let shutdown = CancellationToken::new();
    let (inbound_tx, inbound_rx) = mpsc::channel(64);

    let gateway = DiscordGateway::new(
        rest.as_ref().clone(),
        bot_user_id,
        config.discord.allowed_channel_ids.clone(),
    );
    let gateway_shutdown = shutdown.clone();
    let mut gateway_task = tokio::spawn(async move {
        gateway.run(inbound_tx, gateway_shutdown).await
    });

    let router = CommandRouter::new(
        service.clone(),
        rest,
        config.commands.prefix.clone(),
        fatal,
    );
    let router_shutdown = shutdown.clone();
    let mut router_task =
        tokio::spawn(async move { router.run(inbound_rx, router_shutdown).await });

    // Either task ending before shutdown leaves the bot deaf to commands.
    let result = tokio::select! {
        () = wait_for_signal() => {
            info!("shutdown requested");
            Ok(())
        }
        fatal = fatal_rx.recv() => match fatal {
            Some(err) => Err(anyhow::Error::new(err).context("fatal error, stopping")),
            None => Ok(()),
        },
        joined = &mut gateway_task => Err(match joined {
            Ok(Ok(())) => anyhow::anyhow!("discord gateway stopped unexpectedly"),
            Ok(Err(e)) => e.context("discord gateway stopped"),
            Err(e) => anyhow::anyhow!("discord gateway task failed: {e}"),
        }),
        joined = &mut router_task => Err(match joined {
            Ok(()) => anyhow::anyhow!("command router stopped unexpectedly"),
            Err(e) => anyhow::anyhow!("command router task failed: {e}"),
        }),
    };
    if let Err(e) = &result {
        error!("{e:#}");
    }

    shutdown.cancel();
    service.shutdown().await;
    if !gateway_task.is_finished() {
        if let Ok(Err(e)) = gateway_task.await {
            warn!("discord gateway stopped with error: {e}");
        }
    }
    if !router_task.is_finished() {
        if let Err(e) = router_task.await {
            warn!("router task failed: {e}");
        }
    }

    if result.is_ok() {
        info!("foulbot shut down cleanly");
    }
    result
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("cannot listen for SIGTERM: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
