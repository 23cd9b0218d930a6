mod backup;
mod bookkeeper;
mod command;
mod config;
mod context;
mod drive;
mod event;
mod handler;
mod helper;
mod invite;
mod ledger;
mod logging;
mod plugin;
mod scheduler;
mod store;

use crate::{
    backup::BackupDispatcher, bookkeeper::Bookkeeper, drive::DriveUploader,
    invite::InviteFinder, scheduler::WeeklyAt, store::LedgerStore,
};
use serenity::{all::GatewayIntents, Client};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = crate::config::Config::load().await?;
    let token = cfg.general.discord_token.clone();
    let invites = InviteFinder::new(&cfg.general.invite_pattern)?;
    let weekly_reset: WeeklyAt = cfg.ledger.weekly_reset.parse()?;
    let save_interval = cfg.ledger.save_interval()?;

    let backup = match &cfg.drive {
        // Run the first-time consent flow now rather than in the middle of an upload.
        Some(drive) => drive::backup_dispatcher(DriveUploader::new(drive.clone()).await?).await?,
        None => {
            log_internal!("No [drive] configuration, backups are disabled");
            BackupDispatcher::disabled()
        }
    };

    let store = LedgerStore::new(cfg.ledger.data_dir()?);
    log_internal!("Loading ledger from `{}`", store.dir().to_string_lossy());
    let keeper = Arc::new(Bookkeeper::open(store, backup).await?);

    let fallback = cfg.channels;
    let announce_new_week = cfg.ledger.announce_new_week;
    let handler = handler::Handler::new(cfg, keeper.clone(), invites);

    // Things we want discord to tell us about.
    let intents =
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&token, intents)
        .event_handler(handler)
        .await?;

    scheduler::start(
        keeper.clone(),
        client.http.clone(),
        save_interval,
        weekly_reset,
        fallback,
        announce_new_week,
    );

    let shard_manager = client.shard_manager.clone();
    let result: anyhow::Result<()> = tokio::select! {
        result = client.start() => result.map_err(Into::into),
        signal = tokio::signal::ctrl_c() => {
            log_internal!("Interrupted, shutting down");
            shard_manager.shutdown_all().await;
            signal.map_err(Into::into)
        }
    };

    // Catches changes whose immediate save failed.
    if let Err(e) = keeper.persist_if_dirty().await {
        log_error!("Could not save ledger on shutdown: {}", e);
    }

    result
}
