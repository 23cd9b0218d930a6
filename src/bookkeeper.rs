use crate::{
    backup::BackupDispatcher,
    ledger::{GuildChannels, GuildConfig, Ledger, PointsMap, Standing},
    store::LedgerStore,
};
use anyhow::Result;
use serenity::all::GuildId;
use std::path::PathBuf;
use tokio::sync::{Mutex, RwLock};

/// Leaderboards as they stood when a week was closed
pub struct ClosedWeek {
    pub weekly: PointsMap,
    pub all_time: PointsMap,
    pub guilds: GuildConfig,
}

/// Owns the ledger for the lifetime of the process and keeps disk and backups in step with it.
///
/// Ledger updates only hold the lock for the in-memory change.  Saving works from a snapshot, so
/// slow disks or uploads never hold up message handling.
pub struct Bookkeeper {
    ledger: RwLock<Ledger>,
    store: LedgerStore,
    backup: BackupDispatcher,
    /// Keeps snapshots reaching the disk in the order they were taken
    persist_lock: Mutex<()>,
}

impl Bookkeeper {
    pub fn new(ledger: Ledger, store: LedgerStore, backup: BackupDispatcher) -> Self {
        Self {
            ledger: RwLock::new(ledger),
            store,
            backup,
            persist_lock: Mutex::new(()),
        }
    }

    /// Load the ledger from `store`.  Fails on malformed files.
    pub async fn open(store: LedgerStore, backup: BackupDispatcher) -> Result<Self> {
        let ledger = store.load().await?;
        Ok(Self::new(ledger, store, backup))
    }

    pub fn ledger(&self) -> &RwLock<Ledger> {
        &self.ledger
    }

    pub async fn record_partner(&self, user: &str) -> Standing {
        self.ledger.write().await.record_partner(user)
    }

    pub async fn standing(&self, user: &str) -> Standing {
        self.ledger.read().await.standing(user)
    }

    pub async fn guild_channels(&self, guild_id: GuildId) -> Option<GuildChannels> {
        self.ledger.read().await.guild_channels(guild_id)
    }

    /// Clear the weekly leaderboard, returning both leaderboards as they were just before.
    ///
    /// Capture and clear happen under one lock, so no point lands between the summary and the
    /// reset.  The caller persists afterwards.
    pub async fn close_week(&self) -> ClosedWeek {
        let mut ledger = self.ledger.write().await;
        let closed = ClosedWeek {
            weekly: ledger.weekly.clone(),
            all_time: ledger.all_time.clone(),
            guilds: ledger.guilds.clone(),
        };
        ledger.reset_weekly();
        closed
    }

    /// Save the current ledger and start backing up the written files.
    pub async fn persist(&self) -> Result<Vec<PathBuf>> {
        let _guard = self.persist_lock.lock().await;

        let snapshot = self.ledger.write().await.take_snapshot();
        match self.store.save(&snapshot).await {
            Ok(paths) => {
                self.backup.dispatch_all(paths.clone());
                Ok(paths)
            }
            Err(e) => {
                // Try again on the next tick
                self.ledger.write().await.mark_dirty();
                Err(e)
            }
        }
    }

    /// Like [`Bookkeeper::persist`], but skipped when nothing changed.  Returns whether it saved.
    pub async fn persist_if_dirty(&self) -> Result<bool> {
        if !self.ledger.read().await.is_dirty() {
            return Ok(false);
        }
        self.persist().await.map(|_| true)
    }
}
