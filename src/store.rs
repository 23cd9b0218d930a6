use crate::ledger::{GuildConfig, Ledger, PointsMap};
use anyhow::{anyhow, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub const WEEKLY_FILE: &str = "weekly_points.json";
pub const ALL_TIME_FILE: &str = "all_time_points.json";
pub const GUILD_CONFIG_FILE: &str = "guild_config.json";

/// Ledger files on disk
pub struct LedgerStore {
    dir: PathBuf,
    /// Serializes saves so two writers never share a temporary file
    write_lock: Mutex<()>,
}

impl LedgerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load all three resources.  A missing file is an empty map; a malformed one is an error.
    pub async fn load(&self) -> Result<Ledger> {
        let weekly: PointsMap = read_resource(&self.dir.join(WEEKLY_FILE)).await?;
        let all_time: PointsMap = read_resource(&self.dir.join(ALL_TIME_FILE)).await?;
        let guilds: GuildConfig = read_resource(&self.dir.join(GUILD_CONFIG_FILE)).await?;

        Ok(Ledger::new(weekly, all_time, guilds))
    }

    /// Write all three resources, returning the paths written.
    pub async fn save(&self, ledger: &Ledger) -> Result<Vec<PathBuf>> {
        let _guard = self.write_lock.lock().await;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            anyhow!(
                "Could not create directory `{}`: {}",
                self.dir.to_string_lossy(),
                e
            )
        })?;

        let weekly = self.dir.join(WEEKLY_FILE);
        let all_time = self.dir.join(ALL_TIME_FILE);
        let guilds = self.dir.join(GUILD_CONFIG_FILE);

        write_resource(&weekly, &ledger.weekly).await?;
        write_resource(&all_time, &ledger.all_time).await?;
        write_resource(&guilds, &ledger.guilds).await?;

        Ok(vec![weekly, all_time, guilds])
    }
}

async fn read_resource<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        // First run
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => {
            return Err(anyhow!(
                "Could not read ledger at `{}`: {}",
                path.to_string_lossy(),
                e
            ))
        }
    };

    serde_json::from_str(&contents).map_err(|e| {
        anyhow!(
            "Could not parse ledger at `{}`: {}",
            path.to_string_lossy(),
            e
        )
    })
}

async fn write_resource<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let contents = serde_json::to_string_pretty(value).map_err(|e| {
        anyhow!(
            "Could not serialize ledger for `{}`: {}",
            path.to_string_lossy(),
            e
        )
    })?;

    // Create a temporary file in the same directory.
    let tmp_path = path.with_extension("json.new");

    tokio::fs::write(&tmp_path, contents).await.map_err(|e| {
        anyhow!(
            "Could not write ledger to temporary file `{}`: {}",
            tmp_path.to_string_lossy(),
            e
        )
    })?;

    // Atomically rename the temporary file over the target file.
    tokio::fs::rename(&tmp_path, path).await.map_err(|e| {
        anyhow!(
            "Could not rename temporary file `{}` to `{}`: {}",
            tmp_path.to_string_lossy(),
            path.to_string_lossy(),
            e
        )
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{GuildChannels, Rank};
    use serenity::all::{ChannelId, GuildId};

    #[tokio::test]
    async fn fresh_store_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::new(dir.path().join("data"));

        let ledger = store.load().await.unwrap();

        assert!(ledger.weekly.is_empty());
        assert!(ledger.all_time.is_empty());
        assert!(ledger.guilds.is_empty());
        assert_eq!(ledger.weekly.rank("someone"), Rank::NotRanked);
        assert_eq!(ledger.all_time.rank("someone"), Rank::NotRanked);
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::new(dir.path());

        let mut ledger = Ledger::default();
        for user in ["10", "20", "20", "30"] {
            ledger.record_partner(user);
        }
        ledger.reset_weekly();
        ledger.record_partner("30");
        ledger.set_guild_channels(
            GuildId::new(99),
            GuildChannels {
                log_channel_id: ChannelId::new(7),
                target_channel_id: ChannelId::new(8),
            },
        );

        let written = store.save(&ledger).await.unwrap();
        assert_eq!(written.len(), 3);
        assert!(written.iter().all(|p| p.exists()));
        assert!(!dir.path().join("weekly_points.json.new").exists());

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.weekly, ledger.weekly);
        assert_eq!(loaded.all_time, ledger.all_time);
        assert_eq!(loaded.guilds, ledger.guilds);
        assert!(!loaded.is_dirty());
    }

    #[tokio::test]
    async fn empty_maps_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::new(dir.path());

        store.save(&Ledger::default()).await.unwrap();
        let loaded = store.load().await.unwrap();

        assert!(loaded.weekly.is_empty());
        assert!(loaded.all_time.is_empty());
        assert!(loaded.guilds.is_empty());
    }

    #[tokio::test]
    async fn tie_order_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::new(dir.path());

        let mut ledger = Ledger::default();
        for user in ["900", "100", "900", "100"] {
            ledger.record_partner(user);
        }
        store.save(&ledger).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.weekly.rank("900"), Rank::Ranked(1));
        assert_eq!(loaded.weekly.rank("100"), Rank::Ranked(2));
    }

    #[tokio::test]
    async fn malformed_file_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ALL_TIME_FILE), "{ not json").unwrap();
        let store = LedgerStore::new(dir.path());

        let err = store.load().await.unwrap_err();
        assert!(err.to_string().contains(ALL_TIME_FILE));
    }

    #[tokio::test]
    async fn reads_camel_case_guild_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(GUILD_CONFIG_FILE),
            r#"{ "5": { "logChannelId": "6", "targetChannelId": "7" } }"#,
        )
        .unwrap();
        let store = LedgerStore::new(dir.path());

        let ledger = store.load().await.unwrap();
        let channels = ledger.guild_channels(GuildId::new(5)).unwrap();
        assert_eq!(channels.log_channel_id, ChannelId::new(6));
        assert_eq!(channels.target_channel_id, ChannelId::new(7));
    }
}
