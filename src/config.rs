use crate::ledger::GuildChannels;
use anyhow::{anyhow, Result};
use std::{path::PathBuf, time::Duration};
use tokio::io::AsyncReadExt;

const CONFIG_PATH_REL_HOME: &str = ".config/partnerbot/config.toml";
const DATA_DIR_REL_HOME: &str = ".config/partnerbot/data";

/// Matches nearly any word-like token.  Tighten it in the config file to count only real invites.
///
/// Word boundaries are ASCII-only, so accented letters separate words instead of joining them.
pub const DEFAULT_INVITE_PATTERN: &str = r"(?i)(?-u:\b)(?:https?://)?(?:www\.)?(?:discord(?:\.com|app\.com|\.gg)/invite/)?[a-zA-Z0-9-]{2,32}(?-u:\b)";

/// Bot configuration
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub general: General,
    #[serde(default)]
    pub ledger: LedgerSettings,
    /// Channels for guilds which have not run the set-channels command
    pub channels: Option<GuildChannels>,
    /// Backups are disabled without this section
    pub drive: Option<Drive>,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct General {
    pub discord_token: String,
    pub command_prefix: String,
    #[serde(default = "default_invite_pattern")]
    pub invite_pattern: String,
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// Where the ledger files live.  Defaults to `~/.config/partnerbot/data`.
    pub data_dir: Option<PathBuf>,
    pub save_interval_seconds: u64,
    /// `"<minute> <hour> * * <day-of-week>"`, local time
    pub weekly_reset: String,
    /// Post a "new week" notice in each partner channel after the reset
    pub announce_new_week: bool,
}

/// Google Drive OAuth client and upload target
#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct Drive {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub token_cache_path: PathBuf,
    /// Upload into this folder rather than the Drive root
    pub folder_id: Option<String>,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            save_interval_seconds: 60,
            weekly_reset: "0 0 * * 0".to_owned(),
            announce_new_week: true,
        }
    }
}

fn default_invite_pattern() -> String {
    DEFAULT_INVITE_PATTERN.to_owned()
}

impl Config {
    fn config_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|p| p.join(CONFIG_PATH_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    pub async fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let mut file = tokio::fs::File::open(&path).await.map_err(|e| {
            anyhow!(
                "Could not open configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).await.map_err(|e| {
            anyhow!(
                "Could not read configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        Self::parse(&contents).map_err(|e| {
            anyhow!(
                "Could not parse configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })
    }

    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(Into::into)
    }
}

impl LedgerSettings {
    pub fn save_interval(&self) -> Result<Duration> {
        match self.save_interval_seconds {
            0 => Err(anyhow!("ledger.save_interval_seconds must be at least 1")),
            secs => Ok(Duration::from_secs(secs)),
        }
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::home_dir()
                .map(|p| p.join(DATA_DIR_REL_HOME))
                .ok_or(anyhow!("Could not find home directory")),
        }
    }
}
