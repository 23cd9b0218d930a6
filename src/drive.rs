//! Google Drive backups.
//!
//! Credentials are an OAuth2 refresh token kept in a small JSON cache file.  The first run has no
//! refresh token, so the operator is shown a consent URL and asked to paste the code back on
//! stdin.  Every later run refreshes silently.

use crate::{
    backup::{BackupDispatcher, Uploader},
    config::Drive,
    log_error, log_internal,
};
use anyhow::{anyhow, Result};
use reqwest::Url;
use std::{path::Path, sync::Arc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";
const MULTIPART_BOUNDARY: &str = "partnerbot-backup-boundary";
/// Refresh this many seconds before the access token actually expires
const EXPIRY_MARGIN_SECONDS: i64 = 60;

#[derive(Default, serde::Serialize, serde::Deserialize)]
struct TokenCache {
    refresh_token: Option<String>,
    access_token: Option<String>,
    /// Unix timestamp
    expires_at: Option<i64>,
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

#[derive(serde::Deserialize)]
struct UploadResponse {
    id: String,
}

#[derive(serde::Serialize)]
struct FileMetadata<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parents: Option<[&'a str; 1]>,
}

pub struct DriveUploader {
    settings: Drive,
    client: reqwest::Client,
    token_url: String,
    token: Mutex<TokenCache>,
}

impl DriveUploader {
    pub async fn new(settings: Drive) -> Result<Self> {
        let token = match tokio::fs::read_to_string(&settings.token_cache_path).await {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                anyhow!(
                    "Could not parse token cache at `{}`: {}",
                    settings.token_cache_path.to_string_lossy(),
                    e
                )
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => TokenCache::default(),
            Err(e) => {
                return Err(anyhow!(
                    "Could not read token cache at `{}`: {}",
                    settings.token_cache_path.to_string_lossy(),
                    e
                ))
            }
        };

        Ok(Self {
            settings,
            client: reqwest::Client::new(),
            token_url: TOKEN_URL.to_owned(),
            token: Mutex::new(token),
        })
    }

    /// Whether a refresh token is cached, i.e. the operator has consented before.
    pub async fn has_consent(&self) -> bool {
        self.token.lock().await.refresh_token.is_some()
    }

    /// A usable access token, refreshing or running the first-time consent flow as needed.
    pub async fn authorize(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        let now = chrono::Utc::now().timestamp();

        if let (Some(access_token), Some(expires_at)) = (&token.access_token, token.expires_at) {
            if now + EXPIRY_MARGIN_SECONDS < expires_at {
                return Ok(access_token.clone());
            }
        }

        let response = match token.refresh_token.clone() {
            Some(refresh_token) => {
                self.request_token(&[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token.as_str()),
                ])
                .await?
            }
            None => {
                let code = self.prompt_for_code().await?;
                self.request_token(&[
                    ("grant_type", "authorization_code"),
                    ("code", code.as_str()),
                    ("redirect_uri", self.settings.redirect_uri.as_str()),
                ])
                .await?
            }
        };

        if let Some(refresh_token) = response.refresh_token {
            token.refresh_token = Some(refresh_token);
        }
        token.expires_at = response.expires_in.map(|secs| now + secs);
        token.access_token = Some(response.access_token.clone());
        self.save_cache(&token).await?;

        Ok(response.access_token)
    }

    fn consent_url(&self) -> Result<Url> {
        Url::parse_with_params(
            AUTH_URL,
            &[
                ("client_id", self.settings.client_id.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", DRIVE_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| anyhow!("Could not build consent URL: {}", e))
    }

    async fn prompt_for_code(&self) -> Result<String> {
        log_internal!(
            "Google Drive is not authorized yet.  Open this URL and paste the code below:\n{}",
            self.consent_url()?
        );

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let code = lines
            .next_line()
            .await?
            .ok_or(anyhow!("No authorization code given"))?;
        let code = code.trim();
        if code.is_empty() {
            return Err(anyhow!("No authorization code given"));
        }

        Ok(code.to_owned())
    }

    async fn request_token(&self, grant: &[(&str, &str)]) -> Result<TokenResponse> {
        let mut form = vec![
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
        ];
        form.extend_from_slice(grant);

        self.client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| anyhow!("Token request failed: {}", e))?
            .json::<TokenResponse>()
            .await
            .map_err(|e| anyhow!("Could not parse token response: {}", e))
    }

    async fn save_cache(&self, token: &TokenCache) -> Result<()> {
        let path = &self.settings.token_cache_path;
        let contents = serde_json::to_string_pretty(token)
            .map_err(|e| anyhow!("Could not serialize token cache: {}", e))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(path, contents).await.map_err(|e| {
            anyhow!(
                "Could not write token cache `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })
    }
}

#[serenity::async_trait]
impl Uploader for DriveUploader {
    async fn upload(&self, path: &Path) -> Result<String> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or(anyhow!("`{}` has no file name", path.to_string_lossy()))?;
        let contents = tokio::fs::read(path).await?;
        let metadata = serde_json::to_string(&FileMetadata {
            name,
            parents: self.settings.folder_id.as_deref().map(|id| [id]),
        })?;

        let access_token = self.authorize().await?;
        let response = self
            .client
            .post(UPLOAD_URL)
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .bearer_auth(access_token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(multipart_related(MULTIPART_BOUNDARY, &metadata, &contents))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| anyhow!("Upload of `{}` failed: {}", name, e))?
            .json::<UploadResponse>()
            .await?;

        Ok(response.id)
    }
}

/// Backups through `uploader`, authorizing up front.
///
/// Only a failed first-time consent is an error.  When an earlier consent exists, a failed refresh
/// is logged and backups stay enabled, since every upload authorizes again.
pub async fn backup_dispatcher(uploader: DriveUploader) -> Result<BackupDispatcher> {
    if !uploader.has_consent().await {
        uploader.authorize().await?;
    } else if let Err(e) = uploader.authorize().await {
        log_error!("Could not refresh Google Drive token, retrying on upload: {}", e);
    }

    Ok(BackupDispatcher::new(Arc::new(uploader)))
}

/// Body for Drive's multipart upload: JSON metadata followed by the file itself.
fn multipart_related(boundary: &str, metadata: &str, contents: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata.len() + contents.len() + 256);
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{}\r\n",
            boundary, metadata
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!("--{}\r\nContent-Type: application/json\r\n\r\n", boundary).as_bytes(),
    );
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}
