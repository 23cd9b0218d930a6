//! Best-effort backups of the ledger files.
//!
//! Each save hands the files it wrote to [`BackupDispatcher::dispatch`], which spawns one upload
//! task per file and returns immediately.  Uploads are never retried or queued, and two uploads
//! of the same file may race; the remote store keeps whichever lands last.

use crate::{log_error, log_internal};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Remote storage for backups
#[serenity::async_trait]
pub trait Uploader: Send + Sync {
    /// Upload the file at `path` under its base name, returning the remote id.
    async fn upload(&self, path: &Path) -> Result<String>;
}

#[derive(Clone)]
pub struct BackupDispatcher {
    uploader: Option<Arc<dyn Uploader>>,
}

impl BackupDispatcher {
    pub fn new(uploader: Arc<dyn Uploader>) -> Self {
        Self {
            uploader: Some(uploader),
        }
    }

    /// Dispatcher which drops every request
    pub fn disabled() -> Self {
        Self { uploader: None }
    }

    /// Start uploading `path` in the background.  The task logs its own outcome, so the handle
    /// only needs to be awaited by callers that care.
    pub fn dispatch(&self, path: PathBuf) -> Option<JoinHandle<Result<String>>> {
        let uploader = self.uploader.clone()?;

        Some(tokio::spawn(async move {
            let result = uploader.upload(&path).await;
            match &result {
                Ok(id) => log_internal!("Backed up `{}` as {}", path.to_string_lossy(), id),
                Err(e) => log_error!("Could not back up `{}`: {}", path.to_string_lossy(), e),
            }
            result
        }))
    }

    pub fn dispatch_all(&self, paths: Vec<PathBuf>) -> Vec<JoinHandle<Result<String>>> {
        paths
            .into_iter()
            .filter_map(|path| self.dispatch(path))
            .collect()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// Records uploads instead of sending them anywhere
    #[derive(Default)]
    pub struct RecordingUploader {
        pub uploaded: Mutex<Vec<PathBuf>>,
    }

    #[serenity::async_trait]
    impl Uploader for RecordingUploader {
        async fn upload(&self, path: &Path) -> Result<String> {
            let mut uploaded = self.uploaded.lock().unwrap();
            uploaded.push(path.to_path_buf());
            Ok(format!("remote-{}", uploaded.len()))
        }
    }

    struct FailingUploader;

    #[serenity::async_trait]
    impl Uploader for FailingUploader {
        async fn upload(&self, _path: &Path) -> Result<String> {
            Err(anyhow!("storage unavailable"))
        }
    }

    /// Blocks until released
    struct StuckUploader(Arc<Notify>);

    #[serenity::async_trait]
    impl Uploader for StuckUploader {
        async fn upload(&self, _path: &Path) -> Result<String> {
            self.0.notified().await;
            Ok("late".to_owned())
        }
    }

    #[tokio::test]
    async fn uploads_every_dispatched_file() {
        let uploader = Arc::new(RecordingUploader::default());
        let dispatcher = BackupDispatcher::new(uploader.clone());

        let handles = dispatcher.dispatch_all(vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
        assert_eq!(handles.len(), 2);
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let mut uploaded = uploader.uploaded.lock().unwrap().clone();
        uploaded.sort();
        assert_eq!(uploaded, [PathBuf::from("a.json"), PathBuf::from("b.json")]);
    }

    #[tokio::test]
    async fn failure_is_reported_on_the_handle() {
        let dispatcher = BackupDispatcher::new(Arc::new(FailingUploader));

        let handle = dispatcher.dispatch(PathBuf::from("a.json")).unwrap();
        let err = handle.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("storage unavailable"));
    }

    #[tokio::test]
    async fn dispatch_does_not_wait_for_upload() {
        let release = Arc::new(Notify::new());
        let dispatcher = BackupDispatcher::new(Arc::new(StuckUploader(release.clone())));

        let handle = dispatcher.dispatch(PathBuf::from("a.json")).unwrap();
        assert!(!handle.is_finished());

        release.notify_one();
        assert_eq!(handle.await.unwrap().unwrap(), "late");
    }

    #[test]
    fn disabled_dispatcher_drops_requests() {
        let dispatcher = BackupDispatcher::disabled();
        assert!(dispatcher.dispatch_all(vec![PathBuf::from("a.json")]).is_empty());
    }
}
