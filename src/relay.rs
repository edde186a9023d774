use crate::error::RelayError;
use crate::token_manager::TokenManager;
use crate::youtube::{
    PRIVACY_STATUS, VideoHost, VideoInsert, VideoMetadata, VideoSnippet, VideoStatus, WATCH_URL,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A received file on local disk. Removed exactly once: by `discard`, or on
/// drop if the request is abandoned before reaching the relay.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
    original_name: String,
    content_type: String,
    size: u64,
    removed: bool,
}

impl TempUpload {
    /// A fresh collision-free path under `dir`.
    pub fn allocate_path(dir: &Path) -> PathBuf {
        dir.join(format!("{}.upload", uuid::Uuid::new_v4()))
    }

    pub fn new(path: PathBuf, original_name: String, content_type: String, size: u64) -> Self {
        Self {
            path,
            original_name,
            content_type,
            size,
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn set_size(&mut self, size: u64) {
        self.size = size;
    }

    /// Best-effort removal. A file that is already gone is not an error.
    pub async fn discard(mut self) {
        self.removed = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "Temp file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Could not remove temp file"),
        }
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        let path = std::mem::take(&mut self.path);
        // keep the unlink off the async workers when a runtime is around
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || {
                    let _ = std::fs::remove_file(path);
                });
            }
            Err(_) => {
                let _ = std::fs::remove_file(&path);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct UploadRequest {
    pub file: Option<TempUpload>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub video_id: String,
    pub link: String,
    pub response: serde_json::Value,
}

pub fn watch_link(video_id: &str) -> String {
    format!("{WATCH_URL}{video_id}")
}

pub struct UploadRelay {
    tokens: Arc<TokenManager>,
    host: Arc<dyn VideoHost>,
}

impl UploadRelay {
    pub fn new(tokens: Arc<TokenManager>, host: Arc<dyn VideoHost>) -> Self {
        Self { tokens, host }
    }

    pub async fn relay(&self, request: UploadRequest) -> Result<UploadResult, RelayError> {
        let UploadRequest {
            file,
            title,
            description,
        } = request;
        let file = file.ok_or_else(|| {
            RelayError::Validation("no file uploaded (field 'video')".into())
        })?;

        // Lenient pre-flight: a failed refresh only logs, the host call decides.
        let access_token = match self.tokens.get_valid_access_token().await {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(error = %e, "Could not obtain an access token, attempting upload anyway");
                self.tokens.cached_access_token().await
            }
        };

        let insert = VideoInsert {
            path: file.path().to_path_buf(),
            size: file.size,
            content_type: file.content_type.clone(),
            metadata: VideoMetadata {
                snippet: VideoSnippet {
                    title: non_empty(title).unwrap_or_else(|| file.original_name().to_string()),
                    description: non_empty(description).unwrap_or_default(),
                },
                status: VideoStatus {
                    privacy_status: PRIVACY_STATUS.to_string(),
                },
            },
        };
        info!(
            file = %file.original_name(),
            size = file.size,
            title = %insert.metadata.snippet.title,
            "Relaying upload"
        );

        let outcome = self.host.insert(access_token.as_deref(), insert).await;
        file.discard().await;

        let inserted = outcome?;
        Ok(UploadResult {
            link: watch_link(&inserted.id),
            video_id: inserted.id,
            response: inserted.resource,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
