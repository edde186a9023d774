// src/youtube.rs

use crate::config::YouTubeConfig;
use crate::error::RelayError;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Body, Client, header};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

pub const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Uploads are always created private.
pub const PRIVACY_STATUS: &str = "private";

#[derive(Debug, Clone, Serialize)]
pub struct VideoSnippet {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoStatus {
    #[serde(rename = "privacyStatus")]
    pub privacy_status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoMetadata {
    pub snippet: VideoSnippet,
    pub status: VideoStatus,
}

/// A local file plus the metadata to publish it with.
#[derive(Debug, Clone)]
pub struct VideoInsert {
    pub path: PathBuf,
    pub size: u64,
    pub content_type: String,
    pub metadata: VideoMetadata,
}

#[derive(Debug, Clone)]
pub struct InsertedVideo {
    pub id: String,
    /// Video resource as returned by the host.
    pub resource: serde_json::Value,
}

/// Remote "insert video" endpoint.
#[async_trait]
pub trait VideoHost: Send + Sync {
    async fn insert(
        &self,
        access_token: Option<&str>,
        video: VideoInsert,
    ) -> Result<InsertedVideo, RelayError>;
}

/// Bytes-sent bookkeeping that reports each new 10% step once.
#[derive(Debug)]
pub struct UploadProgress {
    sent: u64,
    total: u64,
    last_step: u8,
}

impl UploadProgress {
    pub fn new(total: u64) -> Self {
        Self {
            sent: 0,
            total,
            last_step: 0,
        }
    }

    /// Returns the percentage to report when `chunk` crosses into a new step.
    pub fn advance(&mut self, chunk: u64) -> Option<u8> {
        if self.total == 0 {
            return None;
        }
        self.sent = (self.sent + chunk).min(self.total);
        let percent = (self.sent * 100 / self.total) as u8;
        let step = percent / 10;
        if step > self.last_step {
            self.last_step = step;
            Some(percent)
        } else {
            None
        }
    }
}

/// YouTube Data API v3 client using the resumable upload protocol.
pub struct YouTubeClient {
    http: Client,
    upload_url: String,
}

impl YouTubeClient {
    pub fn new(cfg: &YouTubeConfig) -> Result<Self, RelayError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| RelayError::Upload(format!("building http client: {e}")))?;
        Ok(Self {
            http,
            upload_url: cfg.upload_url.clone(),
        })
    }

    async fn start_session(
        &self,
        access_token: Option<&str>,
        video: &VideoInsert,
    ) -> Result<String, RelayError> {
        let url = format!("{}?uploadType=resumable&part=snippet,status", self.upload_url);
        let mut req = self
            .http
            .post(&url)
            .header("X-Upload-Content-Length", video.size.to_string())
            .header("X-Upload-Content-Type", video.content_type.as_str())
            .json(&video.metadata);
        if let Some(token) = access_token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(upload_err)?;
        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            return Err(RelayError::Upload(format!("{status}: {error_text}")));
        }

        resp.headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .ok_or_else(|| RelayError::Upload("no upload session location returned".into()))
    }
}

#[async_trait]
impl VideoHost for YouTubeClient {
    async fn insert(
        &self,
        access_token: Option<&str>,
        video: VideoInsert,
    ) -> Result<InsertedVideo, RelayError> {
        let session_url = self.start_session(access_token, &video).await?;
        debug!(session = %session_url, "Upload session opened");

        let file = tokio::fs::File::open(&video.path)
            .await
            .map_err(|e| RelayError::Upload(format!("reading {}: {e}", video.path.display())))?;

        let mut progress = UploadProgress::new(video.size);
        let stream = ReaderStream::new(file).inspect(move |chunk| {
            if let Ok(bytes) = chunk {
                if let Some(percent) = progress.advance(bytes.len() as u64) {
                    info!(percent, "Uploading");
                }
            }
        });

        let mut req = self
            .http
            .put(&session_url)
            .header(header::CONTENT_TYPE, video.content_type.as_str())
            .header(header::CONTENT_LENGTH, video.size.to_string())
            .body(Body::wrap_stream(stream));
        if let Some(token) = access_token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(upload_err)?;
        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            return Err(RelayError::Upload(format!("{status}: {error_text}")));
        }

        let resource: serde_json::Value = resp.json().await.map_err(upload_err)?;
        let id = resource
            .get("id")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| RelayError::Upload("response carried no video id".into()))?;

        info!(video_id = %id, "Video inserted");
        Ok(InsertedVideo { id, resource })
    }
}

fn upload_err(e: reqwest::Error) -> RelayError {
    RelayError::Upload(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header as header_eq, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn metadata(title: &str) -> VideoMetadata {
        VideoMetadata {
            snippet: VideoSnippet {
                title: title.into(),
                description: String::new(),
            },
            status: VideoStatus {
                privacy_status: PRIVACY_STATUS.into(),
            },
        }
    }

    #[test]
    fn test_progress_steps() {
        let mut p = UploadProgress::new(1000);
        assert_eq!(p.advance(50), None);
        assert_eq!(p.advance(60), Some(11));
        assert_eq!(p.advance(10), None);
        assert_eq!(p.advance(500), Some(62));
        assert_eq!(p.advance(10_000), Some(100));
        assert_eq!(p.advance(1), None);

        assert_eq!(UploadProgress::new(0).advance(10), None);
    }

    #[tokio::test]
    async fn test_resumable_insert() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clip.upload");
        std::fs::write(&file, vec![7u8; 4096]).unwrap();

        Mock::given(method("POST"))
            .and(path("/upload/youtube/v3/videos"))
            .and(query_param("uploadType", "resumable"))
            .and(query_param("part", "snippet,status"))
            .and(header_eq("authorization", "Bearer ya29.ok"))
            .and(header_eq("x-upload-content-length", "4096"))
            .and(body_partial_json(serde_json::json!({
                "snippet": { "title": "clip.mp4", "description": "" },
                "status": { "privacyStatus": "private" }
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Location", format!("{}/session/xyz", server.uri()).as_str()),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/session/xyz"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "kind": "youtube#video",
                "id": "vid42"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = YouTubeClient::new(&YouTubeConfig {
            upload_url: format!("{}/upload/youtube/v3/videos", server.uri()),
            timeout_secs: 5,
        })
        .unwrap();
        let inserted = client
            .insert(
                Some("ya29.ok"),
                VideoInsert {
                    path: file,
                    size: 4096,
                    content_type: "video/mp4".into(),
                    metadata: metadata("clip.mp4"),
                },
            )
            .await
            .unwrap();

        assert_eq!(inserted.id, "vid42");
        assert_eq!(inserted.resource["kind"], "youtube#video");
    }

    #[tokio::test]
    async fn test_rejected_session_carries_remote_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Credentials"))
            .mount(&server)
            .await;

        let client = YouTubeClient::new(&YouTubeConfig {
            upload_url: format!("{}/upload/youtube/v3/videos", server.uri()),
            timeout_secs: 5,
        })
        .unwrap();
        let err = client
            .insert(
                None,
                VideoInsert {
                    path: PathBuf::from("unused"),
                    size: 1,
                    content_type: "video/mp4".into(),
                    metadata: metadata("x"),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Upload(ref msg) if msg.contains("Invalid Credentials")));
    }

    #[tokio::test]
    async fn test_slow_upload_endpoint_is_upload_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/youtube/v3/videos"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let client = YouTubeClient::new(&YouTubeConfig {
            upload_url: format!("{}/upload/youtube/v3/videos", server.uri()),
            timeout_secs: 1,
        })
        .unwrap();
        let err = client
            .insert(
                Some("ya29.ok"),
                VideoInsert {
                    path: PathBuf::from("unused"),
                    size: 1,
                    content_type: "video/mp4".into(),
                    metadata: metadata("slow"),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Upload(_)));
    }
}
