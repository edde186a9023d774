use crate::error::RelayError;
use crate::relay::{TempUpload, UploadRelay, UploadRequest};
use crate::token_manager::TokenManager;
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Query, State,
        multipart::{Field, MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenManager>,
    pub relay: Arc<UploadRelay>,
    pub upload_dir: PathBuf,
    pub scopes: Vec<String>,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/auth", get(auth))
        .route("/oauth2callback", get(oauth2_callback))
        .route("/upload", post(upload))
        .route("/token-status", get(token_status))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn banner(State(state): State<AppState>) -> &'static str {
    if state.tokens.has_refresh_token().await {
        "Backend OK. POST /upload to send a video."
    } else {
        "Backend OK. Use GET /auth to authorize, POST /upload to send a video."
    }
}

async fn auth(State(state): State<AppState>) -> Html<String> {
    let url = html_escape(&state.tokens.oauth().consent_url(&state.scopes));
    Html(format!(
        "<p>Open this link in a browser to authorize the YouTube account:</p>\n\
         <a href=\"{url}\" target=\"_blank\">{url}</a>\n\
         <p>After authorizing you will be redirected to /oauth2callback, which stores the tokens.</p>"
    ))
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

async fn oauth2_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(err) = params.error {
        warn!(error = %err, "Provider denied authorization");
        return (StatusCode::BAD_REQUEST, format!("Authorization denied: {err}")).into_response();
    }
    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing 'code' in query string.").into_response();
    };

    let tokens = match state.tokens.oauth().exchange_code(&code).await {
        Ok(tokens) => tokens,
        Err(e) => {
            error!(error = %e, "Code exchange failed");
            return (e.status(), format!("Error obtaining tokens: {e}")).into_response();
        }
    };

    let path = state.tokens.store().path().display().to_string();
    match state.tokens.set_tokens(tokens).await {
        Ok(()) => format!("Authorization complete. Tokens saved to {path}. You may close this window.")
            .into_response(),
        Err(e) => format!(
            "Authorization complete. Tokens are active but could not be saved to {path} ({e})."
        )
        .into_response(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    success: bool,
    video_id: String,
    youtube_link: String,
    response: serde_json::Value,
}

async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, RelayError> {
    let multipart = multipart
        .map_err(|e| RelayError::Validation(format!("expected multipart/form-data: {e}")))?;
    let request = read_upload(&state, multipart).await?;
    let result = state.relay.relay(request).await?;
    Ok(Json(UploadResponse {
        success: true,
        video_id: result.video_id,
        youtube_link: result.link,
        response: result.response,
    }))
}

/// Spools the `video` field to a uniquely named temp file and collects the text fields.
async fn read_upload(state: &AppState, mut multipart: Multipart) -> Result<UploadRequest, RelayError> {
    let mut request = UploadRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("video") if request.file.is_none() && field.file_name().is_some() => {
                request.file = Some(spool(state, field).await?);
            }
            Some("title") => request.title = Some(field.text().await.map_err(bad_multipart)?),
            Some("description") => {
                request.description = Some(field.text().await.map_err(bad_multipart)?)
            }
            _ => {
                // drain unknown fields and text-only `video` parts
                field.bytes().await.map_err(bad_multipart)?;
            }
        }
    }
    Ok(request)
}

async fn spool(state: &AppState, mut field: Field<'_>) -> Result<TempUpload, RelayError> {
    let original_name = field.file_name().unwrap_or("video").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    tokio::fs::create_dir_all(&state.upload_dir)
        .await
        .map_err(|e| RelayError::Upload(format!("creating upload dir: {e}")))?;
    let path = TempUpload::allocate_path(&state.upload_dir);
    let mut out = tokio::fs::File::create(&path)
        .await
        .map_err(|e| RelayError::Upload(format!("creating temp file: {e}")))?;
    // from here the guard owns the file, so every early return cleans up
    let mut upload = TempUpload::new(path, original_name, content_type, 0);

    let mut size = 0u64;
    while let Some(chunk) = field.chunk().await.map_err(bad_multipart)? {
        out.write_all(&chunk)
            .await
            .map_err(|e| RelayError::Upload(format!("writing temp file: {e}")))?;
        size += chunk.len() as u64;
    }
    out.flush()
        .await
        .map_err(|e| RelayError::Upload(format!("writing temp file: {e}")))?;

    upload.set_size(size);
    info!(file = %upload.original_name(), size, "Upload received");
    Ok(upload)
}

fn bad_multipart(e: MultipartError) -> RelayError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        RelayError::TooLarge(format!("upload exceeds the size limit: {e}"))
    } else {
        RelayError::Validation(format!("malformed multipart body: {e}"))
    }
}

#[derive(Debug, Serialize)]
struct TokenStatus {
    success: bool,
    access_token: String,
}

async fn token_status(State(state): State<AppState>) -> Result<Json<TokenStatus>, RelayError> {
    let access_token = state.tokens.get_valid_access_token().await?;
    Ok(Json(TokenStatus {
        success: true,
        access_token,
    }))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
