use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Bad or missing client input.
    #[error("{0}")]
    Validation(String),

    /// Request body went over the configured upload limit.
    #[error("{0}")]
    TooLarge(String),

    /// OAuth configuration, code exchange or refresh failure.
    #[error("authorization failed: {0}")]
    Auth(String),

    /// The video host rejected or failed the insert.
    #[error("upload failed: {0}")]
    Upload(String),

    /// Token file unreadable or unwritable. Never fatal.
    #[error("token file: {0}")]
    Persistence(String),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            RelayError::Auth(_) | RelayError::Upload(_) | RelayError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            RelayError::Validation("no file".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RelayError::TooLarge("limit".into()).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            RelayError::Auth("denied".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            RelayError::Upload("quota".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upload_message_keeps_remote_text() {
        let err = RelayError::Upload("quotaExceeded".into());
        assert_eq!(err.to_string(), "upload failed: quotaExceeded");
    }
}
