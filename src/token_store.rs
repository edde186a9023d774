use crate::error::RelayError;
use crate::token::TokenSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Single-record JSON file holding the current token set.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no file has been written yet.
    pub async fn load(&self) -> Result<Option<TokenSet>, RelayError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No token file yet");
                return Ok(None);
            }
            Err(e) => return Err(persist_err(&self.path, e)),
        };

        let tokens = serde_json::from_str(&content).map_err(|e| persist_err(&self.path, e))?;
        Ok(Some(tokens))
    }

    /// Overwrites the file with `tokens`.
    pub async fn save(&self, tokens: &TokenSet) -> Result<(), RelayError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| persist_err(&self.path, e))?;
        }
        let json = serde_json::to_string_pretty(tokens).map_err(|e| persist_err(&self.path, e))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| persist_err(&self.path, e))?;

        info!(path = %self.path.display(), "Tokens written");
        Ok(())
    }
}

fn persist_err(path: &Path, e: impl std::fmt::Display) -> RelayError {
    RelayError::Persistence(format!("{}: {e}", path.display()))
}
