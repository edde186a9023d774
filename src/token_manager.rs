use crate::error::RelayError;
use crate::oauth::OAuthClient;
use crate::token::{TokenSet, now_millis};
use crate::token_store::TokenStore;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Owns the live token set. Replacements are last-write-wins.
pub struct TokenManager {
    oauth: OAuthClient,
    store: TokenStore,
    current: RwLock<Option<TokenSet>>,
}

impl TokenManager {
    pub fn new(oauth: OAuthClient, store: TokenStore, env_refresh_token: Option<String>) -> Self {
        let seed = env_refresh_token.map(|rt| {
            info!("Using refresh token from environment");
            TokenSet::from_refresh_token(rt)
        });
        Self {
            oauth,
            store,
            current: RwLock::new(seed),
        }
    }

    pub fn oauth(&self) -> &OAuthClient {
        &self.oauth
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Adopts the token file if it exists. Read or parse failures are logged
    /// and the manager keeps whatever it was seeded with. A file without a
    /// refresh token keeps the seeded one.
    pub async fn load_persisted(&self) {
        match self.store.load().await {
            Ok(Some(tokens)) => {
                info!(path = %self.store.path().display(), "Loaded tokens from file");
                let mut current = self.current.write().await;
                let next = match current.as_ref() {
                    Some(seed) => seed.refreshed(tokens),
                    None => tokens,
                };
                *current = Some(next);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Could not read token file, continuing without it"),
        }
    }

    /// Replaces the live set and persists it. On a persistence error the new
    /// set is still live in memory and the error is returned for reporting.
    pub async fn set_tokens(&self, tokens: TokenSet) -> Result<(), RelayError> {
        *self.current.write().await = Some(tokens.clone());
        self.store.save(&tokens).await.inspect_err(|e| {
            warn!(error = %e, "Tokens kept in memory only");
        })
    }

    pub async fn get_valid_access_token(&self) -> Result<String, RelayError> {
        let refresh_token = {
            let guard = self.current.read().await;
            let tokens = guard.as_ref();
            if let Some(token) = tokens.and_then(|t| t.usable_access_token(now_millis())) {
                return Ok(token.to_string());
            }
            tokens
                .and_then(|t| t.refresh_token.clone())
                .ok_or_else(|| {
                    RelayError::Auth("no refresh token available; authorize via /auth".into())
                })?
        };

        let fresh = self.oauth.refresh(&refresh_token).await?;
        let next = {
            let guard = self.current.read().await;
            match guard.as_ref() {
                Some(current) => current.refreshed(fresh),
                None => TokenSet::from_refresh_token(refresh_token).refreshed(fresh),
            }
        };
        let access_token = next
            .access_token
            .clone()
            .ok_or_else(|| RelayError::Auth("refresh returned no access token".into()))?;

        // persistence problems are already logged by set_tokens
        let _ = self.set_tokens(next).await;
        Ok(access_token)
    }

    /// Current access token without attempting a refresh, possibly stale.
    pub async fn cached_access_token(&self) -> Option<String> {
        self.current
            .read()
            .await
            .as_ref()
            .and_then(|t| t.access_token.clone())
    }

    pub async fn has_refresh_token(&self) -> bool {
        self.current
            .read()
            .await
            .as_ref()
            .is_some_and(|t| t.refresh_token.is_some())
    }
}
