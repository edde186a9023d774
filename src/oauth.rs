use crate::config::OAuthConfig;
use crate::error::RelayError;
use crate::token::{TokenResponse, TokenSet, now_millis};
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};
use urlencoding::encode;

/// Authorization-code and refresh-token grants against the provider.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: Client,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
    auth_url: String,
    token_url: String,
}

impl OAuthClient {
    /// Missing client settings only produce a warning here; grants fail later.
    pub fn configure(cfg: &OAuthConfig) -> Result<Self, RelayError> {
        let missing = cfg.missing();
        if !missing.is_empty() {
            warn!(missing = ?missing, "OAuth client is not fully configured");
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| RelayError::Auth(format!("building http client: {e}")))?;

        Ok(Self {
            http,
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            redirect_uri: cfg.redirect_uri.clone(),
            auth_url: cfg.auth_url.clone(),
            token_url: cfg.token_url.clone(),
        })
    }

    /// Consent page URL asking for offline access, with `prompt=consent` so a
    /// refresh token is issued even when the account already granted access.
    pub fn consent_url(&self, scopes: &[String]) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&access_type=offline&prompt=consent",
            self.auth_url,
            encode(self.client_id.as_deref().unwrap_or_default()),
            encode(self.redirect_uri.as_deref().unwrap_or_default()),
            encode(&scopes.join(" ")),
        )
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet, RelayError> {
        let (client_id, client_secret) = self.credentials()?;
        let redirect_uri = self
            .redirect_uri
            .as_deref()
            .ok_or_else(|| RelayError::Auth("REDIRECT_URI is not configured".into()))?;

        let body = format!(
            "code={}&client_id={}&client_secret={}&redirect_uri={}&grant_type=authorization_code",
            encode(code),
            encode(client_id),
            encode(client_secret),
            encode(redirect_uri),
        );
        let tokens = self.token_request(body).await?;
        info!(
            has_refresh_token = tokens.refresh_token.is_some(),
            scope = ?tokens.scope,
            "Authorization code exchanged"
        );
        Ok(tokens)
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, RelayError> {
        let (client_id, client_secret) = self.credentials()?;

        let body = format!(
            "client_id={}&client_secret={}&refresh_token={}&grant_type=refresh_token",
            encode(client_id),
            encode(client_secret),
            encode(refresh_token),
        );
        let tokens = self.token_request(body).await?;
        info!(expiry_date = ?tokens.expiry_date, "Access token refreshed");
        Ok(tokens)
    }

    fn credentials(&self) -> Result<(&str, &str), RelayError> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(RelayError::Auth(
                "CLIENT_ID / CLIENT_SECRET are not configured".into(),
            )),
        }
    }

    async fn token_request(&self, body: String) -> Result<TokenSet, RelayError> {
        let issued_at = now_millis();
        let resp = self
            .http
            .post(&self.token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| RelayError::Auth(format!("token endpoint unreachable: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %error_text, "Token endpoint rejected the request");
            return Err(RelayError::Auth(format!("{status}: {error_text}")));
        }

        let token_resp: TokenResponse = resp
            .json()
            .await
            .map_err(|e| RelayError::Auth(format!("malformed token response: {e}")))?;
        Ok(token_resp.into_token_set(issued_at))
    }
}
