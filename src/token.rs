use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// Refresh this long before the provider's stated expiry.
pub const EXPIRY_SKEW: Duration = Duration::minutes(5);

/// The token bundle issued by the OAuth provider, in the shape written to the token file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

/// Body of a successful token endpoint response.
#[derive(Deserialize, Debug)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

impl TokenResponse {
    pub fn into_token_set(self, issued_at_ms: i64) -> TokenSet {
        TokenSet {
            access_token: Some(self.access_token),
            refresh_token: self.refresh_token,
            expiry_date: self.expires_in.map(|secs| issued_at_ms + secs * 1000),
            scope: self.scope,
            token_type: self.token_type,
            id_token: self.id_token,
        }
    }
}

impl TokenSet {
    pub fn from_refresh_token(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: Some(refresh_token.into()),
            ..Self::default()
        }
    }

    /// An access token that is present and not inside the skew window at `now_ms`.
    pub fn usable_access_token(&self, now_ms: i64) -> Option<&str> {
        let token = self.access_token.as_deref().filter(|t| !t.is_empty())?;
        match self.expiry_date {
            Some(expiry) if now_ms + EXPIRY_SKEW.whole_milliseconds() as i64 >= expiry => None,
            _ => Some(token),
        }
    }

    /// Replacement set after a refresh grant. The provider omits the refresh
    /// token on refresh, so the current one carries over.
    pub fn refreshed(&self, mut next: TokenSet) -> TokenSet {
        if next.refresh_token.is_none() {
            next.refresh_token = self.refresh_token.clone();
        }
        next
    }
}
