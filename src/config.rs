use serde::Deserialize;
use std::{fs, path::Path, path::PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
    /// Multipart body limit for `/upload`, in MiB.
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
    #[serde(rename = "youtube_oauth", default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub youtube: YouTubeConfig,
}

fn default_port() -> u16 {
    5000
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_token_file() -> PathBuf {
    PathBuf::from("youtube_tokens.json")
}

fn default_max_upload_mb() -> usize {
    1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_token_timeout")]
    pub timeout_secs: u64,
}

fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_scopes() -> Vec<String> {
    vec!["https://www.googleapis.com/auth/youtube.upload".to_string()]
}

fn default_token_timeout() -> u64 {
    30
}

impl OAuthConfig {
    /// Names of the client settings that are still unset.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.client_id.is_none() {
            missing.push("CLIENT_ID");
        }
        if self.client_secret.is_none() {
            missing.push("CLIENT_SECRET");
        }
        if self.redirect_uri.is_none() {
            missing.push("REDIRECT_URI");
        }
        missing
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            refresh_token: None,
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            scopes: default_scopes(),
            timeout_secs: default_token_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct YouTubeConfig {
    #[serde(default = "default_upload_url")]
    pub upload_url: String,
    #[serde(default = "default_upload_timeout")]
    pub timeout_secs: u64,
}

fn default_upload_url() -> String {
    "https://www.googleapis.com/upload/youtube/v3/videos".to_string()
}

fn default_upload_timeout() -> u64 {
    3600
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            upload_url: default_upload_url(),
            timeout_secs: default_upload_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            upload_dir: default_upload_dir(),
            token_file: default_token_file(),
            max_upload_mb: default_max_upload_mb(),
            oauth: OAuthConfig::default(),
            youtube: YouTubeConfig::default(),
        }
    }
}

impl Config {
    /// Load the optional TOML file at `path`, then layer the process environment on top.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut cfg = Self::from_file(path)?;
        cfg.apply_env(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let cfg = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded config file");
        Ok(cfg)
    }

    /// Environment overrides. `YT_*` names take precedence over the bare names.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |names: [&str; 2]| {
            names
                .into_iter()
                .filter_map(|n| lookup(n))
                .find(|v| !v.trim().is_empty())
        };

        if let Some(v) = pick(["YT_CLIENT_ID", "CLIENT_ID"]) {
            self.oauth.client_id = Some(v);
        }
        if let Some(v) = pick(["YT_CLIENT_SECRET", "CLIENT_SECRET"]) {
            self.oauth.client_secret = Some(v);
        }
        if let Some(v) = pick(["YT_REDIRECT_URI", "REDIRECT_URI"]) {
            self.oauth.redirect_uri = Some(v);
        }
        if let Some(v) = pick(["YT_REFRESH_TOKEN", "REFRESH_TOKEN"]) {
            self.oauth.refresh_token = Some(v);
        }
        if let Some(v) = lookup("PORT") {
            match v.trim().parse() {
                Ok(port) => self.port = port,
                Err(_) => warn!(value = %v, "Ignoring unparsable PORT"),
            }
        }
    }
}
