mod config;
mod error;
mod oauth;
mod relay;
mod server;
mod token;
mod token_manager;
mod token_store;
mod youtube;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = ".config/relay.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env is optional
    let _ = dotenvy::dotenv();

    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path =
        std::env::var("RELAY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::Config::load(&config_path)?;

    let oauth = oauth::OAuthClient::configure(&cfg.oauth)?;
    let store = token_store::TokenStore::new(&cfg.token_file);
    let tokens = Arc::new(token_manager::TokenManager::new(
        oauth,
        store,
        cfg.oauth.refresh_token.clone(),
    ));
    tokens.load_persisted().await;

    let host = youtube::YouTubeClient::new(&cfg.youtube)?;
    let relay = Arc::new(relay::UploadRelay::new(tokens.clone(), Arc::new(host)));

    tokio::fs::create_dir_all(&cfg.upload_dir).await?;
    let state = server::AppState {
        tokens,
        relay,
        upload_dir: cfg.upload_dir.clone(),
        scopes: cfg.oauth.scopes.clone(),
    };
    let app = server::router(state, cfg.max_upload_mb * 1024 * 1024);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(url = %format!("http://localhost:{}", cfg.port), "Backend running");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
