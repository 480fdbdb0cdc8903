use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use constellation_api::{
    api::{create_router, AppState},
    config::Config,
    db::{create_redis_client, Cache},
    services::providers::{acrcloud::AcrCloudRecognizer, lastfm::LastfmProvider},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let timeout = Duration::from_secs(config.provider_timeout_secs);

    let redis_client = create_redis_client(&config.redis_url)?;
    let (cache, _cache_writer) = Cache::new(redis_client);

    let catalog = LastfmProvider::new(
        cache,
        config.lastfm_api_key.clone(),
        config.lastfm_api_url.clone(),
        timeout,
    )?;
    let recognizer = AcrCloudRecognizer::new(
        config.acrcloud_host.clone(),
        config.acrcloud_access_key.clone(),
        config.acrcloud_access_secret.clone(),
        timeout,
    )?;

    let state = AppState::new(Arc::new(recognizer), Arc::new(catalog));
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Constellation API listening");
    axum::serve(listener, app).await?;

    Ok(())
}
