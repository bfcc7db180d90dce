use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use event_scout::cache::Cache;
use event_scout::config::AppConfig;
use event_scout::server::{self, AppState};
use event_scout::sources;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config = AppConfig::from_env();
    let sources = sources::active_sources(&config);
    info!(
        host = %config.host,
        port = config.port,
        sources = sources.len(),
        "event-scout starting"
    );

    let cache = Arc::new(Cache::new());
    let sweeper = cache.spawn_sweeper();

    let state = Arc::new(AppState {
        cache: Arc::clone(&cache),
        sources,
    });

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let result = server::serve(addr, state).await;

    // teardown: stop the sweep loop and drop every cached entry
    sweeper.abort();
    cache.clear().await;

    result?;
    Ok(())
}
