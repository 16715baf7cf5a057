//! Site content service entrypoint.
//! Boots the Axum diagnostic server with a content cache built from the
//! environment. Missing content store settings abort startup.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;

use site_content_sync::api::{self, AppState};
use site_content_sync::config::content::ContentConfig;
use site_content_sync::content::CachePolicy;
use site_content_sync::metrics::Metrics;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    site_content_sync::init_tracing();

    let config = ContentConfig::from_env().context("loading content config")?;
    let content = site_content_sync::build_content_cache(&config)?;
    let metrics =
        Metrics::init(CachePolicy::from_config(&config)).context("installing metrics recorder")?;

    tracing::info!(
        source = content.source_name(),
        freshness_secs = config.cache_ttl.as_secs(),
        "content cache ready"
    );

    let router = api::router(AppState::new(content)).merge(metrics.router());
    Ok(router.into())
}
