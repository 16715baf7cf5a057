// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod content;
pub mod metrics;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::content::ContentConfig;
use crate::content::{CachePolicy, CollectionCache};

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::content::{
    Article, Brochure, Collection, CollectionData, Event, FetchError, Popup, PublicationStatus,
};

/// Install a tracing subscriber. `LOG_FORMAT=json` switches to JSON lines.
/// No-op if the host (e.g. Shuttle) already installed one.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("content=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

/// One cache per execution context, shared by every request it serves.
pub fn build_content_cache(config: &ContentConfig) -> anyhow::Result<Arc<CollectionCache>> {
    let source = content::source_from_config(config).context("building content source")?;
    Ok(Arc::new(CollectionCache::new(
        source,
        CachePolicy::from_config(config),
    )))
}

/// Fetch every collection once and log what came back. Used by the
/// `content_probe` binary to check credentials and data shape.
pub async fn run_content_probe() -> anyhow::Result<()> {
    let config = ContentConfig::from_env().context("loading content config")?;
    let cache = build_content_cache(&config)?;
    info!(source = cache.source_name(), url = %config.api_url, "content probe starting");

    let page = cache.page_content().await;
    info!(
        articles = page.articles.len(),
        events = page.events.len(),
        popups = page.popups.len(),
        brochures = page.brochures.len(),
        "content probe finished"
    );

    let mut failed = 0usize;
    for st in cache.status() {
        if let Some(err) = &st.last_error {
            failed += 1;
            warn!(
                collection = %st.collection,
                kind = ?st.last_error_kind,
                error = %err,
                "collection failed"
            );
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} collections failed to load", Collection::ALL.len());
    }
    Ok(())
}
