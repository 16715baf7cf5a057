//! Diagnostic HTTP surface over the content layer.
//!
//! Page rendering lives elsewhere; these routes let operators see what the
//! cache currently holds and force a refresh after editors publish.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;

use crate::content::model::{Article, CollectionData, Event, Popup};
use crate::content::{query, Collection, CollectionCache, CollectionStatus};

/// Used by call-to-action buttons when no brochure is published.
pub const DEFAULT_CATALOG_URL: &str = "/downloads/catalog.pdf";

const LATEST_ARTICLES: usize = 3;
const UPCOMING_EVENTS: usize = 4;

#[derive(Clone)]
pub struct AppState {
    pub content: Arc<CollectionCache>,
    pub catalog_fallback_url: Arc<str>,
}

impl AppState {
    pub fn new(content: Arc<CollectionCache>) -> Self {
        Self {
            content,
            catalog_fallback_url: Arc::from(DEFAULT_CATALOG_URL),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/debug/content/{collection}", get(debug_collection))
        .route("/debug/cache", get(debug_cache))
        .route("/debug/views", get(debug_views))
        .route("/admin/content/refresh", post(admin_refresh))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn debug_collection(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CollectionData>, (StatusCode, String)> {
    let collection = name
        .parse::<Collection>()
        .map_err(|e| (StatusCode::NOT_FOUND, e.to_string()))?;
    Ok(Json(state.content.get(collection).await))
}

async fn debug_cache(State(state): State<AppState>) -> Json<Vec<CollectionStatus>> {
    Json(state.content.status())
}

#[derive(serde::Serialize)]
struct ViewsOut {
    generated_at: DateTime<Utc>,
    latest_articles: Vec<Article>,
    upcoming_events: Vec<Event>,
    popup: Option<Popup>,
    catalog_url: String,
}

async fn debug_views(State(state): State<AppState>) -> Json<ViewsOut> {
    let page = state.content.page_content().await;
    let now = Utc::now();
    Json(ViewsOut {
        generated_at: now,
        latest_articles: query::latest_articles(&page.articles, LATEST_ARTICLES),
        upcoming_events: query::upcoming_events(&page.events, now, UPCOMING_EVENTS),
        popup: query::first_active(&page.popups).cloned(),
        catalog_url: query::first_or_default(&page.brochures, &state.catalog_fallback_url),
    })
}

async fn admin_refresh(State(state): State<AppState>) -> &'static str {
    state.content.invalidate_all();
    tracing::info!(target: "content", "all collections invalidated via admin route");
    "invalidated"
}
