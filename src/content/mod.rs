// src/content/mod.rs
//! Content synchronization layer: fetch editor-managed collections from the
//! external store, normalize their loosely-typed rows, cache snapshots and
//! expose pure query helpers for page renderers.

pub mod cache;
pub mod client;
pub mod error;
pub mod fixtures;
pub mod model;
pub mod normalize;
pub mod query;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;

pub use cache::{CachePolicy, CollectionCache, CollectionStatus, PageContent};
pub use client::{ContentSource, HttpContentSource};
pub use error::{FetchError, ValidationError};
pub use fixtures::FixtureSource;
pub use model::{
    Article, Brochure, CollectionData, Event, Popup, PublicationStatus, Publishable, RawRow,
};

/// The fixed set of collections the site reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Articles,
    Events,
    Popups,
    Brochures,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Articles,
        Collection::Events,
        Collection::Popups,
        Collection::Brochures,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Articles => "articles",
            Self::Events => "events",
            Self::Popups => "popups",
            Self::Brochures => "brochures",
        }
    }

    /// Position in `Collection::ALL`; used to index per-collection slots.
    pub fn index(self) -> usize {
        match self {
            Self::Articles => 0,
            Self::Events => 1,
            Self::Popups => 2,
            Self::Brochures => 3,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown collection '{0}'")]
pub struct UnknownCollection(pub String);

impl FromStr for Collection {
    type Err = UnknownCollection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownCollection(s.to_string()))
    }
}

/// Pick the content source for a config: fixtures when a fixtures dir is
/// configured, the HTTP content store otherwise.
pub fn source_from_config(
    config: &crate::config::content::ContentConfig,
) -> Result<Arc<dyn ContentSource>, reqwest::Error> {
    if let Some(dir) = &config.fixtures_dir {
        tracing::info!(target: "content", dir = %dir.display(), "serving content from fixtures");
        return Ok(Arc::new(FixtureSource::from_dir(dir)));
    }
    Ok(Arc::new(HttpContentSource::new(config)?))
}

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "content_fetch_total",
            "Outbound fetches issued to the content store."
        );
        describe_counter!(
            "content_fetch_errors_total",
            "Failed fetches, labelled by collection and error kind."
        );
        describe_histogram!("content_fetch_ms", "Fetch + normalize time in milliseconds.");
        describe_counter!(
            "content_cache_hits_total",
            "Requests served from a fresh snapshot."
        );
        describe_counter!(
            "content_cache_stale_served_total",
            "Requests served from a stale snapshot after a failed refresh."
        );
        describe_counter!(
            "content_cache_empty_served_total",
            "Requests served an empty collection (no snapshot, fetch failed)."
        );
        describe_counter!(
            "content_rows_dropped_total",
            "Raw rows rejected by the normalizer."
        );
        describe_gauge!(
            "content_snapshot_age_secs",
            "Age of the replaced snapshot when a refresh succeeds."
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_names_parse_case_insensitively() {
        assert_eq!("Events".parse::<Collection>(), Ok(Collection::Events));
        assert_eq!(" brochures ".parse::<Collection>(), Ok(Collection::Brochures));
        assert!("pages".parse::<Collection>().is_err());
    }

    #[test]
    fn index_matches_all_order() {
        for (i, c) in Collection::ALL.into_iter().enumerate() {
            assert_eq!(c.index(), i);
        }
    }
}
