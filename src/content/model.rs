// src/content/model.rs
//! Canonical, render-ready records. Everything here has already been through
//! the normalizer: flags are real booleans, dates are `Option<DateTime<Utc>>`
//! where `None` means "unparseable", which orders before every real date.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::content::Collection;

/// Untyped row as delivered by the content store.
pub type RawRow = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationStatus {
    #[default]
    Draft,
    Published,
}

impl PublicationStatus {
    pub fn is_published(self) -> bool {
        matches!(self, Self::Published)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub body: String,
    pub cover_image: String,
    pub category: String,
    pub tags: Vec<String>,
    pub status: PublicationStatus,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub date: Option<DateTime<Utc>>,
    pub location: String,
    pub link: String,
    pub status: PublicationStatus,
    pub pinned: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Popup {
    pub id: String,
    pub active: bool,
    pub title: String,
    pub text: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Brochure {
    pub id: String,
    pub title: String,
    pub url: String,
    pub display_order: i64,
}

/// Records that carry a publication status.
pub trait Publishable {
    fn status(&self) -> PublicationStatus;
}

impl Publishable for Article {
    fn status(&self) -> PublicationStatus {
        self.status
    }
}

impl Publishable for Event {
    fn status(&self) -> PublicationStatus {
        self.status
    }
}

/// A normalized snapshot of one collection, shared cheaply between callers.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CollectionData {
    Articles(Arc<Vec<Article>>),
    Events(Arc<Vec<Event>>),
    Popups(Arc<Vec<Popup>>),
    Brochures(Arc<Vec<Brochure>>),
}

impl CollectionData {
    pub fn empty(collection: Collection) -> Self {
        match collection {
            Collection::Articles => Self::Articles(Arc::default()),
            Collection::Events => Self::Events(Arc::default()),
            Collection::Popups => Self::Popups(Arc::default()),
            Collection::Brochures => Self::Brochures(Arc::default()),
        }
    }

    pub fn collection(&self) -> Collection {
        match self {
            Self::Articles(_) => Collection::Articles,
            Self::Events(_) => Collection::Events,
            Self::Popups(_) => Collection::Popups,
            Self::Brochures(_) => Collection::Brochures,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Articles(v) => v.len(),
            Self::Events(v) => v.len(),
            Self::Popups(v) => v.len(),
            Self::Brochures(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
