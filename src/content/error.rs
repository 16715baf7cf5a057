// src/content/error.rs
//! Error taxonomy for the content layer.
//!
//! `FetchError` is what a `ContentSource` may surface. `ValidationError` only
//! ever lives inside the normalizer: a row that fails validation is dropped
//! and never escalated.

use crate::content::Collection;

#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Transport failure, timeout, or a non-success status other than auth.
    #[error("network error fetching {collection}: {message}")]
    Network {
        collection: Collection,
        message: String,
    },

    /// The content store rejected the credentials (401/403).
    #[error("content store rejected credentials for {collection} (status {status})")]
    Auth { collection: Collection, status: u16 },

    /// The body could not be read as a JSON array of row objects.
    #[error("malformed response for {collection}: {message}")]
    MalformedResponse {
        collection: Collection,
        message: String,
    },
}

impl FetchError {
    pub fn network(collection: Collection, message: impl Into<String>) -> Self {
        Self::Network {
            collection,
            message: message.into(),
        }
    }

    pub fn malformed(collection: Collection, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            collection,
            message: message.into(),
        }
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Auth { .. } => "auth",
            Self::MalformedResponse { .. } => "malformed",
        }
    }

    pub fn collection(&self) -> Collection {
        match self {
            Self::Network { collection, .. }
            | Self::Auth { collection, .. }
            | Self::MalformedResponse { collection, .. } => *collection,
        }
    }
}

/// Why a single raw row could not become a usable record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("article has neither title nor slug")]
    UntitledArticle,
    #[error("event has no title")]
    UntitledEvent,
    #[error("popup has no title, text or link")]
    EmptyPopup,
    #[error("brochure has no download url")]
    MissingBrochureUrl,
}
