// src/content/fixtures.rs
//! Fixture-backed content source for local development and tests.
//!
//! Serves the same JSON documents the content store would return, either from
//! memory or from `<dir>/<collection>.json`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::content::client::{parse_rows, ContentSource};
use crate::content::error::FetchError;
use crate::content::model::RawRow;
use crate::content::Collection;

pub struct FixtureSource {
    mode: Mode,
}

enum Mode {
    Memory(HashMap<Collection, String>),
    Dir(PathBuf),
}

impl FixtureSource {
    /// In-memory documents; collections without a document fail like a
    /// missing endpoint would.
    pub fn from_documents<I, S>(docs: I) -> Self
    where
        I: IntoIterator<Item = (Collection, S)>,
        S: Into<String>,
    {
        Self {
            mode: Mode::Memory(docs.into_iter().map(|(c, s)| (c, s.into())).collect()),
        }
    }

    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            mode: Mode::Dir(dir.as_ref().to_path_buf()),
        }
    }
}

#[async_trait]
impl ContentSource for FixtureSource {
    async fn fetch_collection(&self, collection: Collection) -> Result<Vec<RawRow>, FetchError> {
        match &self.mode {
            Mode::Memory(docs) => {
                let doc = docs
                    .get(&collection)
                    .ok_or_else(|| FetchError::network(collection, "no fixture document"))?;
                parse_rows(collection, doc.as_bytes())
            }
            Mode::Dir(dir) => {
                let path = dir.join(format!("{}.json", collection.as_str()));
                let body = tokio::fs::read(&path).await.map_err(|e| {
                    FetchError::network(collection, format!("reading {}: {e}", path.display()))
                })?;
                parse_rows(collection, &body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "fixtures"
    }
}
