// src/content/client.rs
//! Remote content client: one authenticated GET per collection, raw rows out.
//!
//! No retries here. The cache decides what a failure means for callers.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, StatusCode, Url};
use serde_json::Value;

use crate::config::content::ContentConfig;
use crate::content::error::FetchError;
use crate::content::model::RawRow;
use crate::content::Collection;

/// Where raw rows come from. The cache only ever talks to this trait.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_collection(&self, collection: Collection) -> Result<Vec<RawRow>, FetchError>;
    fn name(&self) -> &'static str;
}

/// HTTP implementation against the external content store.
pub struct HttpContentSource {
    http: reqwest::Client,
    endpoint: Url,
    token: String,
    paths: HashMap<Collection, String>,
}

impl HttpContentSource {
    pub fn new(config: &ContentConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("site-content-sync/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(config.fetch_timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: config.api_url.clone(),
            token: config.api_token.clone(),
            paths: config.paths.clone(),
        })
    }

    /// `endpoint` joined with the collection's path (the collection name
    /// unless overridden).
    pub fn url_for(&self, collection: Collection) -> Result<Url, FetchError> {
        let path = self
            .paths
            .get(&collection)
            .map(String::as_str)
            .unwrap_or_else(|| collection.as_str());
        let mut base = self.endpoint.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path.trim_start_matches('/'))
            .map_err(|e| FetchError::network(collection, format!("invalid collection url: {e}")))
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    async fn fetch_collection(&self, collection: Collection) -> Result<Vec<RawRow>, FetchError> {
        let url = self.url_for(collection)?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FetchError::network(collection, describe_transport_error(&e)))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Auth {
                collection,
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::network(collection, format!("http status {status}")));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::network(collection, describe_transport_error(&e)))?;
        parse_rows(collection, &body)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timed out: {e}")
    } else if e.is_connect() {
        format!("connect failed: {e}")
    } else {
        e.to_string()
    }
}

/// A body is valid only as a JSON array whose every element is an object.
pub fn parse_rows(collection: Collection, body: &[u8]) -> Result<Vec<RawRow>, FetchError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| FetchError::malformed(collection, format!("invalid json: {e}")))?;
    let Value::Array(items) = value else {
        return Err(FetchError::malformed(collection, "expected a json array of rows"));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Object(row) => Ok(row),
            other => Err(FetchError::malformed(
                collection,
                format!("row {idx} is not an object: {}", json_type(&other)),
            )),
        })
        .collect()
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
