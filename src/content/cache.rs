// src/content/cache.rs
//! # Collection Cache
//! Per-collection snapshot store with a freshness window, stale-serve on
//! failed refresh and single-flight fetching.
//!
//! `get` never fails. When the content store misbehaves callers receive the
//! last good snapshot, or an empty collection if there never was one. A
//! failed refresh starts a backoff during which that fallback is served
//! without touching the store.
//!
//! State is in-memory only and may vanish with the execution context; a cold
//! cache is the normal starting point.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::content::ContentConfig;
use crate::content::client::ContentSource;
use crate::content::error::FetchError;
use crate::content::model::{Article, Brochure, CollectionData, Event, Popup, RawRow};
use crate::content::normalize::{normalize, Record};
use crate::content::{ensure_metrics_described, Collection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// How long a snapshot is served without refetching.
    pub freshness: Duration,
    /// Upper bound for one fetch; an expired bound counts as a network error.
    pub fetch_timeout: Duration,
    /// After a failed refresh, serve the fallback for this long before the
    /// store is tried again.
    pub retry_backoff: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            freshness: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(8),
            retry_backoff: Duration::from_secs(10),
        }
    }
}

impl CachePolicy {
    pub fn from_config(config: &ContentConfig) -> Self {
        Self {
            freshness: config.cache_ttl,
            fetch_timeout: config.fetch_timeout,
            retry_backoff: config.retry_backoff,
        }
    }
}

#[derive(Debug, Clone)]
struct Snapshot {
    data: CollectionData,
    fetched_at: Instant,
}

#[derive(Debug, Default)]
struct SlotState {
    snapshot: Option<Snapshot>,
    /// Set by `invalidate`; the snapshot stays around for stale-serve.
    invalidated: bool,
    last_error: Option<FetchError>,
    /// Completed fetch attempts, successful or not.
    attempts: u64,
    /// No fetch before this instant; set by a failed refresh.
    retry_at: Option<Instant>,
}

impl SlotState {
    fn fresh(&self, now: Instant, freshness: Duration) -> Option<&CollectionData> {
        let snap = self.snapshot.as_ref()?;
        if self.invalidated || now.saturating_duration_since(snap.fetched_at) >= freshness {
            return None;
        }
        Some(&snap.data)
    }

    fn backing_off(&self, now: Instant) -> bool {
        self.retry_at.is_some_and(|at| now < at)
    }

    /// Last good snapshot, or an empty collection if there never was one.
    fn fallback(&self, collection: Collection) -> CollectionData {
        match &self.snapshot {
            Some(snap) => snap.data.clone(),
            None => CollectionData::empty(collection),
        }
    }

    fn serve_fallback(&self, collection: Collection) -> CollectionData {
        if self.snapshot.is_some() {
            counter!("content_cache_stale_served_total", "collection" => collection.as_str())
                .increment(1);
        } else {
            counter!("content_cache_empty_served_total", "collection" => collection.as_str())
                .increment(1);
        }
        self.fallback(collection)
    }
}

#[derive(Debug, Default)]
struct Slot {
    state: RwLock<SlotState>,
    /// Held for the duration of a fetch; concurrent callers queue here.
    gate: Arc<Mutex<()>>,
}

impl Slot {
    fn read(&self) -> RwLockReadGuard<'_, SlotState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SlotState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the outcome of one attempt and return what callers get.
    fn settle(
        &self,
        collection: Collection,
        outcome: Result<(usize, CollectionData), FetchError>,
        elapsed_ms: f64,
        retry_backoff: Duration,
    ) -> CollectionData {
        let mut st = self.write();
        st.attempts += 1;
        match outcome {
            Ok((raw_rows, data)) => {
                if let Some(prev) = &st.snapshot {
                    let age = prev.fetched_at.elapsed().as_secs_f64();
                    gauge!("content_snapshot_age_secs", "collection" => collection.as_str())
                        .set(age);
                }
                info!(
                    target: "content",
                    %collection,
                    rows = raw_rows,
                    kept = data.len(),
                    elapsed_ms,
                    "collection refreshed"
                );
                st.snapshot = Some(Snapshot {
                    data: data.clone(),
                    fetched_at: Instant::now(),
                });
                st.invalidated = false;
                st.last_error = None;
                st.retry_at = None;
                data
            }
            Err(e) => {
                counter!(
                    "content_fetch_errors_total",
                    "collection" => collection.as_str(),
                    "kind" => e.kind()
                )
                .increment(1);
                let served = st.serve_fallback(collection);
                warn!(
                    target: "content",
                    %collection,
                    kind = e.kind(),
                    error = %e,
                    serving = served.len(),
                    stale = st.snapshot.is_some(),
                    retry_in_secs = retry_backoff.as_secs_f64(),
                    "refresh failed; serving fallback"
                );
                st.last_error = Some(e);
                st.retry_at = Some(Instant::now() + retry_backoff);
                served
            }
        }
    }
}

/// Diagnostics for one collection.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStatus {
    pub collection: Collection,
    pub records: usize,
    pub age_secs: Option<f64>,
    pub fresh: bool,
    pub attempts: u64,
    /// Seconds until the store is tried again after a failure.
    pub retry_in_secs: Option<f64>,
    pub last_error_kind: Option<&'static str>,
    pub last_error: Option<String>,
}

/// Everything a typical page render needs, resolved concurrently.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageContent {
    pub articles: Arc<Vec<Article>>,
    pub events: Arc<Vec<Event>>,
    pub popups: Arc<Vec<Popup>>,
    pub brochures: Arc<Vec<Brochure>>,
}

pub struct CollectionCache {
    source: Arc<dyn ContentSource>,
    policy: CachePolicy,
    slots: [Arc<Slot>; 4],
}

impl CollectionCache {
    pub fn new(source: Arc<dyn ContentSource>, policy: CachePolicy) -> Self {
        Self {
            source,
            policy,
            slots: std::array::from_fn(|_| Arc::new(Slot::default())),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    fn slot(&self, collection: Collection) -> &Arc<Slot> {
        &self.slots[collection.index()]
    }

    /// Current normalized records for `collection`. Never fails.
    pub async fn get(&self, collection: Collection) -> CollectionData {
        ensure_metrics_described();
        let slot = self.slot(collection);

        let seen_attempts = {
            let st = slot.read();
            let now = Instant::now();
            if let Some(data) = st.fresh(now, self.policy.freshness) {
                counter!("content_cache_hits_total", "collection" => collection.as_str())
                    .increment(1);
                return data.clone();
            }
            if st.backing_off(now) {
                return st.serve_fallback(collection);
            }
            st.attempts
        };

        let gate = Arc::clone(&slot.gate).lock_owned().await;

        {
            let st = slot.read();
            // Someone finished an attempt while we queued: take its outcome
            // instead of issuing another fetch.
            if st.attempts != seen_attempts {
                return st.fallback(collection);
            }
            let now = Instant::now();
            if let Some(data) = st.fresh(now, self.policy.freshness) {
                return data.clone();
            }
            if st.backing_off(now) {
                return st.serve_fallback(collection);
            }
        }

        self.refresh(collection, gate).await
    }

    async fn refresh(&self, collection: Collection, gate: OwnedMutexGuard<()>) -> CollectionData {
        let slot = Arc::clone(self.slot(collection));
        let source = Arc::clone(&self.source);
        let policy = self.policy;

        // The task owns the gate: an attempt runs to completion and is
        // recorded even if the caller that started it goes away.
        let task = tokio::spawn(async move {
            let _gate = gate;
            let started = Instant::now();
            counter!("content_fetch_total", "collection" => collection.as_str()).increment(1);

            let outcome = fetch_bounded(source, collection, policy.fetch_timeout)
                .await
                .map(|rows| (rows.len(), normalize(collection, &rows)));

            let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
            histogram!("content_fetch_ms", "collection" => collection.as_str())
                .record(elapsed_ms);

            slot.settle(collection, outcome, elapsed_ms, policy.retry_backoff)
        });

        match task.await {
            Ok(data) => data,
            Err(join_err) => {
                warn!(target: "content", %collection, error = %join_err, "refresh task failed");
                self.slot(collection).read().fallback(collection)
            }
        }
    }

    /// Typed `getAll` for one record type.
    pub async fn get_all<T: Record>(&self) -> Arc<Vec<T>> {
        let data = self.get(T::COLLECTION).await;
        T::from_data(&data).unwrap_or_default()
    }

    pub async fn articles(&self) -> Arc<Vec<Article>> {
        self.get_all().await
    }

    pub async fn events(&self) -> Arc<Vec<Event>> {
        self.get_all().await
    }

    pub async fn popups(&self) -> Arc<Vec<Popup>> {
        self.get_all().await
    }

    pub async fn brochures(&self) -> Arc<Vec<Brochure>> {
        self.get_all().await
    }

    /// All four collections, fetched concurrently and independently.
    pub async fn page_content(&self) -> PageContent {
        let (articles, events, popups, brochures) = tokio::join!(
            self.articles(),
            self.events(),
            self.popups(),
            self.brochures()
        );
        PageContent {
            articles,
            events,
            popups,
            brochures,
        }
    }

    /// Force the next access to refresh, backoff included. The snapshot is
    /// kept as a fallback.
    pub fn invalidate(&self, collection: Collection) {
        let mut st = self.slot(collection).write();
        st.invalidated = true;
        st.retry_at = None;
        debug!(target: "content", %collection, "snapshot invalidated");
    }

    pub fn invalidate_all(&self) {
        for c in Collection::ALL {
            self.invalidate(c);
        }
    }

    pub fn status(&self) -> Vec<CollectionStatus> {
        let now = Instant::now();
        Collection::ALL
            .into_iter()
            .map(|collection| {
                let st = self.slot(collection).read();
                CollectionStatus {
                    collection,
                    records: st.snapshot.as_ref().map_or(0, |s| s.data.len()),
                    age_secs: st
                        .snapshot
                        .as_ref()
                        .map(|s| now.saturating_duration_since(s.fetched_at).as_secs_f64()),
                    fresh: st.fresh(now, self.policy.freshness).is_some(),
                    attempts: st.attempts,
                    retry_in_secs: st
                        .retry_at
                        .filter(|at| *at > now)
                        .map(|at| (at - now).as_secs_f64()),
                    last_error_kind: st.last_error.as_ref().map(FetchError::kind),
                    last_error: st.last_error.as_ref().map(ToString::to_string),
                }
            })
            .collect()
    }
}

/// One bounded fetch. Runs on its own task so a panicking or hung source
/// degrades to a network error.
async fn fetch_bounded(
    source: Arc<dyn ContentSource>,
    collection: Collection,
    fetch_timeout: Duration,
) -> Result<Vec<RawRow>, FetchError> {
    let mut task = tokio::spawn(async move { source.fetch_collection(collection).await });

    match tokio::time::timeout(fetch_timeout, &mut task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(FetchError::network(
            collection,
            format!("fetch task failed: {join_err}"),
        )),
        Err(_) => {
            task.abort();
            Err(FetchError::network(
                collection,
                format!("timed out after {fetch_timeout:?}"),
            ))
        }
    }
}
