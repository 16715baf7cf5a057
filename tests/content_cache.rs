//! Integration tests for the collection cache against scripted sources.
//!
//! Covered:
//! - single-flight on a cold cache (success and failure)
//! - freshness window (no refetch inside, one refetch after)
//! - stale-serve after a failed refresh, empty on a cold failure
//! - per-collection independence (fail open)
//! - single-flight on a stale refresh, and when the leading caller goes away
//! - backoff after a failed refresh
//! - hung and panicking sources degrade like network errors
//! - explicit invalidation

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use site_content_sync::content::{
    CachePolicy, Collection, CollectionCache, CollectionStatus, ContentSource, FetchError, RawRow,
};
use tokio::time::Instant;

#[derive(Clone)]
enum Behavior {
    Rows(Vec<RawRow>),
    Fail,
    Hang,
    Panic,
}

/// Source whose answer per collection can be changed mid-test.
struct ScriptedSource {
    behaviors: Mutex<HashMap<Collection, Behavior>>,
    calls: Mutex<HashMap<Collection, usize>>,
    total: AtomicUsize,
    delay: Duration,
}

impl ScriptedSource {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            behaviors: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            total: AtomicUsize::new(0),
            delay,
        })
    }

    fn set(&self, collection: Collection, behavior: Behavior) {
        self.behaviors.lock().unwrap().insert(collection, behavior);
    }

    fn calls(&self, collection: Collection) -> usize {
        self.calls.lock().unwrap().get(&collection).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ContentSource for ScriptedSource {
    async fn fetch_collection(&self, collection: Collection) -> Result<Vec<RawRow>, FetchError> {
        *self.calls.lock().unwrap().entry(collection).or_default() += 1;
        self.total.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(&collection)
            .cloned()
            .unwrap_or(Behavior::Fail);
        match behavior {
            Behavior::Rows(rows) => Ok(rows),
            Behavior::Fail => Err(FetchError::network(collection, "scripted failure")),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Behavior::Panic => panic!("scripted panic"),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn row(v: Value) -> RawRow {
    v.as_object().cloned().expect("row must be an object")
}

fn titled(titles: &[&str]) -> Vec<RawRow> {
    titles
        .iter()
        .map(|t| row(json!({"title": t, "status": "published", "date": "2099-01-01"})))
        .collect()
}

fn policy(freshness: Duration, fetch_timeout: Duration, retry_backoff: Duration) -> CachePolicy {
    CachePolicy {
        freshness,
        fetch_timeout,
        retry_backoff,
    }
}

fn cache_with(source: Arc<ScriptedSource>, freshness: Duration) -> Arc<CollectionCache> {
    let policy = policy(freshness, Duration::from_secs(5), Duration::from_secs(5));
    Arc::new(CollectionCache::new(source, policy))
}

fn status_of(cache: &CollectionCache, collection: Collection) -> CollectionStatus {
    cache
        .status()
        .into_iter()
        .find(|s| s.collection == collection)
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cold_requests_share_one_fetch() {
    let source = ScriptedSource::new(Duration::from_millis(100));
    source.set(Collection::Articles, Behavior::Rows(titled(&["a", "b"])));
    let cache = cache_with(source.clone(), Duration::from_secs(60));

    let mut handles = Vec::new();
    for _ in 0..32 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move { cache.articles().await.len() }));
    }
    for h in handles {
        assert_eq!(h.await.unwrap(), 2);
    }
    assert_eq!(source.calls(Collection::Articles), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cold_failures_share_one_fetch() {
    let source = ScriptedSource::new(Duration::from_millis(100));
    source.set(Collection::Events, Behavior::Fail);
    let cache = cache_with(source.clone(), Duration::from_secs(60));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move { cache.events().await.len() }));
    }
    for h in handles {
        assert_eq!(h.await.unwrap(), 0, "cold failure serves empty");
    }
    assert_eq!(source.calls(Collection::Events), 1);
}

#[tokio::test(start_paused = true)]
async fn fresh_snapshot_is_reused_until_window_expires() {
    let source = ScriptedSource::new(Duration::ZERO);
    let rows = vec![row(json!({"url": "/a.pdf"}))];
    source.set(Collection::Brochures, Behavior::Rows(rows));
    let cache = cache_with(source.clone(), Duration::from_secs(30));

    assert_eq!(cache.brochures().await.len(), 1);
    tokio::time::advance(Duration::from_secs(29)).await;
    assert_eq!(cache.brochures().await.len(), 1);
    assert_eq!(source.calls(Collection::Brochures), 1, "inside window: no refetch");

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(cache.brochures().await.len(), 1);
    assert_eq!(source.calls(Collection::Brochures), 2, "past window: one refetch");
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_serves_previous_snapshot() {
    let source = ScriptedSource::new(Duration::ZERO);
    source.set(Collection::Events, Behavior::Rows(titled(&["Gala", "Expo"])));
    let cache = cache_with(source.clone(), Duration::from_secs(10));

    let first = cache.events().await;
    assert_eq!(first.len(), 2);

    source.set(Collection::Events, Behavior::Fail);
    tokio::time::advance(Duration::from_secs(11)).await;

    let second = cache.events().await;
    assert_eq!(second, first, "stale snapshot served unchanged");
    assert_eq!(source.calls(Collection::Events), 2);

    let status = status_of(&cache, Collection::Events);
    assert_eq!(status.records, 2);
    assert!(!status.fresh);
    assert_eq!(status.last_error_kind, Some("network"));
    assert!(status.retry_in_secs.is_some());

    // Recovery after the backoff replaces the snapshot and clears the error.
    source.set(Collection::Events, Behavior::Rows(titled(&["Gala"])));
    tokio::time::advance(Duration::from_secs(6)).await;
    let third = cache.events().await;
    assert_eq!(third.len(), 1);
    let status = status_of(&cache, Collection::Events);
    assert!(status.fresh);
    assert_eq!(status.last_error, None);
    assert_eq!(status.retry_in_secs, None);
}

#[tokio::test]
async fn one_failing_collection_does_not_affect_others() {
    let source = ScriptedSource::new(Duration::ZERO);
    source.set(Collection::Articles, Behavior::Rows(titled(&["News"])));
    source.set(Collection::Events, Behavior::Fail);
    let popups = vec![row(json!({"text": "hi", "isActive": "true"}))];
    source.set(Collection::Popups, Behavior::Rows(popups));
    source.set(Collection::Brochures, Behavior::Fail);
    let cache = cache_with(source.clone(), Duration::from_secs(60));

    let page = cache.page_content().await;
    assert_eq!(page.articles.len(), 1);
    assert!(page.events.is_empty());
    assert_eq!(page.popups.len(), 1);
    assert!(page.brochures.is_empty());
    assert_eq!(source.total.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn hung_source_times_out_to_empty() {
    let source = ScriptedSource::new(Duration::ZERO);
    source.set(Collection::Popups, Behavior::Hang);
    let policy = policy(
        Duration::from_secs(60),
        Duration::from_secs(2),
        Duration::from_secs(10),
    );
    let cache = CollectionCache::new(source.clone(), policy);

    assert!(cache.popups().await.is_empty());
    let status = status_of(&cache, Collection::Popups);
    assert_eq!(status.last_error_kind, Some("network"));
    assert!(status.last_error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn panicking_source_is_contained() {
    let source = ScriptedSource::new(Duration::ZERO);
    source.set(Collection::Articles, Behavior::Panic);
    let cache = cache_with(source.clone(), Duration::from_secs(60));

    assert!(cache.articles().await.is_empty());
    let status = status_of(&cache, Collection::Articles);
    assert_eq!(status.last_error_kind, Some("network"));
}

#[tokio::test]
async fn invalidate_forces_refresh_but_keeps_fallback() {
    let source = ScriptedSource::new(Duration::ZERO);
    source.set(Collection::Articles, Behavior::Rows(titled(&["one"])));
    let cache = cache_with(source.clone(), Duration::from_secs(600));

    assert_eq!(cache.articles().await.len(), 1);
    source.set(Collection::Articles, Behavior::Rows(titled(&["one", "two"])));
    assert_eq!(cache.articles().await.len(), 1, "still fresh");

    cache.invalidate(Collection::Articles);
    assert_eq!(cache.articles().await.len(), 2);
    assert_eq!(source.calls(Collection::Articles), 2);

    source.set(Collection::Articles, Behavior::Fail);
    cache.invalidate_all();
    assert_eq!(cache.articles().await.len(), 2, "failed refresh keeps snapshot");
    assert_eq!(source.calls(Collection::Articles), 3);
}

#[tokio::test(start_paused = true)]
async fn concurrent_stale_requests_share_one_refresh() {
    let source = ScriptedSource::new(Duration::from_secs(1));
    source.set(Collection::Articles, Behavior::Rows(titled(&["a"])));
    let cache = cache_with(source.clone(), Duration::from_secs(10));
    assert_eq!(cache.articles().await.len(), 1);

    source.set(Collection::Articles, Behavior::Rows(titled(&["a", "b"])));
    tokio::time::advance(Duration::from_secs(11)).await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move { cache.articles().await.len() }));
    }
    for h in handles {
        assert_eq!(h.await.unwrap(), 2, "every waiter gets the refreshed snapshot");
    }
    assert_eq!(source.calls(Collection::Articles), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_backs_off_before_retrying() {
    let source = ScriptedSource::new(Duration::ZERO);
    source.set(Collection::Events, Behavior::Rows(titled(&["Gala"])));
    let policy = policy(
        Duration::from_secs(10),
        Duration::from_secs(2),
        Duration::from_secs(30),
    );
    let cache = CollectionCache::new(source.clone(), policy);
    assert_eq!(cache.events().await.len(), 1);

    source.set(Collection::Events, Behavior::Hang);
    tokio::time::advance(Duration::from_secs(11)).await;

    let started = Instant::now();
    assert_eq!(cache.events().await.len(), 1);
    assert!(started.elapsed() >= Duration::from_secs(2), "first request waits out the timeout");
    assert_eq!(source.calls(Collection::Events), 2);

    for _ in 0..4 {
        let started = Instant::now();
        assert_eq!(cache.events().await.len(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
    assert_eq!(source.calls(Collection::Events), 2, "no fetch during backoff");

    source.set(Collection::Events, Behavior::Rows(titled(&["Gala", "Expo"])));
    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(cache.events().await.len(), 2);
    assert_eq!(source.calls(Collection::Events), 3);
}

#[tokio::test(start_paused = true)]
async fn cold_failure_backs_off_until_invalidated() {
    let source = ScriptedSource::new(Duration::ZERO);
    source.set(Collection::Popups, Behavior::Fail);
    let cache = cache_with(source.clone(), Duration::from_secs(60));

    assert!(cache.popups().await.is_empty());
    assert!(cache.popups().await.is_empty());
    assert_eq!(source.calls(Collection::Popups), 1);
    assert!(status_of(&cache, Collection::Popups).retry_in_secs.is_some());

    cache.invalidate(Collection::Popups);
    assert!(cache.popups().await.is_empty());
    assert_eq!(source.calls(Collection::Popups), 2);
}

#[tokio::test(start_paused = true)]
async fn dropped_caller_does_not_cause_a_second_fetch() {
    let source = ScriptedSource::new(Duration::from_secs(1));
    source.set(Collection::Events, Behavior::Rows(titled(&["Gala"])));
    let cache = cache_with(source.clone(), Duration::from_secs(60));

    let leader = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.events().await })
    };
    while source.calls(Collection::Events) == 0 {
        tokio::task::yield_now().await;
    }
    leader.abort();
    assert!(leader.await.unwrap_err().is_cancelled());

    // The abandoned attempt still completes and is shared with the next caller.
    assert_eq!(cache.events().await.len(), 1);
    assert_eq!(source.calls(Collection::Events), 1);
    assert_eq!(status_of(&cache, Collection::Events).attempts, 1);
}
