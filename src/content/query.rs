// src/content/query.rs
//! Query layer: pure views over already-normalized collections.
//!
//! Nothing here fetches or fails. Every helper is total over any input,
//! including the empty slice, and sorts are stable.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::content::model::{Article, Brochure, Event, Popup, Publishable};

/// Keep only records with `published` status.
pub fn filter_published<T: Publishable + Clone>(records: &[T]) -> Vec<T> {
    records
        .iter()
        .filter(|r| r.status().is_published())
        .cloned()
        .collect()
}

/// Keep articles whose publication timestamp parsed.
pub fn filter_dated(articles: &[Article]) -> Vec<Article> {
    articles
        .iter()
        .filter(|a| a.published_at.is_some())
        .cloned()
        .collect()
}

/// Keep events that are pinned or dated at/after `now`. Undated events only
/// survive when pinned.
pub fn filter_upcoming_or_pinned(events: &[Event], now: DateTime<Utc>) -> Vec<Event> {
    events
        .iter()
        .filter(|e| e.pinned || e.date.is_some_and(|d| d >= now))
        .cloned()
        .collect()
}

/// Pinned first in their original order, then the rest ascending by date.
pub fn sort_pinned_then_date(mut events: Vec<Event>) -> Vec<Event> {
    events.sort_by(|a, b| match (a.pinned, b.pinned) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.date.cmp(&b.date),
    });
    events
}

/// Newest first; ties keep their order and undated articles go last.
pub fn sort_by_date_descending(mut articles: Vec<Article>) -> Vec<Article> {
    articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    articles
}

/// First `n` records, or all of them when there are fewer.
pub fn take<T: Clone>(records: &[T], n: usize) -> Vec<T> {
    records.iter().take(n).cloned().collect()
}

/// The authoritative popup: first active one in source order.
pub fn first_active(popups: &[Popup]) -> Option<&Popup> {
    popups.iter().find(|p| p.active)
}

/// Primary catalog link: first brochure's URL, else `fallback_url`.
pub fn first_or_default(brochures: &[Brochure], fallback_url: &str) -> String {
    brochures
        .first()
        .map(|b| b.url.clone())
        .unwrap_or_else(|| fallback_url.to_string())
}

/// Published, dated articles, newest first, at most `n`.
pub fn latest_articles(articles: &[Article], n: usize) -> Vec<Article> {
    let published = filter_published(articles);
    let sorted = sort_by_date_descending(filter_dated(&published));
    take(&sorted, n)
}

/// Published events that are pinned or upcoming, pinned first, at most `n`.
pub fn upcoming_events(events: &[Event], now: DateTime<Utc>, n: usize) -> Vec<Event> {
    let published = filter_published(events);
    let sorted = sort_pinned_then_date(filter_upcoming_or_pinned(&published, now));
    take(&sorted, n)
}
