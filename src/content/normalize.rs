// src/content/normalize.rs
//! Field normalizer: turns loosely-typed rows into canonical records.
//!
//! Every function here is total. A bad field degrades to its neutral default;
//! a row that cannot become a usable record is dropped and counted, never
//! escalated.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use metrics::counter;
use serde_json::Value;

use crate::content::error::ValidationError;
use crate::content::model::{
    Article, Brochure, CollectionData, Event, Popup, PublicationStatus, RawRow,
};
use crate::content::Collection;

/// Boolean coercion shared by every pinned/active-style flag.
///
/// `true` only for native `true` or a string that is `"true"` after trimming,
/// compared case-insensitively. Anything else, absence included, is `false`.
pub fn coerce_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Date coercion. `None` stands for "oldest possible": it orders before any
/// parsed date and never counts as upcoming.
pub fn coerce_date(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(s) => parse_date_str(s.trim()),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    DateTime::parse_from_rfc2822(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Text coercion: trimmed strings, numbers rendered as text, else empty.
pub fn coerce_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// List of strings from an array (non-string items skipped) or a
/// comma-separated string. Empty entries are removed.
pub fn coerce_list(value: Option<&Value>) -> Vec<String> {
    let items: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .collect(),
        Some(Value::String(s)) => s.split(',').map(|p| p.trim().to_string()).collect(),
        _ => Vec::new(),
    };
    items.into_iter().filter(|s| !s.is_empty()).collect()
}

/// Integer coercion; accepts numbers and numeric strings, defaults to 0.
pub fn coerce_int(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

pub fn coerce_status(value: Option<&Value>) -> PublicationStatus {
    match value {
        Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("published") => {
            PublicationStatus::Published
        }
        _ => PublicationStatus::Draft,
    }
}

/// First non-null field among `names` (editors' schemas mix camelCase and
/// snake_case for the same field).
fn field<'a>(row: &'a RawRow, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|n| row.get(*n))
        .find(|v| !v.is_null())
}

fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut dash = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            dash = false;
        } else if !dash && !out.is_empty() {
            out.push('-');
            dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// A record type the normalizer can build from one raw row.
pub trait Record: Sized + Clone + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn from_row(row: &RawRow) -> Result<Self, ValidationError>;

    fn into_data(records: Vec<Self>) -> CollectionData;

    /// Typed view of a snapshot; `None` if it belongs to another collection.
    fn from_data(data: &CollectionData) -> Option<Arc<Vec<Self>>>;
}

impl Record for Article {
    const COLLECTION: Collection = Collection::Articles;

    fn from_row(row: &RawRow) -> Result<Self, ValidationError> {
        let title = coerce_text(field(row, &["title"]));
        let mut slug = coerce_text(field(row, &["slug"]));
        if slug.is_empty() {
            slug = slugify(&title);
        }
        if title.is_empty() && slug.is_empty() {
            return Err(ValidationError::UntitledArticle);
        }
        Ok(Article {
            id: coerce_text(field(row, &["id", "_id", "uuid"])),
            title,
            slug,
            excerpt: coerce_text(field(row, &["excerpt", "summary"])),
            body: coerce_text(field(row, &["body", "content"])),
            cover_image: coerce_text(field(row, &["coverImage", "cover_image", "image"])),
            category: coerce_text(field(row, &["category"])),
            tags: coerce_list(field(row, &["tags"])),
            status: coerce_status(field(row, &["status"])),
            published_at: coerce_date(field(row, &["publishedAt", "published_at", "date"])),
        })
    }

    fn into_data(records: Vec<Self>) -> CollectionData {
        CollectionData::Articles(Arc::new(records))
    }

    fn from_data(data: &CollectionData) -> Option<Arc<Vec<Self>>> {
        match data {
            CollectionData::Articles(v) => Some(Arc::clone(v)),
            _ => None,
        }
    }
}

impl Record for Event {
    const COLLECTION: Collection = Collection::Events;

    fn from_row(row: &RawRow) -> Result<Self, ValidationError> {
        let title = coerce_text(field(row, &["title"]));
        if title.is_empty() {
            return Err(ValidationError::UntitledEvent);
        }
        Ok(Event {
            id: coerce_text(field(row, &["id", "_id", "uuid"])),
            title,
            date: coerce_date(field(row, &["date", "startsAt", "starts_at"])),
            location: coerce_text(field(row, &["location"])),
            link: coerce_text(field(row, &["link", "url"])),
            status: coerce_status(field(row, &["status"])),
            pinned: coerce_bool(field(row, &["isPinned", "is_pinned", "pinned"])),
        })
    }

    fn into_data(records: Vec<Self>) -> CollectionData {
        CollectionData::Events(Arc::new(records))
    }

    fn from_data(data: &CollectionData) -> Option<Arc<Vec<Self>>> {
        match data {
            CollectionData::Events(v) => Some(Arc::clone(v)),
            _ => None,
        }
    }
}

impl Record for Popup {
    const COLLECTION: Collection = Collection::Popups;

    fn from_row(row: &RawRow) -> Result<Self, ValidationError> {
        let popup = Popup {
            id: coerce_text(field(row, &["id", "_id", "uuid"])),
            active: coerce_bool(field(row, &["isActive", "is_active", "active"])),
            title: coerce_text(field(row, &["title"])),
            text: coerce_text(field(row, &["text", "message", "body"])),
            link: coerce_text(field(row, &["link", "url", "ctaUrl"])),
        };
        if popup.title.is_empty() && popup.text.is_empty() && popup.link.is_empty() {
            return Err(ValidationError::EmptyPopup);
        }
        Ok(popup)
    }

    fn into_data(records: Vec<Self>) -> CollectionData {
        CollectionData::Popups(Arc::new(records))
    }

    fn from_data(data: &CollectionData) -> Option<Arc<Vec<Self>>> {
        match data {
            CollectionData::Popups(v) => Some(Arc::clone(v)),
            _ => None,
        }
    }
}

impl Record for Brochure {
    const COLLECTION: Collection = Collection::Brochures;

    fn from_row(row: &RawRow) -> Result<Self, ValidationError> {
        let url = coerce_text(field(row, &["downloadUrl", "download_url", "url", "file"]));
        if url.is_empty() {
            return Err(ValidationError::MissingBrochureUrl);
        }
        Ok(Brochure {
            id: coerce_text(field(row, &["id", "_id", "uuid"])),
            title: coerce_text(field(row, &["title", "name"])),
            url,
            display_order: coerce_int(field(row, &["displayOrder", "display_order", "order"])),
        })
    }

    fn into_data(records: Vec<Self>) -> CollectionData {
        CollectionData::Brochures(Arc::new(records))
    }

    fn from_data(data: &CollectionData) -> Option<Arc<Vec<Self>>> {
        match data {
            CollectionData::Brochures(v) => Some(Arc::clone(v)),
            _ => None,
        }
    }
}

/// Normalize rows into records of one type, keeping source order.
pub fn normalize_rows<T: Record>(rows: &[RawRow]) -> Vec<T> {
    let mut out = Vec::with_capacity(rows.len());
    let mut dropped = 0u64;
    for (idx, row) in rows.iter().enumerate() {
        match T::from_row(row) {
            Ok(record) => out.push(record),
            Err(e) => {
                dropped += 1;
                tracing::debug!(
                    target: "content",
                    collection = %T::COLLECTION,
                    row = idx,
                    reason = %e,
                    "row dropped"
                );
            }
        }
    }
    if dropped > 0 {
        counter!("content_rows_dropped_total", "collection" => T::COLLECTION.as_str())
            .increment(dropped);
    }
    out
}

/// Normalize rows for a collection chosen at runtime.
pub fn normalize(collection: Collection, rows: &[RawRow]) -> CollectionData {
    match collection {
        Collection::Articles => Article::into_data(normalize_rows(rows)),
        Collection::Events => Event::into_data(normalize_rows(rows)),
        Collection::Popups => Popup::into_data(normalize_rows(rows)),
        Collection::Brochures => Brochure::into_data(normalize_rows(rows)),
    }
}
