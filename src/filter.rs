//! Caller-side listing filters. The client returns what the API sent; these
//! narrow it down for display.

use crate::model::{CatalogEntry, VideoSummary};
use chrono::{DateTime, Utc};
use foldhash::HashSet;

/// Drops entries whose name contains any of `patterns` (case-insensitive).
pub fn exclude_names<T: CatalogEntry>(items: Vec<T>, patterns: &[String]) -> Vec<T> {
    let patterns: Vec<String> = patterns
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect();
    if patterns.is_empty() {
        return items;
    }

    items
        .into_iter()
        .filter(|item| {
            let name = item.name().to_lowercase();
            !patterns.iter().any(|p| name.contains(p.as_str()))
        })
        .collect()
}

/// Keeps videos published strictly after `since`. Undated videos are dropped.
pub fn published_after(videos: Vec<VideoSummary>, since: DateTime<Utc>) -> Vec<VideoSummary> {
    videos
        .into_iter()
        .filter(|video| video.published_at.is_some_and(|at| at > since))
        .collect()
}

/// Keeps the first entry for each id, in order.
pub fn dedup_by_id<T: CatalogEntry>(items: Vec<T>) -> Vec<T> {
    let mut seen: HashSet<u64> = HashSet::default();
    items
        .into_iter()
        .filter(|item| seen.insert(item.id()))
        .collect()
}
