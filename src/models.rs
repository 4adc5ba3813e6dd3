//! Data models for imported content and the records handed to persistence.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`ContentType`]: How a provider's response should be interpreted
//! - [`ContentItem`]: The canonical item produced by the normalizer
//! - [`FinishedRecord`]: An item after rewrite, image resolution and scoring
//! - [`RewriteAttempt`]: One step of the rewrite retry loop, for logging/tests
//! - [`ImportSummary`]: Aggregate counts returned by a run
//! - [`FixImagesSummary`]: Counts from backfilling missing images

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Declared shape of a provider's content.
///
/// Unknown strings deserialize to [`ContentType::Other`], which routes the
/// response through the heuristic parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    News,
    Product,
    Crypto,
    #[serde(other)]
    Other,
}

impl ContentType {
    /// Minimum word count an item's source text must reach to be kept.
    pub fn min_words(self) -> usize {
        match self {
            ContentType::News => 10,
            ContentType::Product | ContentType::Crypto | ContentType::Other => 0,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContentType::News => "news",
            ContentType::Product => "product",
            ContentType::Crypto => "crypto",
            ContentType::Other => "other",
        };
        f.write_str(s)
    }
}

/// A normalized content item.
///
/// `content` and `image` are filled in further by the rewriter and the image
/// resolver before the item is frozen into a [`FinishedRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub title: String,
    pub content: String,
    pub url: String,
    pub image: Option<String>,
    pub category: String,
    pub provider: String,
    pub post_type: String,
    pub published_at: Option<String>,
}

/// How the rewrite stage ended for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewriteStatus {
    Success,
    Failed,
    Skipped,
}

/// Classification of a single rewrite attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    TooShort,
    Empty,
    Error { rate_limited: bool },
}

/// One attempt of the rewrite loop. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteAttempt {
    pub attempt_number: u32,
    pub outcome: AttemptOutcome,
    pub wait_before_next_secs: u64,
}

/// A content item ready for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishedRecord {
    #[serde(flatten)]
    pub item: ContentItem,
    pub content_hash: String,
    pub rewrite_status: RewriteStatus,
    pub trend_score: u8,
    pub tags: Vec<String>,
    /// Id of the API the item came from.
    pub source_api: String,
    pub category_id: Option<u64>,
    pub status: String,
    pub imported_at: String,
}

/// Per-provider counters collected during an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProviderCounts {
    pub normalized: usize,
    pub duplicates: usize,
    pub created: usize,
    pub failed: usize,
    pub rewrite_failed: usize,
    pub error: Option<String>,
}

/// Result of a full import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub created: usize,
    pub per_provider: BTreeMap<String, ProviderCounts>,
}

/// Result of a `fix-images` pass over stored records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FixImagesSummary {
    pub scanned: usize,
    pub fixed: usize,
    pub unresolved: usize,
    pub failed: usize,
    pub dry_run: bool,
}
