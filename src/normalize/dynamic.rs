//! Heuristic parsing for providers of unknown shape.
//!
//! The item list is whatever [`find_record_list`] turns up first. This is a
//! best-effort fallback and not schema inference: responses that nest their
//! items more than one level deep produce nothing.

use super::news::clean_content;
use super::records;
use crate::models::ContentItem;
use crate::record::find_record_list;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

pub(super) fn parse(raw: &Value) -> Vec<ContentItem> {
    let Some(list) = find_record_list(raw) else {
        debug!("No list of records found in response");
        return Vec::new();
    };

    records(list, "dynamic")
        .filter_map(|r| {
            let url = r.get_string(&["url", "link"], "");
            let content = clean_content(&r.get_string(&["description", "summary", "text"], ""));
            let title = match r.get_opt(&["title", "name"]) {
                Some(t) => t,
                None if url.is_empty() && content.is_empty() => {
                    debug!("Skipped record: no title, url or text");
                    return None;
                }
                None => placeholder_title(&url, &content),
            };
            Some(ContentItem {
                title,
                content,
                url,
                image: r.get_opt(&["image", "icon", "urlToImage", "thumbnail"]),
                category: r.get_string(&["category"], "Uncategorized"),
                provider: r.get_string(&["source.name", "provider"], "unknown"),
                post_type: "post".to_string(),
                published_at: r.get_opt(&["publishedAt", "published_at", "pubDate", "date"]),
            })
        })
        .collect()
}

/// Stable title for untitled records, distinct per url/text pair.
fn placeholder_title(url: &str, content: &str) -> String {
    let digest = Sha256::new()
        .chain_update(url.as_bytes())
        .chain_update([0u8])
        .chain_update(content.as_bytes())
        .finalize();
    let short: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();
    format!("Untitled {short}")
}
