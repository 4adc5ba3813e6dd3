//! Normalization of raw provider responses into [`ContentItem`]s.
//!
//! [`normalize`] dispatches on the provider's declared [`ContentType`]:
//!
//! | type | item list | required |
//! |---|---|---|
//! | `news` | `articles`, `news` or root list | title, absolute url, 10 words |
//! | `product` | `items`, `products` or root list | name |
//! | `crypto` | `data` or root list | name and symbol |
//! | anything else | first list of records (one nesting level) | nothing |
//!
//! Every branch reads fields through [`LooseRecord`], skips malformed
//! elements with a logged reason and never fails as a whole.

mod crypto;
mod dynamic;
mod news;
mod product;

use crate::models::{ContentItem, ContentType};
use crate::record::LooseRecord;
use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

/// Normalize a raw response according to `content_type`.
///
/// # Arguments
///
/// * `raw` - Response returned by the fetcher
/// * `content_type` - Declared type of the provider
///
/// # Returns
///
/// The items that passed every check, in response order. An unrecognised
/// shape yields an empty vector.
#[instrument(level = "info", skip_all, fields(%content_type))]
pub fn normalize(raw: &Value, content_type: ContentType) -> Vec<ContentItem> {
    let items = match content_type {
        ContentType::News => news::parse(raw),
        ContentType::Product => product::parse(raw),
        ContentType::Crypto => crypto::parse(raw),
        ContentType::Other => dynamic::parse(raw),
    };
    info!(count = items.len(), "Normalized items");
    items
}

/// Iterate the object elements of `list`, logging and skipping anything else.
fn records<'a>(list: &'a [Value], branch: &'static str) -> impl Iterator<Item = LooseRecord<'a>> + 'a {
    list.iter().enumerate().filter_map(move |(index, v)| {
        let record = LooseRecord::new(v);
        if record.is_none() {
            debug!(branch, index, "Skipped item: not a record");
        }
        record
    })
}

/// Trimmed `s` if it parses as an absolute http(s) URL.
fn absolute_url(s: &str) -> Option<String> {
    let url = Url::parse(s.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| s.trim().to_string())
}
