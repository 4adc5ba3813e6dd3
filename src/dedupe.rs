//! Content fingerprints and the duplicate gate.
//!
//! The pipeline checks the fingerprint of every candidate before any rewrite
//! or page scrape happens, so already-ingested content costs one lookup.

use crate::error::PersistenceError;
use crate::store::Persistence;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

/// SHA-256 hex of `lowercase(trim(title) + trim(url))`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(fingerprint("Foo Bar", "http://x/y"), fingerprint("foo bar ", "http://x/y "));
/// ```
pub fn fingerprint(title: &str, url: &str) -> String {
    let key = format!("{}{}", title.trim(), url.trim()).to_lowercase();
    let digest = Sha256::digest(key.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Duplicate check backed by the record store.
#[derive(Clone)]
pub struct Deduplicator {
    store: Arc<dyn Persistence>,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self { store }
    }

    /// Whether a record with `hash` was already stored.
    pub async fn is_duplicate(&self, hash: &str) -> Result<bool, PersistenceError> {
        let seen = self.store.exists_by_fingerprint(hash).await?;
        if seen {
            debug!(%hash, "Fingerprint already stored");
        }
        Ok(seen)
    }
}
