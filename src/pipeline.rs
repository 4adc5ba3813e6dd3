//! Import orchestration.
//!
//! [`Importer::run_import`] drives every provider through
//!
//! ```text
//! fetch -> normalize -> [dedupe gate] -> rewrite -> image -> affiliate -> score -> save
//! ```
//!
//! Providers run concurrently (bounded by `concurrency`); items within one
//! provider run in order. Nothing that goes wrong for a single item or
//! provider aborts the batch: fetch errors end that provider, item failures
//! are counted, and a failed rewrite keeps the original content.

use crate::affiliate::AffiliateLinker;
use crate::config::{DEFAULT_TRENDING, ProviderConfig};
use crate::dedupe::{Deduplicator, fingerprint};
use crate::error::{PersistenceError, RewriteFailure};
use crate::fetch::{Args, Fetcher};
use crate::images::ImageResolver;
use crate::models::{ContentItem, FinishedRecord, FixImagesSummary, ImportSummary, ProviderCounts, RewriteStatus};
use crate::normalize::normalize;
use crate::rewrite::{Cancellation, Rewriter};
use crate::store::Persistence;
use crate::trends::{extract_keywords, score, tags};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Status given to every stored record.
const RECORD_STATUS: &str = "draft";

/// How one candidate item ended.
#[derive(Debug)]
enum ItemOutcome {
    Created(RewriteStatus),
    Duplicate,
    Failed,
    Cancelled,
}

pub struct Importer {
    fetcher: Fetcher,
    store: Arc<dyn Persistence>,
    dedupe: Deduplicator,
    rewriter: Rewriter,
    images: ImageResolver,
    affiliate: Option<AffiliateLinker>,
    trending: Vec<String>,
    concurrency: usize,
}

impl Importer {
    pub fn new(fetcher: Fetcher, store: Arc<dyn Persistence>, rewriter: Rewriter, images: ImageResolver) -> Self {
        Self {
            fetcher,
            dedupe: Deduplicator::new(store.clone()),
            store,
            rewriter,
            images,
            affiliate: None,
            trending: DEFAULT_TRENDING.iter().map(|s| s.to_string()).collect(),
            concurrency: 4,
        }
    }

    pub fn with_affiliate(mut self, linker: AffiliateLinker) -> Self {
        self.affiliate = linker.is_enabled().then_some(linker);
        self
    }

    pub fn with_trending(mut self, trending: Vec<String>) -> Self {
        self.trending = trending;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Import from every provider and report what happened.
    ///
    /// # Arguments
    ///
    /// * `providers` - Validated provider list
    /// * `cancel` - Stops pending work; items already saved stay saved
    ///
    /// # Returns
    ///
    /// Total records created plus per-provider counters keyed by `api/endpoint`.
    #[instrument(level = "info", skip_all, fields(providers = providers.len(), concurrency = self.concurrency))]
    pub async fn run_import(&self, providers: &[ProviderConfig], cancel: &Cancellation) -> ImportSummary {
        if providers.is_empty() {
            warn!("No providers configured; nothing to import");
            return ImportSummary::default();
        }

        let t0 = Instant::now();
        let results: Vec<(String, ProviderCounts)> = stream::iter(providers)
            .map(|provider| async move { (provider.key(), self.import_provider(provider, cancel).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut summary = ImportSummary::default();
        for (key, counts) in results {
            summary.created += counts.created;
            let entry = summary.per_provider.entry(key).or_default();
            merge_counts(entry, counts);
        }

        info!(
            created = summary.created,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            cancelled = cancel.is_cancelled(),
            "Import finished"
        );
        summary
    }

    #[instrument(level = "info", skip_all, fields(provider = %provider.key(), content_type = %provider.content_type))]
    async fn import_provider(&self, provider: &ProviderConfig, cancel: &Cancellation) -> ProviderCounts {
        let mut counts = ProviderCounts::default();
        if cancel.is_cancelled() {
            counts.error = Some("cancelled".to_string());
            return counts;
        }

        let raw = match self.fetcher.fetch(provider, &Args::new()).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "Fetch failed; skipping provider");
                counts.error = Some(e.to_string());
                return counts;
            }
        };

        let items = normalize(&raw, provider.content_type);
        counts.normalized = items.len();

        for item in items {
            if cancel.is_cancelled() {
                warn!("Import cancelled; leaving remaining items");
                counts.error = Some("cancelled".to_string());
                break;
            }
            match self.process_item(provider, item, cancel).await {
                ItemOutcome::Created(status) => {
                    counts.created += 1;
                    if status == RewriteStatus::Failed {
                        counts.rewrite_failed += 1;
                    }
                }
                ItemOutcome::Duplicate => counts.duplicates += 1,
                ItemOutcome::Failed => counts.failed += 1,
                ItemOutcome::Cancelled => {
                    counts.error = Some("cancelled".to_string());
                    break;
                }
            }
        }

        info!(
            normalized = counts.normalized,
            created = counts.created,
            duplicates = counts.duplicates,
            failed = counts.failed,
            rewrite_failed = counts.rewrite_failed,
            "Provider done"
        );
        counts
    }

    async fn process_item(&self, provider: &ProviderConfig, mut item: ContentItem, cancel: &Cancellation) -> ItemOutcome {
        let hash = fingerprint(&item.title, &item.url);
        match self.dedupe.is_duplicate(&hash).await {
            Ok(true) => {
                debug!(title = %item.title, url = %item.url, "Skipping duplicate");
                return ItemOutcome::Duplicate;
            }
            Ok(false) => {}
            Err(e) => {
                error!(title = %item.title, url = %item.url, error = %e, "Duplicate check failed; skipping item");
                return ItemOutcome::Failed;
            }
        }

        let rewrite_status = if provider.rewrite_enabled {
            match self.rewriter.rewrite(&item.content, cancel).await {
                Ok(text) => {
                    item.content = text;
                    RewriteStatus::Success
                }
                Err(RewriteFailure::Cancelled { attempts }) => {
                    warn!(title = %item.title, attempts, "Rewrite cancelled; item not saved");
                    return ItemOutcome::Cancelled;
                }
                Err(e @ RewriteFailure::Exhausted { .. }) => {
                    warn!(title = %item.title, url = %item.url, error = %e, "Rewrite failed; keeping original content");
                    RewriteStatus::Failed
                }
                Err(e @ RewriteFailure::Unavailable(_)) => {
                    debug!(title = %item.title, error = %e, "Rewrite skipped");
                    RewriteStatus::Skipped
                }
            }
        } else {
            RewriteStatus::Skipped
        };

        item.image = self.images.resolve(&item).await;
        if item.image.is_none() {
            debug!(title = %item.title, url = %item.url, "No image resolved");
        }

        if let Some(linker) = &self.affiliate {
            item.content = linker.apply(&item.content);
        }

        let keywords = extract_keywords(&item.content);
        let trend_score = score(&keywords, &self.trending);
        let tags = tags(&keywords, trend_score);

        let category_id = self.category_id(&item.category).await;

        let record = FinishedRecord {
            item,
            content_hash: hash,
            rewrite_status,
            trend_score,
            tags,
            source_api: provider.api_id.clone(),
            category_id,
            status: RECORD_STATUS.to_string(),
            imported_at: chrono::Utc::now().to_rfc3339(),
        };

        match self.store.save(&record).await {
            Ok(id) => {
                info!(
                    id,
                    title = %record.item.title,
                    rewrite_status = ?record.rewrite_status,
                    trend_score = record.trend_score,
                    "Record created"
                );
                ItemOutcome::Created(record.rewrite_status)
            }
            Err(PersistenceError::Conflict(_)) => {
                info!(title = %record.item.title, url = %record.item.url, "Already stored by a concurrent import");
                ItemOutcome::Duplicate
            }
            Err(e) => {
                error!(title = %record.item.title, url = %record.item.url, error = %e, "Failed to save record");
                ItemOutcome::Failed
            }
        }
    }

    async fn category_id(&self, category: &str) -> Option<u64> {
        let category = category.trim();
        if category.is_empty() {
            return None;
        }
        match self.store.create_category_if_missing(category).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(%category, error = %e, "Could not resolve category");
                None
            }
        }
    }

    /// Re-run image resolution for stored records that have none.
    ///
    /// Records are visited in id order, `batch_size` at a time. With
    /// `dry_run` nothing is written; found images are only logged.
    ///
    /// # Errors
    ///
    /// Only a failure to list records aborts the pass. Failures to update
    /// one record are counted in [`FixImagesSummary::failed`].
    #[instrument(level = "info", skip_all, fields(batch_size = batch_size, dry_run = dry_run))]
    pub async fn fix_images(
        &self,
        batch_size: usize,
        dry_run: bool,
        cancel: &Cancellation,
    ) -> Result<FixImagesSummary, PersistenceError> {
        let batch_size = batch_size.max(1);
        let mut summary = FixImagesSummary {
            dry_run,
            ..FixImagesSummary::default()
        };
        let mut after_id = 0;

        'batches: loop {
            let batch = self.store.records_without_image(after_id, batch_size).await?;
            if batch.is_empty() {
                break;
            }
            debug!(records = batch.len(), after_id, "Processing image batch");

            for stored in batch {
                if cancel.is_cancelled() {
                    warn!("Image fix cancelled");
                    break 'batches;
                }
                after_id = stored.id;
                summary.scanned += 1;

                let Some(image) = self.images.from_page(&stored.record.item.url).await else {
                    summary.unresolved += 1;
                    continue;
                };
                if dry_run {
                    info!(id = stored.id, %image, "Would set image");
                    summary.fixed += 1;
                    continue;
                }
                match self.store.set_image(stored.id, &image).await {
                    Ok(()) => {
                        info!(id = stored.id, %image, "Image set");
                        summary.fixed += 1;
                    }
                    Err(e) => {
                        error!(id = stored.id, error = %e, "Failed to set image");
                        summary.failed += 1;
                    }
                }
            }
        }

        info!(
            scanned = summary.scanned,
            fixed = summary.fixed,
            unresolved = summary.unresolved,
            failed = summary.failed,
            "Image fix finished"
        );
        Ok(summary)
    }
}

fn merge_counts(into: &mut ProviderCounts, from: ProviderCounts) {
    into.normalized += from.normalized;
    into.duplicates += from.duplicates;
    into.created += from.created;
    into.failed += from.failed;
    into.rewrite_failed += from.rewrite_failed;
    if from.error.is_some() {
        into.error = from.error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AiProvider;
    use crate::error::{AiError, FetchError, ImageError};
    use crate::fetch::ApiGateway;
    use crate::images::PageFetcher;
    use crate::models::ContentType;
    use crate::rewrite::{Pause, RetryPolicy};
    use crate::store::FileStore;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Serves one canned response per `api/endpoint`; unknown ones are missing.
    struct CannedGateway {
        responses: BTreeMap<String, Value>,
    }

    #[async_trait]
    impl ApiGateway for CannedGateway {
        async fn call(&self, api_id: &str, endpoint_id: &str, _args: &Args) -> Result<Value, FetchError> {
            self.responses
                .get(&format!("{api_id}/{endpoint_id}"))
                .cloned()
                .ok_or_else(|| FetchError::GatewayMissing {
                    api_id: api_id.to_string(),
                    endpoint_id: endpoint_id.to_string(),
                })
        }
    }

    enum AiMode {
        Empty,
        Echo,
    }

    struct StubAi {
        mode: AiMode,
        calls: AtomicU32,
    }

    #[async_trait]
    impl AiProvider for StubAi {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn rewrite(&self, text: &str) -> Result<String, AiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                AiMode::Empty => Ok(String::new()),
                AiMode::Echo => Ok(format!("Rewritten: {text}")),
            }
        }
    }

    #[derive(Default)]
    struct NoWait {
        waits: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Pause for NoWait {
        async fn pause(&self, duration: Duration) {
            self.waits.lock().unwrap().push(duration);
        }
    }

    struct Pages {
        html: Option<String>,
    }

    #[async_trait]
    impl PageFetcher for Pages {
        async fn get_html(&self, _url: &str, _timeout: Duration) -> Result<(u16, String), ImageError> {
            match &self.html {
                Some(h) => Ok((200, h.clone())),
                None => Ok((404, String::new())),
            }
        }
    }

    fn article(n: usize, body: &str) -> Value {
        json!({
            "title": format!("Story {n}"),
            "url": format!("https://news.example.com/{n}"),
            "content": body,
            "category": "World"
        })
    }

    fn long_body() -> String {
        "Bitcoin and Nvidia shares moved as Apple and Tesla reported results while markets watched closely today"
            .to_string()
    }

    fn news_provider(rewrite: bool) -> ProviderConfig {
        ProviderConfig {
            api_id: "newsapi".into(),
            endpoint_id: "top".into(),
            content_type: ContentType::News,
            rewrite_enabled: rewrite,
        }
    }

    struct Harness {
        importer: Importer,
        store: Arc<FileStore>,
        ai: Arc<StubAi>,
        pause: Arc<NoWait>,
    }

    fn harness(responses: Vec<(&str, Value)>, ai_mode: AiMode, page_html: Option<&str>) -> Harness {
        let gateway = Arc::new(CannedGateway {
            responses: responses.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        });
        let store = Arc::new(FileStore::in_memory());
        let ai = Arc::new(StubAi {
            mode: ai_mode,
            calls: AtomicU32::new(0),
        });
        let pause = Arc::new(NoWait::default());
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(5),
        };
        let provider: Arc<dyn AiProvider> = ai.clone();
        let rewriter = Rewriter::with_pause(Some(provider), policy, pause.clone());
        let images = ImageResolver::new(
            Arc::new(Pages {
                html: page_html.map(str::to_string),
            }),
            Duration::from_secs(1),
        );
        let importer = Importer::new(Fetcher::new(gateway, 1), store.clone(), rewriter, images).with_concurrency(2);
        Harness {
            importer,
            store,
            ai,
            pause,
        }
    }

    #[tokio::test]
    async fn test_second_run_creates_nothing() {
        let body = long_body();
        let h = harness(
            vec![("newsapi/top", json!({"articles": [article(1, &body), article(2, &body)]}))],
            AiMode::Echo,
            None,
        );
        let providers = [news_provider(true)];

        let first = h.importer.run_import(&providers, &Cancellation::new()).await;
        assert_eq!(first.created, 2);

        let calls_after_first = h.ai.calls.load(Ordering::SeqCst);
        let second = h.importer.run_import(&providers, &Cancellation::new()).await;
        assert_eq!(second.created, 0);
        assert_eq!(second.per_provider["newsapi/top"].duplicates, 2);
        assert_eq!(h.ai.calls.load(Ordering::SeqCst), calls_after_first);
        assert_eq!(h.store.len().await, 2);
    }

    #[tokio::test]
    async fn test_exhausted_rewrite_keeps_original_content() {
        let body = long_body();
        let raw = json!({"articles": [article(1, &body)]});
        let expected_content = normalize(&raw, ContentType::News)[0].content.clone();
        let h = harness(vec![("newsapi/top", raw)], AiMode::Empty, None);

        let summary = h.importer.run_import(&[news_provider(true)], &Cancellation::new()).await;
        assert_eq!(summary.created, 1);
        assert_eq!(summary.per_provider["newsapi/top"].rewrite_failed, 1);
        assert_eq!(h.ai.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            *h.pause.waits.lock().unwrap(),
            [Duration::from_secs(1), Duration::from_secs(2)]
        );

        let stored = h.store.records().await;
        assert_eq!(stored[0].record.rewrite_status, RewriteStatus::Failed);
        assert_eq!(stored[0].record.item.content, expected_content);
    }

    #[tokio::test]
    async fn test_finished_record_carries_metadata() {
        let body = long_body();
        let h = harness(
            vec![("newsapi/top", json!({"articles": [article(7, &body)]}))],
            AiMode::Echo,
            Some(r#"<meta property="og:image" content="/lead.jpg">"#),
        );
        let summary = h.importer.run_import(&[news_provider(true)], &Cancellation::new()).await;
        assert_eq!(summary.created, 1);

        let r = &h.store.records().await[0].record;
        assert_eq!(r.rewrite_status, RewriteStatus::Success);
        assert!(r.item.content.starts_with("Rewritten: "));
        assert_eq!(r.item.image.as_deref(), Some("https://news.example.com/lead.jpg"));
        assert_eq!(r.content_hash, fingerprint("Story 7", "https://news.example.com/7"));
        assert_eq!(r.status, "draft");
        assert_eq!(r.source_api, "newsapi");
        assert!(r.category_id.is_some());
        assert!(r.tags.len() <= 6);
        assert!(r.trend_score <= 100);
    }

    #[tokio::test]
    async fn test_disabled_rewrite_is_skipped_without_ai_calls() {
        let body = long_body();
        let h = harness(
            vec![("newsapi/top", json!({"articles": [article(1, &body)]}))],
            AiMode::Echo,
            None,
        );
        h.importer.run_import(&[news_provider(false)], &Cancellation::new()).await;
        assert_eq!(h.ai.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.store.records().await[0].record.rewrite_status, RewriteStatus::Skipped);
    }

    #[tokio::test]
    async fn test_missing_ai_provider_marks_rewrite_skipped() {
        let body = long_body();
        let raw = json!({"articles": [article(3, &body)]});
        let expected_content = normalize(&raw, ContentType::News)[0].content.clone();
        let store = Arc::new(FileStore::in_memory());
        let importer = Importer::new(
            Fetcher::new(
                Arc::new(CannedGateway {
                    responses: BTreeMap::from([("newsapi/top".to_string(), raw)]),
                }),
                1,
            ),
            store.clone(),
            Rewriter::new(None, RetryPolicy::default()),
            ImageResolver::new(Arc::new(Pages { html: None }), Duration::from_secs(1)),
        );

        let summary = importer.run_import(&[news_provider(true)], &Cancellation::new()).await;
        assert_eq!(summary.created, 1);
        assert_eq!(summary.per_provider["newsapi/top"].rewrite_failed, 0);

        let stored = store.records().await;
        assert_eq!(stored[0].record.rewrite_status, RewriteStatus::Skipped);
        assert_eq!(stored[0].record.item.content, expected_content);
    }

    #[tokio::test]
    async fn test_failing_provider_does_not_stop_others() {
        let body = long_body();
        let h = harness(
            vec![("newsapi/top", json!({"articles": [article(1, &body)]}))],
            AiMode::Echo,
            None,
        );
        let broken = ProviderConfig {
            api_id: "ghost".into(),
            endpoint_id: "none".into(),
            content_type: ContentType::Crypto,
            rewrite_enabled: true,
        };
        let summary = h
            .importer
            .run_import(&[broken, news_provider(true)], &Cancellation::new())
            .await;
        assert_eq!(summary.created, 1);
        let ghost = &summary.per_provider["ghost/none"];
        assert_eq!(ghost.created, 0);
        assert!(ghost.error.as_deref().unwrap().contains("ghost/none"));
    }

    #[tokio::test]
    async fn test_overlapping_providers_store_each_fingerprint_once() {
        let body = long_body();
        let raw = json!({"articles": [article(1, &body), article(2, &body), article(3, &body)]});
        let h = harness(vec![("newsapi/top", raw.clone()), ("mirror/top", raw)], AiMode::Echo, None);
        let mirror = ProviderConfig {
            api_id: "mirror".into(),
            ..news_provider(true)
        };
        let summary = h
            .importer
            .run_import(&[news_provider(true), mirror], &Cancellation::new())
            .await;
        assert_eq!(summary.created, 3);
        let dupes: usize = summary.per_provider.values().map(|c| c.duplicates).sum();
        assert_eq!(dupes, 3);
        assert_eq!(h.store.len().await, 3);
    }

    #[tokio::test]
    async fn test_no_providers_or_cancelled_run_creates_nothing() {
        let body = long_body();
        let h = harness(
            vec![("newsapi/top", json!({"articles": [article(1, &body)]}))],
            AiMode::Echo,
            None,
        );
        assert_eq!(h.importer.run_import(&[], &Cancellation::new()).await.created, 0);

        let cancel = Cancellation::new();
        cancel.cancel();
        let summary = h.importer.run_import(&[news_provider(true)], &cancel).await;
        assert_eq!(summary.created, 0);
        assert_eq!(summary.per_provider["newsapi/top"].error.as_deref(), Some("cancelled"));
    }

    #[tokio::test]
    async fn test_fix_images_backfills_and_respects_dry_run() {
        let body = long_body();
        let h = harness(
            vec![("newsapi/top", json!({"articles": [article(1, &body), article(2, &body)]}))],
            AiMode::Echo,
            None,
        );
        h.importer.run_import(&[news_provider(false)], &Cancellation::new()).await;
        assert_eq!(h.store.records_without_image(0, 10).await.unwrap().len(), 2);

        let with_pages = Importer::new(
            Fetcher::new(Arc::new(CannedGateway { responses: BTreeMap::new() }), 1),
            h.store.clone(),
            Rewriter::new(None, RetryPolicy::default()),
            ImageResolver::new(
                Arc::new(Pages {
                    html: Some(r#"<img src="/photo.png">"#.to_string()),
                }),
                Duration::from_secs(1),
            ),
        );

        let dry = with_pages.fix_images(1, true, &Cancellation::new()).await.unwrap();
        assert_eq!((dry.scanned, dry.fixed, dry.unresolved), (2, 2, 0));
        assert_eq!(h.store.records_without_image(0, 10).await.unwrap().len(), 2);

        let real = with_pages.fix_images(1, false, &Cancellation::new()).await.unwrap();
        assert_eq!(real.fixed, 2);
        assert!(h.store.records_without_image(0, 10).await.unwrap().is_empty());
        assert!(
            h.store
                .records()
                .await
                .iter()
                .all(|r| r.record.item.image.as_deref() == Some("https://news.example.com/photo.png"))
        );
    }
}
