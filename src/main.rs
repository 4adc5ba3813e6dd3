//! # Content Booster
//!
//! An import pipeline that pulls content from heterogeneous third-party
//! APIs, normalizes it into one shape, rewrites it through an AI provider,
//! resolves a lead image, scores it against trending keywords and stores it
//! as draft records.
//!
//! ## Usage
//!
//! ```sh
//! content_booster --config booster.yaml import
//! content_booster fix-images --dry-run
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: call each provider's endpoint through the HTTP gateway, following pagination
//! 2. **Normalizing**: map news, product, crypto or unknown payloads to [`models::ContentItem`]
//! 3. **Deduplicating**: skip items whose title+url fingerprint is already stored
//! 4. **Rewriting**: AI rewrite with bounded retries and exponential backoff
//! 5. **Enriching**: image lookup, affiliate links, keywords and trend score
//! 6. **Storing**: one draft record per new item
//!
//! Providers are imported concurrently; Ctrl-C stops pending work without
//! losing what was already stored.

use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod affiliate;
mod ai;
mod cli;
mod config;
mod dedupe;
mod error;
mod fetch;
mod images;
mod models;
mod normalize;
mod pipeline;
mod record;
mod rewrite;
mod store;
mod trends;
mod utils;

use affiliate::AffiliateLinker;
use cli::{Cli, Command};
use config::AppConfig;
use fetch::Fetcher;
use fetch::http::HttpGateway;
use images::{HttpPageFetcher, ImageResolver};
use pipeline::Importer;
use rewrite::{Cancellation, RetryPolicy, Rewriter};
use store::{FileStore, Persistence};
use utils::ensure_parent_writable;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("content_booster starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(config = %args.config, command = ?args.command, "Parsed CLI arguments");

    // ---- Load config and apply overrides ----
    let mut config = AppConfig::load(Path::new(&args.config)).await?;
    apply_overrides(&mut config, &args);

    let store_path = Path::new(&config.store_path).to_path_buf();
    if let Err(e) = ensure_parent_writable(&store_path).await {
        error!(
            path = %store_path.display(),
            error = %e,
            "Store location is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }
    let file_store = Arc::new(FileStore::open(&store_path).await?);
    let store: Arc<dyn Persistence> = file_store.clone();

    // ---- Wire the pipeline ----
    let gateway = Arc::new(HttpGateway::new(&config.gateway)?);
    let fetcher = Fetcher::new(gateway, config.gateway.max_pages);
    let provider = ai::build_provider(&config.ai)?;
    let rewriter = Rewriter::new(provider, RetryPolicy::from_config(&config.ai));
    let images = ImageResolver::new(
        Arc::new(HttpPageFetcher::new()?),
        Duration::from_secs(config.images.timeout_secs),
    );
    let importer = Importer::new(fetcher, store, rewriter, images)
        .with_affiliate(AffiliateLinker::new(&config.affiliate))
        .with_trending(config.trending.clone())
        .with_concurrency(config.concurrency);

    // ---- Ctrl-C cancels pending work ----
    let cancel = Cancellation::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; finishing in-flight items and stopping");
                cancel.cancel();
            }
        });
    }

    let report = match args.command {
        Command::Import => {
            let providers = config.valid_providers();
            info!(providers = providers.len(), "Starting import");
            let summary = importer.run_import(&providers, &cancel).await;
            serde_json::to_string_pretty(&summary)?
        }
        Command::FixImages { batch_size, dry_run } => {
            let summary = importer.fix_images(batch_size, dry_run, &cancel).await?;
            serde_json::to_string_pretty(&summary)?
        }
    };
    println!("{report}");

    let stored_records = file_store.len().await;
    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        cancelled = cancel.is_cancelled(),
        stored_records,
        "Execution complete"
    );

    Ok(())
}

/// Fold command-line overrides into the loaded config.
fn apply_overrides(config: &mut AppConfig, args: &Cli) {
    if let Some(store) = &args.store {
        config.store_path = store.clone();
    }
    if let Some(provider) = &args.ai_provider {
        config.ai.provider = provider.clone();
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if args.openai_api_key.is_some() {
        config.ai.openai_api_key = args.openai_api_key.clone();
    }
    if args.huggingface_api_key.is_some() {
        config.ai.huggingface_api_key = args.huggingface_api_key.clone();
    }
}
