//! Fetching raw provider responses through an API gateway.
//!
//! The [`ApiGateway`] trait is the boundary to whatever actually talks to
//! third-party APIs; [`http::HttpGateway`] is the reqwest implementation used
//! by the CLI. [`Fetcher`] shapes requests, validates the response shape and
//! follows a "next page" indicator.
//!
//! # Pagination
//!
//! A response carrying `nextPage` (or `next_page`) triggers another request
//! with `page=<value>`, up to `max_pages` pages in total. Only the item list
//! is merged: root arrays are concatenated, and for objects the list under
//! the first recognised key (`articles`, `news`, `items`, `products`, `data`,
//! `results`) is extended. Every other key keeps the first page's value.

pub mod http;

use crate::config::ProviderConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Query arguments passed to the gateway.
pub type Args = BTreeMap<String, String>;

/// Keys that hold the item list in the response shapes we know about.
pub const LIST_KEYS: &[&str] = &["articles", "news", "items", "products", "data", "results"];

const NEXT_PAGE_KEYS: &[&str] = &["nextPage", "next_page"];

/// Boundary to the component that performs the actual API call.
#[async_trait]
pub trait ApiGateway: Send + Sync {
    async fn call(&self, api_id: &str, endpoint_id: &str, args: &Args) -> Result<Value, FetchError>;
}

/// Provider-level fetch with response validation and pagination.
#[derive(Clone)]
pub struct Fetcher {
    gateway: Arc<dyn ApiGateway>,
    max_pages: usize,
}

impl Fetcher {
    pub fn new(gateway: Arc<dyn ApiGateway>, max_pages: usize) -> Self {
        Self {
            gateway,
            max_pages: max_pages.max(1),
        }
    }

    /// Fetch one provider's response, following pagination.
    ///
    /// # Errors
    ///
    /// - [`FetchError::GatewayMissing`] when the gateway does not know the API/endpoint
    /// - [`FetchError::InvalidShape`] when the first page is not a non-empty array or object
    /// - [`FetchError::Transport`] for network or HTTP failures
    ///
    /// A failure on a follow-up page is logged and the pages fetched so far are returned.
    #[instrument(level = "info", skip_all, fields(api_id = %provider.api_id, endpoint_id = %provider.endpoint_id))]
    pub async fn fetch(&self, provider: &ProviderConfig, extra: &Args) -> Result<Value, FetchError> {
        let mut merged = self.fetch_page(provider, extra).await?;
        let mut next = next_page(&merged);
        let mut pages = 1;

        while let Some(page) = next.take() {
            if pages >= self.max_pages {
                debug!(pages, max = self.max_pages, "Page limit reached; not following nextPage");
                break;
            }
            let mut args = extra.clone();
            args.insert("page".to_string(), page.clone());
            match self.fetch_page(provider, &args).await {
                Ok(data) => {
                    pages += 1;
                    next = next_page(&data);
                    merge_pages(&mut merged, data);
                    debug!(pages, %page, "Merged follow-up page");
                }
                Err(e) => {
                    warn!(%page, error = %e, "Follow-up page failed; keeping pages fetched so far");
                }
            }
        }

        info!(pages, "Fetched provider response");
        Ok(merged)
    }

    async fn fetch_page(&self, provider: &ProviderConfig, extra: &Args) -> Result<Value, FetchError> {
        let mut args = Args::new();
        args.insert("timestamp".to_string(), chrono::Utc::now().timestamp().to_string());
        args.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));

        let response = self
            .gateway
            .call(&provider.api_id, &provider.endpoint_id, &args)
            .await?;
        validate_shape(&response)?;
        Ok(response)
    }
}

fn validate_shape(v: &Value) -> Result<(), FetchError> {
    match v {
        Value::Array(a) if a.is_empty() => Err(FetchError::InvalidShape("empty array".to_string())),
        Value::Object(o) if o.is_empty() => Err(FetchError::InvalidShape("empty object".to_string())),
        Value::Array(_) | Value::Object(_) => Ok(()),
        other => Err(FetchError::InvalidShape(format!(
            "expected array or object, got {}",
            type_name(other)
        ))),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The next-page token of a response, if it carries a usable one.
fn next_page(v: &Value) -> Option<String> {
    let obj = v.as_object()?;
    NEXT_PAGE_KEYS
        .iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|token| match token {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Merge a follow-up page's items into the first page.
pub fn merge_pages(first: &mut Value, next: Value) {
    match (first, next) {
        (Value::Array(a), Value::Array(b)) => a.extend(b),
        (Value::Object(a), Value::Object(mut b)) => {
            let key = LIST_KEYS
                .iter()
                .find(|k| a.get(**k).is_some_and(Value::is_array))
                .map(|k| k.to_string());
            let Some(key) = key else {
                debug!("First page has no known item list; follow-up page not merged");
                return;
            };
            if let (Some(Value::Array(dst)), Some(Value::Array(src))) = (a.get_mut(&key), b.get_mut(&key).map(Value::take)) {
                dst.extend(src);
            }
        }
        _ => debug!("Pages have different shapes; follow-up page not merged"),
    }
}
