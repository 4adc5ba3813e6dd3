//! Hugging Face hosted inference provider.
//!
//! Posts `{"inputs": prompt}` to the model endpoint and reads the first
//! `generated_text` (or `summary_text`) of the returned list.

use super::{AiProvider, error_message, prompt_for};
use crate::config::AiConfig;
use crate::error::AiError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

const BASE_URL: &str = "https://api-inference.huggingface.co/models";
const DEFAULT_MODEL: &str = "facebook/bart-large-cnn";

pub struct HuggingFaceProvider {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

impl HuggingFaceProvider {
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let api_key = config
            .huggingface_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        if api_key.is_none() {
            warn!("Hugging Face API key missing");
        }
        Ok(Self {
            http,
            api_key,
            model: config
                .huggingface_model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

#[derive(Deserialize)]
struct Generated {
    generated_text: Option<String>,
    summary_text: Option<String>,
}

fn first_text(body: &str) -> Result<String, AiError> {
    let outputs: Vec<Generated> =
        serde_json::from_str(body).map_err(|e| AiError::Api(format!("bad response body: {e}")))?;
    Ok(outputs
        .into_iter()
        .next()
        .and_then(|g| g.generated_text.or(g.summary_text))
        .map(|t| t.trim().to_string())
        .unwrap_or_default())
}

#[async_trait]
impl AiProvider for HuggingFaceProvider {
    fn name(&self) -> &'static str {
        "huggingface"
    }

    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn rewrite(&self, text: &str) -> Result<String, AiError> {
        let Some(api_key) = &self.api_key else {
            return Err(AiError::Unconfigured("huggingface"));
        };

        let url = format!("{BASE_URL}/{}", self.model);
        let t0 = Instant::now();
        let resp = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&json!({ "inputs": prompt_for(text) }))
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        debug!(%status, elapsed_ms = t0.elapsed().as_millis() as u64, "Hugging Face responded");

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AiError::RateLimited(error_message(&body)));
        }
        if !status.is_success() {
            return Err(AiError::Api(format!("HTTP {status}: {}", error_message(&body))));
        }
        first_text(&body)
    }
}
