//! AI providers used by the rewriter.
//!
//! To the pipeline a provider is an opaque `text -> text` function that can
//! fail. This module defines that seam ([`AiProvider`]) and the concrete
//! implementations:
//! - [`openai::OpenAiProvider`]: chat completions
//! - [`huggingface::HuggingFaceProvider`]: hosted seq2seq inference
//! - [`LocalExpander`]: offline padding of short content
//!
//! [`build_provider`] picks one from [`AiConfig`]. Providers with missing or
//! malformed credentials answer every call with [`AiError::Unconfigured`]
//! instead of reaching the network.

pub mod huggingface;
pub mod openai;

use crate::config::AiConfig;
use crate::error::AiError;
use crate::utils::{collapse_whitespace, strip_tags, word_count};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Content under this many words gets the "expand" prompt.
const SHORT_CONTENT_WORDS: usize = 100;

const EXPAND_PROMPT: &str = "Expand and rewrite the following short content into a full article while maintaining the core message and adding relevant details: \n\n";
const REWRITE_PROMPT: &str = "Rewrite the following content to be unique, engaging, and SEO-friendly while maintaining accuracy and professionalism: \n\n";

/// A text-in, text-out rewrite service.
#[async_trait]
pub trait AiProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn rewrite(&self, text: &str) -> Result<String, AiError>;
}

/// Prompt sent to remote providers for `content`.
pub fn prompt_for(content: &str) -> String {
    let prefix = if word_count(content) < SHORT_CONTENT_WORDS {
        EXPAND_PROMPT
    } else {
        REWRITE_PROMPT
    };
    format!("{prefix}{content}")
}

/// Build the provider named by `config.provider`.
///
/// Returns `None` for `none` (or an unknown name, which is logged), in which
/// case rewriting is skipped for every item.
pub fn build_provider(config: &AiConfig) -> Result<Option<Arc<dyn AiProvider>>, AiError> {
    let primary: Arc<dyn AiProvider> = match config.provider.trim().to_lowercase().as_str() {
        "openai" => Arc::new(openai::OpenAiProvider::new(config)?),
        "huggingface" | "hf" => Arc::new(huggingface::HuggingFaceProvider::new(config)?),
        "local" => Arc::new(LocalExpander),
        "none" | "" => {
            info!("AI rewriting disabled");
            return Ok(None);
        }
        other => {
            warn!(provider = %other, "Unknown AI provider; rewriting disabled");
            return Ok(None);
        }
    };

    info!(provider = primary.name(), local_fallback = config.local_fallback, "AI provider ready");
    if config.local_fallback && primary.name() != LocalExpander.name() {
        let wrapped: Arc<dyn AiProvider> = Arc::new(LocalFallback { primary });
        return Ok(Some(wrapped));
    }
    Ok(Some(primary))
}

/// Pads short content with follow-up sentences. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalExpander;

impl LocalExpander {
    pub fn expand(text: &str) -> String {
        let mut out = collapse_whitespace(&strip_tags(text));
        let words = word_count(&out);
        if words < 50 {
            out.push_str("\n\nMore information and updates will follow as the story develops.");
        } else if words < 100 {
            out.push_str("\n\nStay tuned for more detailed coverage and analysis.");
        }
        out
    }
}

#[async_trait]
impl AiProvider for LocalExpander {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn rewrite(&self, text: &str) -> Result<String, AiError> {
        Ok(Self::expand(text))
    }
}

/// Uses [`LocalExpander`] whenever the primary provider lacks credentials.
struct LocalFallback {
    primary: Arc<dyn AiProvider>,
}

#[async_trait]
impl AiProvider for LocalFallback {
    fn name(&self) -> &'static str {
        self.primary.name()
    }

    async fn rewrite(&self, text: &str) -> Result<String, AiError> {
        match self.primary.rewrite(text).await {
            Err(AiError::Unconfigured(provider)) => {
                warn!(%provider, "Provider not configured; expanding locally");
                Ok(LocalExpander::expand(text))
            }
            other => other,
        }
    }
}

/// Pull a human-readable message out of a provider's JSON error body.
fn error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
        })
        .map(str::to_string)
        .unwrap_or_else(|| crate::utils::truncate_for_log(body, 200))
}
