//! OpenAI chat-completions provider.

use super::{AiProvider, error_message, prompt_for};
use crate::config::AiConfig;
use crate::error::AiError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

const ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const SYSTEM_PROMPT: &str = "You are a helpful content editor.";

pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

impl OpenAiProvider {
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let api_key = config.openai_api_key.as_deref().map(str::trim).filter(|k| key_looks_valid(k));
        if api_key.is_none() {
            warn!("OpenAI API key missing or malformed");
        }
        Ok(Self {
            http,
            api_key: api_key.map(str::to_string),
            model: config.openai_model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

/// Secret keys start with `sk-` and are at least 30 characters long.
fn key_looks_valid(key: &str) -> bool {
    key.starts_with("sk-") && key.len() >= 30
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn rewrite(&self, text: &str) -> Result<String, AiError> {
        let Some(api_key) = &self.api_key else {
            return Err(AiError::Unconfigured("openai"));
        };

        let prompt = prompt_for(text);
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Msg {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.7,
            max_tokens: 1000,
        };

        let t0 = Instant::now();
        let resp = self.http.post(ENDPOINT).bearer_auth(api_key).json(&req).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        debug!(%status, elapsed_ms = t0.elapsed().as_millis() as u64, "OpenAI responded");

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AiError::RateLimited(error_message(&body)));
        }
        if !status.is_success() {
            return Err(AiError::Api(format!("HTTP {status}: {}", error_message(&body))));
        }

        let parsed: Resp = serde_json::from_str(&body).map_err(|e| AiError::Api(format!("bad response body: {e}")))?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_validation() {
        assert!(key_looks_valid("sk-abcdefghijklmnopqrstuvwxyz0123"));
        assert!(!key_looks_valid("sk-short"));
        assert!(!key_looks_valid("pk-abcdefghijklmnopqrstuvwxyz0123"));
    }

    #[test]
    fn test_request_shape() {
        let req = Req {
            model: DEFAULT_MODEL,
            messages: vec![Msg {
                role: "user",
                content: "hi",
            }],
            temperature: 0.7,
            max_tokens: 1000,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["model"], "gpt-3.5-turbo");
        assert_eq!(v["max_tokens"], 1000);
        assert_eq!(v["messages"][0]["role"], "user");
    }

    #[test]
    fn test_response_without_content_is_empty() {
        let r: Resp = serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant"}}]}"#).unwrap();
        assert!(r.choices[0].message.content.is_none());
    }
}
