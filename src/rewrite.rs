//! AI rewrite with bounded retries and exponential backoff.
//!
//! [`Rewriter`] drives one item's text through an [`AiProvider`]:
//!
//! ```text
//! Pending -> Attempting -> Success
//!                |
//!                +-> Retry (tooShort | empty | error) -> wait -> Attempting
//!                |
//!                +-> ExhaustedFailure (after max_attempts)
//! ```
//!
//! # Acceptance
//!
//! An attempt succeeds only if the output is non-empty and longer than half
//! the original (in characters). Shorter output is treated as truncated.
//!
//! # Backoff
//!
//! With `backoff` as the base delay and `n` the 1-based attempt number:
//! ```text
//! rate limited:  backoff * 2^n
//! anything else: backoff * 2^(n-1)
//! ```
//! No wait follows the last attempt. Waits are exact and go through the
//! [`Pause`] seam so tests can record them instead of sleeping.
//!
//! # Cancellation
//!
//! Every AI call is bounded by `attempt_timeout`, and both the call and the
//! backoff wait race a [`Cancellation`]. A cancelled rewrite returns
//! [`RewriteFailure::Cancelled`] without further attempts.

use crate::ai::AiProvider;
use crate::config::AiConfig;
use crate::error::{AiError, RewriteFailure};
use crate::models::{AttemptOutcome, RewriteAttempt};
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{error, info, instrument, warn};

/// Batch-wide cancellation flag that async code can also wait on.
#[derive(Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// How the runtime waits between attempts.
#[async_trait]
pub trait Pause: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// Waits with `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPause;

#[async_trait]
impl Pause for TokioPause {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Retry limits and base delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AiConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_secs(config.backoff_secs),
            attempt_timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }

    /// Delay after a failed `attempt` (1-based) with the given outcome.
    pub fn wait_after(&self, attempt: u32, outcome: AttemptOutcome) -> Duration {
        if attempt >= self.max_attempts || outcome == AttemptOutcome::Success {
            return Duration::ZERO;
        }
        let exponent = match outcome {
            AttemptOutcome::Error { rate_limited: true } => attempt,
            _ => attempt.saturating_sub(1),
        };
        self.backoff.saturating_mul(2u32.saturating_pow(exponent))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&AiConfig::default())
    }
}

/// Classify one provider answer against the original content.
pub fn classify(original: &str, candidate: &str) -> AttemptOutcome {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return AttemptOutcome::Empty;
    }
    if candidate.chars().count() * 2 > original.trim().chars().count() {
        AttemptOutcome::Success
    } else {
        AttemptOutcome::TooShort
    }
}

/// The retry engine.
#[derive(Clone)]
pub struct Rewriter {
    provider: Option<Arc<dyn AiProvider>>,
    policy: RetryPolicy,
    pause: Arc<dyn Pause>,
}

impl Rewriter {
    pub fn new(provider: Option<Arc<dyn AiProvider>>, policy: RetryPolicy) -> Self {
        Self::with_pause(provider, policy, Arc::new(TokioPause))
    }

    pub fn with_pause(provider: Option<Arc<dyn AiProvider>>, policy: RetryPolicy, pause: Arc<dyn Pause>) -> Self {
        Self {
            provider,
            policy,
            pause,
        }
    }

    /// Rewrite `content`, or explain why no accepted rewrite was produced.
    ///
    /// # Errors
    ///
    /// - [`RewriteFailure::Unavailable`] when no provider is configured or it lacks credentials
    /// - [`RewriteFailure::Exhausted`] after `max_attempts` rejected or failed attempts
    /// - [`RewriteFailure::Cancelled`] when `cancel` fires mid-way
    pub async fn rewrite(&self, content: &str, cancel: &Cancellation) -> Result<String, RewriteFailure> {
        self.rewrite_traced(content, cancel).await.0
    }

    /// Like [`rewrite`](Self::rewrite), also returning every attempt made.
    #[instrument(level = "info", skip_all, fields(chars = content.chars().count()))]
    pub async fn rewrite_traced(
        &self,
        content: &str,
        cancel: &Cancellation,
    ) -> (Result<String, RewriteFailure>, Vec<RewriteAttempt>) {
        let mut attempts = Vec::new();
        let Some(provider) = &self.provider else {
            return (Err(RewriteFailure::Unavailable("no AI provider configured".to_string())), attempts);
        };

        let total_t0 = Instant::now();
        let mut last_error = String::new();

        for attempt in 1..=self.policy.max_attempts {
            if cancel.is_cancelled() {
                return (Err(RewriteFailure::Cancelled { attempts: attempt - 1 }), attempts);
            }

            let attempt_t0 = Instant::now();
            let call = tokio::time::timeout(self.policy.attempt_timeout, provider.rewrite(content));
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(attempt, "Rewrite cancelled during AI call");
                    return (Err(RewriteFailure::Cancelled { attempts: attempt }), attempts);
                }
                r = call => r.unwrap_or_else(|_| Err(AiError::Timeout(self.policy.attempt_timeout.as_secs()))),
            };

            let outcome = match result {
                Ok(text) => {
                    let outcome = classify(content, &text);
                    if outcome == AttemptOutcome::Success {
                        attempts.push(RewriteAttempt {
                            attempt_number: attempt,
                            outcome,
                            wait_before_next_secs: 0,
                        });
                        info!(
                            attempt,
                            provider = provider.name(),
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            "Rewrite accepted"
                        );
                        return (Ok(text.trim().to_string()), attempts);
                    }
                    last_error = match outcome {
                        AttemptOutcome::Empty => "empty response".to_string(),
                        _ => format!(
                            "response too short ({} of {} chars): {}",
                            text.trim().chars().count(),
                            content.trim().chars().count(),
                            truncate_for_log(text.trim(), 80)
                        ),
                    };
                    outcome
                }
                Err(AiError::Unconfigured(name)) => {
                    warn!(provider = name, "AI provider not configured; skipping rewrite");
                    return (Err(RewriteFailure::Unavailable(AiError::Unconfigured(name).to_string())), attempts);
                }
                Err(e) => {
                    last_error = e.to_string();
                    AttemptOutcome::Error {
                        rate_limited: e.is_rate_limit(),
                    }
                }
            };

            let wait = self.policy.wait_after(attempt, outcome);
            attempts.push(RewriteAttempt {
                attempt_number: attempt,
                outcome,
                wait_before_next_secs: wait.as_secs(),
            });
            warn!(
                attempt,
                max = self.policy.max_attempts,
                ?outcome,
                elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                wait_secs = wait.as_secs(),
                error = %last_error,
                "Rewrite attempt rejected"
            );

            if !wait.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        warn!(attempt, "Rewrite cancelled during backoff");
                        return (Err(RewriteFailure::Cancelled { attempts: attempt }), attempts);
                    }
                    _ = self.pause.pause(wait) => {}
                }
            }
        }

        error!(
            attempts = self.policy.max_attempts,
            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
            error = %last_error,
            "Rewrite exhausted retries"
        );
        (
            Err(RewriteFailure::Exhausted {
                attempts: self.policy.max_attempts,
                last_error,
            }),
            attempts,
        )
    }
}
