//! Exponential backoff with jitter around LLM calls that hit rate limits.

use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

use crate::llm::{ChatBackend, ChatRequest, LlmError};

/// Upper bound on any single backoff delay, in seconds.
pub const MAX_DELAY_SECS: f64 = 60.0;
const MAX_JITTER_SECS: f64 = 0.5;

#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
  /// Total calls allowed, including the first one.
  pub max_attempts: u32,
  pub base_delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { max_attempts: 3, base_delay: Duration::from_secs(2) }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
  #[error("rate limited after {attempts} attempts")]
  RateLimited { attempts: u32 },
  #[error("{0}")]
  Upstream(String),
}

/// `min(base * 2^attempt + jitter, 60s)`; `attempt` is zero-based.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32, jitter_secs: f64) -> Duration {
  let exp = 2f64.powi(attempt.min(62) as i32);
  let secs = (policy.base_delay.as_secs_f64() * exp + jitter_secs).min(MAX_DELAY_SECS);
  Duration::from_secs_f64(secs.max(0.0))
}

fn jitter() -> f64 {
  rand::thread_rng().gen_range(0.0..MAX_JITTER_SECS)
}

/// Call the backend, retrying only rate-limit failures while attempts remain.
pub async fn fetch_with_retry<B: ChatBackend>(
  backend: &B,
  request: &ChatRequest,
  policy: &RetryPolicy,
) -> Result<String, FetchError> {
  let attempts = policy.max_attempts.max(1);

  for attempt in 0..attempts {
    match backend.complete(request).await {
      Ok(text) => return Ok(text),
      Err(LlmError::RateLimited(msg)) => {
        if attempt + 1 == attempts {
          error!(target: "study_tutor", attempts, error = %msg, "Rate limit retries exhausted");
          break;
        }
        let delay = backoff_delay(policy, attempt, jitter());
        warn!(target: "study_tutor", attempt, delay_ms = delay.as_millis() as u64, error = %msg, "Rate limited; backing off");
        tokio::time::sleep(delay).await;
      }
      Err(LlmError::Upstream(msg)) => {
        error!(target: "study_tutor", attempt, error = %msg, "LLM call failed");
        return Err(FetchError::Upstream(msg));
      }
    }
  }

  Err(FetchError::RateLimited { attempts })
}
