//! Minimal client for an OpenAI-compatible chat.completions endpoint (Groq by default).
//!
//! Calls are instrumented and log model names, latencies and response sizes (not contents).
//!
//! NOTE: We never log the API key.

use std::future::Future;
use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_MODEL: &str = "llama3-70b-8192";

/// One system + user exchange.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatRequest {
  pub system: String,
  pub user: String,
  pub temperature: f32,
  pub max_tokens: Option<u32>,
  /// Overrides the backend's default model.
  pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
  #[error("rate limited: {0}")]
  RateLimited(String),
  #[error("{0}")]
  Upstream(String),
}

impl LlmError {
  /// HTTP 429, or any failure whose message mentions a rate limit.
  pub fn classify(status: Option<u16>, message: String) -> Self {
    if status == Some(429) || message.to_lowercase().contains("rate limit") {
      LlmError::RateLimited(message)
    } else {
      LlmError::Upstream(message)
    }
  }
}

/// First non-blank of `LLM_API_KEY`, then `GROQ_API_KEY`.
fn api_key_from(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
  ["LLM_API_KEY", "GROQ_API_KEY"]
    .into_iter()
    .filter_map(|name| lookup(name))
    .find(|k| !k.trim().is_empty())
}

/// Anything that can turn a chat request into generated text.
pub trait ChatBackend: Send + Sync {
  fn complete(&self, request: &ChatRequest) -> impl Future<Output = Result<String, LlmError>> + Send;
}

#[derive(Clone)]
pub struct LlmClient {
  pub client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
  pub study_plan_model: String,
}

impl LlmClient {
  /// Construct the client if an API key is configured and the HTTP client builds.
  /// Each reason for returning None is logged here.
  pub fn from_env() -> Option<Self> {
    let Some(api_key) = api_key_from(|name| std::env::var(name).ok()) else {
      warn!(target: "study_tutor", "LLM disabled (no LLM_API_KEY or GROQ_API_KEY). Tutor answers are unavailable.");
      return None;
    };
    let base_url = std::env::var("LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
    let study_plan_model = std::env::var("STUDY_PLAN_MODEL").unwrap_or_else(|_| model.clone());
    match Self::new(api_key, base_url, model, study_plan_model) {
      Ok(client) => Some(client),
      Err(e) => {
        error!(target: "study_tutor", error = %e, "LLM disabled: failed to build HTTP client.");
        None
      }
    }
  }

  pub fn new(api_key: String, base_url: String, model: String, study_plan_model: String) -> Result<Self, reqwest::Error> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(60))
      .build()?;
    Ok(Self { client, api_key, base_url, model, study_plan_model })
  }

  /// Cheap "Hello" round trip used to check that the key is accepted.
  #[instrument(level = "info", skip(self), fields(model = %self.model))]
  pub async fn ping(&self) -> Result<(), LlmError> {
    let req = ChatRequest {
      system: String::new(),
      user: "Hello".into(),
      temperature: 0.0,
      max_tokens: Some(1),
      model: None,
    };
    self.chat_plain(&req).await.map(|_| ())
  }

  #[instrument(level = "info", skip(self, request), fields(model = request.model.as_deref().unwrap_or(&self.model), user_len = request.user.len()))]
  async fn chat_plain(&self, request: &ChatRequest) -> Result<String, LlmError> {
    let url = format!("{}/chat/completions", self.base_url);
    let mut messages = Vec::with_capacity(2);
    if !request.system.is_empty() {
      messages.push(ChatMessageReq { role: "system".into(), content: request.system.clone() });
    }
    messages.push(ChatMessageReq { role: "user".into(), content: request.user.clone() });

    let req = ChatCompletionRequest {
      model: request.model.clone().unwrap_or_else(|| self.model.clone()),
      messages,
      temperature: request.temperature,
      max_tokens: request.max_tokens,
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "study-tutor-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await
      .map_err(|e| LlmError::classify(e.status().map(|s| s.as_u16()), e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_api_error(&body).unwrap_or(body);
      return Err(LlmError::classify(Some(status.as_u16()), format!("API error: {} - {}", status.as_u16(), msg)));
    }

    let body: ChatCompletionResponse = res.json().await
      .map_err(|e| LlmError::Upstream(format!("malformed response: {}", e)))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "LLM usage");
    }
    let text = body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .ok_or_else(|| LlmError::Upstream("malformed response: no choices".into()))?
      .trim()
      .to_string();

    info!(elapsed = ?start.elapsed(), text_len = text.len(), "LLM response received");
    Ok(text)
  }
}

impl ChatBackend for LlmClient {
  async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
    self.chat_plain(request).await
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from an OpenAI-style error body.
fn extract_api_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classify_by_status_and_message() {
    assert!(matches!(LlmError::classify(Some(429), "Too Many Requests".into()), LlmError::RateLimited(_)));
    assert!(matches!(LlmError::classify(None, "Rate limit reached for model".into()), LlmError::RateLimited(_)));
    assert_eq!(
      LlmError::classify(Some(500), "API error: 500 - boom".into()),
      LlmError::Upstream("API error: 500 - boom".into())
    );
  }

  #[test]
  fn extracts_openai_error_message() {
    let body = r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error"}}"#;
    assert_eq!(extract_api_error(body).as_deref(), Some("Invalid API Key"));
    assert_eq!(extract_api_error("<html>"), None);
  }

  #[test]
  fn api_key_prefers_llm_key_and_skips_blanks() {
    let env = |pairs: &'static [(&'static str, &'static str)]| {
      move |name: &str| pairs.iter().find(|(k, _)| *k == name).map(|(_, v)| v.to_string())
    };
    assert_eq!(api_key_from(env(&[("LLM_API_KEY", "a"), ("GROQ_API_KEY", "b")])).as_deref(), Some("a"));
    assert_eq!(api_key_from(env(&[("LLM_API_KEY", "  "), ("GROQ_API_KEY", "b")])).as_deref(), Some("b"));
    assert_eq!(api_key_from(env(&[("GROQ_API_KEY", "")])), None);
    assert_eq!(api_key_from(env(&[])), None);
  }

  #[test]
  fn new_builds_client_with_given_models() {
    let c = LlmClient::new("k".into(), "http://localhost:1".into(), "m".into(), "p".into()).unwrap();
    assert_eq!(c.model, "m");
    assert_eq!(c.study_plan_model, "p");
  }

  #[test]
  fn request_omits_absent_max_tokens() {
    let req = ChatCompletionRequest {
      model: "m".into(),
      messages: vec![ChatMessageReq { role: "user".into(), content: "hi".into() }],
      temperature: 0.4,
      max_tokens: None,
    };
    let json = serde_json::to_value(&req).unwrap();
    assert!(json.get("max_tokens").is_none());
    assert_eq!(json["messages"][0]["role"], "user");
  }
}
