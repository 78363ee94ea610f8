//! Tutoring flow shared by the HTTP and WebSocket handlers: chat context, cache,
//! rate-limit aware LLM call and question tracking.

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::cache::fingerprint;
use crate::catalog;
use crate::domain::{QuestionOutcome, Role, TutorReply};
use crate::error::StoreError;
use crate::llm::{ChatBackend, ChatRequest};
use crate::retry::{fetch_with_retry, FetchError};
use crate::state::AppState;
use crate::util::{fill_template, trunc_for_log};

const FOLLOW_UP_RULE: &str = "6. Keep in mind the previous conversation context when answering follow-up questions";

/// Text the client already extracted from uploads.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct StudyMaterial {
  #[serde(default)]
  pub image_text: Option<String>,
  #[serde(default)]
  pub image_caption: Option<String>,
  #[serde(default)]
  pub document_text: Option<String>,
}

impl StudyMaterial {
  pub fn combined_text(&self) -> String {
    let ocr = self.image_text.as_deref().unwrap_or("");
    let image = match self.image_caption.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
      Some(caption) => format!("Image Info: {}\n\nExtracted Text: {}", caption, ocr),
      None => ocr.to_string(),
    };
    let doc = self.document_text.as_deref().unwrap_or("");
    format!("{}\n\n{}", image, doc).trim().to_string()
  }
}

fn default_subject() -> String {
  "General".into()
}
fn default_grade() -> String {
  "High School".into()
}
fn default_style() -> String {
  "No Preference".into()
}
fn default_language() -> String {
  "en".into()
}

#[derive(Clone, Debug, Deserialize)]
pub struct AskRequest {
  pub user_id: String,
  #[serde(default)]
  pub chat_id: Option<String>,
  pub question: String,
  #[serde(default = "default_subject")]
  pub subject: String,
  #[serde(default = "default_grade")]
  pub grade_level: String,
  #[serde(default = "default_style")]
  pub learning_style: String,
  /// Language code, see `catalog::LANGUAGES`.
  #[serde(default = "default_language")]
  pub language: String,
  #[serde(flatten)]
  pub material: StudyMaterial,
}

#[derive(Clone, Debug)]
pub struct AskOutcome {
  pub chat_id: String,
  pub reply: TutorReply,
  /// Present when the reply was an answer.
  pub question: Option<QuestionOutcome>,
}

pub async fn ask(state: &AppState, req: &AskRequest) -> Result<AskOutcome, StoreError> {
  ask_with(state, state.llm.as_ref(), req).await
}

#[instrument(level = "info", skip(state, backend, req), fields(user_id = %req.user_id, subject = %req.subject, language = %req.language, question_len = req.question.len()))]
pub async fn ask_with<B: ChatBackend>(
  state: &AppState,
  backend: Option<&B>,
  req: &AskRequest,
) -> Result<AskOutcome, StoreError> {
  let chat_id = state.chats.open(&req.user_id, req.chat_id.as_deref()).await;
  state.chats.push(&chat_id, Role::User, &req.question).await;
  let context = state.chats.context_before_latest(&chat_id).await;

  let reply = match backend {
    None => TutorReply::MissingCredential,
    Some(backend) => answer(state, backend, req, &context).await,
  };
  info!(target: "study_tutor", %chat_id, kind = reply.kind(), "Tutor reply ready");

  state.chats.push(&chat_id, Role::Assistant, &reply.user_text()).await;

  let question = if reply.is_answer() {
    Some(state.gamification.track_question_asked(&req.user_id, &req.subject).await?)
  } else {
    None
  };
  Ok(AskOutcome { chat_id, reply, question })
}

async fn answer<B: ChatBackend>(state: &AppState, backend: &B, req: &AskRequest, context: &str) -> TutorReply {
  let material = req.material.combined_text();
  let key = fingerprint(&material, &req.question, &req.subject, &req.grade_level, &req.learning_style, context);

  if let Some(text) = state.cache.lookup(&key, &req.language).await {
    return TutorReply::Answer { text, cached: true };
  }

  let request = build_request(state, req, &material, context);
  match fetch_with_retry(backend, &request, &state.tuning.retry_policy()).await {
    Ok(text) => {
      debug!(target: "study_tutor", answer = %trunc_for_log(&text, 200), "LLM answer");
      if let Err(e) = state.cache.store(&key, &req.language, &text).await {
        warn!(target: "study_tutor", error = %e, "Failed to persist cached answer");
      }
      state.record_usage().await;
      TutorReply::Answer { text, cached: false }
    }
    Err(FetchError::RateLimited { .. }) => TutorReply::RateLimited,
    Err(FetchError::Upstream(detail)) => TutorReply::UpstreamError(detail),
  }
}

fn build_request(state: &AppState, req: &AskRequest, material: &str, context: &str) -> ChatRequest {
  let language = catalog::language_name(&req.language);
  let (context_block, follow_up_rule) = if context.is_empty() {
    (String::new(), "")
  } else {
    (format!("PREVIOUS CONVERSATION CONTEXT:\n{}\n", context), FOLLOW_UP_RULE)
  };
  let user = fill_template(
    &state.prompts.tutor_user_template,
    &[
      ("subject", &req.subject),
      ("grade_level", &req.grade_level),
      ("learning_style", &req.learning_style),
      ("material", material),
      ("context_block", &context_block),
      ("question", &req.question),
      ("follow_up_rule", follow_up_rule),
      ("language", language),
    ],
  );
  ChatRequest {
    system: fill_template(&state.prompts.tutor_system, &[("language", language)]),
    user,
    temperature: state.tuning.temperature,
    max_tokens: Some(state.tuning.max_tokens),
    model: None,
  }
}
