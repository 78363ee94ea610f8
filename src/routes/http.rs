//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use tracing::{info, instrument};

use crate::calendar::{CompletionOutcome, ScheduleOutcome};
use crate::chat::{ChatSummary, ChatThread};
use crate::domain::StreakOutcome;
use crate::error::{AppError, AppResult};
use crate::gamification::Dashboard;
use crate::protocol::*;
use crate::state::AppState;
use crate::study_plan::{self, StudyPlan, StudyPlanRequest};
use crate::tutor::{self, AskRequest};
use crate::util::non_blank;

fn require_user(user_id: &str) -> AppResult<&str> {
  non_blank(Some(user_id)).ok_or_else(|| AppError::BadRequest("user_id is required".into()))
}

#[instrument(level = "info")]
pub async fn http_health() -> Json<HealthOut> {
  Json(HealthOut { ok: true })
}

#[instrument(level = "info")]
pub async fn http_catalog() -> Json<CatalogOut> {
  Json(CatalogOut::build())
}

#[instrument(level = "info", skip(state))]
pub async fn http_llm_status(State(state): State<Arc<AppState>>) -> Json<LlmStatusOut> {
  let usage_today = state.usage_today().await;
  let cache_entries = state.cache.len().await;
  let Some(llm) = &state.llm else {
    return Json(LlmStatusOut { configured: false, valid: false, error: None, usage_today, cache_entries });
  };
  let (valid, error) = match llm.ping().await {
    Ok(()) => (true, None),
    Err(e) => (false, Some(e.to_string())),
  };
  info!(target: "study_tutor", %valid, "LLM key checked");
  Json(LlmStatusOut { configured: true, valid, error, usage_today, cache_entries })
}

#[instrument(level = "info", skip(state, body), fields(user_id = %body.user_id))]
pub async fn http_post_session(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SessionIn>,
) -> AppResult<Json<StreakOutcome>> {
  let user_id = require_user(&body.user_id)?;
  Ok(Json(state.gamification.update_streak(user_id).await?))
}

#[instrument(level = "info", skip(state), fields(user_id = %q.user_id))]
pub async fn http_get_profile(
  State(state): State<Arc<AppState>>,
  Query(q): Query<UserQuery>,
) -> AppResult<Json<Dashboard>> {
  let user_id = require_user(&q.user_id)?;
  Ok(Json(state.gamification.dashboard(user_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(user_id = %body.user_id, question_len = body.question.len()))]
pub async fn http_post_ask(
  State(state): State<Arc<AppState>>,
  Json(mut body): Json<AskRequest>,
) -> AppResult<Json<AskOut>> {
  body.user_id = require_user(&body.user_id)?.to_string();
  if non_blank(Some(body.question.as_str())).is_none() {
    return Err(AppError::BadRequest("question is required".into()));
  }
  let outcome = tutor::ask(&state, &body).await?;
  Ok(Json(AskOut::from(outcome)))
}

#[instrument(level = "info", skip(state), fields(user_id = %q.user_id))]
pub async fn http_list_chats(
  State(state): State<Arc<AppState>>,
  Query(q): Query<UserQuery>,
) -> AppResult<Json<Vec<ChatSummary>>> {
  let user_id = require_user(&q.user_id)?;
  Ok(Json(state.chats.list_for_user(user_id).await))
}

#[instrument(level = "info", skip_all, fields(%chat_id, user_id = %q.user_id))]
pub async fn http_get_chat(
  State(state): State<Arc<AppState>>,
  Path(chat_id): Path<String>,
  Query(q): Query<UserQuery>,
) -> AppResult<Json<ChatThread>> {
  let user_id = require_user(&q.user_id)?;
  state
    .chats
    .get(user_id, &chat_id)
    .await
    .map(Json)
    .ok_or_else(|| AppError::NotFound(format!("chat {}", chat_id)))
}

#[instrument(level = "info", skip_all, fields(%chat_id, user_id = %body.user_id))]
pub async fn http_rename_chat(
  State(state): State<Arc<AppState>>,
  Path(chat_id): Path<String>,
  Json(body): Json<ChatTitleIn>,
) -> AppResult<Json<OkOut>> {
  let user_id = require_user(&body.user_id)?;
  let title = non_blank(Some(body.title.as_str())).ok_or_else(|| AppError::BadRequest("title is required".into()))?;
  if state.chats.rename(user_id, &chat_id, title).await {
    Ok(Json(OkOut { ok: true }))
  } else {
    Err(AppError::NotFound(format!("chat {}", chat_id)))
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_clear_cache(State(state): State<Arc<AppState>>) -> AppResult<Json<CacheClearedOut>> {
  let removed = state.cache.clear().await?;
  Ok(Json(CacheClearedOut { removed }))
}

#[instrument(level = "info", skip(state, body), fields(subjects = body.subjects.len()))]
pub async fn http_post_study_plan(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StudyPlanRequest>,
) -> AppResult<Json<StudyPlan>> {
  let llm = state
    .llm
    .as_ref()
    .ok_or_else(|| AppError::Upstream(crate::domain::MISSING_CREDENTIAL_MESSAGE.into()))?;
  let plan = study_plan::generate(llm, &llm.study_plan_model, &state.prompts, &state.tuning, &body)
    .await
    .map_err(|e| AppError::Upstream(e.to_string()))?;
  Ok(Json(plan))
}

#[instrument(level = "info", skip(state, body), fields(user_id = %body.user_id, days = body.days))]
pub async fn http_post_schedule(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ScheduleIn>,
) -> AppResult<Json<ScheduleOutcome>> {
  let user_id = require_user(&body.user_id)?;
  let topic = non_blank(Some(body.topic.as_str())).ok_or_else(|| AppError::BadRequest("topic is required".into()))?;
  let out = state
    .calendar
    .generate_schedule(&state.gamification, user_id, topic, &body.subject, body.days, body.start_date)
    .await?;
  Ok(Json(out))
}

#[instrument(level = "info", skip(state), fields(user_id = %q.user_id))]
pub async fn http_get_events(
  State(state): State<Arc<AppState>>,
  Query(q): Query<EventsQuery>,
) -> AppResult<Json<EventsOut>> {
  let user_id = require_user(&q.user_id)?;
  if let (Some(from), Some(to)) = (q.from, q.to) {
    if from > to {
      return Err(AppError::BadRequest("from must not be after to".into()));
    }
  }
  let events = state.calendar.events_between(user_id, q.from, q.to).await?;
  Ok(Json(EventsOut { events }))
}

#[instrument(level = "info", skip(state, body), fields(user_id = %body.user_id, event_id = %body.event_id))]
pub async fn http_post_complete(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CompleteIn>,
) -> AppResult<Json<CompletionOutcome>> {
  let user_id = require_user(&body.user_id)?;
  state
    .calendar
    .complete_event(&state.gamification, user_id, &body.event_id)
    .await?
    .map(Json)
    .ok_or_else(|| AppError::NotFound(format!("event {}", body.event_id)))
}
