//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::{self, AchievementDef, LevelDef};
use crate::domain::{CalendarEvent, QuestionOutcome, StreakOutcome};
use crate::gamification::Dashboard;
use crate::tutor::{AskOutcome, AskRequest};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
  Ping,
  StartSession { user_id: String },
  Ask(AskRequest),
  Profile { user_id: String },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
  Pong,
  Session { streak: StreakOutcome },
  Answer(AskOut),
  Profile { dashboard: Dashboard },
  Error { message: String },
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
}

#[derive(Serialize)]
pub struct LanguageOut {
  pub code: &'static str,
  pub name: &'static str,
}

#[derive(Serialize)]
pub struct CatalogOut {
  pub subjects: &'static [&'static str],
  pub grade_levels: &'static [&'static str],
  pub learning_styles: &'static [&'static str],
  pub languages: Vec<LanguageOut>,
  pub levels: &'static [LevelDef],
  pub achievements: &'static [AchievementDef],
}

impl CatalogOut {
  pub fn build() -> Self {
    Self {
      subjects: catalog::SUBJECTS,
      grade_levels: catalog::GRADE_LEVELS,
      learning_styles: catalog::LEARNING_STYLES,
      languages: catalog::LANGUAGES.iter().map(|&(code, name)| LanguageOut { code, name }).collect(),
      levels: &catalog::LEVELS,
      achievements: &catalog::ACHIEVEMENTS,
    }
  }
}

#[derive(Serialize)]
pub struct LlmStatusOut {
  pub configured: bool,
  pub valid: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  pub usage_today: u64,
  pub cache_entries: usize,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
  pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionIn {
  pub user_id: String,
}

/// Tutor reply as sent to clients; `kind` tells the outcomes apart.
#[derive(Debug, Serialize)]
pub struct AskOut {
  pub chat_id: String,
  pub kind: &'static str,
  pub text: String,
  pub cached: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub question: Option<QuestionOutcome>,
}

impl From<AskOutcome> for AskOut {
  fn from(o: AskOutcome) -> Self {
    let cached = matches!(o.reply, crate::domain::TutorReply::Answer { cached: true, .. });
    Self {
      chat_id: o.chat_id,
      kind: o.reply.kind(),
      text: o.reply.user_text(),
      cached,
      question: o.question,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ChatTitleIn {
  pub user_id: String,
  pub title: String,
}

#[derive(Serialize)]
pub struct OkOut {
  pub ok: bool,
}

#[derive(Serialize)]
pub struct CacheClearedOut {
  pub removed: usize,
}

fn default_schedule_days() -> u32 {
  7
}

#[derive(Debug, Deserialize)]
pub struct ScheduleIn {
  pub user_id: String,
  pub topic: String,
  pub subject: String,
  #[serde(default = "default_schedule_days")]
  pub days: u32,
  #[serde(default)]
  pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
  pub user_id: String,
  pub from: Option<NaiveDate>,
  pub to: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct EventsOut {
  pub events: BTreeMap<NaiveDate, Vec<CalendarEvent>>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteIn {
  pub user_id: String,
  pub event_id: String,
}
