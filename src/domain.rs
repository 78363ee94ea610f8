//! Domain models: user profiles, gamification results, calendar events and chat turns.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::AchievementDef;

/// Consecutive-day usage tracking.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Streak {
  pub current: u32,
  pub longest: u32,
  #[serde(default)]
  pub last_active: Option<NaiveDate>,
}

/// Persistent per-user gamification state.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
  pub points: u64,
  pub level: u8,
  /// Award order; each id appears at most once.
  pub achievements: Vec<String>,
  pub streak: Streak,
  pub subjects: BTreeMap<String, u32>,
  pub questions_asked: u32,
  #[serde(default)]
  pub schedules_created: u32,
  #[serde(default)]
  pub schedules_completed: u32,
  /// Weekday names seen since the last weekend-warrior award.
  #[serde(default)]
  pub weekend_days: Vec<String>,
  pub last_updated: NaiveDate,
}

impl UserProfile {
  pub fn new(today: NaiveDate) -> Self {
    Self {
      points: 0,
      level: 1,
      achievements: Vec::new(),
      streak: Streak::default(),
      subjects: BTreeMap::new(),
      questions_asked: 0,
      schedules_created: 0,
      schedules_completed: 0,
      weekend_days: Vec::new(),
      last_updated: today,
    }
  }

  pub fn has_achievement(&self, id: &str) -> bool {
    self.achievements.iter().any(|a| a == id)
  }
}

/// `{"users": {user_id: UserProfile}}`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UsersDocument {
  #[serde(default)]
  pub users: BTreeMap<String, UserProfile>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PointsResult {
  pub points_added: u64,
  pub new_total: u64,
  pub level_up: bool,
  pub new_level: u8,
  pub level_title: &'static str,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AchievementAward {
  pub achievement: AchievementDef,
  pub points_result: PointsResult,
}

#[derive(Clone, Debug, Serialize)]
pub struct StreakOutcome {
  pub current: u32,
  pub longest: u32,
  pub unlocked: Vec<AchievementAward>,
}

#[derive(Clone, Debug, Serialize)]
pub struct QuestionOutcome {
  pub points: PointsResult,
  pub unlocked: Vec<AchievementAward>,
}

/// One study session in a generated learning schedule.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CalendarEvent {
  pub id: String,
  pub schedule_id: String,
  pub date: NaiveDate,
  pub user_id: String,
  pub topic: String,
  pub subject: String,
  pub subtopic: String,
  pub description: String,
  /// minutes
  pub duration: u32,
  pub completed: bool,
  pub points: u64,
  pub difficulty: String,
}

/// `{"events": [CalendarEvent, ...]}`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CalendarDocument {
  #[serde(default)]
  pub events: Vec<CalendarEvent>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  User,
  Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
  pub role: Role,
  pub content: String,
}

/// Outcome of a tutoring request, distinguishable without parsing message text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TutorReply {
  Answer { text: String, cached: bool },
  RateLimited,
  UpstreamError(String),
  MissingCredential,
}

pub const RATE_LIMIT_MESSAGE: &str =
  "Rate Limit Exceeded. The API service is currently experiencing high demand. Please try again in a few minutes.";
pub const MISSING_CREDENTIAL_MESSAGE: &str =
  "Please configure an LLM API key to get educational insights.";
pub const CACHE_NOTE: &str = "(This response was retrieved from cache)";

impl TutorReply {
  /// Text shown to the learner for every outcome.
  pub fn user_text(&self) -> String {
    match self {
      TutorReply::Answer { text, cached: false } => text.clone(),
      TutorReply::Answer { text, cached: true } => format!("{}\n\n{}", text, CACHE_NOTE),
      TutorReply::RateLimited => RATE_LIMIT_MESSAGE.to_string(),
      TutorReply::UpstreamError(detail) => format!("Error getting insights: {}", detail),
      TutorReply::MissingCredential => MISSING_CREDENTIAL_MESSAGE.to_string(),
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      TutorReply::Answer { .. } => "answer",
      TutorReply::RateLimited => "rate_limited",
      TutorReply::UpstreamError(_) => "upstream_error",
      TutorReply::MissingCredential => "missing_credential",
    }
  }

  pub fn is_answer(&self) -> bool {
    matches!(self, TutorReply::Answer { .. })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn profile_round_trips_through_original_layout() {
    let raw = r#"{
      "points": 15, "level": 1, "achievements": ["first_question"],
      "streak": {"current": 1, "longest": 1, "last_active": "2024-06-01"},
      "subjects": {"Physics": 1}, "questions_asked": 1,
      "schedules_created": 0, "schedules_completed": 0,
      "last_updated": "2024-06-01"
    }"#;
    let p: UserProfile = serde_json::from_str(raw).unwrap();
    assert!(p.has_achievement("first_question"));
    assert!(p.weekend_days.is_empty());
    assert_eq!(p.streak.last_active, NaiveDate::from_ymd_opt(2024, 6, 1));
  }

  #[test]
  fn reply_text_annotates_cache_hits() {
    let hit = TutorReply::Answer { text: "42".into(), cached: true };
    assert_eq!(hit.user_text(), format!("42\n\n{}", CACHE_NOTE));
    assert_eq!(TutorReply::UpstreamError("boom".into()).user_text(), "Error getting insights: boom");
    assert_eq!(TutorReply::RateLimited.kind(), "rate_limited");
  }
}
