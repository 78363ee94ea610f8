//! Learning calendar: generated study schedules and session completion.
//!
//! Events live in one JSON document shared by all users. Points and schedule
//! achievements are delegated to the gamification engine passed in by the caller.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{AchievementAward, CalendarDocument, CalendarEvent, PointsResult};
use crate::error::StoreError;
use crate::gamification::Gamification;
use crate::store::JsonStore;

pub const MAX_SCHEDULE_DAYS: u32 = 30;
/// Default look-ahead for `events_between` when no end date is given.
pub const DEFAULT_VIEW_DAYS: u64 = 14;
const SESSION_MINUTES: u32 = 60;
const SESSION_POINTS: u64 = 10;
const SESSION_DIFFICULTY: &str = "Medium";

#[derive(Clone, Debug, Serialize)]
pub struct ScheduleOutcome {
  pub schedule_id: String,
  pub events: Vec<CalendarEvent>,
  pub achievement: Option<AchievementAward>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CompletionOutcome {
  pub event: CalendarEvent,
  /// False when the event had already been completed.
  pub newly_completed: bool,
  pub points: Option<PointsResult>,
  pub schedule_completed: bool,
  pub achievement: Option<AchievementAward>,
}

pub struct Calendar {
  store: JsonStore<CalendarDocument>,
  clock: Arc<dyn Clock>,
}

impl Calendar {
  pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
    Self { store: JsonStore::new(path), clock }
  }

  /// One session per day starting at `start` (today when absent). `days` is clamped to
  /// 1..=MAX_SCHEDULE_DAYS.
  #[instrument(level = "info", skip(self, games))]
  pub async fn generate_schedule(
    &self,
    games: &Gamification,
    user_id: &str,
    topic: &str,
    subject: &str,
    days: u32,
    start: Option<NaiveDate>,
  ) -> Result<ScheduleOutcome, StoreError> {
    let start = start.unwrap_or_else(|| self.clock.today());
    let days = days.clamp(1, MAX_SCHEDULE_DAYS);
    let schedule_id = Uuid::new_v4().to_string();

    let events: Vec<CalendarEvent> = (0..days)
      .filter_map(|i| start.checked_add_days(Days::new(u64::from(i))).map(|date| (i + 1, date)))
      .map(|(n, date)| CalendarEvent {
        id: Uuid::new_v4().to_string(),
        schedule_id: schedule_id.clone(),
        date,
        user_id: user_id.to_string(),
        topic: topic.to_string(),
        subject: subject.to_string(),
        subtopic: format!("Part {} of {}", n, topic),
        description: format!("Study session for {} - Day {}", topic, n),
        duration: SESSION_MINUTES,
        completed: false,
        points: SESSION_POINTS,
        difficulty: SESSION_DIFFICULTY.to_string(),
      })
      .collect();

    let to_store = events.clone();
    self.store.update(move |doc| doc.events.extend(to_store)).await?;
    info!(target: "study_tutor", %user_id, %schedule_id, events = events.len(), "Learning schedule created");

    let achievement = games.track_schedule_created(user_id).await?;
    Ok(ScheduleOutcome { schedule_id, events, achievement })
  }

  /// The user's events in `[from, to]`, grouped by date.
  pub async fn events_between(
    &self,
    user_id: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
  ) -> Result<BTreeMap<NaiveDate, Vec<CalendarEvent>>, StoreError> {
    let from = from.unwrap_or_else(|| self.clock.today());
    let to = to.unwrap_or_else(|| from.checked_add_days(Days::new(DEFAULT_VIEW_DAYS)).unwrap_or(from));

    let doc = self.store.load().await?;
    let mut grouped: BTreeMap<NaiveDate, Vec<CalendarEvent>> = BTreeMap::new();
    for ev in doc.events.into_iter().filter(|e| e.user_id == user_id && e.date >= from && e.date <= to) {
      grouped.entry(ev.date).or_default().push(ev);
    }
    Ok(grouped)
  }

  /// Mark a session complete. `None` when the event does not exist or is not the user's.
  #[instrument(level = "info", skip(self, games))]
  pub async fn complete_event(
    &self,
    games: &Gamification,
    user_id: &str,
    event_id: &str,
  ) -> Result<Option<CompletionOutcome>, StoreError> {
    let found = self
      .store
      .update(|doc| {
        let idx = doc.events.iter().position(|e| e.id == event_id && e.user_id == user_id)?;
        let newly = !doc.events[idx].completed;
        doc.events[idx].completed = true;
        let event = doc.events[idx].clone();
        let schedule_done = doc
          .events
          .iter()
          .filter(|e| e.schedule_id == event.schedule_id)
          .all(|e| e.completed);
        Some((event, newly, schedule_done))
      })
      .await?;

    let Some((event, newly_completed, schedule_done)) = found else {
      return Ok(None);
    };

    let mut outcome = CompletionOutcome {
      event,
      newly_completed,
      points: None,
      schedule_completed: schedule_done,
      achievement: None,
    };
    if !newly_completed {
      return Ok(Some(outcome));
    }

    outcome.points = Some(games.award_points(user_id, outcome.event.points, "Completed study session").await?);
    if schedule_done {
      info!(target: "study_tutor", %user_id, schedule_id = %outcome.event.schedule_id, "Learning schedule completed");
      outcome.achievement = games.track_schedule_completed(user_id).await?;
    }
    Ok(Some(outcome))
  }
}
