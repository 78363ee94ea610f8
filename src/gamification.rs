//! Gamification engine: points, levels, achievements, streaks and usage counters.
//!
//! Every mutation is a read-modify-write of the users document. Public operations hold a
//! per-user lock for their whole sequence of writes, so concurrent requests for one user
//! are applied one after another. Achievement awards are separate writes that land before
//! the final point award of the operation that triggered them.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Timelike;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument};

use crate::catalog::{self, AchievementDef, ACHIEVEMENTS};
use crate::clock::Clock;
use crate::domain::{
  AchievementAward, PointsResult, QuestionOutcome, StreakOutcome, UserProfile, UsersDocument,
};
use crate::error::StoreError;
use crate::levels::{self, level_for_points, LevelProgress};
use crate::store::JsonStore;

const QUESTION_POINTS: u64 = 5;
const SUBJECT_MASTER_COUNT: u32 = 10;
const SATURDAY: &str = "Saturday";
const SUNDAY: &str = "Sunday";

pub struct Gamification {
  store: JsonStore<UsersDocument>,
  clock: Arc<dyn Clock>,
  locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// Everything the progress page shows.
#[derive(Clone, Debug, Serialize)]
pub struct Dashboard {
  pub user_id: String,
  pub profile: UserProfile,
  pub progress: LevelProgress,
  pub completion_rate: f64,
  pub earned: Vec<AchievementDef>,
  pub available: Vec<AchievementDef>,
  /// Sorted by question count, highest first.
  pub subjects: Vec<(String, u32)>,
}

impl Gamification {
  pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
    Self { store: JsonStore::new(path), clock, locks: Mutex::new(HashMap::new()) }
  }

  /// Existing profile, or a fresh zero-valued one that is persisted right away.
  #[instrument(level = "debug", skip(self))]
  pub async fn get_or_create_profile(&self, user_id: &str) -> Result<UserProfile, StoreError> {
    let _user = self.lock_user(user_id).await;
    self.profile(user_id).await
  }

  #[instrument(level = "info", skip(self))]
  pub async fn award_points(&self, user_id: &str, amount: u64, reason: &str) -> Result<PointsResult, StoreError> {
    let _user = self.lock_user(user_id).await;
    self.add_points(user_id, amount, reason).await
  }

  /// `None` when the id is unknown or already held; never awards twice.
  #[instrument(level = "info", skip(self))]
  pub async fn award_achievement(&self, user_id: &str, achievement_id: &str) -> Result<Option<AchievementAward>, StoreError> {
    let _user = self.lock_user(user_id).await;
    self.grant(user_id, achievement_id).await
  }

  /// Record today's activity and return the resulting streak.
  #[instrument(level = "info", skip(self))]
  pub async fn update_streak(&self, user_id: &str) -> Result<StreakOutcome, StoreError> {
    let _user = self.lock_user(user_id).await;
    let today = self.clock.today();

    let (current, longest, milestone) = self
      .modify(user_id, |p| {
        let s = &mut p.streak;
        let mut milestone = None;
        match s.last_active {
          None => s.current = 1,
          Some(last) => {
            let gap = (today - last).num_days();
            if gap == 1 {
              s.current += 1;
              // exact match: a streak that jumps past 3 or 7 never unlocks them
              milestone = match s.current {
                3 => Some(catalog::STREAK_3),
                7 => Some(catalog::STREAK_7),
                _ => None,
              };
            } else if gap > 1 {
              s.current = 1;
            }
          }
        }
        s.longest = s.longest.max(s.current);
        s.last_active = Some(today);
        (s.current, s.longest, milestone)
      })
      .await?;

    let mut unlocked = Vec::new();
    if let Some(id) = milestone {
      unlocked.extend(self.grant(user_id, id).await?);
    }

    debug!(target: "gamification", %user_id, current, longest, "Streak updated");
    Ok(StreakOutcome { current, longest, unlocked })
  }

  #[instrument(level = "info", skip(self))]
  pub async fn track_question_asked(&self, user_id: &str, subject: &str) -> Result<QuestionOutcome, StoreError> {
    let _user = self.lock_user(user_id).await;
    let now = self.clock.now();
    let weekday = now.format("%A").to_string();
    let hour = now.hour();

    let (was_first, subject_count, weekend_done) = self
      .modify(user_id, |p| {
        let was_first = p.questions_asked == 0;
        let count = p.subjects.entry(subject.to_string()).or_insert(0);
        *count += 1;
        let count = *count;
        p.questions_asked += 1;

        let mut weekend_done = false;
        if weekday == SATURDAY || weekday == SUNDAY {
          if !p.weekend_days.contains(&weekday) {
            p.weekend_days.push(weekday.clone());
          }
          let seen = |d: &str| p.weekend_days.iter().any(|w| w == d);
          if seen(SATURDAY) && seen(SUNDAY) {
            weekend_done = true;
            p.weekend_days.clear();
          }
        }
        (was_first, count, weekend_done)
      })
      .await?;

    let mut triggered = Vec::new();
    if was_first {
      triggered.push(catalog::FIRST_QUESTION);
    }
    if subject_count == SUBJECT_MASTER_COUNT {
      triggered.push(catalog::SUBJECT_MASTER);
    }
    if hour >= 22 || hour < 3 {
      triggered.push(catalog::NIGHT_OWL);
    } else if (5..8).contains(&hour) {
      triggered.push(catalog::EARLY_BIRD);
    }
    if weekend_done {
      triggered.push(catalog::WEEKEND_WARRIOR);
    }

    let mut unlocked = Vec::new();
    for id in triggered {
      unlocked.extend(self.grant(user_id, id).await?);
    }

    let points = self.add_points(user_id, QUESTION_POINTS, "Asked a question").await?;
    Ok(QuestionOutcome { points, unlocked })
  }

  #[instrument(level = "info", skip(self))]
  pub async fn track_schedule_created(&self, user_id: &str) -> Result<Option<AchievementAward>, StoreError> {
    let _user = self.lock_user(user_id).await;
    let was_first = self
      .modify(user_id, |p| {
        let was_first = p.schedules_created == 0;
        p.schedules_created += 1;
        was_first
      })
      .await?;
    if was_first {
      self.grant(user_id, catalog::FIRST_SCHEDULE).await
    } else {
      Ok(None)
    }
  }

  #[instrument(level = "info", skip(self))]
  pub async fn track_schedule_completed(&self, user_id: &str) -> Result<Option<AchievementAward>, StoreError> {
    let _user = self.lock_user(user_id).await;
    self.modify(user_id, |p| p.schedules_completed += 1).await?;
    self.grant(user_id, catalog::COMPLETE_SCHEDULE).await
  }

  pub async fn dashboard(&self, user_id: &str) -> Result<Dashboard, StoreError> {
    let profile = self.get_or_create_profile(user_id).await?;

    let completion_rate = if profile.schedules_created > 0 {
      f64::from(profile.schedules_completed) / f64::from(profile.schedules_created) * 100.0
    } else {
      0.0
    };
    let (earned, available): (Vec<AchievementDef>, Vec<AchievementDef>) =
      ACHIEVEMENTS.iter().copied().partition(|a| profile.has_achievement(a.id));

    let mut subjects: Vec<(String, u32)> = profile.subjects.iter().map(|(k, v)| (k.clone(), *v)).collect();
    subjects.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    Ok(Dashboard {
      user_id: user_id.to_string(),
      progress: levels::progress(profile.points),
      profile,
      completion_rate,
      earned,
      available,
      subjects,
    })
  }

  // --- unlocked helpers: callers hold the user lock ---

  async fn profile(&self, user_id: &str) -> Result<UserProfile, StoreError> {
    if let Some(p) = self.store.load().await?.users.get(user_id) {
      return Ok(p.clone());
    }
    let today = self.clock.today();
    let created = self
      .store
      .update(|doc| doc.users.entry(user_id.to_string()).or_insert_with(|| UserProfile::new(today)).clone())
      .await?;
    info!(target: "gamification", %user_id, "Created user profile");
    Ok(created)
  }

  async fn modify<R>(&self, user_id: &str, f: impl FnOnce(&mut UserProfile) -> R) -> Result<R, StoreError> {
    let today = self.clock.today();
    self
      .store
      .update(|doc| {
        let profile = doc.users.entry(user_id.to_string()).or_insert_with(|| UserProfile::new(today));
        let out = f(profile);
        profile.last_updated = today;
        out
      })
      .await
  }

  async fn add_points(&self, user_id: &str, amount: u64, reason: &str) -> Result<PointsResult, StoreError> {
    let result = self
      .modify(user_id, |p| {
        let old_level = p.level;
        p.points = p.points.saturating_add(amount);
        p.level = level_for_points(p.points);
        PointsResult {
          points_added: amount,
          new_total: p.points,
          level_up: p.level > old_level,
          new_level: p.level,
          level_title: catalog::level_def(p.level).title,
        }
      })
      .await?;

    debug!(target: "gamification", %user_id, amount, %reason, total = result.new_total, "Points awarded");
    if result.level_up {
      info!(target: "gamification", %user_id, level = result.new_level, title = result.level_title, "Level up");
    }
    Ok(result)
  }

  async fn grant(&self, user_id: &str, achievement_id: &str) -> Result<Option<AchievementAward>, StoreError> {
    let Some(def) = catalog::achievement(achievement_id) else {
      debug!(target: "gamification", %user_id, %achievement_id, "Unknown achievement ignored");
      return Ok(None);
    };

    let newly = self
      .modify(user_id, |p| {
        if p.has_achievement(def.id) {
          false
        } else {
          p.achievements.push(def.id.to_string());
          true
        }
      })
      .await?;
    if !newly {
      return Ok(None);
    }

    let points_result = self.add_points(user_id, def.points, &format!("Achievement: {}", def.name)).await?;
    info!(target: "gamification", %user_id, achievement = def.id, points = def.points, "Achievement unlocked");
    Ok(Some(AchievementAward { achievement: *def, points_result }))
  }

  /// Per-user lock. Slots nobody holds or waits on are dropped so the map stays small.
  async fn lock_user(&self, user_id: &str) -> OwnedMutexGuard<()> {
    let slot = {
      let mut locks = self.locks.lock().await;
      locks.retain(|id, m| id == user_id || Arc::strong_count(m) > 1);
      locks.entry(user_id.to_string()).or_default().clone()
    };
    slot.lock_owned().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::ManualClock;
  use tempfile::TempDir;

  fn engine(at: &str) -> (TempDir, Arc<ManualClock>, Gamification) {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::at(at));
    let g = Gamification::new(dir.path().join("users.json"), clock.clone());
    (dir, clock, g)
  }

  fn ids(awards: &[AchievementAward]) -> Vec<&'static str> {
    awards.iter().map(|a| a.achievement.id).collect()
  }

  #[tokio::test]
  async fn new_profile_is_zeroed_and_persisted() {
    let (dir, _clock, g) = engine("2024-06-03 12:00");
    let p = g.get_or_create_profile("ana").await.unwrap();
    assert_eq!(p.points, 0);
    assert_eq!(p.level, 1);
    assert_eq!(p.streak.current, 0);

    let raw = std::fs::read_to_string(dir.path().join("users.json")).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(doc["users"]["ana"]["points"], 0);
  }

  #[tokio::test]
  async fn award_points_reports_level_up() {
    let (_dir, _clock, g) = engine("2024-06-03 12:00");
    let r = g.award_points("ana", 90, "test").await.unwrap();
    assert!(!r.level_up);
    assert_eq!(r.new_level, 1);

    let r = g.award_points("ana", 20, "test").await.unwrap();
    assert!(r.level_up);
    assert_eq!(r.new_total, 110);
    assert_eq!(r.new_level, 2);
    assert_eq!(r.level_title, "Eager Student");
  }

  #[tokio::test]
  async fn achievements_are_idempotent() {
    let (_dir, _clock, g) = engine("2024-06-03 12:00");
    let first = g.award_achievement("ana", catalog::NIGHT_OWL).await.unwrap();
    assert_eq!(first.map(|a| a.points_result.new_total), Some(15));

    assert!(g.award_achievement("ana", catalog::NIGHT_OWL).await.unwrap().is_none());
    let p = g.get_or_create_profile("ana").await.unwrap();
    assert_eq!(p.achievements, vec![catalog::NIGHT_OWL.to_string()]);
    assert_eq!(p.points, 15);
  }

  #[tokio::test]
  async fn unknown_achievement_is_a_no_op() {
    let (_dir, _clock, g) = engine("2024-06-03 12:00");
    assert!(g.award_achievement("ana", "moon_landing").await.unwrap().is_none());
    assert_eq!(g.get_or_create_profile("ana").await.unwrap().points, 0);
  }

  #[tokio::test]
  async fn streak_continues_then_resets_after_gap() {
    let (_dir, clock, g) = engine("2024-06-03 09:00");
    assert_eq!(g.update_streak("ana").await.unwrap().current, 1);

    clock.set("2024-06-04 09:00");
    let s = g.update_streak("ana").await.unwrap();
    assert_eq!((s.current, s.longest), (2, 2));

    clock.set("2024-06-06 09:00");
    let s = g.update_streak("ana").await.unwrap();
    assert_eq!((s.current, s.longest), (1, 2));
  }

  #[tokio::test]
  async fn same_day_update_changes_nothing() {
    let (_dir, clock, g) = engine("2024-06-03 09:00");
    g.update_streak("ana").await.unwrap();
    clock.set("2024-06-04 08:00");
    g.update_streak("ana").await.unwrap();
    clock.set("2024-06-04 23:00");
    let s = g.update_streak("ana").await.unwrap();
    assert_eq!(s.current, 2);
    let p = g.get_or_create_profile("ana").await.unwrap();
    assert_eq!(p.streak.last_active, Some(clock.today()));
  }

  #[tokio::test]
  async fn streak_3_unlocks_exactly_once() {
    let (_dir, clock, g) = engine("2024-06-01 09:00");
    let mut unlocked = Vec::new();
    for day in 1..=5 {
      clock.set(&format!("2024-06-{:02} 09:00", day));
      unlocked.extend(g.update_streak("ana").await.unwrap().unlocked);
    }
    assert_eq!(ids(&unlocked), vec![catalog::STREAK_3]);

    let p = g.get_or_create_profile("ana").await.unwrap();
    assert_eq!(p.streak.current, 5);
    assert_eq!(p.points, 30);
    assert_eq!(p.achievements.iter().filter(|a| *a == catalog::STREAK_3).count(), 1);
  }

  #[tokio::test]
  async fn streak_7_unlocks_on_seventh_day() {
    let (_dir, clock, g) = engine("2024-06-01 09:00");
    let mut last = None;
    for day in 1..=7 {
      clock.set(&format!("2024-06-{:02} 09:00", day));
      last = Some(g.update_streak("ana").await.unwrap());
    }
    let last = last.unwrap();
    assert_eq!(last.current, 7);
    assert_eq!(ids(&last.unlocked), vec![catalog::STREAK_7]);
  }

  #[tokio::test]
  async fn first_question_awards_bonus_and_question_points() {
    // Monday noon: no time-of-day or weekend effects.
    let (_dir, _clock, g) = engine("2024-06-03 12:00");
    let out = g.track_question_asked("ana", "Physics").await.unwrap();
    assert_eq!(ids(&out.unlocked), vec![catalog::FIRST_QUESTION]);
    assert_eq!(out.points.points_added, 5);
    assert_eq!(out.points.new_total, 15);

    let out = g.track_question_asked("ana", "Physics").await.unwrap();
    assert!(out.unlocked.is_empty());
    let p = g.get_or_create_profile("ana").await.unwrap();
    assert_eq!(p.questions_asked, 2);
    assert_eq!(p.subjects.get("Physics"), Some(&2));
  }

  #[tokio::test]
  async fn subject_master_on_tenth_question_in_subject() {
    let (_dir, _clock, g) = engine("2024-06-03 12:00");
    for _ in 0..9 {
      g.track_question_asked("ana", "History").await.unwrap();
    }
    g.track_question_asked("ana", "Biology").await.unwrap();
    let out = g.track_question_asked("ana", "History").await.unwrap();
    assert_eq!(ids(&out.unlocked), vec![catalog::SUBJECT_MASTER]);

    let p = g.get_or_create_profile("ana").await.unwrap();
    assert_eq!(p.questions_asked, p.subjects.values().sum::<u32>());
  }

  #[tokio::test]
  async fn night_owl_and_early_bird_windows() {
    let (_dir, clock, g) = engine("2024-06-03 23:30");
    let out = g.track_question_asked("ana", "Math").await.unwrap();
    assert!(ids(&out.unlocked).contains(&catalog::NIGHT_OWL));

    clock.set("2024-06-04 02:59");
    assert!(g.track_question_asked("ana", "Math").await.unwrap().unlocked.is_empty());

    clock.set("2024-06-04 04:00");
    assert!(g.track_question_asked("bob", "Math").await.unwrap().unlocked.iter().all(|a| a.achievement.id == catalog::FIRST_QUESTION));

    clock.set("2024-06-04 07:59");
    let out = g.track_question_asked("bob", "Math").await.unwrap();
    assert_eq!(ids(&out.unlocked), vec![catalog::EARLY_BIRD]);
  }

  #[tokio::test]
  async fn idle_user_locks_are_pruned() {
    let (_dir, _clock, g) = engine("2024-06-03 12:00");
    for user in ["ana", "bob", "cy", "dee"] {
      g.award_points(user, 1, "test").await.unwrap();
    }
    assert_eq!(g.locks.lock().await.len(), 1);
  }

  /// Time-of-day achievements a brand-new user earns with one weekday question at `at`.
  async fn time_awards(at: &str) -> Vec<&'static str> {
    let (_dir, _clock, g) = engine(at);
    let out = g.track_question_asked("ana", "Math").await.unwrap();
    ids(&out.unlocked).into_iter().filter(|id| *id != catalog::FIRST_QUESTION).collect()
  }

  #[tokio::test]
  async fn night_owl_starts_at_22() {
    assert_eq!(time_awards("2024-06-03 21:59").await, Vec::<&str>::new());
    assert_eq!(time_awards("2024-06-03 22:00").await, vec![catalog::NIGHT_OWL]);
  }

  #[tokio::test]
  async fn night_owl_ends_before_3() {
    assert_eq!(time_awards("2024-06-04 00:00").await, vec![catalog::NIGHT_OWL]);
    assert_eq!(time_awards("2024-06-04 02:59").await, vec![catalog::NIGHT_OWL]);
    assert_eq!(time_awards("2024-06-04 03:00").await, Vec::<&str>::new());
  }

  #[tokio::test]
  async fn early_bird_covers_5_to_8() {
    assert_eq!(time_awards("2024-06-04 04:59").await, Vec::<&str>::new());
    assert_eq!(time_awards("2024-06-04 05:00").await, vec![catalog::EARLY_BIRD]);
    assert_eq!(time_awards("2024-06-04 07:59").await, vec![catalog::EARLY_BIRD]);
    assert_eq!(time_awards("2024-06-04 08:00").await, Vec::<&str>::new());
  }

  #[tokio::test]
  async fn weekend_warrior_in_either_order_once() {
    // 2024-06-09 is a Sunday, 2024-06-15 a Saturday.
    let (_dir, clock, g) = engine("2024-06-09 12:00");
    let out = g.track_question_asked("ana", "Math").await.unwrap();
    assert!(!ids(&out.unlocked).contains(&catalog::WEEKEND_WARRIOR));
    assert_eq!(g.get_or_create_profile("ana").await.unwrap().weekend_days, vec![SUNDAY.to_string()]);

    clock.set("2024-06-15 12:00");
    let out = g.track_question_asked("ana", "Math").await.unwrap();
    assert_eq!(ids(&out.unlocked), vec![catalog::WEEKEND_WARRIOR]);
    assert!(g.get_or_create_profile("ana").await.unwrap().weekend_days.is_empty());

    clock.set("2024-06-16 12:00");
    g.track_question_asked("ana", "Math").await.unwrap();
    clock.set("2024-06-22 12:00");
    let out = g.track_question_asked("ana", "Math").await.unwrap();
    assert!(out.unlocked.is_empty());
    assert!(g.get_or_create_profile("ana").await.unwrap().weekend_days.is_empty());
  }

  #[tokio::test]
  async fn schedule_counters_and_achievements() {
    let (_dir, _clock, g) = engine("2024-06-03 12:00");
    let first = g.track_schedule_created("ana").await.unwrap();
    assert_eq!(first.map(|a| a.achievement.id), Some(catalog::FIRST_SCHEDULE));
    assert!(g.track_schedule_created("ana").await.unwrap().is_none());

    let done = g.track_schedule_completed("ana").await.unwrap();
    assert_eq!(done.map(|a| a.achievement.id), Some(catalog::COMPLETE_SCHEDULE));

    let d = g.dashboard("ana").await.unwrap();
    assert_eq!(d.profile.schedules_created, 2);
    assert_eq!(d.profile.schedules_completed, 1);
    assert!((d.completion_rate - 50.0).abs() < 1e-9);
    assert_eq!(d.earned.len(), 2);
    assert_eq!(d.available.len(), ACHIEVEMENTS.len() - 2);
  }

  #[tokio::test]
  async fn concurrent_questions_are_all_counted() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::at("2024-06-03 12:00"));
    let g = Arc::new(Gamification::new(dir.path().join("users.json"), clock));

    let mut tasks = Vec::new();
    for i in 0..20 {
      let g = g.clone();
      let user = if i % 2 == 0 { "ana" } else { "bob" };
      tasks.push(tokio::spawn(async move { g.track_question_asked(user, "Chemistry").await.unwrap() }));
    }
    for t in tasks {
      t.await.unwrap();
    }

    for user in ["ana", "bob"] {
      let p = g.get_or_create_profile(user).await.unwrap();
      assert_eq!(p.questions_asked, 10);
      // 10 questions * 5 + first_question 10 + subject_master 50
      assert_eq!(p.points, 110);
      assert_eq!(p.level, 2);
    }
  }
}
