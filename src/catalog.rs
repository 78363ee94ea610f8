//! Static reference data: level table, achievement catalog and the option lists
//! offered to clients (subjects, grade levels, learning styles, languages).

use serde::Serialize;

pub const FIRST_QUESTION: &str = "first_question";
pub const STREAK_3: &str = "streak_3";
pub const STREAK_7: &str = "streak_7";
pub const FIRST_SCHEDULE: &str = "first_schedule";
pub const COMPLETE_SCHEDULE: &str = "complete_schedule";
pub const SUBJECT_MASTER: &str = "subject_master";
pub const NIGHT_OWL: &str = "night_owl";
pub const EARLY_BIRD: &str = "early_bird";
pub const WEEKEND_WARRIOR: &str = "weekend_warrior";

/// One row of the level table. Thresholds strictly increase with `level`.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct LevelDef {
  pub level: u8,
  pub threshold: u64,
  pub title: &'static str,
}

/// A one-time milestone and the points it grants.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct AchievementDef {
  pub id: &'static str,
  pub name: &'static str,
  pub description: &'static str,
  pub points: u64,
  pub icon: &'static str,
}

pub static LEVELS: [LevelDef; 10] = [
  LevelDef { level: 1, threshold: 0, title: "Beginner Learner" },
  LevelDef { level: 2, threshold: 100, title: "Eager Student" },
  LevelDef { level: 3, threshold: 250, title: "Knowledge Seeker" },
  LevelDef { level: 4, threshold: 500, title: "Academic Explorer" },
  LevelDef { level: 5, threshold: 1000, title: "Scholar" },
  LevelDef { level: 6, threshold: 2000, title: "Master Scholar" },
  LevelDef { level: 7, threshold: 3500, title: "Intellectual" },
  LevelDef { level: 8, threshold: 5000, title: "Knowledge Master" },
  LevelDef { level: 9, threshold: 7500, title: "Wisdom Keeper" },
  LevelDef { level: 10, threshold: 10000, title: "Education Virtuoso" },
];

pub static ACHIEVEMENTS: [AchievementDef; 9] = [
  AchievementDef { id: FIRST_QUESTION, name: "First Question", description: "Asked your first question", points: 10, icon: "🎯" },
  AchievementDef { id: STREAK_3, name: "Three-Day Streak", description: "Used the app for 3 consecutive days", points: 30, icon: "🔥" },
  AchievementDef { id: STREAK_7, name: "Weekly Scholar", description: "Used the app for 7 consecutive days", points: 100, icon: "🔥" },
  AchievementDef { id: FIRST_SCHEDULE, name: "Planner", description: "Created your first learning schedule", points: 25, icon: "📅" },
  AchievementDef { id: COMPLETE_SCHEDULE, name: "Follow Through", description: "Completed all events in a learning schedule", points: 150, icon: "✅" },
  AchievementDef { id: SUBJECT_MASTER, name: "Subject Enthusiast", description: "Asked 10 questions in the same subject", points: 50, icon: "📚" },
  AchievementDef { id: NIGHT_OWL, name: "Night Owl", description: "Studied late at night (after 10 PM)", points: 15, icon: "🦉" },
  AchievementDef { id: EARLY_BIRD, name: "Early Bird", description: "Studied early in the morning (before 8 AM)", points: 15, icon: "🐦" },
  AchievementDef { id: WEEKEND_WARRIOR, name: "Weekend Warrior", description: "Studied on both Saturday and Sunday in the same weekend", points: 40, icon: "⚔️" },
];

pub const SUBJECTS: &[&str] = &[
  "General", "Mathematics", "Science", "History", "Language Arts",
  "Computer Science", "Geography", "Economics", "Physics", "Chemistry",
  "Biology", "Literature", "Philosophy",
];

pub const GRADE_LEVELS: &[&str] = &[
  "Elementary School", "Middle School", "High School", "College/University", "Professional",
];

pub const LEARNING_STYLES: &[&str] = &[
  "Visual", "Auditory", "Reading/Writing", "Kinesthetic", "No Preference",
];

/// (language code, display name)
pub const LANGUAGES: &[(&str, &str)] = &[
  ("en", "English"),
  ("hi", "हिन्दी (Hindi)"),
  ("bn", "বাংলা (Bengali)"),
  ("te", "తెలుగు (Telugu)"),
  ("mr", "मराठी (Marathi)"),
  ("ta", "தமிழ் (Tamil)"),
  ("gu", "ગુજરાતી (Gujarati)"),
  ("kn", "ಕನ್ನಡ (Kannada)"),
  ("ml", "മലയാളം (Malayalam)"),
  ("pa", "ਪੰਜਾਬੀ (Punjabi)"),
  ("or", "ଓଡ଼ିଆ (Odia)"),
  ("as", "অসমীয়া (Assamese)"),
];

pub fn achievement(id: &str) -> Option<&'static AchievementDef> {
  ACHIEVEMENTS.iter().find(|a| a.id == id)
}

/// Level row for a level number, clamped into the table.
pub fn level_def(level: u8) -> &'static LevelDef {
  let idx = usize::from(level.clamp(1, max_level())) - 1;
  &LEVELS[idx]
}

pub fn max_level() -> u8 {
  LEVELS[LEVELS.len() - 1].level
}

/// Display name used in prompts; unknown codes fall back to English.
pub fn language_name(code: &str) -> &'static str {
  LANGUAGES
    .iter()
    .find(|(c, _)| c.eq_ignore_ascii_case(code))
    .map(|(_, name)| *name)
    .unwrap_or("English")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn level_thresholds_strictly_increase() {
    assert_eq!(LEVELS[0].threshold, 0);
    for pair in LEVELS.windows(2) {
      assert!(pair[0].threshold < pair[1].threshold);
      assert_eq!(pair[0].level + 1, pair[1].level);
    }
  }

  #[test]
  fn achievement_ids_are_unique_and_resolvable() {
    for a in ACHIEVEMENTS.iter() {
      assert_eq!(achievement(a.id).map(|d| d.name), Some(a.name));
    }
    let mut ids: Vec<_> = ACHIEVEMENTS.iter().map(|a| a.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), ACHIEVEMENTS.len());
    assert!(achievement("does_not_exist").is_none());
  }

  #[test]
  fn language_lookup_falls_back_to_english() {
    assert_eq!(language_name("ta"), "தமிழ் (Tamil)");
    assert_eq!(language_name("EN"), "English");
    assert_eq!(language_name("xx"), "English");
  }

  #[test]
  fn level_def_clamps() {
    assert_eq!(level_def(0).level, 1);
    assert_eq!(level_def(42).level, 10);
  }
}
