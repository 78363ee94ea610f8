//! Level table lookup and progress-to-next-level math.

use serde::Serialize;

use crate::catalog::{level_def, max_level, LEVELS};

/// Highest level whose threshold is <= `points`.
pub fn level_for_points(points: u64) -> u8 {
  LEVELS
    .iter()
    .rev()
    .find(|l| points >= l.threshold)
    .map(|l| l.level)
    .unwrap_or(1)
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct LevelProgress {
  pub level: u8,
  pub title: &'static str,
  pub points: u64,
  /// `None` at max level.
  pub next_level: Option<u8>,
  pub next_threshold: Option<u64>,
  pub points_to_next: Option<u64>,
  /// Fraction of the current level band already covered, in [0, 1].
  pub fraction: f64,
}

pub fn progress(points: u64) -> LevelProgress {
  let level = level_for_points(points);
  let current = level_def(level);

  if level >= max_level() {
    return LevelProgress {
      level,
      title: current.title,
      points,
      next_level: None,
      next_threshold: None,
      points_to_next: None,
      fraction: 1.0,
    };
  }

  let next = level_def(level + 1);
  let band = (next.threshold - current.threshold) as f64;
  let fraction = ((points - current.threshold) as f64 / band).clamp(0.0, 1.0);

  LevelProgress {
    level,
    title: current.title,
    points,
    next_level: Some(next.level),
    next_threshold: Some(next.threshold),
    points_to_next: Some(next.threshold.saturating_sub(points)),
    fraction,
  }
}
