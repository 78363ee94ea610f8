//! Wall-clock source for streaks and time-of-day achievements.
//!
//! Dates and hours are process-local time with no timezone policy.

use chrono::{Local, NaiveDate, NaiveDateTime};

pub trait Clock: Send + Sync {
  fn now(&self) -> NaiveDateTime;

  fn today(&self) -> NaiveDate {
    self.now().date()
  }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> NaiveDateTime {
    Local::now().naive_local()
  }
}

/// Settable clock for tests.
#[cfg(test)]
pub struct ManualClock(std::sync::Mutex<NaiveDateTime>);

#[cfg(test)]
impl ManualClock {
  /// `at("2024-06-01 10:00")`
  pub fn at(s: &str) -> Self {
    Self(std::sync::Mutex::new(parse(s)))
  }

  pub fn set(&self, s: &str) {
    *self.0.lock().unwrap() = parse(s);
  }
}

#[cfg(test)]
impl Clock for ManualClock {
  fn now(&self) -> NaiveDateTime {
    *self.0.lock().unwrap()
  }
}

#[cfg(test)]
fn parse(s: &str) -> NaiveDateTime {
  NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}
