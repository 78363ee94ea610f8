//! Study-plan generation: prompt assembly and parsing of the week-numbered reply.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::{LlmTuning, Prompts};
use crate::llm::{ChatBackend, ChatRequest};
use crate::retry::{fetch_with_retry, FetchError};
use crate::util::fill_template;

const DEFAULT_STUDY_HOURS: &str = "2";
const DEFAULT_GOAL: &str = "Improve academic performance";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct StudyPlanRequest {
  #[serde(default)]
  pub subjects: Vec<String>,
  /// Free-form, e.g. "2" or "1.5".
  #[serde(default)]
  pub study_hours: Option<String>,
  #[serde(default)]
  pub strengths: Vec<String>,
  #[serde(default)]
  pub weaknesses: Vec<String>,
  #[serde(default)]
  pub goals: Option<String>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct StudyWeek {
  pub week: u32,
  pub entries: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct StudyPlan {
  pub study_plan: String,
  pub weeks: Vec<StudyWeek>,
}

pub fn build_prompt(prompts: &Prompts, req: &StudyPlanRequest) -> String {
  let subjects = req.subjects.join(", ");
  let strengths = req.strengths.join(", ");
  let weaknesses = req.weaknesses.join(", ");
  let hours = req.study_hours.as_deref().filter(|h| !h.trim().is_empty()).unwrap_or(DEFAULT_STUDY_HOURS);
  let goals = req.goals.as_deref().filter(|g| !g.trim().is_empty()).unwrap_or(DEFAULT_GOAL);
  fill_template(
    &prompts.study_plan_template,
    &[
      ("subjects", &subjects),
      ("study_hours", hours),
      ("strengths", &strengths),
      ("weaknesses", &weaknesses),
      ("goals", goals),
    ],
  )
}

/// Week number from header lines like `**Week 2**`, `### Week 3:` or `Week 1`.
fn week_header(line: &str) -> Option<u32> {
  let t = line.trim().trim_start_matches(['#', '*', ' ']).trim_end_matches(['*', ':', ' ']);
  let rest = t.strip_prefix("Week").or_else(|| t.strip_prefix("WEEK"))?;
  let digits: String = rest.trim_start().chars().take_while(|c| c.is_ascii_digit()).collect();
  let after = rest.trim_start()[digits.len()..].trim_start_matches(['*', ':', ' ']);
  if digits.is_empty() || !after.is_empty() {
    return None;
  }
  digits.parse().ok()
}

/// Split plan text into weeks. Lines before the first header are ignored.
pub fn parse_weeks(text: &str) -> Vec<StudyWeek> {
  let mut weeks: Vec<StudyWeek> = Vec::new();
  for line in text.lines() {
    if let Some(n) = week_header(line) {
      weeks.push(StudyWeek { week: n, entries: Vec::new() });
      continue;
    }
    let entry = line.trim();
    if entry.is_empty() {
      continue;
    }
    if let Some(w) = weeks.last_mut() {
      w.entries.push(entry.to_string());
    }
  }
  weeks
}

#[instrument(level = "info", skip(backend, prompts, tuning, req), fields(subjects = req.subjects.len()))]
pub async fn generate<B: ChatBackend>(
  backend: &B,
  model: &str,
  prompts: &Prompts,
  tuning: &LlmTuning,
  req: &StudyPlanRequest,
) -> Result<StudyPlan, FetchError> {
  let request = ChatRequest {
    system: String::new(),
    user: build_prompt(prompts, req),
    temperature: tuning.temperature,
    max_tokens: Some(tuning.max_tokens),
    model: Some(model.to_string()),
  };
  let study_plan = fetch_with_retry(backend, &request, &tuning.retry_policy()).await?;
  let weeks = parse_weeks(&study_plan);
  info!(target: "study_tutor", weeks = weeks.len(), plan_len = study_plan.len(), "Study plan generated");
  Ok(StudyPlan { study_plan, weeks })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::llm::testing::ScriptedBackend;
  use crate::llm::LlmError;

  #[test]
  fn prompt_fills_defaults() {
    let req = StudyPlanRequest {
      subjects: vec!["Math".into(), "Physics".into()],
      strengths: vec!["Algebra".into()],
      ..Default::default()
    };
    let p = build_prompt(&Prompts::default(), &req);
    assert!(p.contains("- Subjects: Math, Physics"));
    assert!(p.contains("- Daily Study Time: 2 hours"));
    assert!(p.contains("- Strengths: Algebra"));
    assert!(p.contains("- Goal: Improve academic performance"));
    assert!(!p.contains("{goals}"));
  }

  #[test]
  fn headers_are_recognised() {
    assert_eq!(week_header("**Week 1**"), Some(1));
    assert_eq!(week_header("### Week 12:"), Some(12));
    assert_eq!(week_header("Week 3"), Some(3));
    assert_eq!(week_header("Weekly review: Math"), None);
    assert_eq!(week_header("Week 2 focuses on revision"), None);
    assert_eq!(week_header("Monday: 9:00 AM"), None);
  }

  #[test]
  fn weeks_are_split() {
    let text = "Here is your plan.\n\n**Week 1**\nMonday: 9:00 AM - 10:30 AM: Math\nTuesday: 10:00 AM - 11:30 AM: Science\n\n**Week 2**\nMonday: 8:00 AM - 9:30 AM: English\n";
    let weeks = parse_weeks(text);
    assert_eq!(weeks.len(), 2);
    assert_eq!(weeks[0].week, 1);
    assert_eq!(weeks[0].entries.len(), 2);
    assert_eq!(weeks[1].entries, vec!["Monday: 8:00 AM - 9:30 AM: English".to_string()]);
  }

  #[tokio::test]
  async fn generate_uses_study_plan_model() {
    let backend = ScriptedBackend::new([Ok("**Week 1**\nMonday: Math".to_string())]);
    let plan = generate(&backend, "plan-model", &Prompts::default(), &LlmTuning::default(), &StudyPlanRequest::default())
      .await
      .unwrap();
    assert_eq!(plan.weeks.len(), 1);
    let sent = backend.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(sent.model.as_deref(), Some("plan-model"));
  }

  #[tokio::test]
  async fn upstream_failure_is_returned() {
    let backend = ScriptedBackend::new([Err(LlmError::Upstream("API error: 401 - Invalid API Key".into()))]);
    let err = generate(&backend, "m", &Prompts::default(), &LlmTuning::default(), &StudyPlanRequest::default())
      .await
      .unwrap_err();
    assert_eq!(err, FetchError::Upstream("API error: 401 - Invalid API Key".into()));
  }
}
