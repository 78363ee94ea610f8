//! Loading agent configuration (prompts, LLM tuning, storage) from TOML.
//!
//! Every section and field is optional; see `AgentConfig` for the schema.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::retry::{RetryPolicy, MAX_DELAY_SECS};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub llm: LlmTuning,
  #[serde(default)]
  pub storage: Storage,
}

/// Prompt templates. Placeholders are `{name}` and filled by `util::fill_template`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  /// `{language}`
  pub tutor_system: String,
  /// `{subject} {grade_level} {learning_style} {material} {context_block} {question}
  /// {follow_up_rule} {language}`
  pub tutor_user_template: String,
  /// `{subjects} {study_hours} {strengths} {weaknesses} {goals}`
  pub study_plan_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      tutor_system: "You are a helpful educational tutor. Respond in {language} language.".into(),
      tutor_user_template: "You are an educational tutor specializing in {subject}.\n\
The student is at a {grade_level} level and prefers {learning_style} learning approaches.\n\
\n\
STUDY MATERIAL TEXT:\n\
{material}\n\
\n\
{context_block}\n\
STUDENT QUESTION:\n\
{question}\n\
\n\
Based on both the study material and the question, provide a comprehensive educational response that:\n\
1. Directly answers the student's question\n\
2. References relevant information from the study material\n\
3. Explains key concepts clearly and thoroughly\n\
4. Provides examples or analogies appropriate for their learning style\n\
5. Suggests additional study approaches for this topic\n\
{follow_up_rule}\n\
Provide your response in {language} language.".into(),
      study_plan_template: "Create a structured and personalized study plan for a student.\n\
- Subjects: {subjects}\n\
- Daily Study Time: {study_hours} hours\n\
- Strengths: {strengths}\n\
- Weaknesses: {weaknesses}\n\
- Goal: {goals}\n\
\n\
### Response Format:\n\
Generate the study plan as structured text, with each week introduced by a numbered header line.\n\
\n\
#### Example Response Format:\n\
**Week 1**\n\
Monday: 9:00 AM - 10:30 AM: Math\n\
Tuesday: 10:00 AM - 11:30 AM: Science\n\
\n\
**Week 2**\n\
Monday: 8:00 AM - 9:30 AM: English\n\
Tuesday: 9:30 AM - 11:00 AM: Physics".into(),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LlmTuning {
  pub max_attempts: u32,
  pub retry_base_delay_secs: f64,
  pub temperature: f32,
  pub max_tokens: u32,
}

impl Default for LlmTuning {
  fn default() -> Self {
    Self { max_attempts: 3, retry_base_delay_secs: 2.0, temperature: 0.4, max_tokens: 2048 }
  }
}

impl LlmTuning {
  /// Base delay is clamped to [0, MAX_DELAY_SECS]; NaN falls back to the default.
  pub fn retry_policy(&self) -> RetryPolicy {
    let secs = self.retry_base_delay_secs.clamp(0.0, MAX_DELAY_SECS);
    RetryPolicy {
      max_attempts: self.max_attempts.max(1),
      base_delay: Duration::try_from_secs_f64(secs).unwrap_or(RetryPolicy::default().base_delay),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Storage {
  pub data_dir: PathBuf,
}

impl Default for Storage {
  fn default() -> Self {
    Self { data_dir: PathBuf::from("./data") }
  }
}

impl Storage {
  pub fn users_file(&self) -> PathBuf {
    self.data_dir.join("user_gamification_data.json")
  }
  pub fn calendar_file(&self) -> PathBuf {
    self.data_dir.join("calendar_data.json")
  }
  pub fn cache_file(&self) -> PathBuf {
    self.data_dir.join("response_cache.json")
  }
}

/// Config from AGENT_CONFIG_PATH (defaults when unset or unreadable), with DATA_DIR
/// overriding the storage directory.
pub fn load_agent_config_from_env() -> AgentConfig {
  let mut cfg = std::env::var("AGENT_CONFIG_PATH")
    .ok()
    .and_then(|path| load_agent_config(Path::new(&path)))
    .unwrap_or_default();
  if let Ok(dir) = std::env::var("DATA_DIR") {
    cfg.storage.data_dir = PathBuf::from(dir);
  }
  cfg
}

/// On any parsing/IO error, logs and returns None.
pub fn load_agent_config(path: &Path) -> Option<AgentConfig> {
  match std::fs::read_to_string(path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "study_tutor", path = %path.display(), "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "study_tutor", path = %path.display(), error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "study_tutor", path = %path.display(), error = %e, "Failed to read TOML config file");
      None
    }
  }
}
