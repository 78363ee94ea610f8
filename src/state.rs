//! Application state shared by HTTP and WebSocket handlers.
//!
//! This module owns:
//!   - the gamification engine and learning calendar (JSON-file backed)
//!   - the response cache
//!   - in-memory chat threads
//!   - prompts and LLM tuning (from TOML or defaults)
//!   - the optional LLM client and a per-day usage counter

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::cache::ResponseCache;
use crate::calendar::Calendar;
use crate::chat::ChatSessions;
use crate::clock::{Clock, SystemClock};
use crate::config::{AgentConfig, LlmTuning, Prompts};
use crate::error::StoreError;
use crate::gamification::Gamification;
use crate::llm::LlmClient;

pub struct AppState {
  pub gamification: Gamification,
  pub calendar: Calendar,
  pub cache: ResponseCache,
  pub chats: ChatSessions,
  pub llm: Option<LlmClient>,
  pub prompts: Prompts,
  pub tuning: LlmTuning,
  usage: RwLock<HashMap<NaiveDate, u64>>,
  clock: Arc<dyn Clock>,
}

impl AppState {
  /// Build state from config and env: stores under the data dir, LLM client from env.
  #[instrument(level = "info", skip_all, fields(data_dir = %cfg.storage.data_dir.display()))]
  pub async fn new(cfg: AgentConfig) -> Result<Self, StoreError> {
    let llm = LlmClient::from_env();
    if let Some(c) = &llm {
      info!(target: "study_tutor", base_url = %c.base_url, model = %c.model, study_plan_model = %c.study_plan_model, "LLM enabled.");
    }
    Self::build(cfg, llm, Arc::new(SystemClock)).await
  }

  pub async fn build(cfg: AgentConfig, llm: Option<LlmClient>, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
    let storage = &cfg.storage;
    let cache = ResponseCache::open(storage.cache_file()).await?;
    Ok(Self {
      gamification: Gamification::new(storage.users_file(), clock.clone()),
      calendar: Calendar::new(storage.calendar_file(), clock.clone()),
      cache,
      chats: ChatSessions::default(),
      llm,
      prompts: cfg.prompts,
      tuning: cfg.llm,
      usage: RwLock::new(HashMap::new()),
      clock,
    })
  }

  /// Count one successful upstream call against today. Earlier days are dropped.
  pub async fn record_usage(&self) {
    let today = self.clock.today();
    let mut usage = self.usage.write().await;
    usage.retain(|day, _| *day == today);
    *usage.entry(today).or_insert(0) += 1;
  }

  pub async fn usage_today(&self) -> u64 {
    let today = self.clock.today();
    self.usage.read().await.get(&today).copied().unwrap_or(0)
  }
}

#[cfg(test)]
pub mod testing {
  use super::*;
  use crate::clock::ManualClock;
  use tempfile::TempDir;

  /// State rooted in a fresh temp dir, with a fixed Monday-noon clock and no LLM client.
  pub async fn state_in_tempdir() -> (TempDir, AppState) {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = AgentConfig::default();
    cfg.storage.data_dir = dir.path().to_path_buf();
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::at("2024-06-03 12:00"));
    let state = AppState::build(cfg, None, clock).await.unwrap();
    (dir, state)
  }
}
