//! In-memory chat threads: per-chat turn history, titles and follow-up context.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{ChatTurn, Role};

pub const DEFAULT_TITLE: &str = "New Chat";
/// Window of trailing turns (including the newest question) used for context.
const CONTEXT_WINDOW: usize = 4;

#[derive(Clone, Debug, Serialize)]
pub struct ChatThread {
  pub id: String,
  pub user_id: String,
  pub title: String,
  pub created_at: DateTime<Utc>,
  pub turns: Vec<ChatTurn>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatSummary {
  pub id: String,
  pub title: String,
  pub created_at: DateTime<Utc>,
  pub turns: usize,
}

#[derive(Default)]
pub struct ChatSessions {
  threads: RwLock<HashMap<String, ChatThread>>,
}

impl ChatSessions {
  /// Reuse the caller's thread when it exists and belongs to them, else start a new one.
  pub async fn open(&self, user_id: &str, chat_id: Option<&str>) -> String {
    let mut threads = self.threads.write().await;
    if let Some(id) = chat_id {
      if threads.get(id).is_some_and(|t| t.user_id == user_id) {
        return id.to_string();
      }
    }
    let id = match chat_id {
      Some(id) if !threads.contains_key(id) => id.to_string(),
      _ => Uuid::new_v4().to_string(),
    };
    threads.insert(
      id.clone(),
      ChatThread {
        id: id.clone(),
        user_id: user_id.to_string(),
        title: DEFAULT_TITLE.to_string(),
        created_at: Utc::now(),
        turns: Vec::new(),
      },
    );
    id
  }

  pub async fn push(&self, chat_id: &str, role: Role, content: &str) {
    if let Some(t) = self.threads.write().await.get_mut(chat_id) {
      t.turns.push(ChatTurn { role, content: content.to_string() });
    }
  }

  /// Turns preceding the newest one inside the context window, as "User:"/"Tutor:" lines.
  /// Empty when the newest turn is the only one.
  pub async fn context_before_latest(&self, chat_id: &str) -> String {
    let threads = self.threads.read().await;
    let Some(t) = threads.get(chat_id) else { return String::new() };
    if t.turns.len() <= 1 {
      return String::new();
    }
    let start = t.turns.len().saturating_sub(CONTEXT_WINDOW);
    t.turns[start..t.turns.len() - 1]
      .iter()
      .map(|turn| {
        let who = match turn.role {
          Role::User => "User",
          Role::Assistant => "Tutor",
        };
        format!("{}: {}", who, turn.content)
      })
      .collect::<Vec<_>>()
      .join("\n")
  }

  pub async fn rename(&self, user_id: &str, chat_id: &str, title: &str) -> bool {
    match self.threads.write().await.get_mut(chat_id) {
      Some(t) if t.user_id == user_id => {
        t.title = title.to_string();
        true
      }
      _ => false,
    }
  }

  pub async fn get(&self, user_id: &str, chat_id: &str) -> Option<ChatThread> {
    self.threads.read().await.get(chat_id).filter(|t| t.user_id == user_id).cloned()
  }

  /// Newest first.
  pub async fn list_for_user(&self, user_id: &str) -> Vec<ChatSummary> {
    let threads = self.threads.read().await;
    let mut out: Vec<ChatSummary> = threads
      .values()
      .filter(|t| t.user_id == user_id)
      .map(|t| ChatSummary { id: t.id.clone(), title: t.title.clone(), created_at: t.created_at, turns: t.turns.len() })
      .collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    out
  }
}
