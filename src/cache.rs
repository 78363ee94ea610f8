//! Content-addressed response cache for tutor answers.
//!
//! Entries are keyed by (fingerprint, language code), never expire and are never evicted.
//! The in-memory map is the source of truth for lookups; every store rewrites the JSON file.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::error::StoreError;
use crate::store::JsonStore;

/// Deterministic key over every input that shapes a tutor answer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// No normalization: whitespace or case differences produce different keys.
pub fn fingerprint(
  combined_text: &str,
  query: &str,
  subject: &str,
  grade: &str,
  style: &str,
  context: &str,
) -> Fingerprint {
  let mut hasher = Sha256::new();
  for field in [combined_text, query, subject, grade, style, context] {
    // length prefix keeps field boundaries unambiguous
    hasher.update((field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
  }
  Fingerprint(hex::encode(hasher.finalize()))
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CacheDocument {
  #[serde(default)]
  pub entries: BTreeMap<String, String>,
}

pub struct ResponseCache {
  file: JsonStore<CacheDocument>,
  entries: RwLock<BTreeMap<String, String>>,
}

fn entry_key(key: &Fingerprint, language: &str) -> String {
  format!("{}:{}", key.as_str(), language)
}

impl ResponseCache {
  /// Load previously persisted entries (an absent file is an empty cache).
  pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
    let file = JsonStore::new(path);
    let doc: CacheDocument = file.load().await?;
    info!(target: "study_tutor", entries = doc.entries.len(), path = %file.path().display(), "Response cache loaded");
    Ok(Self { file, entries: RwLock::new(doc.entries) })
  }

  pub async fn lookup(&self, key: &Fingerprint, language: &str) -> Option<String> {
    let hit = self.entries.read().await.get(&entry_key(key, language)).cloned();
    debug!(target: "study_tutor", %key, %language, hit = hit.is_some(), "Cache lookup");
    hit
  }

  /// Insert or overwrite. Memory only changes once the file has been written.
  #[instrument(level = "debug", skip(self, text), fields(%key, %language, text_len = text.len()))]
  pub async fn store(&self, key: &Fingerprint, language: &str, text: &str) -> Result<(), StoreError> {
    let mut entries = self.entries.write().await;
    let mut next = entries.clone();
    next.insert(entry_key(key, language), text.to_string());
    self.persist(&next).await?;
    *entries = next;
    Ok(())
  }

  /// Drop every entry; returns how many were removed.
  pub async fn clear(&self) -> Result<usize, StoreError> {
    let mut entries = self.entries.write().await;
    let removed = entries.len();
    self.persist(&BTreeMap::new()).await?;
    entries.clear();
    info!(target: "study_tutor", removed, "Response cache cleared");
    Ok(removed)
  }

  pub async fn len(&self) -> usize {
    self.entries.read().await.len()
  }

  async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
    let doc = CacheDocument { entries: entries.clone() };
    self.file.save(&doc).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn key(query: &str) -> Fingerprint {
    fingerprint("material", query, "Physics", "High School", "Visual", "")
  }

  #[test]
  fn fingerprint_is_deterministic_and_field_sensitive() {
    assert_eq!(key("why?"), key("why?"));
    assert_ne!(key("why?"), key("Why?"));
    assert_ne!(key("why?"), key("why? "));
    assert_ne!(
      fingerprint("a_b", "c", "", "", "", ""),
      fingerprint("a", "b_c", "", "", "", ""),
    );
    assert_ne!(
      fingerprint("m", "q", "Physics", "High School", "Visual", ""),
      fingerprint("m", "q", "Physics", "High School", "Visual", "User: hi"),
    );
    assert_eq!(key("x").as_str().len(), 64);
  }

  #[tokio::test]
  async fn round_trip_is_per_language() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResponseCache::open(dir.path().join("cache.json")).await.unwrap();
    let k = key("what is inertia?");

    cache.store(&k, "en", "answer").await.unwrap();
    assert_eq!(cache.lookup(&k, "en").await.as_deref(), Some("answer"));
    assert_eq!(cache.lookup(&k, "fr").await, None);

    cache.store(&k, "en", "better answer").await.unwrap();
    assert_eq!(cache.lookup(&k, "en").await.as_deref(), Some("better answer"));
    assert_eq!(cache.len().await, 1);
  }

  #[tokio::test]
  async fn entries_survive_reopen_and_clear_empties() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let k = key("q");
    {
      let cache = ResponseCache::open(&path).await.unwrap();
      cache.store(&k, "hi", "उत्तर").await.unwrap();
    }
    let cache = ResponseCache::open(&path).await.unwrap();
    assert_eq!(cache.lookup(&k, "hi").await.as_deref(), Some("उत्तर"));

    assert_eq!(cache.clear().await.unwrap(), 1);
    let reopened = ResponseCache::open(&path).await.unwrap();
    assert_eq!(reopened.lookup(&k, "hi").await, None);
  }

  #[tokio::test]
  async fn failed_write_leaves_memory_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResponseCache::open(dir.path().join("data").join("cache.json")).await.unwrap();
    // a plain file where the parent directory should be makes every write fail
    std::fs::write(dir.path().join("data"), b"").unwrap();

    let k = key("q");
    assert!(cache.store(&k, "en", "answer").await.is_err());
    assert_eq!(cache.lookup(&k, "en").await, None);
    assert_eq!(cache.len().await, 0);
  }
}
