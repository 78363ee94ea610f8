//! Whole-document JSON persistence.
//!
//! Each state file is read fully into memory and rewritten fully on every mutation.
//! A per-file async mutex serializes read-modify-write cycles inside this process;
//! separate processes writing the same file can still lose updates.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::error::StoreError;

pub struct JsonStore<T> {
  path: PathBuf,
  gate: Mutex<()>,
  _doc: PhantomData<fn() -> T>,
}

impl<T> JsonStore<T>
where
  T: Serialize + DeserializeOwned + Default,
{
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into(), gate: Mutex::new(()), _doc: PhantomData }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Read the current document. A missing file yields `T::default()`.
  pub async fn load(&self) -> Result<T, StoreError> {
    let _guard = self.gate.lock().await;
    self.read().await
  }

  /// Replace the whole document.
  pub async fn save(&self, doc: &T) -> Result<(), StoreError> {
    let _guard = self.gate.lock().await;
    self.write(doc).await
  }

  /// Load, mutate and rewrite the document as one serialized step.
  #[instrument(level = "debug", skip(self, f), fields(path = %self.path.display()))]
  pub async fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, StoreError> {
    let _guard = self.gate.lock().await;
    let mut doc = self.read().await?;
    let out = f(&mut doc);
    self.write(&doc).await?;
    Ok(out)
  }

  async fn read(&self) -> Result<T, StoreError> {
    match tokio::fs::read_to_string(&self.path).await {
      Ok(raw) => serde_json::from_str(&raw)
        .map_err(|source| StoreError::Json { path: self.path.clone(), source }),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
      Err(source) => Err(StoreError::Io { path: self.path.clone(), source }),
    }
  }

  async fn write(&self, doc: &T) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io { path: self.path.clone(), source };
    if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let body = serde_json::to_vec(doc)
      .map_err(|source| StoreError::Json { path: self.path.clone(), source })?;
    tokio::fs::write(&self.path, &body).await.map_err(io_err)?;
    debug!(target: "study_tutor", path = %self.path.display(), bytes = body.len(), "State file written");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeMap;
  use std::sync::Arc;

  #[derive(Default, serde::Serialize, serde::Deserialize)]
  struct Doc {
    counters: BTreeMap<String, u32>,
  }

  #[tokio::test]
  async fn missing_file_loads_default() {
    let dir = tempfile::tempdir().unwrap();
    let store: JsonStore<Doc> = JsonStore::new(dir.path().join("nested/doc.json"));
    assert!(store.load().await.unwrap().counters.is_empty());
  }

  #[tokio::test]
  async fn update_persists_and_creates_parent_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/doc.json");
    let store: JsonStore<Doc> = JsonStore::new(&path);
    store.update(|d| d.counters.insert("a".into(), 1)).await.unwrap();

    let reopened: JsonStore<Doc> = JsonStore::new(&path);
    assert_eq!(reopened.load().await.unwrap().counters.get("a"), Some(&1));
  }

  #[tokio::test]
  async fn corrupt_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.json");
    std::fs::write(&path, "{not json").unwrap();
    let store: JsonStore<Doc> = JsonStore::new(&path);
    assert!(matches!(store.load().await, Err(StoreError::Json { .. })));
  }

  #[tokio::test]
  async fn concurrent_updates_do_not_lose_writes() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<JsonStore<Doc>> = Arc::new(JsonStore::new(dir.path().join("doc.json")));

    let mut tasks = Vec::new();
    for _ in 0..25 {
      let store = store.clone();
      tasks.push(tokio::spawn(async move {
        store.update(|d| *d.counters.entry("hits".into()).or_insert(0) += 1).await.unwrap();
      }));
    }
    for t in tasks {
      t.await.unwrap();
    }
    assert_eq!(store.load().await.unwrap().counters["hits"], 25);
  }
}
