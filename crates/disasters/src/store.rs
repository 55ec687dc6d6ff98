//! Pre-computed embedding store
//!
//! The store is a line-delimited JSON file, one record per line:
//!
//! ```text
//! {"id": 52098, "embedding": [0.01, ...], "embedding_metadata": {"title": ..., "date": ...}, "embedding_model": "text-embedding-005"}
//! ```
//!
//! It is read wholesale once at startup and shared read-only afterwards. The
//! optional `embedding_model` tag records which model produced the vectors so
//! queries embedded with another model can be refused.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use crate::error::{Result, RetrievalError};
use crate::record::{Record, RecordId, RecordMetadata};

#[derive(Deserialize)]
struct StoreLine {
  id: RecordId,
  embedding: Vec<f32>,
  #[serde(default)]
  embedding_metadata: RecordMetadata,
  #[serde(default)]
  embedding_model: Option<String>,
}

/// All stored records, in file order, with an id lookup
#[derive(Debug, Default)]
pub struct EmbeddingStore {
  records: Vec<Record>,
  positions: HashMap<RecordId, usize>,
  dimension: Option<usize>,
  embedding_model: Option<String>,
}

impl EmbeddingStore {
  /// Build a store from records already in memory (fixtures, tests, rebuilds)
  pub fn from_records(records: Vec<Record>, embedding_model: Option<String>) -> Result<Self> {
    let mut store = Self { embedding_model, ..Self::default() };
    for (position, record) in records.into_iter().enumerate() {
      store.push(record, position + 1)?;
    }
    Ok(store)
  }

  /// Read a store file from disk
  pub fn load(path: &Path) -> Result<Self> {
    let content = fs::read_to_string(path)
      .map_err(|e| RetrievalError::store_io(path.display().to_string(), e.to_string()))?;

    let store = Self::parse(&content)?;
    info!(
      path = %path.display(),
      records = store.len(),
      dimension = store.dimension().unwrap_or(0),
      "loaded embedding store"
    );
    Ok(store)
  }

  /// Parse line-delimited store content. Blank lines are skipped.
  pub fn parse(content: &str) -> Result<Self> {
    let mut store = Self::default();

    for (index, line) in content.lines().enumerate() {
      let line_number = index + 1;
      if line.trim().is_empty() {
        continue;
      }

      let parsed: StoreLine = serde_json::from_str(line)
        .map_err(|e| RetrievalError::store_format(line_number, e.to_string()))?;

      if let Some(model) = parsed.embedding_model.as_deref() {
        store.adopt_model_tag(model, line_number)?;
      }

      let record = Record::new(parsed.id, parsed.embedding, parsed.embedding_metadata);
      store.push(record, line_number)?;
    }

    Ok(store)
  }

  fn adopt_model_tag(&mut self, model: &str, line: usize) -> Result<()> {
    match self.embedding_model.as_deref() {
      None => {
        self.embedding_model = Some(model.to_string());
        Ok(())
      }
      Some(existing) if existing == model => Ok(()),
      Some(existing) => Err(RetrievalError::store_format(
        line,
        format!("embedding model '{model}' differs from '{existing}' used earlier in the store"),
      )),
    }
  }

  fn push(&mut self, record: Record, line: usize) -> Result<()> {
    if record.embedding.is_empty() {
      return Err(RetrievalError::store_format(line, format!("record {} has no embedding", record.id)));
    }

    match self.dimension {
      None => self.dimension = Some(record.embedding.len()),
      Some(expected) if expected != record.embedding.len() => {
        return Err(RetrievalError::store_format(
          line,
          format!(
            "record {} has {} dimensions, expected {}",
            record.id,
            record.embedding.len(),
            expected
          ),
        ));
      }
      Some(_) => {}
    }

    if self.positions.contains_key(&record.id) {
      return Err(RetrievalError::store_format(line, format!("duplicate record id {}", record.id)));
    }

    self.positions.insert(record.id.clone(), self.records.len());
    self.records.push(record);
    Ok(())
  }

  pub fn get(&self, id: &RecordId) -> Option<&Record> {
    self.positions.get(id).map(|&position| &self.records[position])
  }

  /// Insertion index of a record, used to break score ties
  pub fn position(&self, id: &RecordId) -> Option<usize> {
    self.positions.get(id).copied()
  }

  /// Records in file (insertion) order
  pub fn records(&self) -> &[Record] {
    &self.records
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  /// Shared vector dimension, `None` for an empty store
  pub fn dimension(&self) -> Option<usize> {
    self.dimension
  }

  pub fn embedding_model(&self) -> Option<&str> {
    self.embedding_model.as_deref()
  }

  /// Refuse query embeddings from a model other than the one the store was built with
  pub fn check_query_model(&self, requested: &str) -> Result<()> {
    match self.embedding_model.as_deref() {
      Some(stored) if stored != requested => {
        Err(RetrievalError::model_version_mismatch(stored, requested))
      }
      Some(_) => Ok(()),
      None => {
        debug!(requested, "embedding store has no model tag, skipping version check");
        Ok(())
      }
    }
  }

  /// A query vector must match the stored dimension exactly
  pub fn check_dimension(&self, query: &[f32]) -> Result<()> {
    match self.dimension {
      Some(expected) if expected != query.len() => {
        Err(RetrievalError::dimension_mismatch(expected, query.len()))
      }
      _ => Ok(()),
    }
  }
}

/// Process-wide access to the loaded store.
///
/// Loaded explicitly at startup; callers take an `Arc` snapshot per query so a
/// reload never changes a query that is already running.
pub struct StoreHandle {
  path: Option<PathBuf>,
  current: RwLock<Arc<EmbeddingStore>>,
}

impl StoreHandle {
  pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
    let path = path.into();
    let store = EmbeddingStore::load(&path)?;
    Ok(Self { path: Some(path), current: RwLock::new(Arc::new(store)) })
  }

  /// Wrap a store built in memory; `reload` is unavailable for these
  pub fn from_store(store: EmbeddingStore) -> Self {
    Self { path: None, current: RwLock::new(Arc::new(store)) }
  }

  pub fn path(&self) -> Option<&Path> {
    self.path.as_deref()
  }

  pub fn current(&self) -> Arc<EmbeddingStore> {
    let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
    Arc::clone(&*guard)
  }

  /// Re-read the store file. On failure the previous snapshot stays active.
  pub fn reload(&self) -> Result<Arc<EmbeddingStore>> {
    let path = self
      .path
      .as_deref()
      .ok_or_else(|| RetrievalError::config("store was not loaded from a file"))?;

    match EmbeddingStore::load(path) {
      Ok(store) => {
        let store = Arc::new(store);
        self.swap(Arc::clone(&store));
        Ok(store)
      }
      Err(e) => {
        warn!(error = %e, "store reload failed, keeping previous snapshot");
        Err(e)
      }
    }
  }

  /// Swap in a different store, e.g. a test fixture
  pub fn replace(&self, store: EmbeddingStore) {
    self.swap(Arc::new(store));
  }

  fn swap(&self, store: Arc<EmbeddingStore>) {
    let mut guard = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = store;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use tempfile::NamedTempFile;

  const THREE_RECORDS: &str = r#"{"id": 1, "embedding": [1.0, 0.0], "embedding_metadata": {"title": "r1", "date": "2024-01-01"}}
{"id": "2", "embedding": [0.0, 1.0], "embedding_metadata": {"title": "r2", "date": "2024-01-02"}}

{"id": 3, "embedding": [0.7, 0.7], "embedding_metadata": {"title": "r3", "date": "2024-01-03"}}
"#;

  fn write_store(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
  }

  #[test]
  fn test_parse_keeps_file_order_and_skips_blank_lines() {
    let store = EmbeddingStore::parse(THREE_RECORDS).unwrap();
    let ids: Vec<&str> = store.records().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert_eq!(store.dimension(), Some(2));
    assert!(store.embedding_model().is_none());
  }

  #[test]
  fn test_lookup_by_id() {
    let store = EmbeddingStore::parse(THREE_RECORDS).unwrap();
    let record = store.get(&RecordId::from("3")).unwrap();
    assert_eq!(record.metadata.title.as_deref(), Some("r3"));
    assert!(store.get(&RecordId::from("99")).is_none());
  }

  #[test]
  fn test_dimension_disagreement_names_the_line() {
    let content = "{\"id\": 1, \"embedding\": [1.0, 0.0]}\n{\"id\": 2, \"embedding\": [1.0]}\n";
    let err = EmbeddingStore::parse(content).unwrap_err();
    assert!(matches!(err, RetrievalError::StoreFormat { line: 2, .. }));
  }

  #[test]
  fn test_invalid_json_line() {
    let err = EmbeddingStore::parse("{\"id\": 1, \"embedding\": [1.0]}\nnot json\n").unwrap_err();
    assert!(matches!(err, RetrievalError::StoreFormat { line: 2, .. }));
  }

  #[test]
  fn test_duplicate_ids_rejected() {
    let content = "{\"id\": 1, \"embedding\": [1.0]}\n{\"id\": \"1\", \"embedding\": [0.5]}\n";
    let err = EmbeddingStore::parse(content).unwrap_err();
    assert!(err.to_string().contains("duplicate"));
  }

  #[test]
  fn test_empty_embedding_rejected() {
    let err = EmbeddingStore::parse("{\"id\": 1, \"embedding\": []}\n").unwrap_err();
    assert!(err.to_string().contains("no embedding"));
  }

  #[test]
  fn test_model_tags_must_agree() {
    let content = concat!(
      "{\"id\": 1, \"embedding\": [1.0], \"embedding_model\": \"text-embedding-005\"}\n",
      "{\"id\": 2, \"embedding\": [1.0]}\n",
      "{\"id\": 3, \"embedding\": [1.0], \"embedding_model\": \"text-embedding-004\"}\n",
    );
    let err = EmbeddingStore::parse(content).unwrap_err();
    assert!(matches!(err, RetrievalError::StoreFormat { line: 3, .. }));
  }

  #[test]
  fn test_check_query_model() {
    let content = "{\"id\": 1, \"embedding\": [1.0], \"embedding_model\": \"text-embedding-005\"}\n";
    let store = EmbeddingStore::parse(content).unwrap();
    assert!(store.check_query_model("text-embedding-005").is_ok());
    assert_eq!(
      store.check_query_model("text-embedding-004").unwrap_err(),
      RetrievalError::ModelVersionMismatch {
        stored: "text-embedding-005".to_string(),
        requested: "text-embedding-004".to_string(),
      }
    );

    let untagged = EmbeddingStore::parse(THREE_RECORDS).unwrap();
    assert!(untagged.check_query_model("anything").is_ok());
  }

  #[test]
  fn test_check_dimension() {
    let store = EmbeddingStore::parse(THREE_RECORDS).unwrap();
    assert!(store.check_dimension(&[0.1, 0.2]).is_ok());
    assert_eq!(
      store.check_dimension(&[0.1, 0.2, 0.3]).unwrap_err(),
      RetrievalError::DimensionMismatch { expected: 2, actual: 3 }
    );
    assert!(EmbeddingStore::default().check_dimension(&[1.0]).is_ok());
  }

  #[test]
  fn test_load_missing_file() {
    let err = EmbeddingStore::load(Path::new("/definitely/not/here.json")).unwrap_err();
    assert!(matches!(err, RetrievalError::StoreIo { .. }));
  }

  #[test]
  fn test_handle_reload_picks_up_new_content() {
    let file = write_store(THREE_RECORDS);
    let handle = StoreHandle::load(file.path()).unwrap();
    let before = handle.current();
    assert_eq!(before.len(), 3);

    fs::write(file.path(), "{\"id\": 9, \"embedding\": [1.0, 1.0]}\n").unwrap();
    let after = handle.reload().unwrap();

    assert_eq!(after.len(), 1);
    assert_eq!(handle.current().len(), 1);
    // snapshots taken earlier are unaffected
    assert_eq!(before.len(), 3);
  }

  #[test]
  fn test_handle_failed_reload_keeps_previous_store() {
    let file = write_store(THREE_RECORDS);
    let handle = StoreHandle::load(file.path()).unwrap();

    fs::write(file.path(), "garbage\n").unwrap();
    assert!(handle.reload().is_err());
    assert_eq!(handle.current().len(), 3);
  }

  #[test]
  fn test_handle_replace_with_fixture() {
    let handle = StoreHandle::from_store(EmbeddingStore::default());
    assert!(handle.current().is_empty());
    assert!(handle.reload().is_err());

    let fixture = EmbeddingStore::from_records(
      vec![Record::new("a", vec![1.0], RecordMetadata::default())],
      Some("text-embedding-005".to_string()),
    )
    .unwrap();
    handle.replace(fixture);

    assert_eq!(handle.current().len(), 1);
    assert_eq!(handle.current().embedding_model(), Some("text-embedding-005"));
  }
}
