use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable record key shared by ingestion, the store and the vector index.
///
/// The upstream API hands out integers while the index reports strings, so
/// both forms are accepted and kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for RecordId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for RecordId {
  fn from(id: &str) -> Self {
    Self::new(id)
  }
}

impl From<i64> for RecordId {
  fn from(id: i64) -> Self {
    Self(id.to_string())
  }
}

impl<'de> Deserialize<'de> for RecordId {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
      Int(i64),
      Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
      Raw::Int(id) => RecordId::from(id),
      Raw::Text(id) => RecordId(id.trim().to_string()),
    })
  }
}

/// Nested per-record metadata as produced at ingestion time.
///
/// Unknown keys are kept in `extra` so flattening can carry them through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub date: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub country: Option<String>,
  #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
  pub disaster_type: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(flatten)]
  pub extra: BTreeMap<String, serde_json::Value>,
}

/// One disaster event with its embedding. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
  pub id: RecordId,
  pub embedding: Vec<f32>,
  pub metadata: RecordMetadata,
}

impl Record {
  pub fn new(id: impl Into<RecordId>, embedding: Vec<f32>, metadata: RecordMetadata) -> Self {
    Self { id: id.into(), embedding, metadata }
  }

  /// Free-text description, empty when the upstream API had none
  pub fn description(&self) -> &str {
    self.metadata.description.as_deref().unwrap_or("")
  }
}
