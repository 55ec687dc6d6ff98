//! Flat, typed rows built from ranked results
//!
//! Known metadata keys become fields, the event date is parsed into a UTC
//! timestamp, and any other keys are flattened into dotted column names
//! (`source.name`). A dot inside a key is escaped (`a\\.b`) so a flat key never
//! collides with a nested one. A row with a missing or unparseable date is an
//! error for the whole query, never silently dropped.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{Result, RetrievalError};
use crate::ranker::RankedResult;
use crate::record::{RecordId, RecordMetadata};

const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq)]
pub struct FlatRow {
  pub id: RecordId,
  pub score: f32,
  pub title: Option<String>,
  pub date: DateTime<Utc>,
  /// Date exactly as stored, kept so the row can be re-nested unchanged
  pub date_text: String,
  pub country: Option<String>,
  pub disaster_type: Option<String>,
  pub status: Option<String>,
  pub description: Option<String>,
  /// Remaining metadata, flattened to dotted keys with scalar or array values.
  /// Dots and backslashes inside a key are escaped with `\\`.
  pub columns: BTreeMap<String, Value>,
}

impl FlatRow {
  pub fn title_or_default(&self) -> &str {
    self.title.as_deref().unwrap_or("(untitled)")
  }

  /// Re-nest the flat columns into the stored metadata shape
  pub fn to_metadata(&self) -> RecordMetadata {
    let mut extra = Map::new();
    for (key, value) in &self.columns {
      insert_path(&mut extra, &split_path(key), value.clone());
    }

    RecordMetadata {
      title: self.title.clone(),
      date: Some(self.date_text.clone()),
      country: self.country.clone(),
      disaster_type: self.disaster_type.clone(),
      status: self.status.clone(),
      description: self.description.clone(),
      extra: extra.into_iter().collect(),
    }
  }
}

/// Parse the ISO-8601 forms the disaster API emits.
///
/// Accepts RFC 3339 with offset or `Z`, naive date-times (taken as UTC), and
/// bare dates (midnight UTC).
pub fn parse_event_date(text: &str) -> std::result::Result<DateTime<Utc>, String> {
  let text = text.trim();
  if text.is_empty() {
    return Err("empty date".to_string());
  }

  if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
    return Ok(parsed.with_timezone(&Utc));
  }

  for format in NAIVE_DATETIME_FORMATS {
    if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
      return Ok(parsed.and_utc());
    }
  }

  if let Ok(date) = NaiveDate::parse_from_str(text, DATE_FORMAT) {
    if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
      return Ok(midnight.and_utc());
    }
  }

  Err(format!("'{text}' is not an ISO-8601 date"))
}

pub fn flatten_one(result: RankedResult) -> Result<FlatRow> {
  let RankedResult { id, score, metadata } = result;

  let date_text = metadata
    .date
    .ok_or_else(|| RetrievalError::data_format(id.as_str(), "date", "missing"))?;
  let date =
    parse_event_date(&date_text).map_err(|message| RetrievalError::data_format(id.as_str(), "date", message))?;

  let mut columns = BTreeMap::new();
  for (key, value) in metadata.extra {
    flatten_value(&id, &escape_segment(&key), value, &mut columns)?;
  }

  Ok(FlatRow {
    id,
    score,
    title: metadata.title,
    date,
    date_text,
    country: metadata.country,
    disaster_type: metadata.disaster_type,
    status: metadata.status,
    description: metadata.description,
    columns,
  })
}

/// Flatten every ranked result, keeping rank order. The first bad row aborts.
pub fn flatten(results: Vec<RankedResult>) -> Result<Vec<FlatRow>> {
  results.into_iter().map(flatten_one).collect()
}

fn flatten_value(
  id: &RecordId,
  path: &str,
  value: Value,
  columns: &mut BTreeMap<String, Value>,
) -> Result<()> {
  match value {
    Value::Object(map) if !map.is_empty() => {
      for (key, nested) in map {
        flatten_value(id, &format!("{path}.{}", escape_segment(&key)), nested, columns)?;
      }
      Ok(())
    }
    other => {
      if columns.insert(path.to_string(), other).is_some() {
        return Err(RetrievalError::data_format(id.as_str(), path, "column produced twice"));
      }
      Ok(())
    }
  }
}

/// Escape `\` and `.` inside one key so dotted paths stay unambiguous
fn escape_segment(key: &str) -> String {
  key.replace('\\', "\\\\").replace('.', "\\.")
}

/// Split a column name on unescaped dots, undoing [`escape_segment`]
fn split_path(column: &str) -> Vec<String> {
  let mut segments = vec![String::new()];
  let mut chars = column.chars();
  while let Some(c) = chars.next() {
    match c {
      '\\' => {
        if let (Some(escaped), Some(current)) = (chars.next(), segments.last_mut()) {
          current.push(escaped);
        }
      }
      '.' => segments.push(String::new()),
      other => {
        if let Some(current) = segments.last_mut() {
          current.push(other);
        }
      }
    }
  }
  segments
}

fn insert_path(target: &mut Map<String, Value>, path: &[String], value: Value) {
  match path {
    [] => {}
    [last] => {
      target.insert(last.clone(), value);
    }
    [head, rest @ ..] => {
      let slot = target.entry(head.clone()).or_insert_with(|| Value::Object(Map::new()));
      if !slot.is_object() {
        *slot = Value::Object(Map::new());
      }
      if let Value::Object(nested) = slot {
        insert_path(nested, rest, value);
      }
    }
  }
}
