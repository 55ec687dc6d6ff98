use thiserror::Error;

/// Failures of the retrieval chain.
///
/// Upstream failures during summarization are turned into a user-visible
/// message by the summarizer; everywhere else these abort the current query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetrievalError {
  #[error("{service} call failed: {message}")]
  UpstreamCallFailure { service: String, message: String },

  #[error("record {record_id}: bad '{field}': {message}")]
  DataFormatError { record_id: String, field: String, message: String },

  #[error("query vector has {actual} dimensions, stored vectors have {expected}")]
  DimensionMismatch { expected: usize, actual: usize },

  #[error("embedding store line {line}: {message}")]
  StoreFormat { line: usize, message: String },

  #[error("could not read embedding store {path}: {message}")]
  StoreIo { path: String, message: String },

  #[error("store was embedded with '{stored}' but queries use '{requested}'")]
  ModelVersionMismatch { stored: String, requested: String },

  #[error("vector index returned unknown record '{id}'")]
  UnknownRecord { id: String },

  #[error("query is empty")]
  EmptyQuery,

  #[error("invalid configuration: {message}")]
  Config { message: String },
}

pub type Result<T> = std::result::Result<T, RetrievalError>;

impl RetrievalError {
  pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
    Self::UpstreamCallFailure { service: service.into(), message: message.into() }
  }

  pub fn data_format(
    record_id: impl Into<String>,
    field: impl Into<String>,
    message: impl Into<String>,
  ) -> Self {
    Self::DataFormatError {
      record_id: record_id.into(),
      field: field.into(),
      message: message.into(),
    }
  }

  pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
    Self::DimensionMismatch { expected, actual }
  }

  pub fn store_format(line: usize, message: impl Into<String>) -> Self {
    Self::StoreFormat { line, message: message.into() }
  }

  pub fn store_io(path: impl Into<String>, message: impl Into<String>) -> Self {
    Self::StoreIo { path: path.into(), message: message.into() }
  }

  pub fn model_version_mismatch(stored: impl Into<String>, requested: impl Into<String>) -> Self {
    Self::ModelVersionMismatch { stored: stored.into(), requested: requested.into() }
  }

  pub fn unknown_record(id: impl Into<String>) -> Self {
    Self::UnknownRecord { id: id.into() }
  }

  pub fn config(message: impl Into<String>) -> Self {
    Self::Config { message: message.into() }
  }

  pub fn is_upstream(&self) -> bool {
    matches!(self, Self::UpstreamCallFailure { .. })
  }
}
