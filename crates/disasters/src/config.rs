//! Pipeline configuration
//!
//! Defaults mirror the hosted models the store was built against. Every value
//! can come from the environment (see [`PipelineConfig::from_env`]) and the
//! command line overrides individual flags on top of that.

use clap::ValueEnum;
use std::path::PathBuf;
use url::Url;

use crate::error::{Result, RetrievalError};

pub const DEFAULT_STORE_PATH: &str = "disaster_title_desc_vectors.json";
pub const DEFAULT_LOCATION: &str = "us-central1";
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-005";
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;
pub const DEFAULT_SUMMARY_WORD_LIMIT: usize = 100;

/// What to do when the query rewrite fails or comes back empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RewriteFallback {
  /// Abort the query
  #[default]
  Fail,
  /// Embed the user's text unchanged
  RawQuery,
}

/// How the external vector index measures distance between vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DistanceMeasure {
  /// 1 - cosine similarity; lower is closer
  #[default]
  Cosine,
  /// Raw dot product; higher is closer
  DotProduct,
  /// Squared euclidean distance; lower is closer
  SquaredL2,
}

impl DistanceMeasure {
  /// Map a reported distance onto a score where higher always means more similar
  pub fn to_similarity(self, distance: f32) -> f32 {
    match self {
      DistanceMeasure::Cosine => 1.0 - distance,
      DistanceMeasure::DotProduct => distance,
      DistanceMeasure::SquaredL2 => -distance,
    }
  }
}

/// Location of a deployed nearest-neighbor index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
  /// Public endpoint domain of the index endpoint, including scheme
  pub endpoint_base: String,
  pub index_endpoint_id: String,
  pub deployed_index_id: String,
  pub distance: DistanceMeasure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
  pub store_path: PathBuf,
  pub project: String,
  pub location: String,
  pub api_base: String,
  pub access_token: Option<String>,
  pub generation_model: String,
  pub temperature: f32,
  pub max_output_tokens: u32,
  pub embedding_model: String,
  pub top_k: usize,
  pub index: Option<IndexConfig>,
  pub timeout_secs: u64,
  pub retry_backoff_ms: u64,
  pub max_retries: u32,
  pub rewrite_fallback: RewriteFallback,
  pub summary_word_limit: usize,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      store_path: PathBuf::from(DEFAULT_STORE_PATH),
      project: String::new(),
      location: DEFAULT_LOCATION.to_string(),
      api_base: regional_api_base(DEFAULT_LOCATION),
      access_token: None,
      generation_model: DEFAULT_GENERATION_MODEL.to_string(),
      temperature: 0.7,
      max_output_tokens: 2048,
      embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
      top_k: DEFAULT_TOP_K,
      index: None,
      timeout_secs: DEFAULT_TIMEOUT_SECS,
      retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
      max_retries: 1,
      rewrite_fallback: RewriteFallback::Fail,
      summary_word_limit: DEFAULT_SUMMARY_WORD_LIMIT,
    }
  }
}

/// Regional Vertex AI endpoint for a location
pub fn regional_api_base(location: &str) -> String {
  format!("https://{location}-aiplatform.googleapis.com")
}

impl PipelineConfig {
  /// Build the configuration from process environment variables
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Build the configuration from any key lookup. Blank values count as unset.
  pub fn from_lookup<F>(lookup: F) -> Result<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let mut config = Self::default();

    if let Some(path) = get("DISASTERS_STORE") {
      config.store_path = PathBuf::from(path);
    }
    if let Some(project) = get("PROJECT_ID") {
      config.project = project;
    }
    if let Some(location) = get("LOCATION") {
      config.api_base = regional_api_base(&location);
      config.location = location;
    }
    if let Some(api_base) = get("VERTEX_API_BASE") {
      config.api_base = api_base;
    }
    config.access_token = get("VERTEX_ACCESS_TOKEN");
    if let Some(model) = get("GENERATION_MODEL") {
      config.generation_model = model;
    }
    if let Some(model) = get("EMBEDDING_MODEL") {
      config.embedding_model = model;
    }

    config.top_k = parse_or(get("DISASTERS_TOP_K"), DEFAULT_TOP_K);
    config.timeout_secs = parse_or(get("DISASTERS_TIMEOUT_SECS"), DEFAULT_TIMEOUT_SECS);
    config.retry_backoff_ms = parse_or(get("DISASTERS_RETRY_BACKOFF_MS"), DEFAULT_RETRY_BACKOFF_MS);

    if let Some(fallback) = get("DISASTERS_REWRITE_FALLBACK") {
      config.rewrite_fallback = parse_enum("DISASTERS_REWRITE_FALLBACK", &fallback)?;
    }

    if let (Some(endpoint), Some(deployed)) = (get("INDEX_ENDPOINT"), get("DEPLOYED_INDEX_ID")) {
      let distance = match get("INDEX_DISTANCE") {
        Some(raw) => parse_enum("INDEX_DISTANCE", &raw)?,
        None => DistanceMeasure::default(),
      };
      config.index = Some(IndexConfig {
        endpoint_base: get("INDEX_ENDPOINT_BASE").unwrap_or_else(|| config.api_base.clone()),
        index_endpoint_id: endpoint,
        deployed_index_id: deployed,
        distance,
      });
    }

    Ok(config)
  }

  /// Check settings every command relies on
  pub fn validate(&self) -> Result<()> {
    if self.top_k == 0 {
      return Err(RetrievalError::config("top_k must be at least 1"));
    }
    if self.timeout_secs == 0 {
      return Err(RetrievalError::config("timeout must be at least one second"));
    }
    if self.summary_word_limit == 0 {
      return Err(RetrievalError::config("summary word limit must be at least 1"));
    }
    check_url("api base", &self.api_base)?;

    if let Some(index) = &self.index {
      check_url("index endpoint base", &index.endpoint_base)?;
      if index.index_endpoint_id.is_empty() || index.deployed_index_id.is_empty() {
        return Err(RetrievalError::config("index endpoint and deployed index id are both required"));
      }
    }

    Ok(())
  }

  /// Check settings needed before any hosted service is called
  pub fn validate_upstream(&self) -> Result<()> {
    self.validate()?;
    if self.project.is_empty() {
      return Err(RetrievalError::config("PROJECT_ID is not set"));
    }
    Ok(())
  }

  /// `projects/{project}/locations/{location}` prefix used by every Vertex path
  pub fn resource_prefix(&self) -> String {
    format!("projects/{}/locations/{}", self.project, self.location)
  }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
  value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_enum<T: ValueEnum>(key: &str, value: &str) -> Result<T> {
  T::from_str(value, true).map_err(|_| RetrievalError::config(format!("{key}: unknown value '{value}'")))
}

fn check_url(label: &str, value: &str) -> Result<()> {
  let url = Url::parse(value).map_err(|e| RetrievalError::config(format!("{label} '{value}': {e}")))?;
  if url.scheme() != "http" && url.scheme() != "https" {
    return Err(RetrievalError::config(format!("{label} '{value}' must be http or https")));
  }
  Ok(())
}
