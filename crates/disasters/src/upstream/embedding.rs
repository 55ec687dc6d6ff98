//! Hosted embedding model for query vectors

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::error::{Result, RetrievalError};
use crate::upstream::transport::HttpTransport;

const SERVICE: &str = "embedding model";
const QUERY_TASK_TYPE: &str = "RETRIEVAL_QUERY";

/// Turns a query string into a fixed-dimension vector
#[async_trait]
pub trait Embedder: Send + Sync {
  /// Identifier of the model producing the vectors, compared with the store's tag
  fn model_id(&self) -> &str;

  async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Serialize)]
struct PredictRequest<'a> {
  instances: Vec<PredictInstance<'a>>,
}

#[derive(Serialize)]
struct PredictInstance<'a> {
  content: &'a str,
  task_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
  #[serde(default)]
  predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
  embeddings: PredictionEmbeddings,
}

#[derive(Debug, Deserialize)]
struct PredictionEmbeddings {
  #[serde(default)]
  values: Vec<f32>,
}

/// Vertex AI text embedding `predict` client
pub struct VertexEmbedder {
  transport: Arc<HttpTransport>,
  url: String,
  model: String,
}

impl VertexEmbedder {
  pub fn new(config: &PipelineConfig, transport: Arc<HttpTransport>) -> Self {
    let url = format!(
      "{}/v1/{}/publishers/google/models/{}:predict",
      config.api_base.trim_end_matches('/'),
      config.resource_prefix(),
      config.embedding_model
    );

    Self { transport, url, model: config.embedding_model.clone() }
  }
}

#[async_trait]
impl Embedder for VertexEmbedder {
  fn model_id(&self) -> &str {
    &self.model
  }

  async fn embed(&self, text: &str) -> Result<Vec<f32>> {
    let request =
      PredictRequest { instances: vec![PredictInstance { content: text, task_type: QUERY_TASK_TYPE }] };

    let response: PredictResponse = self.transport.post_json(SERVICE, &self.url, &request).await?;
    let values = response
      .predictions
      .into_iter()
      .next()
      .map(|prediction| prediction.embeddings.values)
      .unwrap_or_default();

    if values.is_empty() {
      return Err(RetrievalError::upstream(SERVICE, "response contained no embedding values"));
    }

    Ok(values)
  }
}
