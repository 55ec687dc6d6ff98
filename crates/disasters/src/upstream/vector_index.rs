//! Managed nearest-neighbor index (Vertex AI Vector Search)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{IndexConfig, PipelineConfig};
use crate::error::Result;
use crate::record::RecordId;
use crate::upstream::transport::HttpTransport;

const SERVICE: &str = "vector index";

/// One neighbor as reported by the index. Distance semantics depend on the
/// index's configured measure.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
  pub id: RecordId,
  pub distance: f32,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
  /// Neighbors in the order the index reports them
  async fn find_neighbors(&self, query: &[f32], neighbor_count: usize) -> Result<Vec<Neighbor>>;
}

#[derive(Serialize)]
struct FindNeighborsRequest<'a> {
  deployed_index_id: &'a str,
  queries: Vec<NeighborQuery<'a>>,
  return_full_datapoint: bool,
}

#[derive(Serialize)]
struct NeighborQuery<'a> {
  datapoint: QueryDatapoint<'a>,
  neighbor_count: usize,
}

#[derive(Serialize)]
struct QueryDatapoint<'a> {
  datapoint_id: &'static str,
  feature_vector: &'a [f32],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindNeighborsResponse {
  #[serde(default, alias = "nearest_neighbors")]
  nearest_neighbors: Vec<NearestNeighbors>,
}

#[derive(Debug, Deserialize)]
struct NearestNeighbors {
  #[serde(default)]
  neighbors: Vec<RawNeighbor>,
}

#[derive(Debug, Deserialize)]
struct RawNeighbor {
  datapoint: RawDatapoint,
  #[serde(default)]
  distance: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDatapoint {
  #[serde(alias = "datapoint_id")]
  datapoint_id: RecordId,
}

/// `findNeighbors` client for one deployed index
pub struct VertexVectorIndex {
  transport: Arc<HttpTransport>,
  url: String,
  deployed_index_id: String,
}

impl VertexVectorIndex {
  pub fn new(config: &PipelineConfig, index: &IndexConfig, transport: Arc<HttpTransport>) -> Self {
    let url = format!(
      "{}/v1/{}/indexEndpoints/{}:findNeighbors",
      index.endpoint_base.trim_end_matches('/'),
      config.resource_prefix(),
      index.index_endpoint_id
    );

    Self { transport, url, deployed_index_id: index.deployed_index_id.clone() }
  }
}

#[async_trait]
impl VectorIndex for VertexVectorIndex {
  async fn find_neighbors(&self, query: &[f32], neighbor_count: usize) -> Result<Vec<Neighbor>> {
    let request = FindNeighborsRequest {
      deployed_index_id: &self.deployed_index_id,
      queries: vec![NeighborQuery {
        datapoint: QueryDatapoint { datapoint_id: "query", feature_vector: query },
        neighbor_count,
      }],
      return_full_datapoint: true,
    };

    let response: FindNeighborsResponse =
      self.transport.post_json(SERVICE, &self.url, &request).await?;

    Ok(
      response
        .nearest_neighbors
        .into_iter()
        .next()
        .map(|result| result.neighbors)
        .unwrap_or_default()
        .into_iter()
        .map(|raw| Neighbor { id: raw.datapoint.datapoint_id, distance: raw.distance })
        .collect(),
    )
  }
}
