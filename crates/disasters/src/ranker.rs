//! Top-K ranking over the embedding store
//!
//! Both backends report a similarity where higher is always better, so callers
//! never need to know which one produced a result list.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::config::DistanceMeasure;
use crate::error::{Result, RetrievalError};
use crate::record::{RecordId, RecordMetadata};
use crate::similarity;
use crate::store::EmbeddingStore;
use crate::upstream::vector_index::VectorIndex;

/// A record identifier with its similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
  pub id: RecordId,
  pub score: f32,
}

/// A ranked record re-joined with its stored metadata
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
  pub id: RecordId,
  pub score: f32,
  pub metadata: RecordMetadata,
}

#[async_trait]
pub trait Ranker: Send + Sync {
  /// Short backend name for logs and display
  fn backend(&self) -> &'static str;

  /// At most `min(k, store.len())` results, best first, no duplicate ids.
  /// Equal scores keep store insertion order.
  async fn rank(&self, store: &EmbeddingStore, query: &[f32], k: usize) -> Result<Vec<Scored>>;
}

/// Exhaustive cosine similarity against every stored vector
#[derive(Debug, Default, Clone, Copy)]
pub struct CosineRanker;

#[async_trait]
impl Ranker for CosineRanker {
  fn backend(&self) -> &'static str {
    "cosine"
  }

  async fn rank(&self, store: &EmbeddingStore, query: &[f32], k: usize) -> Result<Vec<Scored>> {
    if k == 0 || store.is_empty() {
      return Ok(Vec::new());
    }
    store.check_dimension(query)?;

    let mut scored = store
      .records()
      .iter()
      .map(|record| {
        Ok(Scored { id: record.id.clone(), score: similarity::cosine(query, &record.embedding)? })
      })
      .collect::<Result<Vec<_>>>()?;

    // sort_by is stable, so ties stay in insertion order
    scored.sort_by(|a, b| descending(a.score, b.score));
    scored.truncate(k);

    debug!(backend = self.backend(), candidates = store.len(), returned = scored.len(), "ranked");
    Ok(scored)
  }
}

/// Nearest-neighbor search delegated to an external index
pub struct IndexRanker {
  index: Arc<dyn VectorIndex>,
  distance: DistanceMeasure,
}

impl IndexRanker {
  pub fn new(index: Arc<dyn VectorIndex>, distance: DistanceMeasure) -> Self {
    Self { index, distance }
  }
}

#[async_trait]
impl Ranker for IndexRanker {
  fn backend(&self) -> &'static str {
    "vector-index"
  }

  async fn rank(&self, store: &EmbeddingStore, query: &[f32], k: usize) -> Result<Vec<Scored>> {
    if k == 0 || store.is_empty() {
      return Ok(Vec::new());
    }
    store.check_dimension(query)?;

    let limit = k.min(store.len());
    let neighbors = self.index.find_neighbors(query, limit).await?;
    let reported = neighbors.len();

    let mut seen = HashSet::new();
    let mut scored = Vec::with_capacity(limit);
    for neighbor in neighbors {
      if !seen.insert(neighbor.id.clone()) {
        continue;
      }
      let position = store
        .position(&neighbor.id)
        .ok_or_else(|| RetrievalError::unknown_record(neighbor.id.as_str()))?;
      scored.push((position, Scored { id: neighbor.id, score: self.distance.to_similarity(neighbor.distance) }));
    }

    scored.sort_by(|(pos_a, a), (pos_b, b)| descending(a.score, b.score).then(pos_a.cmp(pos_b)));
    scored.truncate(limit);

    debug!(
      backend = self.backend(),
      distance = ?self.distance,
      reported,
      returned = scored.len(),
      "ranked"
    );
    Ok(scored.into_iter().map(|(_, scored)| scored).collect())
  }
}

/// Higher scores first; NaN sinks to the bottom
fn descending(a: f32, b: f32) -> Ordering {
  let a = if a.is_nan() { f32::NEG_INFINITY } else { a };
  let b = if b.is_nan() { f32::NEG_INFINITY } else { b };
  b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Join ranked identifiers back to their stored metadata
pub fn rehydrate(store: &EmbeddingStore, scored: Vec<Scored>) -> Result<Vec<RankedResult>> {
  scored
    .into_iter()
    .map(|Scored { id, score }| {
      let record = store.get(&id).ok_or_else(|| RetrievalError::unknown_record(id.as_str()))?;
      Ok(RankedResult { metadata: record.metadata.clone(), id, score })
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::record::Record;
  use crate::upstream::vector_index::Neighbor;

  fn store(vectors: &[(&str, Vec<f32>)]) -> EmbeddingStore {
    let records = vectors
      .iter()
      .map(|(id, v)| Record::new(*id, v.clone(), RecordMetadata::default()))
      .collect();
    EmbeddingStore::from_records(records, None).unwrap()
  }

  fn example_store() -> EmbeddingStore {
    store(&[("r1", vec![1.0, 0.0]), ("r2", vec![0.0, 1.0]), ("r3", vec![0.7, 0.7])])
  }

  fn ids(scored: &[Scored]) -> Vec<&str> {
    scored.iter().map(|s| s.id.as_str()).collect()
  }

  struct FakeIndex {
    neighbors: Vec<Neighbor>,
  }

  #[async_trait]
  impl VectorIndex for FakeIndex {
    async fn find_neighbors(&self, _query: &[f32], neighbor_count: usize) -> Result<Vec<Neighbor>> {
      Ok(self.neighbors.iter().take(neighbor_count).cloned().collect())
    }
  }

  fn neighbor(id: &str, distance: f32) -> Neighbor {
    Neighbor { id: RecordId::from(id), distance }
  }

  #[tokio::test]
  async fn test_cosine_top_two() {
    let ranked = CosineRanker.rank(&example_store(), &[1.0, 0.0], 2).await.unwrap();

    assert_eq!(ids(&ranked), vec!["r1", "r3"]);
    assert!((ranked[0].score - 1.0).abs() < 1e-6);
    assert!((ranked[1].score - 0.707).abs() < 1e-3);
  }

  #[tokio::test]
  async fn test_k_larger_than_store_returns_everything() {
    let ranked = CosineRanker.rank(&example_store(), &[1.0, 0.0], 10).await.unwrap();
    assert_eq!(ids(&ranked), vec!["r1", "r3", "r2"]);
  }

  #[tokio::test]
  async fn test_k_zero_and_empty_store() {
    assert!(CosineRanker.rank(&example_store(), &[1.0, 0.0], 0).await.unwrap().is_empty());
    assert!(CosineRanker.rank(&EmbeddingStore::default(), &[1.0, 0.0], 3).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_repeated_ranking_is_identical() {
    let store = example_store();
    let first = CosineRanker.rank(&store, &[0.3, 0.9], 3).await.unwrap();
    let second = CosineRanker.rank(&store, &[0.3, 0.9], 3).await.unwrap();
    assert_eq!(first, second);
  }

  #[tokio::test]
  async fn test_ties_keep_insertion_order() {
    let store = store(&[("b", vec![0.0, 1.0]), ("a", vec![1.0, 0.0]), ("c", vec![1.0, 0.0])]);
    let ranked = CosineRanker.rank(&store, &[1.0, 0.0], 3).await.unwrap();
    assert_eq!(ids(&ranked), vec!["a", "c", "b"]);
  }

  #[tokio::test]
  async fn test_zero_query_scores_zero_everywhere() {
    let ranked = CosineRanker.rank(&example_store(), &[0.0, 0.0], 3).await.unwrap();
    assert!(ranked.iter().all(|s| s.score == 0.0));
    assert_eq!(ids(&ranked), vec!["r1", "r2", "r3"]);
  }

  #[tokio::test]
  async fn test_dimension_mismatch_is_reported() {
    let err = CosineRanker.rank(&example_store(), &[1.0, 0.0, 0.0], 2).await.unwrap_err();
    assert_eq!(err, RetrievalError::DimensionMismatch { expected: 2, actual: 3 });
  }

  #[tokio::test]
  async fn test_index_distances_become_similarities() {
    let index = FakeIndex { neighbors: vec![neighbor("r3", 0.29), neighbor("r1", 0.0)] };
    let ranker = IndexRanker::new(Arc::new(index), DistanceMeasure::Cosine);

    let ranked = ranker.rank(&example_store(), &[1.0, 0.0], 2).await.unwrap();

    assert_eq!(ids(&ranked), vec!["r1", "r3"]);
    assert!(ranked[0].score > ranked[1].score);
  }

  #[tokio::test]
  async fn test_index_squared_l2_lower_distance_ranks_first() {
    let index = FakeIndex { neighbors: vec![neighbor("r2", 2.0), neighbor("r1", 0.1), neighbor("r3", 0.6)] };
    let ranker = IndexRanker::new(Arc::new(index), DistanceMeasure::SquaredL2);

    let ranked = ranker.rank(&example_store(), &[1.0, 0.0], 10).await.unwrap();
    assert_eq!(ids(&ranked), vec!["r1", "r3", "r2"]);
  }

  #[tokio::test]
  async fn test_index_duplicates_keep_first_occurrence() {
    let index = FakeIndex { neighbors: vec![neighbor("r1", 0.0), neighbor("r1", 0.5), neighbor("r3", 0.3)] };
    let ranker = IndexRanker::new(Arc::new(index), DistanceMeasure::Cosine);

    let ranked = ranker.rank(&example_store(), &[1.0, 0.0], 3).await.unwrap();
    assert_eq!(ids(&ranked), vec!["r1", "r3"]);
    assert!((ranked[0].score - 1.0).abs() < 1e-6);
  }

  #[tokio::test]
  async fn test_index_unknown_id_is_an_error() {
    let index = FakeIndex { neighbors: vec![neighbor("r9", 0.1)] };
    let ranker = IndexRanker::new(Arc::new(index), DistanceMeasure::Cosine);

    let err = ranker.rank(&example_store(), &[1.0, 0.0], 2).await.unwrap_err();
    assert_eq!(err, RetrievalError::UnknownRecord { id: "r9".to_string() });
  }

  #[test]
  fn test_descending_sinks_nan() {
    let mut scores = vec![0.2, f32::NAN, 0.9];
    scores.sort_by(|a, b| descending(*a, *b));
    assert_eq!(scores[0], 0.9);
    assert_eq!(scores[1], 0.2);
    assert!(scores[2].is_nan());
  }

  #[test]
  fn test_rehydrate_attaches_metadata() {
    let metadata = RecordMetadata { title: Some("Kenya: Floods".to_string()), ..RecordMetadata::default() };
    let store = EmbeddingStore::from_records(vec![Record::new("7", vec![1.0], metadata.clone())], None).unwrap();

    let results = rehydrate(&store, vec![Scored { id: RecordId::from("7"), score: 0.5 }]).unwrap();
    assert_eq!(results, vec![RankedResult { id: RecordId::from("7"), score: 0.5, metadata }]);

    let err = rehydrate(&store, vec![Scored { id: RecordId::from("8"), score: 0.1 }]).unwrap_err();
    assert!(matches!(err, RetrievalError::UnknownRecord { .. }));
  }
}
