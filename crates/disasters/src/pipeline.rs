//! Query orchestration: rewrite, embed, rank, flatten, and on request summarize.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{PipelineConfig, RewriteFallback};
use crate::error::{Result, RetrievalError};
use crate::flatten::{self, FlatRow};
use crate::ranker::{self, CosineRanker, IndexRanker, Ranker};
use crate::record::RecordId;
use crate::rewriter::QueryRewriter;
use crate::store::StoreHandle;
use crate::summarizer::{Summarizer, Summary};
use crate::upstream::embedding::{Embedder, VertexEmbedder};
use crate::upstream::generation::{TextGenerator, VertexGenerator};
use crate::upstream::transport::HttpTransport;
use crate::upstream::vector_index::VertexVectorIndex;

/// Everything one query produced
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieval {
  pub raw_query: String,
  pub rewritten_query: String,
  /// True when the rewrite failed and the raw text was embedded instead
  pub used_raw_query: bool,
  pub rows: Vec<FlatRow>,
}

pub struct RetrievalPipeline {
  store: Arc<StoreHandle>,
  rewriter: QueryRewriter,
  embedder: Arc<dyn Embedder>,
  ranker: Box<dyn Ranker>,
  summarizer: Summarizer,
  top_k: usize,
  rewrite_fallback: RewriteFallback,
}

impl RetrievalPipeline {
  pub fn new(
    config: &PipelineConfig,
    store: Arc<StoreHandle>,
    generator: Arc<dyn TextGenerator>,
    embedder: Arc<dyn Embedder>,
    ranker: Box<dyn Ranker>,
  ) -> Self {
    Self {
      store,
      rewriter: QueryRewriter::new(Arc::clone(&generator)),
      embedder,
      ranker,
      summarizer: Summarizer::new(generator, config.summary_word_limit),
      top_k: config.top_k,
      rewrite_fallback: config.rewrite_fallback,
    }
  }

  /// Wire the Vertex AI clients. `use_index` selects the external vector
  /// index, which must then be configured.
  pub fn from_config(config: &PipelineConfig, store: Arc<StoreHandle>, use_index: bool) -> Result<Self> {
    config.validate_upstream()?;

    let transport = Arc::new(HttpTransport::new(config)?);
    let generator: Arc<dyn TextGenerator> = Arc::new(VertexGenerator::new(config, Arc::clone(&transport)));
    let embedder: Arc<dyn Embedder> = Arc::new(VertexEmbedder::new(config, Arc::clone(&transport)));

    let ranker: Box<dyn Ranker> = if use_index {
      let index = config.index.as_ref().ok_or_else(|| {
        RetrievalError::config("vector index requested but INDEX_ENDPOINT / DEPLOYED_INDEX_ID are not set")
      })?;
      let client = VertexVectorIndex::new(config, index, Arc::clone(&transport));
      Box::new(IndexRanker::new(Arc::new(client), index.distance))
    } else {
      Box::new(CosineRanker)
    };

    Ok(Self::new(config, store, generator, embedder, ranker))
  }

  pub fn store(&self) -> &StoreHandle {
    &self.store
  }

  pub fn backend(&self) -> &'static str {
    self.ranker.backend()
  }

  pub fn top_k(&self) -> usize {
    self.top_k
  }

  /// Run one query with the configured K
  pub async fn retrieve(&self, raw_query: &str) -> Result<Retrieval> {
    self.retrieve_top(raw_query, self.top_k).await
  }

  pub async fn retrieve_top(&self, raw_query: &str, k: usize) -> Result<Retrieval> {
    // One snapshot for the whole query, even if the store is reloaded meanwhile
    let store = self.store.current();

    let (rewritten_query, used_raw_query) = match self.rewriter.rewrite(raw_query).await {
      Ok(rewritten) => (rewritten, false),
      Err(e) if e.is_upstream() && self.rewrite_fallback == RewriteFallback::RawQuery => {
        warn!(error = %e, "query rewrite failed, embedding the raw query");
        (raw_query.trim().to_string(), true)
      }
      Err(e) => return Err(e),
    };

    store.check_query_model(self.embedder.model_id())?;
    let query_vector = self.embedder.embed(&rewritten_query).await?;
    store.check_dimension(&query_vector)?;

    let scored = self.ranker.rank(&store, &query_vector, k).await?;
    let rows = flatten::flatten(ranker::rehydrate(&store, scored)?)?;

    info!(
      backend = self.ranker.backend(),
      k,
      query_len = raw_query.len(),
      results = rows.len(),
      "retrieval complete"
    );

    Ok(Retrieval { raw_query: raw_query.to_string(), rewritten_query, used_raw_query, rows })
  }

  /// Summarize a stored record's description. Only an unknown id is an error;
  /// model trouble comes back as [`Summary::Unavailable`].
  pub async fn summarize(&self, id: &RecordId) -> Result<Summary> {
    let store = self.store.current();
    let record = store.get(id).ok_or_else(|| RetrievalError::unknown_record(id.as_str()))?;

    debug!(id = %id, description_len = record.description().len(), "summarizing record");
    Ok(self.summarizer.summarize(record.description()).await)
  }
}
