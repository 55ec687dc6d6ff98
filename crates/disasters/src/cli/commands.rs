use anyhow::{Context, Result};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::display;
use crate::config::{PipelineConfig, RewriteFallback};
use crate::facets::{self, ResultFilter};
use crate::pipeline::{Retrieval, RetrievalPipeline};
use crate::record::RecordId;
use crate::store::{EmbeddingStore, StoreHandle};
use crate::summarizer::Summary;

/// Command-line values that win over the environment
#[derive(Debug, Default, Clone)]
pub struct Overrides {
  pub store: Option<PathBuf>,
  pub top_k: Option<usize>,
  pub raw_fallback: bool,
}

/// Environment configuration with command-line overrides applied
pub fn resolve_config(overrides: &Overrides) -> Result<PipelineConfig> {
  let mut config = PipelineConfig::from_env()?;

  if let Some(store) = &overrides.store {
    config.store_path = store.clone();
  }
  if let Some(top_k) = overrides.top_k {
    config.top_k = top_k;
  }
  if overrides.raw_fallback {
    config.rewrite_fallback = RewriteFallback::RawQuery;
  }

  config.validate()?;
  Ok(config)
}

fn load_store(config: &PipelineConfig) -> Result<Arc<StoreHandle>> {
  let handle = StoreHandle::load(&config.store_path)
    .with_context(|| format!("loading embedding store {}", config.store_path.display()))?;
  Ok(Arc::new(handle))
}

fn build_pipeline(config: &PipelineConfig, use_index: bool) -> Result<RetrievalPipeline> {
  config.validate_upstream()?;
  let store = load_store(config)?;
  Ok(RetrievalPipeline::from_config(config, store, use_index)?)
}

async fn run_query(pipeline: &RetrievalPipeline, query: &str) -> Result<Retrieval> {
  herald::stage!("query", &format!("retrieving top {} with {}", pipeline.top_k(), pipeline.backend()));
  let retrieval = pipeline.retrieve(query).await?;

  if retrieval.used_raw_query {
    herald::warn!("query rewrite failed, searched with the original text");
  }
  println!("{} {}", "Rewritten query:".bold(), retrieval.rewritten_query.as_str().italic());
  herald::info!(&format!("{} results ranked", retrieval.rows.len()));
  Ok(retrieval)
}

fn report_summary(id: &str, summary: &Summary) {
  display::display_summary(id, summary);
  if let Summary::Unavailable(reason) = summary {
    herald::error!(&format!("summary of {id} unavailable: {reason}"));
  }
}

/// Rank stored disasters against a free-text query and print the filtered rows
pub async fn search(
  config: &PipelineConfig,
  query: &str,
  use_index: bool,
  filter: &ResultFilter,
  summarize: Option<&str>,
) -> Result<()> {
  let pipeline = build_pipeline(config, use_index)?;
  let retrieval = run_query(&pipeline, query).await?;

  let rows = filter.apply(&retrieval.rows);
  if !filter.is_unrestricted() {
    herald::verbose!(&format!("{} of {} results match the filters", rows.len(), retrieval.rows.len()));
  }
  println!();
  display::display_rows(&rows);

  if let Some(id) = summarize {
    let summary = pipeline.summarize(&RecordId::new(id)).await?;
    report_summary(id, &summary);
  }

  Ok(())
}

/// Filter options and aggregate counts for a query's result set
pub async fn facets(config: &PipelineConfig, query: &str, use_index: bool) -> Result<()> {
  let pipeline = build_pipeline(config, use_index)?;
  let retrieval = run_query(&pipeline, query).await?;
  let rows = &retrieval.rows;

  println!();
  display::display_options(&facets::filter_options(rows));
  display::display_pair_table("Status by country", &facets::status_by_country(rows), "country");
  display::display_pair_table("Events by type and status", &facets::counts_by_type_and_status(rows), "type");
  display::display_single_counts("Countries affected per type", &facets::countries_per_type(rows));
  display::display_pair_table("Monthly frequency", &facets::monthly_frequency(rows), "month");

  Ok(())
}

/// Summarize one stored record by id
pub async fn summarize(config: &PipelineConfig, id: &str) -> Result<()> {
  let pipeline = build_pipeline(config, false)?;
  let summary = pipeline.summarize(&RecordId::new(id)).await?;
  report_summary(id, &summary);
  Ok(())
}

/// Describe the embedding store without calling any hosted service
pub fn inspect(config: &PipelineConfig) -> Result<()> {
  let store = EmbeddingStore::load(&config.store_path)
    .with_context(|| format!("loading embedding store {}", config.store_path.display()))?;

  herald::headline("Embedding store");
  println!("{:<12} {}", "path".bold(), config.store_path.display());
  println!("{:<12} {}", "records".bold(), store.len());
  println!(
    "{:<12} {}",
    "dimension".bold(),
    store.dimension().map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
  );
  println!("{:<12} {}", "model".bold(), store.embedding_model().unwrap_or("untagged"));

  if store.embedding_model().is_some_and(|model| model != config.embedding_model) {
    herald::warn!(&format!(
      "store model differs from the configured query model '{}'; queries will be refused",
      config.embedding_model
    ));
  } else {
    herald::success!(&format!("store is readable with {} records", store.len()));
  }

  Ok(())
}
