//! Disasters - similarity retrieval over disaster event records
//!
//! A natural-language query is rewritten by a hosted language model, embedded,
//! ranked against a pre-computed embedding store (in memory or through an
//! external vector index) and returned as flat, typed rows. Any stored record
//! can be summarized on request.

pub mod cli;
pub mod config;
pub mod error;
pub mod facets;
pub mod flatten;
pub mod pipeline;
pub mod ranker;
pub mod record;
pub mod rewriter;
pub mod similarity;
pub mod store;
pub mod summarizer;
pub mod upstream;

pub use error::{Result, RetrievalError};
pub use pipeline::{Retrieval, RetrievalPipeline};
