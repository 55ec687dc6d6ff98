use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, RetrievalError};
use crate::upstream::generation::TextGenerator;

pub const REWRITE_INSTRUCTION: &str = "You rewrite questions about disasters into queries for semantic \
search over a database of disaster reports. Expand region names into the countries they cover when that \
helps. Keep every disaster type and location the user names. Treat relative time phrases such as 'recent' \
or 'this month' as the last 30 days without writing out concrete dates; keep explicit dates, months and \
years exactly as given. Be concise and natural. Never invent facts or add numbers the user did not give. \
Reply with the rewritten query only.";

/// Normalizes a raw user query through the language model
pub struct QueryRewriter {
  generator: Arc<dyn TextGenerator>,
}

impl QueryRewriter {
  pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
    Self { generator }
  }

  pub async fn rewrite(&self, raw_query: &str) -> Result<String> {
    let query = raw_query.trim();
    if query.is_empty() {
      return Err(RetrievalError::EmptyQuery);
    }

    let rewritten = self.generator.generate(REWRITE_INSTRUCTION, query).await?;
    let rewritten = rewritten.trim();
    if rewritten.is_empty() {
      return Err(RetrievalError::upstream("language model", "rewrite came back empty"));
    }

    debug!(raw_len = query.len(), rewritten_len = rewritten.len(), "query rewritten");
    Ok(rewritten.to_string())
  }
}
