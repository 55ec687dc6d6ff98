use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::upstream::generation::TextGenerator;

/// Outcome of summarizing one record. Upstream trouble is a value here, not an
/// error, so the caller's session carries on.
#[derive(Debug, Clone, PartialEq)]
pub enum Summary {
  Text(String),
  /// The record had no description to summarize
  Empty,
  /// The language model could not be reached; the message is fit for display
  Unavailable(String),
}

impl Summary {
  pub fn text(&self) -> Option<&str> {
    match self {
      Summary::Text(text) => Some(text),
      _ => None,
    }
  }
}

impl fmt::Display for Summary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Summary::Text(text) => f.write_str(text),
      Summary::Empty => f.write_str("No description available for this record."),
      Summary::Unavailable(message) => write!(f, "Summary unavailable: {message}"),
    }
  }
}

pub struct Summarizer {
  generator: Arc<dyn TextGenerator>,
  word_limit: usize,
  instruction: String,
}

impl Summarizer {
  pub fn new(generator: Arc<dyn TextGenerator>, word_limit: usize) -> Self {
    Self { generator, word_limit, instruction: summary_instruction(word_limit) }
  }

  pub async fn summarize(&self, description: &str) -> Summary {
    let description = description.trim();
    if description.is_empty() {
      debug!("empty description, skipping summary call");
      return Summary::Empty;
    }

    match self.generator.generate(&self.instruction, description).await {
      Ok(text) => {
        let capped = cap_words(&text, self.word_limit);
        if capped.is_empty() {
          Summary::Unavailable("the language model returned no text".to_string())
        } else {
          Summary::Text(capped)
        }
      }
      Err(e) => {
        warn!(error = %e, "summary failed");
        Summary::Unavailable(e.to_string())
      }
    }
  }
}

fn summary_instruction(word_limit: usize) -> String {
  format!(
    "You are a disaster data analyst. Summarize the disaster report you are given in fewer than \
     {word_limit} words. Cover what happened, where and when, the main impacts such as casualties, \
     affected areas and damage, and the current status if the report states it. Stay factual. Leave \
     out speculation, opinion and repetition. Reply with plain summary text and no markdown."
  )
}

/// Keep at most `limit` whitespace-separated words
fn cap_words(text: &str, limit: usize) -> String {
  text.split_whitespace().take(limit).collect::<Vec<_>>().join(" ")
}
