//! Hosted language model used for query rewriting and summarization

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::error::{Result, RetrievalError};
use crate::upstream::transport::HttpTransport;

const SERVICE: &str = "language model";

/// Generates text from a fixed system instruction plus user content
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
  /// Returns trimmed, non-empty text or an upstream failure
  async fn generate(&self, system_instruction: &str, content: &str) -> Result<String>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
  contents: Vec<RequestContent<'a>>,
  system_instruction: SystemInstruction<'a>,
  generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent<'a> {
  role: &'static str,
  parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct SystemInstruction<'a> {
  parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
  text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  temperature: f32,
  max_output_tokens: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
  #[serde(default)]
  content: Option<CandidateContent>,
  #[serde(default)]
  finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
  #[serde(default)]
  parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
  #[serde(default)]
  text: Option<String>,
}

impl GenerateResponse {
  /// Text of the first candidate, all parts joined and trimmed
  pub fn into_text(self) -> Result<String> {
    let candidate = self
      .candidates
      .into_iter()
      .next()
      .ok_or_else(|| RetrievalError::upstream(SERVICE, "response contained no candidates"))?;

    let text: String = candidate
      .content
      .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
      .unwrap_or_default();

    let text = text.trim();
    if text.is_empty() {
      let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
      return Err(RetrievalError::upstream(
        SERVICE,
        format!("candidate had no text (finish reason: {reason})"),
      ));
    }

    Ok(text.to_string())
  }
}

/// Vertex AI `generateContent` client
pub struct VertexGenerator {
  transport: Arc<HttpTransport>,
  url: String,
  temperature: f32,
  max_output_tokens: u32,
}

impl VertexGenerator {
  pub fn new(config: &PipelineConfig, transport: Arc<HttpTransport>) -> Self {
    let url = format!(
      "{}/v1/{}/publishers/google/models/{}:generateContent",
      config.api_base.trim_end_matches('/'),
      config.resource_prefix(),
      config.generation_model
    );

    Self {
      transport,
      url,
      temperature: config.temperature,
      max_output_tokens: config.max_output_tokens,
    }
  }

  #[cfg(test)]
  fn url(&self) -> &str {
    &self.url
  }
}

#[async_trait]
impl TextGenerator for VertexGenerator {
  async fn generate(&self, system_instruction: &str, content: &str) -> Result<String> {
    let request = GenerateRequest {
      contents: vec![RequestContent { role: "user", parts: vec![RequestPart { text: content }] }],
      system_instruction: SystemInstruction { parts: vec![RequestPart { text: system_instruction }] },
      generation_config: GenerationConfig {
        temperature: self.temperature,
        max_output_tokens: self.max_output_tokens,
      },
    };

    let response: GenerateResponse = self.transport.post_json(SERVICE, &self.url, &request).await?;
    response.into_text()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use mockito::{Matcher, Server};
  use serde_json::json;
  use std::time::Duration;

  fn generator(base: &str) -> VertexGenerator {
    let config = PipelineConfig {
      project: "relief".to_string(),
      api_base: base.to_string(),
      ..PipelineConfig::default()
    };
    let transport =
      HttpTransport::with_settings(Duration::from_secs(5), Duration::from_millis(1), 1, None).unwrap();
    VertexGenerator::new(&config, Arc::new(transport))
  }

  const PATH: &str =
    "/v1/projects/relief/locations/us-central1/publishers/google/models/gemini-2.5-flash:generateContent";

  #[test]
  fn test_url_layout() {
    let generator = generator("https://us-central1-aiplatform.googleapis.com/");
    assert_eq!(generator.url(), format!("https://us-central1-aiplatform.googleapis.com{PATH}"));
  }

  #[tokio::test]
  async fn test_generate_sends_instruction_and_config() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("POST", PATH)
      .match_body(Matcher::PartialJson(json!({
        "contents": [{"role": "user", "parts": [{"text": "recent floods in asia"}]}],
        "systemInstruction": {"parts": [{"text": "rewrite this"}]},
        "generationConfig": {"temperature": 0.7, "maxOutputTokens": 2048}
      })))
      .with_status(200)
      .with_body(
        r#"{"candidates": [{"content": {"role": "model", "parts": [{"text": "  Floods in Asian countries "}, {"text": "in the last 30 days "}]}, "finishReason": "STOP"}]}"#,
      )
      .create_async()
      .await;

    let text = generator(&server.url()).generate("rewrite this", "recent floods in asia").await.unwrap();

    mock.assert_async().await;
    assert_eq!(text, "Floods in Asian countries in the last 30 days");
  }

  #[tokio::test]
  async fn test_no_candidates_is_an_upstream_failure() {
    let mut server = Server::new_async().await;
    let _mock = server.mock("POST", PATH).with_status(200).with_body(r#"{"candidates": []}"#).create_async().await;

    let err = generator(&server.url()).generate("x", "y").await.unwrap_err();
    assert!(err.is_upstream());
    assert!(err.to_string().contains("no candidates"));
  }

  #[test]
  fn test_blank_text_reports_finish_reason() {
    let response: GenerateResponse = serde_json::from_value(json!({
      "candidates": [{"content": {"parts": [{"text": "   "}]}, "finishReason": "SAFETY"}]
    }))
    .unwrap();

    let err = response.into_text().unwrap_err();
    assert!(err.to_string().contains("SAFETY"));
  }

  #[test]
  fn test_missing_content_is_an_upstream_failure() {
    let response: GenerateResponse =
      serde_json::from_value(json!({"candidates": [{"finishReason": "MAX_TOKENS"}]})).unwrap();
    assert!(response.into_text().unwrap_err().is_upstream());
  }
}
