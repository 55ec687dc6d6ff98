//! Shared HTTP plumbing for the hosted services
//!
//! Every call gets a bounded timeout and a single retry with backoff when the
//! failure looks transient (connection refused, timeout, 429, 5xx). Anything
//! else fails straight away.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::error::{Result, RetrievalError};

const ERROR_BODY_LIMIT: usize = 300;

struct Failure {
  transient: bool,
  message: String,
}

impl Failure {
  fn transient(message: impl Into<String>) -> Self {
    Self { transient: true, message: message.into() }
  }

  fn permanent(message: impl Into<String>) -> Self {
    Self { transient: false, message: message.into() }
  }
}

pub struct HttpTransport {
  client: Client,
  access_token: Option<String>,
  retry_backoff: Duration,
  max_retries: u32,
}

impl HttpTransport {
  pub fn new(config: &PipelineConfig) -> Result<Self> {
    Self::with_settings(
      Duration::from_secs(config.timeout_secs),
      Duration::from_millis(config.retry_backoff_ms),
      config.max_retries,
      config.access_token.clone(),
    )
  }

  pub fn with_settings(
    timeout: Duration,
    retry_backoff: Duration,
    max_retries: u32,
    access_token: Option<String>,
  ) -> Result<Self> {
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| RetrievalError::config(format!("failed to create HTTP client: {e}")))?;

    Ok(Self { client, access_token, retry_backoff, max_retries })
  }

  /// POST a JSON body and decode the JSON answer, retrying transient failures
  pub async fn post_json<B, R>(&self, service: &str, url: &str, body: &B) -> Result<R>
  where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
  {
    let mut attempt: u32 = 0;

    loop {
      attempt += 1;
      debug!(service, url, attempt, "calling upstream");

      match self.send_once(url, body).await {
        Ok(decoded) => return Ok(decoded),
        Err(failure) if failure.transient && attempt <= self.max_retries => {
          warn!(service, attempt, error = %failure.message, "transient upstream failure, retrying");
          sleep(self.retry_backoff * attempt).await;
        }
        Err(failure) => return Err(RetrievalError::upstream(service, failure.message)),
      }
    }
  }

  async fn send_once<B, R>(&self, url: &str, body: &B) -> std::result::Result<R, Failure>
  where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
  {
    let mut request = self.client.post(url).json(body);
    if let Some(token) = &self.access_token {
      request = request.bearer_auth(token);
    }

    let response = request.send().await.map_err(classify_send_error)?;
    let status = response.status();
    let text = response.text().await.map_err(classify_send_error)?;

    if !status.is_success() {
      let message = format!("HTTP {}: {}", status.as_u16(), truncate(&text, ERROR_BODY_LIMIT));
      return Err(if is_transient_status(status) {
        Failure::transient(message)
      } else {
        Failure::permanent(message)
      });
    }

    serde_json::from_str(&text).map_err(|e| Failure::permanent(format!("malformed response: {e}")))
  }
}

fn classify_send_error(e: reqwest::Error) -> Failure {
  if e.is_timeout() {
    Failure::transient(format!("timed out: {e}"))
  } else if e.is_connect() {
    Failure::transient(format!("connection failed: {e}"))
  } else {
    Failure::permanent(e.to_string())
  }
}

pub fn is_transient_status(status: StatusCode) -> bool {
  status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn truncate(text: &str, limit: usize) -> String {
  let trimmed = text.trim();
  if trimmed.chars().count() <= limit {
    trimmed.to_string()
  } else {
    let cut: String = trimmed.chars().take(limit).collect();
    format!("{cut}...")
  }
}
