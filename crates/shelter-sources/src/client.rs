//! Shared HTTP client for the upstream feeds.

use std::time::Duration;

use reqwest::Client;
use shelter_core::UpstreamError;

/// Thin wrapper over [`reqwest::Client`] that maps transport failures into
/// [`UpstreamError`].
///
/// Cheap to clone; the inner client is `Arc`-based.
#[derive(Clone)]
pub struct HttpFetcher {
  client:  Client,
  timeout: Duration,
}

impl HttpFetcher {
  pub fn new(timeout: Duration) -> Result<Self, UpstreamError> {
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| UpstreamError::Http(format!("failed to build HTTP client: {e}")))?;
    Ok(Self { client, timeout })
  }

  /// `GET url` and return the body as text. Non-2xx is an error.
  pub async fn get_text(&self, url: &str) -> Result<String, UpstreamError> {
    let resp = self
      .client
      .get(url)
      .send()
      .await
      .map_err(|e| self.map_err(e))?;

    let status = resp.status();
    if !status.is_success() {
      return Err(UpstreamError::Status(status.as_u16()));
    }

    resp.text().await.map_err(|e| self.map_err(e))
  }

  fn map_err(&self, err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
      UpstreamError::Timeout(self.timeout)
    } else if let Some(status) = err.status() {
      UpstreamError::Status(status.as_u16())
    } else {
      UpstreamError::Http(err.to_string())
    }
  }
}
