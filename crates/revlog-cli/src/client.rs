//! Async HTTP client wrapping the revlog JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::{Client, Response};
use revlog_core::{
  engine::{LatestContent, SaveOutcome, VersionDiff},
  file::{Author, FileSummary, VersionSummary},
  reconstruct::Reconstruction,
};
use serde::{Serialize, de::DeserializeOwned};

/// Connection settings for the revlog API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
}

/// Body of `POST /api/files/save`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveBody<'a> {
  pub path:              &'a str,
  pub content:           &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub author:            Option<Author>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub expected_versions: Option<usize>,
}

/// Async HTTP client for the revlog JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

/// Turn a non-2xx response into an error carrying the server's message.
async fn decode<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T> {
  let status = resp.status();
  if !status.is_success() {
    let message = resp
      .json::<serde_json::Value>()
      .await
      .ok()
      .and_then(|body| body.get("error")?.as_str().map(str::to_owned))
      .unwrap_or_else(|| status.to_string());
    return Err(anyhow!("{what} → {status}: {message}"));
  }
  resp
    .json()
    .await
    .with_context(|| format!("deserialising {what} response"))
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/api{}",
      self.config.base_url.trim_end_matches('/'),
      path
    )
  }

  async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
    tracing::debug!(path, ?query, "GET");
    let resp = self
      .client
      .get(self.url(path))
      .query(query)
      .send()
      .await
      .with_context(|| format!("GET {path} failed"))?;
    decode(resp, &format!("GET {path}")).await
  }

  /// `GET /api/files`
  pub async fn list(&self) -> Result<Vec<FileSummary>> { self.get("/files", &[]).await }

  /// `GET /api/files/latest?path=<p>`
  pub async fn latest(&self, path: &str) -> Result<LatestContent> {
    self.get("/files/latest", &[("path", path)]).await
  }

  /// `GET /api/files/version?path=<p>&version=<v>`
  pub async fn version(&self, path: &str, version: &str) -> Result<Reconstruction> {
    self
      .get("/files/version", &[("path", path), ("version", version)])
      .await
  }

  /// `GET /api/files/history?path=<p>`
  pub async fn history(&self, path: &str) -> Result<Vec<VersionSummary>> {
    self.get("/files/history", &[("path", path)]).await
  }

  /// `GET /api/files/diff?path=<p>&from=<a>&to=<b>`
  pub async fn diff(&self, path: &str, from: &str, to: &str) -> Result<VersionDiff> {
    self
      .get("/files/diff", &[("path", path), ("from", from), ("to", to)])
      .await
  }

  /// `POST /api/files/save`
  pub async fn save(&self, body: &SaveBody<'_>) -> Result<SaveOutcome> {
    tracing::debug!(path = body.path, "POST /files/save");
    let resp = self
      .client
      .post(self.url("/files/save"))
      .json(body)
      .send()
      .await
      .context("POST /files/save failed")?;
    decode(resp, "POST /files/save").await
  }
}
