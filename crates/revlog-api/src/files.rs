//! Handlers for `/files` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/files` | Every tracked file |
//! | `GET`  | `/files/latest` | `?path=`; empty content for unknown files |
//! | `GET`  | `/files/version` | `?path=&version=<n\|latest\|base>` |
//! | `GET`  | `/files/history` | `?path=`; chain metadata |
//! | `GET`  | `/files/diff` | `?path=&from=&to=`; unified diff |
//! | `POST` | `/files/save` | Body: [`SaveBody`] |
//! | `POST` | `/files/patch` | Body: [`PatchBody`] |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use revlog_core::{
  engine::{
    LatestContent, PatchRequest, SaveOutcome, SaveRequest, SaveStatus, VersionDiff,
    VersionEngine,
  },
  file::{Author, FileSummary, VersionSummary},
  reconstruct::VersionTarget,
  store::VersionStore,
};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, etag::compute_etag};

fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
  value
    .filter(|v| !v.is_empty())
    .ok_or_else(|| ApiError::BadRequest(format!("missing query parameter `{name}`")))
}

fn target(raw: Option<String>, name: &str) -> Result<VersionTarget, ApiError> {
  Ok(required(raw, name)?.parse::<VersionTarget>()?)
}

/// Answer `304` when the client already holds `etag`, otherwise `body` with
/// the ETag attached.
fn with_etag<T: Serialize>(headers: &HeaderMap, etag: String, body: T) -> Response {
  let fresh = headers
    .get(header::IF_NONE_MATCH)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|v| v.split(',').any(|tag| tag.trim() == etag || tag.trim() == "*"));
  if fresh {
    return (StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response();
  }
  ([(header::ETAG, etag)], Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct PathParams {
  pub path: Option<String>,
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /files`
pub async fn list<S: VersionStore>(
  State(engine): State<Arc<VersionEngine<S>>>,
) -> Result<Json<Vec<FileSummary>>, ApiError> {
  Ok(Json(engine.list().await?))
}

// ─── Latest ───────────────────────────────────────────────────────────────────

/// `GET /files/latest?path=<filename>`
pub async fn latest<S: VersionStore>(
  State(engine): State<Arc<VersionEngine<S>>>,
  Query(params): Query<PathParams>,
  headers: HeaderMap,
) -> Result<Response, ApiError> {
  let path = required(params.path, "path")?;
  let latest: LatestContent = engine.latest(&path).await?;
  let etag = compute_etag(
    &latest.filename,
    latest.version_count.checked_sub(1),
    &latest.content,
  );
  Ok(with_etag(&headers, etag, latest))
}

// ─── Version ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VersionParams {
  pub path:    Option<String>,
  /// Index, `latest` or `base`.
  pub version: Option<String>,
}

/// `GET /files/version?path=<filename>&version=<n>`
pub async fn version<S: VersionStore>(
  State(engine): State<Arc<VersionEngine<S>>>,
  Query(params): Query<VersionParams>,
  headers: HeaderMap,
) -> Result<Response, ApiError> {
  let path = required(params.path, "path")?;
  let target = target(params.version, "version")?;
  let rebuilt = engine.version(&path, target).await?;
  let etag = compute_etag(&path, rebuilt.version, &rebuilt.content);
  Ok(with_etag(&headers, etag, rebuilt))
}

// ─── History ──────────────────────────────────────────────────────────────────

/// `GET /files/history?path=<filename>`
pub async fn history<S: VersionStore>(
  State(engine): State<Arc<VersionEngine<S>>>,
  Query(params): Query<PathParams>,
) -> Result<Json<Vec<VersionSummary>>, ApiError> {
  let path = required(params.path, "path")?;
  Ok(Json(engine.history(&path).await?))
}

// ─── Diff ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DiffParams {
  pub path: Option<String>,
  pub from: Option<String>,
  pub to:   Option<String>,
}

/// `GET /files/diff?path=<filename>&from=<v>&to=<v>`
pub async fn diff<S: VersionStore>(
  State(engine): State<Arc<VersionEngine<S>>>,
  Query(params): Query<DiffParams>,
) -> Result<Json<VersionDiff>, ApiError> {
  let path = required(params.path, "path")?;
  let from = target(params.from, "from")?;
  let to = target(params.to, "to")?;
  Ok(Json(engine.diff_versions(&path, from, to).await?))
}

// ─── Save ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveBody {
  pub path:              String,
  pub content:           String,
  #[serde(default)]
  pub author:            Option<Author>,
  /// Chain length the content was edited against.
  #[serde(default)]
  pub expected_versions: Option<usize>,
}

fn saved(outcome: SaveOutcome) -> (StatusCode, Json<SaveOutcome>) {
  let status = match outcome.status {
    SaveStatus::BaseCreated => StatusCode::CREATED,
    SaveStatus::PatchAppended | SaveStatus::NoChange => StatusCode::OK,
  };
  (status, Json(outcome))
}

/// `POST /files/save`, body: `{"path":"a.txt","content":"..."}`
pub async fn save<S: VersionStore>(
  State(engine): State<Arc<VersionEngine<S>>>,
  Json(body): Json<SaveBody>,
) -> Result<impl IntoResponse, ApiError> {
  if body.path.is_empty() {
    return Err(ApiError::BadRequest("`path` must not be empty".into()));
  }
  let outcome = engine
    .save(SaveRequest {
      filename:          body.path,
      content:           body.content,
      author:            body.author,
      expected_versions: body.expected_versions,
    })
    .await?;
  Ok(saved(outcome))
}

// ─── Patch ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchBody {
  pub path:              String,
  /// Serialised patch against the current HEAD.
  pub patch:             String,
  #[serde(default)]
  pub new_content:       Option<String>,
  #[serde(default)]
  pub author:            Option<Author>,
  #[serde(default)]
  pub expected_versions: Option<usize>,
}

/// `POST /files/patch`, body: `{"path":"a.txt","patch":"@@ ..."}`
pub async fn patch<S: VersionStore>(
  State(engine): State<Arc<VersionEngine<S>>>,
  Json(body): Json<PatchBody>,
) -> Result<impl IntoResponse, ApiError> {
  if body.path.is_empty() {
    return Err(ApiError::BadRequest("`path` must not be empty".into()));
  }
  let outcome = engine
    .save_patch(PatchRequest {
      filename:          body.path,
      patch:             body.patch,
      new_content:       body.new_content,
      author:            body.author,
      expected_versions: body.expected_versions,
    })
    .await?;
  Ok(saved(outcome))
}
