//! HTTP server wiring for revlog.
//!
//! Loads [`ServerConfig`], builds the [`VersionEngine`] over a
//! [`SqliteStore`], and mounts the JSON API under `/api`.

use std::{path::PathBuf, sync::Arc};

use axum::Router;
use revlog_core::{
  codec::{Codec, CodecOptions},
  engine::VersionEngine,
};
use revlog_store_sqlite::SqliteStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `revlog.toml` and
/// `REVLOG_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  /// SQLite database file; a leading `~/` is expanded.
  pub store_path: PathBuf,
  pub codec:      CodecOptions,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".to_string(),
      port:       5232,
      store_path: PathBuf::from("revlog.db"),
      codec:      CodecOptions::default(),
    }
  }
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the engine for `store` from the configured codec options.
pub fn engine(store: SqliteStore, config: &ServerConfig) -> Arc<VersionEngine<SqliteStore>> {
  Arc::new(VersionEngine::new(store, Codec::new(config.codec.clone())))
}

/// The full application: the API under `/api` with request tracing.
pub fn app(engine: Arc<VersionEngine<SqliteStore>>) -> Router {
  Router::new()
    .nest("/api", revlog_api::api_router(engine))
    .layer(TraceLayer::new_for_http())
}
