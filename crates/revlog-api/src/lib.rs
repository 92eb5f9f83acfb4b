//! JSON REST API for revlog.
//!
//! Exposes an axum [`Router`] backed by a [`VersionEngine`] over any
//! [`revlog_core::store::VersionStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", revlog_api::api_router(engine.clone()))
//! ```

pub mod error;
pub mod etag;
pub mod files;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use revlog_core::{engine::VersionEngine, store::VersionStore};

pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(engine: Arc<VersionEngine<S>>) -> Router<()>
where
  S: VersionStore + 'static,
{
  Router::new()
    .route("/files", get(files::list::<S>))
    .route("/files/latest", get(files::latest::<S>))
    .route("/files/version", get(files::version::<S>))
    .route("/files/history", get(files::history::<S>))
    .route("/files/diff", get(files::diff::<S>))
    .route("/files/save", post(files::save::<S>))
    .route("/files/patch", post(files::patch::<S>))
    .with_state(engine)
}
