//! Core types and the version-history engine for revlog.
//!
//! A tracked file is stored as an immutable base snapshot plus an append-only
//! chain of text patches. Any historical revision is rebuilt by replaying the
//! chain over the base.
//!
//! This crate has no HTTP and database dependencies.
//! Storage backends implement [`store::VersionStore`]; everything else is
//! built on top of [`engine::VersionEngine`].

pub mod codec;
pub mod diff;
pub mod engine;
pub mod error;
pub mod file;
pub mod patch;
pub mod reconstruct;
pub mod store;

pub use error::{Error, Result};
