//! `revlog`: command-line client for a revlog server.
//!
//! # Usage
//!
//! ```text
//! revlog ls
//! revlog save notes.md --file ./notes.md --author alice
//! revlog cat notes.md --version 3
//! revlog log notes.md
//! revlog diff notes.md base latest
//! ```

mod client;

use std::{
  io::{self, Read as _},
  path::PathBuf,
};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig, SaveBody};
use revlog_core::file::{Author, FileSummary, VersionSummary};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const DEFAULT_URL: &str = "http://localhost:5232";

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "revlog", about = "Client for the revlog version history server")]
struct Args {
  /// Path to a TOML config file (url).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the revlog server (default: http://localhost:5232).
  #[arg(long, env = "REVLOG_URL")]
  url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List tracked files.
  Ls,

  /// Print a file's content at HEAD or at a given version.
  Cat {
    path:    String,
    /// Version index, `latest` or `base`.
    #[arg(long)]
    version: Option<String>,
  },

  /// Commit new content for a file, read from `--file` or stdin.
  Save {
    path:   String,
    #[arg(long, value_name = "FILE")]
    file:   Option<PathBuf>,
    #[arg(long, value_name = "NAME")]
    author: Option<String>,
    #[arg(long, value_name = "ADDR", requires = "author")]
    email:  Option<String>,
    /// Reject the save unless the chain has exactly this many versions.
    #[arg(long, value_name = "N")]
    expect: Option<usize>,
  },

  /// Show the version history of a file.
  Log { path: String },

  /// Unified diff between two versions (index, `latest` or `base`).
  Diff { path: String, from: String, to: String },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default, Debug)]
struct ConfigFile {
  #[serde(default)]
  url: String,
}

/// CLI flag or env var, then config file, then the default.
fn resolve_url(flag: Option<String>, file_cfg: &ConfigFile) -> String {
  flag
    .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
    .unwrap_or_else(|| DEFAULT_URL.to_string())
}

// ─── Output ───────────────────────────────────────────────────────────────────

fn format_file(file: &FileSummary) -> String {
  format!(
    "{:<40} {:>5} versions  updated {}",
    file.filename,
    file.version_count,
    file.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
  )
}

fn format_version(version: &VersionSummary) -> String {
  let when = version.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S");
  match &version.author {
    Some(Author { name, email: Some(email) }) => {
      format!("{:>4}  {when}  {name} <{email}>", version.index)
    }
    Some(Author { name, email: None }) => format!("{:>4}  {when}  {name}", version.index),
    None => format!("{:>4}  {when}", version.index),
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  // Load config file if provided.
  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  let client = ApiClient::new(ApiConfig { base_url: resolve_url(args.url, &file_cfg) })?;

  match args.command {
    Command::Ls => {
      for file in client.list().await? {
        println!("{}", format_file(&file));
      }
    }
    Command::Cat { path, version: None } => {
      print!("{}", client.latest(&path).await?.content);
    }
    Command::Cat { path, version: Some(version) } => {
      print!("{}", client.version(&path, &version).await?.content);
    }
    Command::Save { path, file, author, email, expect } => {
      let content = match file {
        Some(file) => std::fs::read_to_string(&file)
          .with_context(|| format!("reading {}", file.display()))?,
        None => {
          let mut buf = String::new();
          io::stdin().read_to_string(&mut buf).context("reading stdin")?;
          buf
        }
      };
      let outcome = client
        .save(&SaveBody {
          path:              &path,
          content:           &content,
          author:            author.map(|name| Author { name, email }),
          expected_versions: expect,
        })
        .await?;
      match outcome.version {
        Some(v) => println!("{}: {} (version {v})", path, outcome.status),
        None => println!("{}: {}", path, outcome.status),
      }
    }
    Command::Log { path } => {
      for version in client.history(&path).await? {
        println!("{}", format_version(&version));
      }
    }
    Command::Diff { path, from, to } => {
      print!("{}", client.diff(&path, &from, &to).await?.diff);
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;

  #[test]
  fn url_precedence() {
    let file = ConfigFile { url: "http://file:1".into() };
    assert_eq!(resolve_url(Some("http://flag:2".into()), &file), "http://flag:2");
    assert_eq!(resolve_url(None, &file), "http://file:1");
    assert_eq!(resolve_url(None, &ConfigFile::default()), DEFAULT_URL);
  }

  #[test]
  fn config_file_parses() {
    let cfg: ConfigFile = toml::from_str(r#"url = "http://example:9000""#).unwrap();
    assert_eq!(cfg.url, "http://example:9000");
    let empty: ConfigFile = toml::from_str("").unwrap();
    assert!(empty.url.is_empty());
  }

  #[test]
  fn save_command_parses() {
    let args = Args::try_parse_from([
      "revlog", "save", "a.txt", "--author", "alice", "--email", "a@example.com", "--expect",
      "2",
    ])
    .unwrap();
    match args.command {
      Command::Save { path, author, email, expect, file } => {
        assert_eq!(path, "a.txt");
        assert_eq!(author.as_deref(), Some("alice"));
        assert_eq!(email.as_deref(), Some("a@example.com"));
        assert_eq!(expect, Some(2));
        assert!(file.is_none());
      }
      other => panic!("unexpected command {other:?}"),
    }
  }

  #[test]
  fn email_requires_author() {
    assert!(Args::try_parse_from(["revlog", "save", "a.txt", "--email", "a@example.com"]).is_err());
  }

  #[test]
  fn version_lines_show_authors() {
    let timestamp = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let anonymous = VersionSummary { index: 7, timestamp, author: None };
    assert!(format_version(&anonymous).starts_with("   7  "));

    let named = VersionSummary {
      index: 0,
      timestamp,
      author: Some(Author { name: "Alice".into(), email: Some("a@example.com".into()) }),
    };
    assert!(format_version(&named).ends_with("Alice <a@example.com>"));
  }
}
