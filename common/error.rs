use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
  #[error("I/O error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  // Only post shards are required to exist; comment and link shards may be sparse.
  #[error("required shard file {0} does not exist")]
  MissingShard(PathBuf),

  #[error("failed to parse {path} line {line}: {source}")]
  Parse {
    path: PathBuf,
    line: usize,
    #[source]
    source: serde_json::Error,
  },

  #[error("unexpected {field} reference {value:?}")]
  Fullname { field: &'static str, value: String },

  #[error("invalid timestamp {0:?}")]
  Timestamp(String),

  #[error("failed to set up statsd sink: {0}")]
  Metrics(#[source] std::io::Error),

  #[error("store error: {0}")]
  Db(String),

  #[error("pending link artifact {path} is invalid: {source}")]
  Artifact {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

pub type SeedResult<T> = Result<T, SeedError>;

impl SeedError {
  pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> SeedError {
    let path = path.into();
    move |source| SeedError::Io { path, source }
  }
}

impl From<rusqlite::Error> for SeedError {
  fn from(err: rusqlite::Error) -> Self {
    SeedError::Db(err.to_string())
  }
}
