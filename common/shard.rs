use crate::error::SeedError;
use crate::error::SeedResult;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;

/// Layout of a dump directory: `posts/`, `comments/` and `parents/`, each holding one file per
/// shard named by the zero-padded shard index.
#[derive(Clone, Debug)]
pub struct ShardDirs {
  root: PathBuf,
}

impl ShardDirs {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn file_name(index: u32) -> String {
    format!("{index:012}.json")
  }

  pub fn posts(&self, index: u32) -> PathBuf {
    self.root.join("posts").join(Self::file_name(index))
  }

  pub fn comments(&self, index: u32) -> PathBuf {
    self.root.join("comments").join(Self::file_name(index))
  }

  pub fn parents(&self, index: u32) -> PathBuf {
    self.root.join("parents").join(Self::file_name(index))
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineCounts {
  pub records: usize,
  pub blank_lines: usize,
}

/// Streams a newline-delimited JSON file, calling `on_record` for every non-blank line.
/// Returns None if the file doesn't exist; callers decide whether that's fatal.
pub async fn for_each_record<T, F>(path: &Path, mut on_record: F) -> SeedResult<Option<LineCounts>>
where
  T: DeserializeOwned,
  F: FnMut(T) -> SeedResult<()>,
{
  let file = match File::open(path).await {
    Ok(f) => f,
    Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
    Err(err) => return Err(SeedError::io(path)(err)),
  };
  let mut lines = BufReader::new(file).lines();
  let mut counts = LineCounts::default();
  let mut line_no = 0;
  while let Some(line) = lines.next_line().await.map_err(SeedError::io(path))? {
    line_no += 1;
    if line.trim().is_empty() {
      tracing::warn!(file = %path.display(), line = line_no, "empty line");
      counts.blank_lines += 1;
      continue;
    };
    let record = serde_json::from_str::<T>(&line).map_err(|source| SeedError::Parse {
      path: path.to_path_buf(),
      line: line_no,
      source,
    })?;
    on_record(record)?;
    counts.records += 1;
  }
  Ok(Some(counts))
}

#[cfg(test)]
mod tests {
  use super::*;
  use parking_lot::Mutex;
  use serde::Deserialize;
  use std::io::Write;
  use std::sync::Arc;

  #[derive(Clone, Default)]
  struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

  impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
      self.0.lock().extend_from_slice(buf);
      Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
      Ok(())
    }
  }

  #[derive(Deserialize)]
  struct Row {
    id: String,
  }

  #[test]
  fn test_shard_paths() {
    let dirs = ShardDirs::new("/data");
    assert_eq!(dirs.posts(7), PathBuf::from("/data/posts/000000000007.json"));
    assert_eq!(
      dirs.parents(135),
      PathBuf::from("/data/parents/000000000135.json")
    );
  }

  #[tokio::test]
  async fn test_blank_lines_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("000000000000.json");
    std::fs::write(&path, "{\"id\":\"a\"}\n\n{\"id\":\"b\"}\n   \n{\"id\":\"c\"}\n").unwrap();
    let mut ids = Vec::new();
    let counts = for_each_record(&path, |r: Row| {
      ids.push(r.id);
      Ok(())
    })
    .await
    .unwrap();
    assert_eq!(
      counts,
      Some(LineCounts {
        records: 3,
        blank_lines: 2,
      })
    );
    assert_eq!(ids, vec!["a", "b", "c"]);
  }

  #[tokio::test]
  async fn test_blank_lines_are_logged() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
      .with_writer(move || writer.clone())
      .with_ansi(false)
      .json()
      .finish();
    // Current-thread runtime, so the guard covers every poll of the read below.
    let _guard = tracing::subscriber::set_default(subscriber);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("000000000000.json");
    std::fs::write(&path, "{\"id\":\"a\"}\n\n{\"id\":\"b\"}\n").unwrap();
    for_each_record(&path, |_: Row| Ok(())).await.unwrap();

    let out = String::from_utf8(logs.0.lock().clone()).unwrap();
    let events = out
      .lines()
      .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap())
      .filter(|e| e["fields"]["message"] == "empty line")
      .collect::<Vec<_>>();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["level"], "WARN");
    assert_eq!(events[0]["fields"]["line"], 2);
  }

  #[tokio::test]
  async fn test_malformed_line_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("000000000000.json");
    std::fs::write(&path, "{\"id\":\"a\"}\n{\"id\":\n").unwrap();
    let res = for_each_record(&path, |_: Row| Ok(())).await;
    assert!(matches!(res, Err(SeedError::Parse { line: 2, .. })));
  }

  #[tokio::test]
  async fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let res = for_each_record(&dir.path().join("nope.json"), |_: Row| Ok(())).await;
    assert_eq!(res.unwrap(), None);
  }
}
