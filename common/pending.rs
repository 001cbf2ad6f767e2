use crate::error::SeedError;
use crate::error::SeedResult;
use serde::Deserialize;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

/// A comment whose parent is another comment that may not have been loaded yet.
/// Serialized as a `[child_id, parent_id]` pair.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct PendingParentLink {
  pub child_id: String,
  pub parent_id: String,
}

impl From<(String, String)> for PendingParentLink {
  fn from((child_id, parent_id): (String, String)) -> Self {
    Self {
      child_id,
      parent_id,
    }
  }
}

impl From<PendingParentLink> for (String, String) {
  fn from(l: PendingParentLink) -> Self {
    (l.child_id, l.parent_id)
  }
}

/// Writes the link list for a shard. Goes through a temp file so a crash mid-write never leaves a
/// truncated list for the linker to consume.
pub async fn write_pending_links(path: &Path, links: &[PendingParentLink]) -> SeedResult<()> {
  if let Some(dir) = path.parent() {
    fs::create_dir_all(dir).await.map_err(SeedError::io(dir))?;
  };
  let raw = serde_json::to_vec(links).map_err(|source| SeedError::Artifact {
    path: path.to_path_buf(),
    source,
  })?;
  let temp_path = path.with_extension("json.tmp");
  fs::write(&temp_path, raw)
    .await
    .map_err(SeedError::io(&temp_path))?;
  fs::rename(&temp_path, path)
    .await
    .map_err(SeedError::io(path))?;
  Ok(())
}

/// Returns None if the shard never produced a link list.
pub async fn read_pending_links(path: &Path) -> SeedResult<Option<Vec<PendingParentLink>>> {
  let raw = match fs::read(path).await {
    Ok(raw) => raw,
    Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
    Err(err) => return Err(SeedError::io(path)(err)),
  };
  let links = serde_json::from_slice(&raw).map_err(|source| SeedError::Artifact {
    path: path.to_path_buf(),
    source,
  })?;
  Ok(Some(links))
}
