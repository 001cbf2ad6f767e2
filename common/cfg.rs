use crate::shard::ShardDirs;

// Sizes of the dump this was first run against.
pub const DEFAULT_POST_SHARDS: u32 = 34;
pub const DEFAULT_COMMENT_SHARDS: u32 = 136;
// Keeps the linker's `in (...)` list and values list well under the store's placeholder limits.
pub const DEFAULT_LINK_BATCH_SIZE: usize = 16_000;

/// Everything a stage needs to know about the run. Built once by the binary and passed into every
/// stage call.
#[derive(Clone, Debug)]
pub struct SeedCfg {
  pub dirs: ShardDirs,
  pub post_shards: u32,
  pub comment_shards: u32,
  pub link_batch_size: usize,
  /// Shards loaded at once in the post and comment stages. The linker is always sequential.
  pub concurrency: usize,
  pub first_shard: u32,
  pub last_shard: Option<u32>,
}

impl SeedCfg {
  pub fn new(dirs: ShardDirs) -> Self {
    Self {
      dirs,
      post_shards: DEFAULT_POST_SHARDS,
      comment_shards: DEFAULT_COMMENT_SHARDS,
      link_batch_size: DEFAULT_LINK_BATCH_SIZE,
      concurrency: 1,
      first_shard: 0,
      last_shard: None,
    }
  }

  /// Shard indices to process out of `count`, honoring the first/last overrides.
  pub fn shards(&self, count: u32) -> impl Iterator<Item = u32> {
    let last = self.last_shard;
    (self.first_shard..count).take_while(move |i| last.map_or(true, |last| *i <= last))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use itertools::Itertools;

  #[test]
  fn test_shard_range() {
    let mut cfg = SeedCfg::new(ShardDirs::new("data"));
    assert_eq!(cfg.shards(3).collect_vec(), vec![0, 1, 2]);
    cfg.first_shard = 1;
    cfg.last_shard = Some(5);
    assert_eq!(cfg.shards(4).collect_vec(), vec![1, 2, 3]);
    assert_eq!(cfg.shards(10).collect_vec(), vec![1, 2, 3, 4, 5]);
    cfg.first_shard = 7;
    assert_eq!(cfg.shards(10).count(), 0);
  }
}
