use crate::cfg::SeedCfg;
use crate::error::SeedError;
use crate::error::SeedResult;
use crate::record::Post;
use crate::record::RawPost;
use crate::shard::for_each_record;
use crate::store::Store;
use cadence::Counted;
use cadence::StatsdClient;
use cadence::Timed;
use std::time::Instant;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PostShardSummary {
  pub records: usize,
  pub blank_lines: usize,
}

/// Loads one post shard. Unlike comments, every post shard must exist: a missing file is an error.
pub async fn load_post_shard<S: Store>(
  cfg: &SeedCfg,
  store: &S,
  statsd: &StatsdClient,
  index: u32,
) -> SeedResult<PostShardSummary> {
  let path = cfg.dirs.posts(index);
  let started = Instant::now();
  let mut posts = Vec::new();
  let counts = for_each_record(&path, |raw: RawPost| {
    posts.push(Post::try_from(raw)?);
    Ok(())
  })
  .await?;
  let Some(counts) = counts else {
    return Err(SeedError::MissingShard(path));
  };

  tracing::info!(shard = index, file = %path.display(), posts = posts.len(), "seeding posts");
  store.insert_posts(posts).await?;

  statsd
    .count_with_tags("posts_read", counts.records as u64)
    .send();
  statsd
    .count_with_tags("blank_lines", counts.blank_lines as u64)
    .with_tag("stage", "posts")
    .send();
  statsd
    .time_with_tags("shard_ms", started.elapsed())
    .with_tag("stage", "posts")
    .send();
  Ok(PostShardSummary {
    records: counts.records,
    blank_lines: counts.blank_lines,
  })
}
