use crate::cfg::SeedCfg;
use crate::error::SeedResult;
use crate::pending::write_pending_links;
use crate::record::Comment;
use crate::record::RawComment;
use crate::shard::for_each_record;
use crate::store::Store;
use cadence::Counted;
use cadence::StatsdClient;
use cadence::Timed;
use std::time::Instant;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommentShardSummary {
  pub records: usize,
  pub blank_lines: usize,
  pub roots: usize,
  pub pending_links: usize,
}

/// Loads one comment shard and writes its pending parent links for the linker.
///
/// Every comment goes in with a null `parent_id`: a parent comment may live in a shard that hasn't
/// been loaded yet, so comment-to-comment links are only resolved once all shards are in. Returns
/// None if the shard doesn't exist, since comment shards are sparse.
pub async fn load_comment_shard<S: Store>(
  cfg: &SeedCfg,
  store: &S,
  statsd: &StatsdClient,
  index: u32,
) -> SeedResult<Option<CommentShardSummary>> {
  let path = cfg.dirs.comments(index);
  let started = Instant::now();
  let mut comments = Vec::new();
  let mut pending = Vec::new();
  let counts = for_each_record(&path, |raw: RawComment| {
    let (comment, link) = Comment::from_raw(raw)?;
    comments.push(comment);
    pending.extend(link);
    Ok(())
  })
  .await?;
  let Some(counts) = counts else {
    tracing::debug!(shard = index, file = %path.display(), "no comment shard");
    return Ok(None);
  };

  let summary = CommentShardSummary {
    records: counts.records,
    blank_lines: counts.blank_lines,
    roots: comments.iter().filter(|c| c.is_root).count(),
    pending_links: pending.len(),
  };
  tracing::info!(
    shard = index,
    file = %path.display(),
    comments = summary.records,
    roots = summary.roots,
    "seeding comments"
  );
  store.insert_comments(comments).await?;

  // Written only after the insert succeeds, and even when empty, so the linker can tell a loaded
  // shard from one that was never loaded.
  write_pending_links(&cfg.dirs.parents(index), &pending).await?;
  tracing::info!(
    shard = index,
    pending_links = summary.pending_links,
    "wrote pending parent links"
  );

  statsd
    .count_with_tags("comments_read", summary.records as u64)
    .send();
  statsd
    .count_with_tags("pending_links", summary.pending_links as u64)
    .send();
  statsd
    .count_with_tags("blank_lines", summary.blank_lines as u64)
    .with_tag("stage", "comments")
    .send();
  statsd
    .time_with_tags("shard_ms", started.elapsed())
    .with_tag("stage", "comments")
    .send();
  Ok(Some(summary))
}
