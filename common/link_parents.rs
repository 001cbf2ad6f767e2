use crate::cfg::SeedCfg;
use crate::error::SeedResult;
use crate::pending::read_pending_links;
use crate::store::Store;
use cadence::Counted;
use cadence::StatsdClient;
use cadence::Timed;
use itertools::Itertools;
use std::time::Instant;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkShardSummary {
  pub pending: usize,
  pub batches: usize,
  pub found: usize,
  pub affected: u64,
}

/// Resolves one shard's pending parent links against the comments currently in the store.
///
/// Each batch is an existence lookup followed by a single set-based update. Links whose parent
/// isn't in the store are dropped: the dump is known to contain replies to comments it doesn't
/// include, and those children stay as non-root comments without a parent.
///
/// Not isolated from concurrent comment loads. A parent inserted between the lookup and the
/// update is picked up by a later run, which is safe because relinking is idempotent.
pub async fn link_parent_shard<S: Store>(
  cfg: &SeedCfg,
  store: &S,
  statsd: &StatsdClient,
  index: u32,
) -> SeedResult<Option<LinkShardSummary>> {
  let path = cfg.dirs.parents(index);
  let Some(links) = read_pending_links(&path).await? else {
    tracing::debug!(shard = index, file = %path.display(), "no pending parent links");
    return Ok(None);
  };
  tracing::info!(shard = index, file = %path.display(), pending = links.len(), "linking parents");
  let started = Instant::now();

  let batch_size = cfg.link_batch_size.max(1);
  let mut summary = LinkShardSummary {
    pending: links.len(),
    ..Default::default()
  };
  for (batch_no, batch) in links.chunks(batch_size).enumerate() {
    let from = batch_no * batch_size;
    let parent_ids = batch
      .iter()
      .map(|l| l.parent_id.clone())
      .unique()
      .collect_vec();
    let found = store.existing_comment_ids(parent_ids).await?;
    let resolved = batch
      .iter()
      .filter(|l| found.contains(&l.parent_id))
      .cloned()
      .collect_vec();
    let resolved_cnt = resolved.len();
    let affected = if resolved.is_empty() {
      0
    } else {
      store.link_parents(resolved).await?
    };
    tracing::info!(
      shard = index,
      from,
      to = from + batch.len(),
      found = resolved_cnt,
      affected,
      "processed batch"
    );
    statsd.count_with_tags("links_found", resolved_cnt as u64).send();
    statsd.count_with_tags("links_affected", affected).send();
    summary.batches += 1;
    summary.found += resolved_cnt;
    summary.affected += affected;
  }

  statsd
    .time_with_tags("shard_ms", started.elapsed())
    .with_tag("stage", "parents")
    .send();
  Ok(Some(summary))
}
