use crate::cfg::SeedCfg;
use crate::error::SeedError;
use crate::error::SeedResult;
use crate::link_parents::link_parent_shard;
use crate::load_comments::load_comment_shard;
use crate::load_comments::CommentShardSummary;
use crate::load_posts::load_post_shard;
use crate::load_posts::PostShardSummary;
use crate::store::Store;
use cadence::StatsdClient;
use futures::stream;
use futures::StreamExt;
use futures::TryStreamExt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PostStageTotals {
  pub shards: usize,
  pub records: usize,
  pub blank_lines: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommentStageTotals {
  pub shards: usize,
  pub missing_shards: usize,
  pub records: usize,
  pub blank_lines: usize,
  pub pending_links: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkStageTotals {
  pub shards: usize,
  pub pending: usize,
  pub found: usize,
  pub affected: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunTotals {
  pub posts: PostStageTotals,
  pub comments: CommentStageTotals,
  pub links: LinkStageTotals,
}

/// Runs the stages over the configured shard ranges. The first failing shard aborts its stage and
/// the run; rerunning is safe because every stage is idempotent.
pub struct Seeder<S> {
  cfg: SeedCfg,
  store: S,
  statsd: Arc<StatsdClient>,
}

impl<S: Store> Seeder<S> {
  pub fn new(cfg: SeedCfg, store: S, statsd: Arc<StatsdClient>) -> Self {
    Self { cfg, store, statsd }
  }

  pub async fn load_posts(&self) -> SeedResult<PostStageTotals> {
    let totals = stream::iter(self.cfg.shards(self.cfg.post_shards))
      .map(|index| load_post_shard(&self.cfg, &self.store, &self.statsd, index))
      .buffer_unordered(self.cfg.concurrency.max(1))
      .try_fold(
        PostStageTotals::default(),
        |mut t, s: PostShardSummary| async move {
          t.shards += 1;
          t.records += s.records;
          t.blank_lines += s.blank_lines;
          Ok::<_, SeedError>(t)
        },
      )
      .await?;
    tracing::info!(
      shards = totals.shards,
      posts = totals.records,
      blank_lines = totals.blank_lines,
      "posts stage finished"
    );
    Ok(totals)
  }

  pub async fn load_comments(&self) -> SeedResult<CommentStageTotals> {
    let totals = stream::iter(self.cfg.shards(self.cfg.comment_shards))
      .map(|index| load_comment_shard(&self.cfg, &self.store, &self.statsd, index))
      .buffer_unordered(self.cfg.concurrency.max(1))
      .try_fold(
        CommentStageTotals::default(),
        |mut t, s: Option<CommentShardSummary>| async move {
          match s {
            Some(s) => {
              t.shards += 1;
              t.records += s.records;
              t.blank_lines += s.blank_lines;
              t.pending_links += s.pending_links;
            }
            None => t.missing_shards += 1,
          };
          Ok::<_, SeedError>(t)
        },
      )
      .await?;
    tracing::info!(
      shards = totals.shards,
      missing_shards = totals.missing_shards,
      comments = totals.records,
      pending_links = totals.pending_links,
      "comments stage finished"
    );
    Ok(totals)
  }

  // Always sequential, whatever `concurrency` is set to.
  pub async fn link_parents(&self) -> SeedResult<LinkStageTotals> {
    let mut totals = LinkStageTotals::default();
    for index in self.cfg.shards(self.cfg.comment_shards) {
      let Some(s) = link_parent_shard(&self.cfg, &self.store, &self.statsd, index).await? else {
        continue;
      };
      totals.shards += 1;
      totals.pending += s.pending;
      totals.found += s.found;
      totals.affected += s.affected;
    }
    tracing::info!(
      shards = totals.shards,
      pending = totals.pending,
      found = totals.found,
      affected = totals.affected,
      "parents stage finished"
    );
    Ok(totals)
  }

  pub async fn run_all(&self) -> SeedResult<RunTotals> {
    tracing::info!("start seeding");
    let posts = self.load_posts().await?;
    let comments = self.load_comments().await?;
    let links = self.link_parents().await?;
    tracing::info!("seeding finished");
    Ok(RunTotals {
      posts,
      comments,
      links,
    })
  }
}
