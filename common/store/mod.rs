pub mod db_rpc;
pub mod sqlite;

use crate::error::SeedResult;
use crate::pending::PendingParentLink;
use crate::record::Comment;
use crate::record::Post;
use ahash::AHashSet;
use std::future::Future;

/// Everything the pipeline needs from the relational store.
///
/// Inserts must skip rows whose id already exists rather than overwrite or fail, and that skip must
/// be atomic per row so concurrent shard loads stay safe. Any other failure (connectivity, foreign
/// key violations) is returned as an error and aborts the run.
pub trait Store: Send + Sync {
  fn insert_posts(&self, posts: Vec<Post>) -> impl Future<Output = SeedResult<()>> + Send;

  fn insert_comments(&self, comments: Vec<Comment>)
    -> impl Future<Output = SeedResult<()>> + Send;

  /// Returns the subset of `ids` that currently exist in the comment table.
  fn existing_comment_ids(
    &self,
    ids: Vec<String>,
  ) -> impl Future<Output = SeedResult<AHashSet<String>>> + Send;

  /// Sets `parent_id` for every child in `links` with one set-based statement. Returns rows
  /// affected.
  fn link_parents(
    &self,
    links: Vec<PendingParentLink>,
  ) -> impl Future<Output = SeedResult<u64>> + Send;
}
