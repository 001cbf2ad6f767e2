use super::Store;
use crate::error::SeedError;
use crate::error::SeedResult;
use crate::pending::PendingParentLink;
use crate::record::Comment;
use crate::record::Post;
use ahash::AHashSet;
use itertools::Itertools;
use parking_lot::Mutex;
use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::Connection;
use std::iter::repeat;
use std::path::Path;
use std::sync::Arc;
use tokio::task::spawn_blocking;

// SQLITE_MAX_VARIABLE_NUMBER for bundled builds.
const MAX_VARIABLES: usize = 32_766;

const SCHEMA: &str = r#"
  pragma foreign_keys = on;

  create table if not exists post (
    id text primary key,
    author text not null,
    title text not null,
    url text not null,
    selftext text not null,
    thumbnail text not null,
    created_utc integer not null,
    score integer not null,
    subreddit text not null,
    over_18 integer not null,
    permalink text not null
  );

  create table if not exists comment (
    id text primary key,
    body text not null,
    author text not null,
    created_utc integer not null,
    score integer not null,
    gilded integer not null,
    edited integer not null,
    locked integer not null,
    is_submitter integer not null,
    post_id text not null references post (id),
    parent_id text references comment (id),
    is_root integer not null,
    permalink text not null
  );

  create index if not exists comment_post_id on comment (post_id);
  create index if not exists comment_parent_id on comment (parent_id);
"#;

/// Local SQLite database, mainly for development runs and tests. Calls run on the blocking pool
/// and serialize on one connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
  pub fn open(path: &Path) -> SeedResult<Self> {
    Self::init(Connection::open(path)?)
  }

  pub fn open_in_memory() -> SeedResult<Self> {
    Self::init(Connection::open_in_memory()?)
  }

  fn init(conn: Connection) -> SeedResult<Self> {
    conn.execute_batch(SCHEMA)?;
    Ok(Self {
      conn: Arc::new(Mutex::new(conn)),
    })
  }

  async fn with_conn<T, F>(&self, f: F) -> SeedResult<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> SeedResult<T> + Send + 'static,
  {
    let conn = self.conn.clone();
    spawn_blocking(move || f(&mut conn.lock()))
      .await
      .map_err(|err| SeedError::Db(format!("sqlite task failed: {err}")))?
  }
}

impl Store for SqliteStore {
  async fn insert_posts(&self, posts: Vec<Post>) -> SeedResult<()> {
    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
          let mut stmt = tx.prepare_cached(
            r#"
              insert into post (id, author, title, url, selftext, thumbnail, created_utc, score, subreddit, over_18, permalink)
              values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
              on conflict (id) do nothing
            "#,
          )?;
          for p in posts {
            inserted += stmt.execute(params![
              p.id,
              p.author,
              p.title,
              p.url,
              p.selftext,
              p.thumbnail,
              p.created_utc.timestamp(),
              p.score,
              p.subreddit,
              p.over_18,
              p.permalink,
            ])?;
          }
        }
        tx.commit()?;
        tracing::debug!(inserted, "inserted posts");
        Ok(())
      })
      .await
  }

  async fn insert_comments(&self, comments: Vec<Comment>) -> SeedResult<()> {
    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
          let mut stmt = tx.prepare_cached(
            r#"
              insert into comment (id, body, author, created_utc, score, gilded, edited, locked, is_submitter, post_id, parent_id, is_root, permalink)
              values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
              on conflict (id) do nothing
            "#,
          )?;
          for c in comments {
            inserted += stmt.execute(params![
              c.id,
              c.body,
              c.author,
              c.created_utc.timestamp(),
              c.score,
              c.gilded,
              c.edited,
              c.locked,
              c.is_submitter,
              c.post_id,
              c.parent_id,
              c.is_root,
              c.permalink,
            ])?;
          }
        }
        tx.commit()?;
        tracing::debug!(inserted, "inserted comments");
        Ok(())
      })
      .await
  }

  async fn existing_comment_ids(&self, ids: Vec<String>) -> SeedResult<AHashSet<String>> {
    self
      .with_conn(move |conn| {
        let mut found = AHashSet::new();
        for chunk in ids.chunks(MAX_VARIABLES) {
          let sql = format!(
            "select id from comment where id in ({})",
            repeat("?").take(chunk.len()).join(", ")
          );
          let mut stmt = conn.prepare(&sql)?;
          let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| row.get::<_, String>(0))?;
          for id in rows {
            found.insert(id?);
          }
        }
        Ok(found)
      })
      .await
  }

  async fn link_parents(&self, links: Vec<PendingParentLink>) -> SeedResult<u64> {
    self
      .with_conn(move |conn| {
        let mut affected = 0;
        for chunk in links.chunks(MAX_VARIABLES / 2) {
          let sql = format!(
            r#"
              with x (id, parent_id) as (values {})
              update comment
              set parent_id = x.parent_id
              from x
              where comment.id = x.id
            "#,
            repeat("(?, ?)").take(chunk.len()).join(", ")
          );
          let params = chunk
            .iter()
            .flat_map(|l| [l.child_id.as_str(), l.parent_id.as_str()]);
          affected += conn.execute(&sql, params_from_iter(params))? as u64;
        }
        Ok(affected)
      })
      .await
  }
}
