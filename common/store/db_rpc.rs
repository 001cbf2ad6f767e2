use super::Store;
use crate::error::SeedError;
use crate::error::SeedResult;
use crate::msgpack::datetime_to_rmpv;
use crate::pending::PendingParentLink;
use crate::record::Comment;
use crate::record::Post;
use ahash::AHashSet;
use db_rpc_client_rs::DbRpcDbClient;
use itertools::Itertools;
use rmpv::Value;
use serde::Deserialize;
use std::fmt::Debug;
use std::iter::repeat;

// One batch call per chunk keeps a whole shard from being buffered by the db-rpc server at once.
const INSERT_CHUNK: usize = 10_000;

// MySQL prepared statements take at most 65535 placeholders.
const MAX_PLACEHOLDERS: usize = 65_535;

const INSERT_POST_SQL: &str = r#"
  insert into post (id, author, title, url, selftext, thumbnail, created_utc, score, subreddit, over_18, permalink)
  values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
  on duplicate key update id = id
"#;

const INSERT_COMMENT_SQL: &str = r#"
  insert into comment (id, body, author, created_utc, score, gilded, edited, locked, is_submitter, post_id, parent_id, is_root, permalink)
  values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
  on duplicate key update id = id
"#;

fn db_err(err: impl Debug) -> SeedError {
  SeedError::Db(format!("{err:?}"))
}

fn opt_str(v: Option<String>) -> Value {
  v.map(Value::from).unwrap_or(Value::Nil)
}

// Column order matches INSERT_POST_SQL.
fn post_row(p: Post) -> Vec<Value> {
  vec![
    p.id.into(),
    p.author.into(),
    p.title.into(),
    p.url.into(),
    p.selftext.into(),
    p.thumbnail.into(),
    datetime_to_rmpv(p.created_utc),
    p.score.into(),
    p.subreddit.into(),
    p.over_18.into(),
    p.permalink.into(),
  ]
}

// Column order matches INSERT_COMMENT_SQL.
fn comment_row(c: Comment) -> Vec<Value> {
  vec![
    c.id.into(),
    c.body.into(),
    c.author.into(),
    datetime_to_rmpv(c.created_utc),
    c.score.into(),
    c.gilded.into(),
    c.edited.into(),
    c.locked.into(),
    c.is_submitter.into(),
    c.post_id.into(),
    opt_str(c.parent_id),
    c.is_root.into(),
    c.permalink.into(),
  ]
}

fn select_ids_sql(cnt: usize) -> String {
  format!(
    "select id from comment where id in ({})",
    repeat("?").take(cnt).join(", ")
  )
}

// `affected` only counts rows whose parent actually changed.
fn link_parents_sql(cnt: usize) -> String {
  format!(
    r#"
      update comment c
      join (values {}) as x (id, parent_id) on c.id = x.id
      set c.parent_id = x.parent_id
    "#,
    repeat("row(?, ?)").take(cnt).join(", ")
  )
}

fn link_params(links: &[PendingParentLink]) -> Vec<Value> {
  links
    .iter()
    .flat_map(|l| {
      [
        Value::from(l.child_id.as_str()),
        Value::from(l.parent_id.as_str()),
      ]
    })
    .collect_vec()
}

/// MySQL-flavoured store behind a db-rpc endpoint. Tables are expected to already exist.
#[derive(Clone)]
pub struct DbRpcStore {
  db: DbRpcDbClient,
}

impl DbRpcStore {
  pub fn new(db: DbRpcDbClient) -> Self {
    Self { db }
  }

  async fn batch_insert(&self, sql: &str, rows: Vec<Vec<Value>>) -> SeedResult<()> {
    // Collected up front: itertools' chunk iterator isn't Send and can't be held across an await.
    let chunks = rows
      .into_iter()
      .chunks(INSERT_CHUNK)
      .into_iter()
      .map(|c| c.collect_vec())
      .collect_vec();
    for params in chunks {
      let cnt = params.len();
      self.db.batch(sql, params).await.map_err(db_err)?;
      tracing::debug!(rows = cnt, "inserted chunk");
    }
    Ok(())
  }
}

impl Store for DbRpcStore {
  async fn insert_posts(&self, posts: Vec<Post>) -> SeedResult<()> {
    let rows = posts.into_iter().map(post_row).collect_vec();
    // `on duplicate key update id = id` only swallows duplicate keys, unlike `insert ignore`.
    self.batch_insert(INSERT_POST_SQL, rows).await
  }

  async fn insert_comments(&self, comments: Vec<Comment>) -> SeedResult<()> {
    let rows = comments.into_iter().map(comment_row).collect_vec();
    self.batch_insert(INSERT_COMMENT_SQL, rows).await
  }

  async fn existing_comment_ids(&self, ids: Vec<String>) -> SeedResult<AHashSet<String>> {
    #[derive(Deserialize)]
    struct Row {
      id: String,
    }
    let mut found = AHashSet::new();
    for chunk in ids.chunks(MAX_PLACEHOLDERS) {
      let rows = self
        .db
        .query::<Row>(
          &select_ids_sql(chunk.len()),
          chunk.iter().map(|id| Value::from(id.as_str())).collect_vec(),
        )
        .await
        .map_err(db_err)?;
      found.extend(rows.into_iter().map(|r| r.id));
    }
    Ok(found)
  }

  async fn link_parents(&self, links: Vec<PendingParentLink>) -> SeedResult<u64> {
    let mut affected = 0;
    for chunk in links.chunks(MAX_PLACEHOLDERS / 2) {
      let res = self
        .db
        .exec(&link_parents_sql(chunk.len()), link_params(chunk))
        .await
        .map_err(db_err)?;
      affected += res.affected_rows as u64;
    }
    Ok(affected)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use chrono::Utc;

  fn link(child_id: &str, parent_id: &str) -> PendingParentLink {
    PendingParentLink {
      child_id: child_id.to_string(),
      parent_id: parent_id.to_string(),
    }
  }

  fn placeholders(sql: &str) -> usize {
    sql.matches('?').count()
  }

  #[test]
  fn test_inserts_skip_duplicate_keys_only() {
    for sql in [INSERT_POST_SQL, INSERT_COMMENT_SQL] {
      assert!(sql.contains("on duplicate key update id = id"));
      assert!(!sql.contains("ignore"));
    }
    assert_eq!(placeholders(INSERT_POST_SQL), 11);
    assert_eq!(placeholders(INSERT_COMMENT_SQL), 13);
  }

  #[test]
  fn test_rows_match_insert_columns() {
    let created_utc = Utc.timestamp_opt(1672531200, 0).unwrap();
    let row = post_row(Post {
      id: "p1".to_string(),
      author: "op".to_string(),
      title: "title".to_string(),
      url: String::new(),
      selftext: String::new(),
      thumbnail: "self".to_string(),
      created_utc,
      score: 5,
      subreddit: "test".to_string(),
      over_18: true,
      permalink: String::new(),
    });
    assert_eq!(row.len(), placeholders(INSERT_POST_SQL));
    assert_eq!(row[0], Value::from("p1"));
    assert_eq!(row[6], datetime_to_rmpv(created_utc));
    assert_eq!(row[7], Value::from(5i64));
    assert_eq!(row[9], Value::from(true));

    let row = comment_row(Comment {
      id: "c2".to_string(),
      body: "body".to_string(),
      author: "someone".to_string(),
      created_utc,
      score: 1,
      gilded: 0,
      edited: false,
      locked: false,
      is_submitter: false,
      post_id: "p1".to_string(),
      parent_id: None,
      is_root: false,
      permalink: String::new(),
    });
    assert_eq!(row.len(), placeholders(INSERT_COMMENT_SQL));
    assert_eq!(row[9], Value::from("p1"));
    assert_eq!(row[10], Value::Nil);
    assert_eq!(row[11], Value::from(false));
  }

  #[test]
  fn test_select_ids_placeholders() {
    let sql = select_ids_sql(3);
    assert_eq!(sql, "select id from comment where id in (?, ?, ?)");
  }

  #[test]
  fn test_link_update_is_set_based() {
    let links = [link("c2", "c1"), link("c3", "c2")];
    let sql = link_parents_sql(links.len());
    assert!(sql.contains("join (values row(?, ?), row(?, ?)) as x (id, parent_id) on c.id = x.id"));
    assert!(sql.contains("set c.parent_id = x.parent_id"));
    assert_eq!(
      link_params(&links),
      vec![
        Value::from("c2"),
        Value::from("c1"),
        Value::from("c3"),
        Value::from("c2"),
      ]
    );
  }

  #[test]
  fn test_chunks_stay_under_placeholder_limit() {
    let links = (0..MAX_PLACEHOLDERS)
      .map(|i| link(&format!("c{i}"), "p"))
      .collect_vec();
    let chunks = links.chunks(MAX_PLACEHOLDERS / 2).collect_vec();
    assert_eq!(chunks.len(), 3);
    for chunk in chunks {
      assert!(placeholders(&link_parents_sql(chunk.len())) <= MAX_PLACEHOLDERS);
    }
  }
}
