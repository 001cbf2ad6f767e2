use crate::error::SeedError;
use crate::error::SeedResult;
use crate::pending::PendingParentLink;
use chrono::DateTime;
use chrono::TimeZone;
use chrono::Utc;
use serde::Deserialize;
use serde_with::serde_as;
use serde_with::DisplayFromStr;
use serde_with::PickFirst;

// Dumps mix JSON numbers, numeric strings and the occasional ISO string for `created_utc`.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
  Int(i64),
  Float(f64),
  Text(String),
}

impl RawTimestamp {
  fn from_float(v: f64) -> Option<DateTime<Utc>> {
    if !v.is_finite() {
      return None;
    };
    let secs = v.floor();
    let nanos = (((v - secs) * 1e9).round() as u32).min(999_999_999);
    Utc.timestamp_opt(secs as i64, nanos).single()
  }

  pub fn to_utc(&self) -> SeedResult<DateTime<Utc>> {
    let parsed = match self {
      RawTimestamp::Int(secs) => Utc.timestamp_opt(*secs, 0).single(),
      RawTimestamp::Float(v) => Self::from_float(*v),
      RawTimestamp::Text(raw) => {
        let raw = raw.trim();
        if let Ok(secs) = raw.parse::<i64>() {
          Utc.timestamp_opt(secs, 0).single()
        } else if let Ok(v) = raw.parse::<f64>() {
          Self::from_float(v)
        } else {
          DateTime::parse_from_rfc3339(raw).map(|v| v.to_utc()).ok()
        }
      }
    };
    parsed.ok_or_else(|| SeedError::Timestamp(format!("{self:?}")))
  }
}

// Older dumps store `edited` as the edit time instead of `true`.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(untagged)]
pub enum RawEdited {
  Flag(bool),
  At(f64),
}

impl RawEdited {
  pub fn is_edited(self) -> bool {
    match self {
      RawEdited::Flag(v) => v,
      RawEdited::At(_) => true,
    }
  }
}

/// A typed `t1_`/`t3_` reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fullname {
  Comment(String),
  Post(String),
}

impl Fullname {
  /// The referenced id is NUL-stripped the same way record ids are, so it matches the stored row.
  pub fn parse(field: &'static str, raw: &str) -> SeedResult<Self> {
    let parsed = if let Some(id) = raw.strip_prefix("t1_") {
      Some(Fullname::Comment(strip_nul(id.to_string())))
    } else if let Some(id) = raw.strip_prefix("t3_") {
      Some(Fullname::Post(strip_nul(id.to_string())))
    } else {
      None
    };
    match parsed {
      Some(Fullname::Comment(id) | Fullname::Post(id)) if id.is_empty() => None,
      other => other,
    }
    .ok_or_else(|| SeedError::Fullname {
      field,
      value: raw.to_string(),
    })
  }
}

// Postgres-compatible stores reject NUL in text columns.
pub fn strip_nul(v: String) -> String {
  if v.contains('\0') {
    v.replace('\0', "")
  } else {
    v
  }
}

/// One line of a post shard. `name`, `subreddit_id` and `author_fullname` are deliberately not
/// modelled, so they never reach the store.
#[serde_as]
#[derive(Debug, Deserialize)]
pub struct RawPost {
  pub author: String,
  pub created_utc: RawTimestamp,
  pub id: String,
  pub over_18: bool,
  pub permalink: String,
  #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
  pub score: i64,
  pub selftext: String,
  pub subreddit: String,
  pub thumbnail: String,
  pub title: String,
  pub url: String,
}

/// One line of a comment shard. `subreddit`, `subreddit_id`, `name` and `author_fullname` are
/// dropped the same way.
#[serde_as]
#[derive(Debug, Deserialize)]
pub struct RawComment {
  pub author: String,
  pub body: String,
  pub created_utc: RawTimestamp,
  pub edited: RawEdited,
  #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
  pub gilded: i64,
  pub id: String,
  pub is_submitter: bool,
  pub link_id: String,
  pub locked: bool,
  pub parent_id: String,
  pub permalink: String,
  #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
  pub score: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Post {
  pub id: String,
  pub author: String,
  pub title: String,
  pub url: String,
  pub selftext: String,
  pub thumbnail: String,
  pub created_utc: DateTime<Utc>,
  pub score: i64,
  pub subreddit: String,
  pub over_18: bool,
  pub permalink: String,
}

impl TryFrom<RawPost> for Post {
  type Error = SeedError;

  fn try_from(raw: RawPost) -> SeedResult<Self> {
    Ok(Post {
      created_utc: raw.created_utc.to_utc()?,
      id: strip_nul(raw.id),
      author: strip_nul(raw.author),
      title: strip_nul(raw.title),
      url: strip_nul(raw.url),
      selftext: strip_nul(raw.selftext),
      thumbnail: strip_nul(raw.thumbnail),
      score: raw.score,
      subreddit: strip_nul(raw.subreddit),
      over_18: raw.over_18,
      permalink: strip_nul(raw.permalink),
    })
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Comment {
  pub id: String,
  pub body: String,
  pub author: String,
  pub created_utc: DateTime<Utc>,
  pub score: i64,
  pub gilded: i64,
  pub edited: bool,
  pub locked: bool,
  pub is_submitter: bool,
  pub post_id: String,
  // Always None when loaded; comment parents are assigned by the linker.
  pub parent_id: Option<String>,
  pub is_root: bool,
  pub permalink: String,
}

impl Comment {
  /// Normalizes a raw comment, returning the pending link to its parent comment if it has one.
  pub fn from_raw(raw: RawComment) -> SeedResult<(Comment, Option<PendingParentLink>)> {
    let post_id = match Fullname::parse("link_id", &raw.link_id)? {
      Fullname::Post(id) => id,
      Fullname::Comment(_) => {
        return Err(SeedError::Fullname {
          field: "link_id",
          value: raw.link_id,
        })
      }
    };
    let id = strip_nul(raw.id);
    let pending = match Fullname::parse("parent_id", &raw.parent_id)? {
      Fullname::Post(_) => None,
      Fullname::Comment(parent_id) => Some(PendingParentLink {
        child_id: id.clone(),
        parent_id,
      }),
    };
    let comment = Comment {
      is_root: pending.is_none(),
      parent_id: None,
      created_utc: raw.created_utc.to_utc()?,
      id,
      body: strip_nul(raw.body),
      author: strip_nul(raw.author),
      score: raw.score,
      gilded: raw.gilded,
      edited: raw.edited.is_edited(),
      locked: raw.locked,
      is_submitter: raw.is_submitter,
      post_id,
      permalink: strip_nul(raw.permalink),
    };
    Ok((comment, pending))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn raw_comment(parent_id: &str) -> serde_json::Value {
    json!({
      "author": "someone",
      "author_fullname": "t2_xyz",
      "body": "hello",
      "created_utc": "1672531200",
      "edited": false,
      "gilded": "0",
      "id": "c1",
      "is_submitter": false,
      "link_id": "t3_abc123",
      "locked": false,
      "name": "t1_c1",
      "parent_id": parent_id,
      "permalink": "/r/test/comments/abc123/_/c1/",
      "score": "42",
      "subreddit": "test",
      "subreddit_id": "t5_2qh0u",
    })
  }

  #[test]
  fn test_root_comment_normalization() {
    let raw: RawComment = serde_json::from_value(raw_comment("t3_abc123")).unwrap();
    let (c, pending) = Comment::from_raw(raw).unwrap();
    assert_eq!(c.score, 42);
    assert_eq!(c.gilded, 0);
    assert_eq!(c.post_id, "abc123");
    assert_eq!(c.parent_id, None);
    assert!(c.is_root);
    assert!(pending.is_none());
    assert_eq!(c.created_utc.timestamp(), 1672531200);
  }

  #[test]
  fn test_reply_comment_yields_pending_link() {
    let raw: RawComment = serde_json::from_value(raw_comment("t1_parent9")).unwrap();
    let (c, pending) = Comment::from_raw(raw).unwrap();
    assert!(!c.is_root);
    assert_eq!(c.parent_id, None);
    assert_eq!(
      pending,
      Some(PendingParentLink {
        child_id: "c1".to_string(),
        parent_id: "parent9".to_string(),
      })
    );
  }

  #[test]
  fn test_unknown_parent_prefix_is_rejected() {
    let raw: RawComment = serde_json::from_value(raw_comment("t5_sub")).unwrap();
    assert!(matches!(
      Comment::from_raw(raw),
      Err(SeedError::Fullname {
        field: "parent_id",
        ..
      })
    ));
    assert!(Fullname::parse("parent_id", "t1_").is_err());
  }

  #[test]
  fn test_post_nul_stripping() {
    let raw: RawPost = serde_json::from_value(json!({
      "author": "op",
      "author_fullname": "t2_op",
      "created_utc": 1672531200,
      "id": "abc123",
      "name": "t3_abc123",
      "over_18": true,
      "permalink": "/r/test/comments/abc123/",
      "score": "7",
      "selftext": "before\u{0}after",
      "subreddit": "test",
      "subreddit_id": "t5_2qh0u",
      "thumbnail": "self",
      "title": "A title",
      "url": "https://example.com",
    }))
    .unwrap();
    let p = Post::try_from(raw).unwrap();
    assert_eq!(p.selftext, "beforeafter");
    assert_eq!(p.score, 7);
    assert!(p.over_18);
  }

  #[test]
  fn test_references_match_nul_stripped_ids() {
    let mut v = raw_comment("t1_pa\u{0}rent");
    v["id"] = json!("c\u{0}1");
    v["link_id"] = json!("t3_abc\u{0}123");
    let raw: RawComment = serde_json::from_value(v).unwrap();
    let (c, pending) = Comment::from_raw(raw).unwrap();
    assert_eq!(c.id, "c1");
    assert_eq!(c.post_id, "abc123");
    assert_eq!(
      pending,
      Some(PendingParentLink {
        child_id: "c1".to_string(),
        parent_id: "parent".to_string(),
      })
    );
    assert!(Fullname::parse("parent_id", "t1_\u{0}").is_err());
  }

  #[test]
  fn test_timestamp_forms() {
    let expected = Utc.timestamp_opt(1672531200, 0).unwrap();
    for raw in [
      json!(1672531200),
      json!(1672531200.0),
      json!("1672531200"),
      json!("1672531200.0"),
      json!("2023-01-01T00:00:00Z"),
    ] {
      let ts: RawTimestamp = serde_json::from_value(raw).unwrap();
      assert_eq!(ts.to_utc().unwrap(), expected);
    }
    let ts: RawTimestamp = serde_json::from_value(json!("yesterday")).unwrap();
    assert!(matches!(ts.to_utc(), Err(SeedError::Timestamp(_))));
  }

  #[test]
  fn test_edited_timestamp_means_edited() {
    let mut v = raw_comment("t3_abc123");
    v["edited"] = json!(1672531999.0);
    let raw: RawComment = serde_json::from_value(v).unwrap();
    let (c, _) = Comment::from_raw(raw).unwrap();
    assert!(c.edited);
  }
}
