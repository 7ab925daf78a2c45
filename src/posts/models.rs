//! Post records and the validated Post Store.
//!
//! Rows arrive as loosely-typed JSON objects from the collection layer. They
//! are checked once here ([`PostStore::from_rows`]); everything downstream
//! works on the typed [`Post`] and never looks at raw columns again.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{EngineError, EngineResult};

/// Columns every input row must carry.
pub const REQUIRED_COLUMNS: [&str; 4] = ["id", "author", "subreddit", "created_at"];

// ============================================================================
// Post
// ============================================================================

/// A single validated post (submission or reply).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author: String,
    pub subreddit: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: u64,
    /// Share of upvotes among all votes (1.0 when the source did not report it)
    #[serde(default = "default_upvote_ratio")]
    pub upvote_ratio: f64,
    #[serde(default)]
    pub crisis_id: Option<String>,
    /// Post this one replies to; `None` for top-level submissions
    #[serde(default)]
    pub parent_id: Option<String>,
}

fn default_upvote_ratio() -> f64 {
    1.0
}

impl Post {
    /// Title and body joined for text analysis.
    pub fn text(&self) -> String {
        match (self.title.is_empty(), self.content.is_empty()) {
            (true, _) => self.content.clone(),
            (_, true) => self.title.clone(),
            _ => format!("{} {}", self.title, self.content),
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn engagement_category(&self) -> EngagementCategory {
        EngagementCategory::from_score(self.score)
    }
}

/// Coarse engagement bin derived from a post's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementCategory {
    Low,
    Medium,
    High,
    Viral,
}

impl EngagementCategory {
    pub fn from_score(score: i64) -> Self {
        match score {
            s if s <= 10 => Self::Low,
            s if s <= 100 => Self::Medium,
            s if s <= 1000 => Self::High,
            _ => Self::Viral,
        }
    }
}

impl std::fmt::Display for EngagementCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Viral => write!(f, "viral"),
        }
    }
}

// ============================================================================
// PostStore
// ============================================================================

/// Immutable, validated table of posts.
///
/// Posts are kept in `(created_at, id)` order so every consumer iterates them
/// deterministically. Thread roots are resolved once at construction.
#[derive(Debug, Clone, Default)]
pub struct PostStore {
    posts: Vec<Post>,
    index: HashMap<String, usize>,
    thread_roots: Vec<usize>,
}

impl PostStore {
    /// Validate raw JSON rows and build the store.
    ///
    /// Every row is checked for the required columns before any value is
    /// parsed, so a missing column is reported as a schema error regardless
    /// of where it occurs.
    pub fn from_rows(rows: &[Value]) -> EngineResult<Self> {
        let mut objects = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let obj = row
                .as_object()
                .ok_or_else(|| EngineError::schema(format!("row {} is not an object", i)))?;
            for column in REQUIRED_COLUMNS {
                if obj.get(column).map_or(true, Value::is_null) {
                    return Err(EngineError::schema(format!(
                        "row {} missing required column `{}`",
                        i, column
                    )));
                }
            }
            objects.push(obj);
        }

        let posts = objects
            .into_iter()
            .enumerate()
            .map(|(i, obj)| parse_post(i, obj))
            .collect::<EngineResult<Vec<_>>>()?;

        Self::from_posts(posts)
    }

    /// Build a store from already-typed posts, enforcing the record invariants.
    pub fn from_posts(mut posts: Vec<Post>) -> EngineResult<Self> {
        let mut seen = BTreeSet::new();
        for post in &posts {
            if post.id.trim().is_empty() {
                return Err(EngineError::schema("post with empty `id`"));
            }
            if post.author.trim().is_empty() {
                return Err(EngineError::schema(format!("post {} has empty `author`", post.id)));
            }
            if post.subreddit.trim().is_empty() {
                return Err(EngineError::schema(format!(
                    "post {} has empty `subreddit`",
                    post.id
                )));
            }
            if !(0.0..=1.0).contains(&post.upvote_ratio) {
                return Err(EngineError::schema(format!(
                    "post {} has upvote_ratio {} outside [0, 1]",
                    post.id, post.upvote_ratio
                )));
            }
            if !seen.insert(post.id.as_str()) {
                return Err(EngineError::schema(format!("duplicate post id `{}`", post.id)));
            }
        }

        posts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        let index: HashMap<String, usize> = posts
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();
        let thread_roots = resolve_thread_roots(&posts, &index);

        Ok(Self {
            posts,
            index,
            thread_roots,
        })
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn iter(&self) -> impl Iterator<Item = &Post> {
        self.posts.iter()
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Post> {
        self.index.get(id).map(|&i| &self.posts[i])
    }

    /// The post this one directly replies to, if it is part of the store.
    pub fn parent_of(&self, post: &Post) -> Option<&Post> {
        post.parent_id.as_deref().and_then(|p| self.get(p))
    }

    /// Id of the root post of the thread containing `id`.
    pub fn thread_root(&self, id: &str) -> Option<&str> {
        let i = *self.index.get(id)?;
        Some(self.posts[self.thread_roots[i]].id.as_str())
    }

    /// Posts grouped by thread root id, each group in chronological order.
    pub fn threads(&self) -> BTreeMap<&str, Vec<&Post>> {
        let mut threads: BTreeMap<&str, Vec<&Post>> = BTreeMap::new();
        for (i, post) in self.posts.iter().enumerate() {
            let root = self.posts[self.thread_roots[i]].id.as_str();
            threads.entry(root).or_default().push(post);
        }
        threads
    }

    /// Distinct authors, excluding the given placeholder names.
    pub fn authors(&self, excluded: &[String]) -> BTreeSet<&str> {
        self.posts
            .iter()
            .map(|p| p.author.as_str())
            .filter(|a| !excluded.iter().any(|e| e == a))
            .collect()
    }

    pub fn subreddits(&self) -> BTreeSet<&str> {
        self.posts.iter().map(|p| p.subreddit.as_str()).collect()
    }

    pub fn posts_by_author(&self) -> BTreeMap<&str, Vec<&Post>> {
        let mut by_author: BTreeMap<&str, Vec<&Post>> = BTreeMap::new();
        for post in &self.posts {
            by_author.entry(post.author.as_str()).or_default().push(post);
        }
        by_author
    }

    pub fn crisis_ids(&self) -> BTreeSet<&str> {
        self.posts.iter().filter_map(|p| p.crisis_id.as_deref()).collect()
    }

    /// A new store holding only the posts tagged with `crisis_id`.
    pub fn filter_crisis(&self, crisis_id: &str) -> Self {
        let posts = self
            .posts
            .iter()
            .filter(|p| p.crisis_id.as_deref() == Some(crisis_id))
            .cloned()
            .collect::<Vec<_>>();
        // Ids were unique in the source store, so validation cannot fail here.
        Self::from_posts(posts).unwrap_or_default()
    }

    /// Earliest and latest `created_at`.
    pub fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.posts.first()?.created_at, self.posts.last()?.created_at))
    }

    pub fn engagement_breakdown(&self) -> BTreeMap<EngagementCategory, usize> {
        let mut counts = BTreeMap::new();
        for post in &self.posts {
            *counts.entry(post.engagement_category()).or_insert(0) += 1;
        }
        counts
    }
}

/// Follow `parent_id` links up to the first post without a known parent.
fn resolve_thread_roots(posts: &[Post], index: &HashMap<String, usize>) -> Vec<usize> {
    (0..posts.len())
        .map(|start| {
            let mut current = start;
            let mut steps = 0;
            while let Some(&parent) = posts[current]
                .parent_id
                .as_deref()
                .and_then(|p| index.get(p))
            {
                // Cyclic parent links end the walk
                if parent == current || steps >= posts.len() {
                    break;
                }
                current = parent;
                steps += 1;
            }
            current
        })
        .collect()
}

// ============================================================================
// Row parsing
// ============================================================================

fn parse_post(row: usize, obj: &Map<String, Value>) -> EngineResult<Post> {
    let required = |column: &str| -> EngineResult<String> {
        obj.get(column)
            .and_then(scalar_to_string)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                EngineError::schema(format!("row {} has invalid value in column `{}`", row, column))
            })
    };

    let id = required("id")?;
    let author = required("author")?;
    let subreddit = required("subreddit")?;
    let created_at = obj
        .get("created_at")
        .and_then(parse_timestamp)
        .ok_or_else(|| {
            EngineError::schema(format!("row {} has unparsable `created_at`", row))
        })?;

    let optional_string = |column: &str| obj.get(column).and_then(scalar_to_string);

    Ok(Post {
        id,
        author,
        subreddit,
        created_at,
        title: optional_string("title").unwrap_or_default(),
        content: optional_string("content").unwrap_or_default(),
        score: obj
            .get("score")
            .and_then(Value::as_f64)
            .map(|s| s as i64)
            .unwrap_or(0),
        num_comments: obj
            .get("num_comments")
            .and_then(Value::as_f64)
            .map(|n| n.max(0.0) as u64)
            .unwrap_or(0),
        upvote_ratio: obj
            .get("upvote_ratio")
            .and_then(Value::as_f64)
            .unwrap_or_else(default_upvote_ratio),
        crisis_id: optional_string("crisis_id").filter(|s| !s.is_empty()),
        parent_id: optional_string("parent_id").filter(|s| !s.is_empty()),
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Accepts RFC 3339 strings, `YYYY-MM-DD HH:MM:SS` (UTC), or Unix seconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                return Some(ts.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(naive.and_utc());
            }
            s.parse::<f64>().ok().and_then(from_unix_seconds)
        }
        Value::Number(n) => n.as_f64().and_then(from_unix_seconds),
        _ => None,
    }
}

fn from_unix_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: &str, author: &str, created_at: Value) -> Value {
        json!({
            "id": id,
            "author": author,
            "subreddit": "news",
            "created_at": created_at,
            "title": "Flood warning",
            "content": "Water rising downtown",
            "score": 12,
        })
    }

    #[test]
    fn test_from_rows_parses_timestamps() {
        let rows = vec![
            row("p1", "alice", json!("2024-09-01T12:00:00Z")),
            row("p2", "bob", json!(1725192000)),
            row("p3", "carol", json!("2024-09-01 13:30:00")),
        ];
        let store = PostStore::from_rows(&rows).unwrap();
        assert_eq!(store.len(), 3);
        let p2 = store.get("p2").unwrap();
        assert_eq!(p2.created_at.to_rfc3339(), "2024-09-01T12:00:00+00:00");
        assert!((p2.upvote_ratio - 1.0).abs() < f64::EPSILON);
        assert_eq!(p2.score, 12);
    }

    #[test]
    fn test_missing_created_at_is_schema_error() {
        let rows = vec![
            row("p1", "alice", json!("2024-09-01T12:00:00Z")),
            json!({"id": "p2", "author": "bob", "subreddit": "news"}),
        ];
        let err = PostStore::from_rows(&rows).unwrap_err();
        assert!(matches!(err, EngineError::Schema(ref m) if m.contains("created_at")));
    }

    #[test]
    fn test_unparsable_timestamp_is_schema_error() {
        let rows = vec![row("p1", "alice", json!("yesterday"))];
        assert!(matches!(
            PostStore::from_rows(&rows),
            Err(EngineError::Schema(_))
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let rows = vec![
            row("p1", "alice", json!(1725192000)),
            row("p1", "bob", json!(1725192060)),
        ];
        assert!(matches!(
            PostStore::from_rows(&rows),
            Err(EngineError::Schema(ref m)) if m.contains("duplicate")
        ));
    }

    #[test]
    fn test_upvote_ratio_out_of_range_rejected() {
        let mut r = row("p1", "alice", json!(1725192000));
        r["upvote_ratio"] = json!(1.5);
        assert!(PostStore::from_rows(&[r]).is_err());
    }

    #[test]
    fn test_posts_sorted_chronologically() {
        let rows = vec![
            row("late", "alice", json!(1725195600)),
            row("early", "bob", json!(1725192000)),
        ];
        let store = PostStore::from_rows(&rows).unwrap();
        let ids: Vec<&str> = store.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn test_thread_roots_follow_parent_chain() {
        let mut reply = row("c1", "bob", json!(1725192060));
        reply["parent_id"] = json!("p1");
        let mut nested = row("c2", "carol", json!(1725192120));
        nested["parent_id"] = json!("c1");
        let mut orphan = row("c3", "dave", json!(1725192180));
        orphan["parent_id"] = json!("unknown");
        let rows = vec![row("p1", "alice", json!(1725192000)), reply, nested, orphan];

        let store = PostStore::from_rows(&rows).unwrap();
        assert_eq!(store.thread_root("c2"), Some("p1"));
        assert_eq!(store.thread_root("c1"), Some("p1"));
        assert_eq!(store.thread_root("c3"), Some("c3"));
        assert_eq!(store.threads()["p1"].len(), 3);
    }

    #[test]
    fn test_filter_crisis() {
        let mut a = row("p1", "alice", json!(1725192000));
        a["crisis_id"] = json!("hurricane_milton");
        let mut b = row("p2", "bob", json!(1725192060));
        b["crisis_id"] = json!("maui_fire");
        let store = PostStore::from_rows(&[a, b]).unwrap();

        assert_eq!(store.crisis_ids().len(), 2);
        let milton = store.filter_crisis("hurricane_milton");
        assert_eq!(milton.len(), 1);
        assert!(milton.get("p1").is_some());
    }

    #[test]
    fn test_engagement_categories() {
        assert_eq!(EngagementCategory::from_score(-3), EngagementCategory::Low);
        assert_eq!(EngagementCategory::from_score(10), EngagementCategory::Low);
        assert_eq!(EngagementCategory::from_score(11), EngagementCategory::Medium);
        assert_eq!(EngagementCategory::from_score(1000), EngagementCategory::High);
        assert_eq!(EngagementCategory::from_score(1001), EngagementCategory::Viral);
        assert_eq!(EngagementCategory::Viral.to_string(), "viral");
    }

    #[test]
    fn test_authors_excludes_placeholders() {
        let rows = vec![
            row("p1", "alice", json!(1725192000)),
            row("p2", "[deleted]", json!(1725192060)),
        ];
        let store = PostStore::from_rows(&rows).unwrap();
        let authors = store.authors(&["[deleted]".to_string()]);
        assert_eq!(authors.into_iter().collect::<Vec<_>>(), vec!["alice"]);
    }
}
