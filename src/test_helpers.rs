//! Test helper factories
//!
//! Convenience constructors for posts, stores, score tables and small graphs
//! with sensible defaults.
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};

use crate::network::{Layer, LayerGraph};
use crate::posts::{LinguisticScores, Post, PostStore};

/// 2024-09-01T00:00:00Z
pub const BASE_TS: i64 = 1_725_148_800;

pub fn ts(offset_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(BASE_TS + offset_secs, 0)
        .single()
        .expect("valid test timestamp")
}

// ============================================================================
// Posts and stores
// ============================================================================

/// Top-level post created `offset_secs` after [`BASE_TS`].
pub fn post_at(id: &str, author: &str, subreddit: &str, offset_secs: i64) -> Post {
    Post {
        id: id.to_string(),
        author: author.to_string(),
        subreddit: subreddit.to_string(),
        created_at: ts(offset_secs),
        title: String::new(),
        content: String::new(),
        score: 1,
        num_comments: 0,
        upvote_ratio: 1.0,
        crisis_id: None,
        parent_id: None,
    }
}

/// Reply to `parent` created `offset_secs` after [`BASE_TS`].
pub fn reply_at(id: &str, author: &str, subreddit: &str, offset_secs: i64, parent: &str) -> Post {
    Post {
        parent_id: Some(parent.to_string()),
        ..post_at(id, author, subreddit, offset_secs)
    }
}

pub fn store_of(posts: Vec<Post>) -> PostStore {
    PostStore::from_posts(posts).expect("valid test posts")
}

fn with_text(mut post: Post, title: &str, content: &str, crisis: &str, score: i64) -> Post {
    post.title = title.to_string();
    post.content = content.to_string();
    post.crisis_id = Some(crisis.to_string());
    post.score = score;
    post
}

/// Two crises across four authors and three subreddits, with reply threads,
/// overlapping vocabulary and crisis keywords.
pub fn crisis_store() -> PostStore {
    const H: i64 = 3_600;
    store_of(vec![
        with_text(
            post_at("f1", "alice", "news", 0),
            "Flood warning issued for river valley",
            "Evacuation shelter opened downtown, river levels rising fast",
            "flood",
            120,
        ),
        with_text(
            reply_at("f2", "bob", "news", H, "f1"),
            "",
            "River levels rising near my street, heading to the shelter",
            "flood",
            15,
        ),
        with_text(
            reply_at("f3", "carol", "news", 2 * H, "f1"),
            "",
            "Rescue boats on the river valley road, stay safe everyone",
            "flood",
            40,
        ),
        with_text(
            post_at("f4", "dave", "weather", 3 * H),
            "Rainfall totals for the river valley",
            "Record rainfall overnight, flood gauges above warning level",
            "flood",
            60,
        ),
        with_text(
            reply_at("f5", "alice", "weather", 4 * H, "f4"),
            "",
            "Flood gauges still rising, evacuation order expanded",
            "flood",
            25,
        ),
        with_text(
            post_at("f6", "bob", "local", 26 * H),
            "Volunteers needed at the downtown shelter",
            "Shelter needs blankets and water, volunteers welcome",
            "flood",
            8,
        ),
        with_text(
            reply_at("f7", "carol", "local", 27 * H, "f6"),
            "",
            "Dropping blankets and water at the shelter tonight",
            "flood",
            3,
        ),
        with_text(
            post_at("w1", "dave", "weather", 72 * H),
            "Wildfire smoke alert for the hills",
            "Air quality alert, wildfire smoke drifting over the hills",
            "wildfire",
            90,
        ),
        with_text(
            reply_at("w2", "alice", "weather", 73 * H, "w1"),
            "",
            "Smoke is thick near the hills, windows closed",
            "wildfire",
            12,
        ),
        with_text(
            post_at("w3", "carol", "news", 74 * H),
            "Wildfire evacuation for hill towns",
            "Emergency evacuation ordered for hill towns as the wildfire spreads",
            "wildfire",
            150,
        ),
        with_text(
            reply_at("w4", "bob", "news", 75 * H, "w3"),
            "",
            "Evacuation traffic heavy on the hill road",
            "wildfire",
            -2,
        ),
        with_text(
            post_at("w5", "alice", "local", 98 * H),
            "Wildfire containment update",
            "Crews report the wildfire mostly contained, smoke clearing",
            "wildfire",
            30,
        ),
    ])
}

/// Deterministic linguistic rows for every post of `store`.
pub fn linguistic_for(store: &PostStore) -> LinguisticScores {
    let categories = [
        "affect", "negemo", "anx", "cogproc", "insight", "causation", "certainty", "see",
        "percept",
    ];
    let mut scores = LinguisticScores::new();
    for (i, post) in store.iter().enumerate() {
        let row = categories
            .iter()
            .enumerate()
            .map(|(c, name)| (name.to_string(), ((i * 7 + c * 3) % 11) as f64 * 0.5))
            .collect();
        scores.insert(post.id.clone(), row);
    }
    scores
}

// ============================================================================
// Graphs
// ============================================================================

pub fn graph_from_edges(layer: Layer, edges: &[(&str, &str, f64)]) -> LayerGraph {
    let mut graph = LayerGraph::new(layer);
    for (a, b, w) in edges {
        graph.add_node(a);
        graph.add_node(b);
        graph.add_or_increment_edge(a, b, *w);
    }
    graph
}

/// Triangles a1-a2-a3 and b1-b2-b3 joined by the bridge a3-b1, unit weights.
pub fn two_triangles_bridged() -> LayerGraph {
    graph_from_edges(
        Layer::UserInteraction,
        &[
            ("a1", "a2", 1.0),
            ("a2", "a3", 1.0),
            ("a1", "a3", 1.0),
            ("a3", "b1", 1.0),
            ("b1", "b2", 1.0),
            ("b2", "b3", 1.0),
            ("b1", "b3", 1.0),
        ],
    )
}
