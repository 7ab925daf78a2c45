//! Externally supplied linguistic category scores (LIWC-style percentages).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{EngineError, EngineResult};

/// Category name → score for one post.
pub type CategoryScores = BTreeMap<String, f64>;

/// Post id → category scores. A post without a row reads as all zeros.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinguisticScores {
    rows: HashMap<String, CategoryScores>,
}

impl LinguisticScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse rows keyed by `post_id` (or `id`). Every other numeric column is
    /// taken as a category; text columns are ignored.
    pub fn from_rows(rows: &[Value]) -> EngineResult<Self> {
        let mut scores = Self::new();
        for (i, row) in rows.iter().enumerate() {
            let obj = row.as_object().ok_or_else(|| {
                EngineError::schema(format!("linguistic row {} is not an object", i))
            })?;
            let post_id = obj
                .get("post_id")
                .or_else(|| obj.get("id"))
                .and_then(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .ok_or_else(|| {
                    EngineError::schema(format!("linguistic row {} missing `post_id`", i))
                })?;

            let categories: CategoryScores = obj
                .iter()
                .filter(|(k, _)| k.as_str() != "post_id" && k.as_str() != "id")
                .filter_map(|(k, v)| v.as_f64().filter(|x| x.is_finite()).map(|x| (k.clone(), x)))
                .collect();
            scores.insert(post_id, categories);
        }
        Ok(scores)
    }

    pub fn insert(&mut self, post_id: impl Into<String>, scores: CategoryScores) {
        self.rows.insert(post_id.into(), scores);
    }

    pub fn get(&self, post_id: &str) -> Option<&CategoryScores> {
        self.rows.get(post_id)
    }

    pub fn has_row(&self, post_id: &str) -> bool {
        self.rows.contains_key(post_id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One category for one post, 0 when absent.
    pub fn score(&self, post_id: &str, category: &str) -> f64 {
        self.rows
            .get(post_id)
            .and_then(|row| row.get(category))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn sum_categories(&self, post_id: &str, categories: &[String]) -> f64 {
        categories.iter().map(|c| self.score(post_id, c)).sum()
    }

    pub fn weighted(&self, post_id: &str, weights: &BTreeMap<String, f64>) -> f64 {
        weights
            .iter()
            .map(|(category, w)| w * self.score(post_id, category))
            .sum()
    }

    /// Every category name present in at least one row.
    pub fn categories(&self) -> BTreeSet<&str> {
        self.rows
            .values()
            .flat_map(|row| row.keys().map(String::as_str))
            .collect()
    }

    pub fn post_ids(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_rows_collects_numeric_columns() {
        let rows = vec![
            json!({"post_id": "p1", "anx": 2.5, "cogproc": 10.0, "text": "ignored"}),
            json!({"id": 42, "posemo": 1.0}),
        ];
        let scores = LinguisticScores::from_rows(&rows).unwrap();
        assert_eq!(scores.len(), 2);
        assert!((scores.score("p1", "anx") - 2.5).abs() < f64::EPSILON);
        assert!((scores.score("42", "posemo") - 1.0).abs() < f64::EPSILON);
        assert!(!scores.categories().contains("text"));
    }

    #[test]
    fn test_missing_post_id_is_schema_error() {
        let rows = vec![json!({"anx": 2.5})];
        assert!(matches!(
            LinguisticScores::from_rows(&rows),
            Err(EngineError::Schema(_))
        ));
    }

    #[test]
    fn test_missing_row_reads_as_zero() {
        let scores = LinguisticScores::new();
        assert_eq!(scores.score("nope", "anx"), 0.0);
        assert_eq!(
            scores.sum_categories("nope", &["anx".to_string(), "negemo".to_string()]),
            0.0
        );
    }

    #[test]
    fn test_weighted_combination() {
        let mut scores = LinguisticScores::new();
        scores.insert(
            "p1",
            [("cogproc".to_string(), 10.0), ("insight".to_string(), 4.0)]
                .into_iter()
                .collect(),
        );
        let weights: BTreeMap<String, f64> =
            [("cogproc".to_string(), 0.5), ("insight".to_string(), 0.25)]
                .into_iter()
                .collect();
        assert!((scores.weighted("p1", &weights) - 6.0).abs() < 1e-12);
    }
}
