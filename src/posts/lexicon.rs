//! Crisis-domain keyword vocabulary.

use regex::Regex;

use crate::error::{EngineError, EngineResult};

pub const DEFAULT_CRISIS_KEYWORDS: &[&str] = &[
    "emergency",
    "crisis",
    "disaster",
    "danger",
    "help",
    "urgent",
    "warning",
    "alert",
    "evacuation",
    "evacuate",
    "rescue",
    "shelter",
];

/// Case-insensitive whole-word matcher over a keyword list.
#[derive(Debug, Clone)]
pub struct CrisisLexicon {
    keywords: Vec<String>,
    pattern: Option<Regex>,
}

impl CrisisLexicon {
    pub fn new<I, S>(keywords: I) -> EngineResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        keywords.sort();
        keywords.dedup();

        if keywords.is_empty() {
            return Ok(Self::empty());
        }

        // Longest alternatives first so multi-word phrases win over their prefixes
        let mut alternatives: Vec<&String> = keywords.iter().collect();
        alternatives.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let body = alternatives
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", body))
            .map_err(|e| EngineError::InvalidConfig(format!("crisis lexicon: {}", e)))?;

        Ok(Self {
            keywords,
            pattern: Some(pattern),
        })
    }

    pub fn empty() -> Self {
        Self {
            keywords: Vec::new(),
            pattern: None,
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn count_matches(&self, text: &str) -> usize {
        self.pattern
            .as_ref()
            .map_or(0, |re| re.find_iter(text).count())
    }

    pub fn matches(&self, text: &str) -> bool {
        self.pattern.as_ref().is_some_and(|re| re.is_match(text))
    }
}

impl Default for CrisisLexicon {
    fn default() -> Self {
        Self::new(DEFAULT_CRISIS_KEYWORDS).unwrap_or_else(|_| Self::empty())
    }
}
