//! Text normalization and TF-IDF vectors for the content-similarity layer.
//!
//! Vectors are sparse `(term_id, weight)` lists sorted by term id and
//! L2-normalized, so cosine similarity is a merge-join dot product.

use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use unicode_normalization::UnicodeNormalization;

const STOP_WORDS: &[&str] = &[
    "about", "after", "again", "all", "also", "and", "any", "are", "because", "been", "before",
    "being", "but", "can", "could", "did", "does", "for", "from", "had", "has", "have", "her",
    "here", "him", "his", "how", "into", "its", "just", "more", "most", "not", "now", "off",
    "once", "only", "other", "our", "out", "over", "own", "same", "she", "should", "some",
    "such", "than", "that", "the", "their", "them", "then", "there", "these", "they", "this",
    "those", "through", "too", "under", "until", "very", "was", "were", "what", "when", "where",
    "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your",
];

/// Lowercased alphanumeric tokens of at least 3 characters, stop words removed.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized: String = text.nfc().collect::<String>().to_lowercase();
    normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3 && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

pub type SparseVector = Vec<(u32, f64)>;

/// TF-IDF model over a fixed corpus.
#[derive(Debug, Clone)]
pub struct TfIdfCorpus {
    /// One normalized vector per document, in input order
    pub vectors: Vec<SparseVector>,
    /// Document frequency per term id
    pub document_frequency: Vec<usize>,
}

impl TfIdfCorpus {
    /// Build vectors with smoothed idf: `ln((1 + n) / (1 + df)) + 1`.
    pub fn build(texts: &[String]) -> Self {
        let tokenized: Vec<Vec<String>> = texts.par_iter().map(|t| tokenize(t)).collect();

        // Term ids assigned in sorted order for determinism
        let vocabulary: BTreeSet<&str> = tokenized.iter().flatten().map(String::as_str).collect();
        let term_ids: HashMap<&str, u32> = vocabulary
            .iter()
            .enumerate()
            .map(|(i, t)| (*t, i as u32))
            .collect();

        let mut document_frequency = vec![0usize; term_ids.len()];
        let counts: Vec<BTreeMap<u32, usize>> = tokenized
            .iter()
            .map(|tokens| {
                let mut tf: BTreeMap<u32, usize> = BTreeMap::new();
                for token in tokens {
                    *tf.entry(term_ids[token.as_str()]).or_insert(0) += 1;
                }
                tf
            })
            .collect();
        for tf in &counts {
            for term in tf.keys() {
                document_frequency[*term as usize] += 1;
            }
        }

        let n = texts.len() as f64;
        let vectors = counts
            .par_iter()
            .map(|tf| {
                let mut v: SparseVector = tf
                    .iter()
                    .map(|(&term, &count)| {
                        let df = document_frequency[term as usize] as f64;
                        let idf = ((1.0 + n) / (1.0 + df)).ln() + 1.0;
                        (term, count as f64 * idf)
                    })
                    .collect();
                let norm = v.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
                if norm > 0.0 {
                    for (_, w) in v.iter_mut() {
                        *w /= norm;
                    }
                }
                v
            })
            .collect();

        Self {
            vectors,
            document_frequency,
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Candidate pairs `(i, j)` with `i < j` sharing at least one blocking term.
    ///
    /// Terms present in more than `max_df_ratio` of the documents (and at
    /// least two documents) are too common to discriminate and are skipped.
    /// Skipping a shared term can drop qualifying pairs, so the count of
    /// skipped terms is returned alongside the candidates.
    pub fn blocking_candidates(&self, max_df_ratio: f64) -> BlockingCandidates {
        let n = self.vectors.len();
        let max_df = ((max_df_ratio * n as f64).floor() as usize).max(2);

        let excluded_terms = self
            .document_frequency
            .iter()
            .filter(|&&df| df > max_df)
            .count();

        let mut postings: HashMap<u32, Vec<usize>> = HashMap::new();
        for (doc, vector) in self.vectors.iter().enumerate() {
            for &(term, _) in vector {
                let df = self.document_frequency[term as usize];
                if df >= 2 && df <= max_df {
                    postings.entry(term).or_default().push(doc);
                }
            }
        }

        let candidates = (0..n)
            .into_par_iter()
            .map(|i| {
                let mut candidates = BTreeSet::new();
                for &(term, _) in &self.vectors[i] {
                    if let Some(docs) = postings.get(&term) {
                        candidates.extend(docs.iter().copied().filter(|&j| j > i));
                    }
                }
                candidates.into_iter().collect()
            })
            .collect();

        BlockingCandidates {
            candidates,
            excluded_terms,
        }
    }
}

/// Output of [`TfIdfCorpus::blocking_candidates`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockingCandidates {
    /// Candidates per document `i`, each list ascending with every `j > i`
    pub candidates: Vec<Vec<usize>>,
    /// Terms shared by more documents than the cap allows
    pub excluded_terms: usize,
}

impl BlockingCandidates {
    pub fn pair_count(&self) -> usize {
        self.candidates.iter().map(Vec::len).sum()
    }
}

/// Dot product of two sorted, normalized sparse vectors.
pub fn cosine(a: &SparseVector, b: &SparseVector) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut dot = 0.0;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dot += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    dot.clamp(0.0, 1.0)
}
