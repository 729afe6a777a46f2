//! Cluster summaries: the most frequent informative terms per cluster.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tokenize::tokens;

/// Number of terms kept per cluster by default.
pub const DEFAULT_TOP_TERMS: usize = 5;

static ENGLISH_STOPWORDS: LazyLock<HashSet<String>> = LazyLock::new(|| {
    stop_words::get(stop_words::LANGUAGE::English)
        .into_iter()
        .map(|w| w.to_string())
        .collect()
});

/// Id, size and characteristic terms of one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub id: usize,
    pub count: usize,
    /// Most frequent non-stopword terms, most frequent first.
    pub terms: Vec<String>,
}

/// Builds [`ClusterSummary`] values from an assignment and the member texts.
#[derive(Debug, Clone)]
pub struct Labeler {
    top_k: usize,
}

impl Default for Labeler {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_TERMS,
        }
    }
}

impl Labeler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of terms per summary.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Summarize every cluster in `assignment`, keyed by cluster id.
    ///
    /// Terms are ranked by count; equal counts keep the order in which the
    /// terms first appear across the cluster's members taken in index order.
    pub fn label<S: AsRef<str>>(
        &self,
        assignment: &[usize],
        texts: &[S],
    ) -> Result<BTreeMap<usize, ClusterSummary>> {
        if assignment.len() != texts.len() {
            return Err(Error::DimensionMismatch {
                expected: assignment.len(),
                found: texts.len(),
            });
        }

        let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (idx, &id) in assignment.iter().enumerate() {
            members.entry(id).or_default().push(idx);
        }

        Ok(members
            .into_iter()
            .map(|(id, idxs)| {
                let summary = ClusterSummary {
                    id,
                    count: idxs.len(),
                    terms: self.top_terms(idxs.iter().map(|&i| texts[i].as_ref())),
                };
                (id, summary)
            })
            .collect())
    }

    fn top_terms<'a>(&self, texts: impl Iterator<Item = &'a str>) -> Vec<String> {
        // term -> (count, first position)
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        let mut position = 0;
        for text in texts {
            for token in tokens(text) {
                if ENGLISH_STOPWORDS.contains(&token) {
                    continue;
                }
                counts.entry(token).or_insert((0, position)).0 += 1;
                position += 1;
            }
        }

        let mut ranked: Vec<(String, usize, usize)> = counts
            .into_iter()
            .map(|(term, (count, first))| (term, count, first))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        ranked
            .into_iter()
            .take(self.top_k)
            .map(|(term, _, _)| term)
            .collect()
    }
}

/// Summarize clusters with the default top-5 terms.
pub fn label<S: AsRef<str>>(
    assignment: &[usize],
    texts: &[S],
) -> Result<BTreeMap<usize, ClusterSummary>> {
    Labeler::new().label(assignment, texts)
}
