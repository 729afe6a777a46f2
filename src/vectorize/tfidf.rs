//! TF-IDF over word n-grams.
//!
//! Weighting for term `t` in document `d` of an `n`-document corpus:
//!
//! ```text
//! tf(t, d)  = 1 + ln(count(t, d))           (sublinear)
//! idf(t)    = ln((1 + n) / (1 + df(t))) + 1 (smoothed)
//! w(t, d)   = tf(t, d) * idf(t), then each row is L2-normalized
//! ```
//!
//! The vocabulary is sorted lexicographically so column order does not depend
//! on hash iteration order.

use std::collections::{BTreeMap, HashMap};

use super::Vectorizer;
use crate::error::{Error, Result};
use crate::tokenize::tokens;

/// TF-IDF vectorizer configuration.
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    min_n: usize,
    max_n: usize,
    sublinear_tf: bool,
    smooth_idf: bool,
}

impl Default for TfidfVectorizer {
    fn default() -> Self {
        Self {
            min_n: 1,
            max_n: 2,
            sublinear_tf: true,
            smooth_idf: true,
        }
    }
}

impl TfidfVectorizer {
    /// Unigrams and bigrams, sublinear tf, smoothed idf.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the inclusive n-gram range.
    pub fn with_ngram_range(mut self, min_n: usize, max_n: usize) -> Self {
        self.min_n = min_n;
        self.max_n = max_n;
        self
    }

    /// Use `1 + ln(tf)` instead of raw counts.
    pub fn with_sublinear_tf(mut self, sublinear_tf: bool) -> Self {
        self.sublinear_tf = sublinear_tf;
        self
    }

    /// Add one to document frequencies as if an extra document contained every term.
    pub fn with_smooth_idf(mut self, smooth_idf: bool) -> Self {
        self.smooth_idf = smooth_idf;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.min_n == 0 {
            return Err(Error::InvalidParameter {
                name: "ngram_range",
                message: "lower bound must be at least 1",
            });
        }
        if self.max_n < self.min_n {
            return Err(Error::InvalidParameter {
                name: "ngram_range",
                message: "upper bound must not be below lower bound",
            });
        }
        Ok(())
    }

    fn ngram_counts(&self, text: &str) -> HashMap<String, u32> {
        let words = tokens(text);
        let mut counts = HashMap::new();
        for n in self.min_n..=self.max_n {
            for window in words.windows(n) {
                *counts.entry(window.join(" ")).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Learn the vocabulary and idf weights of `docs`.
    pub fn fit(&self, docs: &[String]) -> Result<TfidfModel> {
        self.validate()?;
        if docs.is_empty() {
            return Err(Error::EmptyInput);
        }

        let mut df: BTreeMap<String, u32> = BTreeMap::new();
        for doc in docs {
            for term in self.ngram_counts(doc).into_keys() {
                *df.entry(term).or_insert(0) += 1;
            }
        }
        if df.is_empty() {
            return Err(Error::InvalidInput(
                "empty vocabulary: messages contain no terms".to_string(),
            ));
        }

        let n = docs.len() as f64;
        let mut vocabulary = Vec::with_capacity(df.len());
        let mut idf = Vec::with_capacity(df.len());
        for (term, freq) in df {
            let freq = f64::from(freq);
            let weight = if self.smooth_idf {
                ((1.0 + n) / (1.0 + freq)).ln() + 1.0
            } else {
                (n / freq).ln() + 1.0
            };
            vocabulary.push(term);
            idf.push(weight as f32);
        }
        let index = vocabulary
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();

        Ok(TfidfModel {
            config: self.clone(),
            vocabulary,
            index,
            idf,
        })
    }
}

impl Vectorizer for TfidfVectorizer {
    fn vectorize(&self, messages: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = self.fit(messages)?;
        Ok(model.transform(messages))
    }

    fn name(&self) -> &'static str {
        "tfidf"
    }
}

/// A fitted TF-IDF vocabulary.
#[derive(Debug, Clone)]
pub struct TfidfModel {
    config: TfidfVectorizer,
    vocabulary: Vec<String>,
    index: HashMap<String, usize>,
    idf: Vec<f32>,
}

impl TfidfModel {
    /// Terms in column order.
    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    /// Inverse document frequency per column.
    pub fn idf(&self) -> &[f32] {
        &self.idf
    }

    /// Weight `docs` against the fitted vocabulary. Unknown terms are ignored;
    /// a document with no known terms maps to the zero vector.
    pub fn transform(&self, docs: &[String]) -> Vec<Vec<f32>> {
        docs.iter().map(|doc| self.transform_one(doc)).collect()
    }

    fn transform_one(&self, doc: &str) -> Vec<f32> {
        let mut row = vec![0.0f32; self.vocabulary.len()];
        for (term, count) in self.config.ngram_counts(doc) {
            let Some(&col) = self.index.get(&term) else {
                continue;
            };
            let tf = if self.config.sublinear_tf {
                1.0 + (count as f32).ln()
            } else {
                count as f32
            };
            row[col] = tf * self.idf[col];
        }

        let norm = row.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut row {
                *x /= norm;
            }
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn vocabulary_has_unigrams_and_bigrams_sorted() {
        let model = TfidfVectorizer::new()
            .fit(&corpus(&["disk full", "disk slow"]))
            .unwrap();
        assert_eq!(
            model.vocabulary(),
            &["disk", "disk full", "disk slow", "full", "slow"]
        );
    }

    #[test]
    fn smoothed_idf_values() {
        let model = TfidfVectorizer::new()
            .fit(&corpus(&["disk full", "disk slow"]))
            .unwrap();
        // "disk" appears in both documents: ln(3/3) + 1 = 1.
        assert!((model.idf()[0] - 1.0).abs() < 1e-6);
        // "full" appears in one: ln(3/2) + 1.
        let expected = (1.5f32).ln() + 1.0;
        assert!((model.idf()[3] - expected).abs() < 1e-6);
    }

    #[test]
    fn rows_are_unit_length_and_ordered() {
        let docs = corpus(&["timeout waiting for lock", "lock acquired", "timeout"]);
        let rows = TfidfVectorizer::new().vectorize(&docs).unwrap();
        assert_eq!(rows.len(), 3);
        let dim = rows[0].len();
        for row in &rows {
            assert_eq!(row.len(), dim);
            let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
        // Third document only contains "timeout".
        let model = TfidfVectorizer::new().fit(&docs).unwrap();
        let col = model.vocabulary().iter().position(|t| t == "timeout").unwrap();
        assert!((rows[2][col] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn sublinear_tf_dampens_repeats() {
        let docs = corpus(&["error error error error", "warning"]);
        let raw = TfidfVectorizer::new()
            .with_ngram_range(1, 1)
            .with_sublinear_tf(false)
            .fit(&docs)
            .unwrap();
        assert_eq!(raw.vocabulary(), &["error", "warning"]);
        let sub = TfidfVectorizer::new().with_ngram_range(1, 1).fit(&docs).unwrap();
        // Both normalize to a one-hot row; the raw weights differ before normalization.
        assert_eq!(raw.transform(&docs)[0], sub.transform(&docs)[0]);
    }

    #[test]
    fn unknown_terms_give_zero_row() {
        let model = TfidfVectorizer::new().fit(&corpus(&["alpha beta"])).unwrap();
        let rows = model.transform(&corpus(&["gamma"]));
        assert!(rows[0].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn empty_corpus_fails() {
        let err = TfidfVectorizer::new().vectorize(&[]).unwrap_err();
        assert!(matches!(err, Error::EmptyInput));
    }

    #[test]
    fn empty_vocabulary_fails() {
        let err = TfidfVectorizer::new()
            .vectorize(&corpus(&["a", "! ?"]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn invalid_ngram_range() {
        let docs = corpus(&["x y"]);
        assert!(TfidfVectorizer::new().with_ngram_range(0, 1).fit(&docs).is_err());
        assert!(TfidfVectorizer::new().with_ngram_range(2, 1).fit(&docs).is_err());
    }

    #[test]
    fn single_message() {
        let rows = TfidfVectorizer::new()
            .vectorize(&corpus(&["segmentation fault"]))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 3);
    }
}
