//! Turning normalized messages into feature vectors.
//!
//! Two strategies are provided behind the [`Vectorizer`] trait:
//!
//! - [`TfidfVectorizer`]: sparse lexical features. Unigrams and bigrams are
//!   weighted by sublinear term frequency and smoothed inverse document
//!   frequency, fitted over the whole corpus of one run.
//! - [`SemanticVectorizer`]: dense features from a [`SentenceEmbedder`] handle,
//!   applied to each message independently.
//!
//! Both return exactly one vector per message, in input order, with the same
//! dimension for every vector.

mod embed;
mod tfidf;

pub use embed::{HashingEmbedder, SemanticVectorizer, SentenceEmbedder};
pub use tfidf::{TfidfModel, TfidfVectorizer};

use crate::error::Result;

/// Maps a corpus of messages to one feature vector per message.
pub trait Vectorizer {
    /// Vectorize `messages`. Fails with [`crate::Error::EmptyInput`] on an empty corpus.
    fn vectorize(&self, messages: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}
