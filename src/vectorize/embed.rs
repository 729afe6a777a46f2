use super::Vectorizer;
use crate::error::{Error, Result};

/// A sentence embedding model: text in, fixed-length vector out.
///
/// Loading the model is the caller's business. The pipeline only borrows the
/// handle for the duration of one run and never mutates it.
pub trait SentenceEmbedder: Send + Sync {
    /// Length of every vector returned by [`SentenceEmbedder::embed`].
    fn dimension(&self) -> usize;

    /// Model identifier used in logs.
    fn model_id(&self) -> &str;

    /// Embed one text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Vectorizer backed by a borrowed [`SentenceEmbedder`].
pub struct SemanticVectorizer<'m> {
    model: &'m dyn SentenceEmbedder,
}

impl<'m> SemanticVectorizer<'m> {
    /// Wrap a model handle.
    pub fn new(model: &'m dyn SentenceEmbedder) -> Self {
        Self { model }
    }
}

impl Vectorizer for SemanticVectorizer<'_> {
    fn vectorize(&self, messages: &[String]) -> Result<Vec<Vec<f32>>> {
        if messages.is_empty() {
            return Err(Error::EmptyInput);
        }
        let dim = self.model.dimension();
        if dim == 0 {
            return Err(Error::InvalidParameter {
                name: "dimension",
                message: "must be at least 1",
            });
        }

        let mut out = Vec::with_capacity(messages.len());
        for message in messages {
            let v = self.model.embed(message)?;
            if v.len() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    found: v.len(),
                });
            }
            out.push(v);
        }
        tracing::debug!(
            model = self.model.model_id(),
            dim,
            n = out.len(),
            "embedded messages"
        );
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "semantic"
    }
}

/// Signed feature-hashing embedder over character n-grams.
///
/// Deterministic and model-free: each 1-, 2- and 3-gram of the lowercased text
/// (with begin/end markers) is hashed with FNV-1a into one of `dimension`
/// buckets, the top hash bit choosing the sign. The result is L2-normalized.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Embedder with the given output dimension.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

fn fnv1a(seq: &[u32]) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for &x in seq {
        h ^= u64::from(x);
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

impl SentenceEmbedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        "hashing-char-ngram"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.dimension == 0 {
            return Err(Error::InvalidParameter {
                name: "dimension",
                message: "must be at least 1",
            });
        }
        let mut v = vec![0.0f32; self.dimension];

        // Markers outside the Unicode scalar range.
        const BOS: u32 = 0x110000;
        const EOS: u32 = 0x110001;
        let mut xs: Vec<u32> = Vec::with_capacity(text.len() + 2);
        xs.push(BOS);
        xs.extend(text.to_lowercase().chars().map(u32::from));
        xs.push(EOS);

        for n in [3usize, 2, 1] {
            if xs.len() < n {
                continue;
            }
            for gram in xs.windows(n) {
                let h = fnv1a(gram);
                let idx = (h % self.dimension as u64) as usize;
                v[idx] += if h >> 63 == 0 { 1.0 } else { -1.0 };
            }
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl SentenceEmbedder for Broken {
        fn dimension(&self) -> usize {
            4
        }
        fn model_id(&self) -> &str {
            "broken"
        }
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0; text.len()])
        }
    }

    #[test]
    fn hashing_is_deterministic_and_unit_length() {
        let e = HashingEmbedder::new(64);
        let a = e.embed("Timeout after <number> seconds").unwrap();
        let b = e.embed("Timeout after <number> seconds").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn semantic_preserves_count_and_order() {
        let e = HashingEmbedder::default();
        let msgs: Vec<String> = vec!["alpha".into(), "beta".into(), "alpha".into()];
        let rows = SemanticVectorizer::new(&e).vectorize(&msgs).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], rows[2]);
        assert_ne!(rows[0], rows[1]);
        assert_eq!(rows[1], e.embed("beta").unwrap());
    }

    #[test]
    fn semantic_rejects_empty_and_bad_dimension() {
        let e = HashingEmbedder::default();
        assert!(matches!(
            SemanticVectorizer::new(&e).vectorize(&[]),
            Err(Error::EmptyInput)
        ));
        let msgs: Vec<String> = vec!["abc".into()];
        assert!(matches!(
            SemanticVectorizer::new(&Broken).vectorize(&msgs),
            Err(Error::DimensionMismatch {
                expected: 4,
                found: 3
            })
        ));
    }
}
