use serde::{Deserialize, Serialize};

/// A failure message and its position in the caller's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Position in the raw input, counting skipped entries.
    pub index: usize,
    /// Decoded text, before normalization.
    pub text: String,
}

impl Message {
    /// Message at input position `index`.
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    /// Messages numbered by position.
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Vec<Self> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Self::new(i, t.as_ref()))
            .collect()
    }
}
