use thiserror::Error;

/// Errors returned by the clustering pipeline and its stages.
#[derive(Debug, Error)]
pub enum Error {
    /// Input slice is empty.
    #[error("empty input")]
    EmptyInput,

    /// A message could not be used as text.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Too few distinct pairwise distances to fit the threshold model.
    #[error("insufficient data: {distinct} distinct distance value(s) among {n_items} items")]
    InsufficientData {
        /// Number of distinct distance values observed.
        distinct: usize,
        /// Number of items in the dataset.
        n_items: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Human-readable explanation.
        message: &'static str,
    },

    /// Requested cluster count is incompatible with the dataset.
    #[error("invalid cluster count: requested {requested}, but dataset has {n_items} items")]
    InvalidClusterCount {
        /// Requested number of clusters.
        requested: usize,
        /// Number of items in the dataset.
        n_items: usize,
    },

    /// Points in a dataset have inconsistent dimensionality.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimensionality.
        expected: usize,
        /// Found dimensionality.
        found: usize,
    },

    /// A configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Failure writing a report.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for errors caused by configuration rather than by the corpus.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidParameter { .. } | Error::InvalidClusterCount { .. } | Error::Config(_)
        )
    }
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;
