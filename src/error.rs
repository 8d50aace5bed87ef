//! Error types for the support-counting engines

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A selector ID outside `[0, selector_count)` reached a query or the encoded-data boundary
    #[error("Selector {selector} out of range: only {selector_count} selectors were built")]
    SelectorOutOfRange { selector: u32, selector_count: usize },

    /// Node storage could not grow, either past the configured budget or in the allocator
    #[error("Resource exhausted: {resident} resident tree nodes, {requested} more requested (budget {budget})")]
    ResourceExhausted {
        resident: usize,
        requested: usize,
        budget: usize,
    },

    #[error("Invalid efficiency coefficient {0}: must be positive")]
    InvalidEfficiency(usize),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Whether the caller may retry with a smaller memory footprint
    /// (a partitioned build or a larger efficiency).
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, Error::ResourceExhausted { .. })
    }
}
