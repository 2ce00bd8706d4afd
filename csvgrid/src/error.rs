//! Error types for the import pipeline.
//!
//! Ragged rows and empty input are not errors: the first is handled by
//! alignment, the second yields the empty sentinel result. What remains here
//! is the small set of conditions a caller actually has to react to.

use thiserror::Error;

// =============================================================================
// Import Errors
// =============================================================================

/// Errors raised while detecting, reading or assembling a delimited file.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The sample has no line structure to sniff.
    ///
    /// Callers should treat the input as empty rather than fail hard.
    #[error("Cannot detect dialect: sample is empty or has no line break")]
    UndetectableDialect,

    /// A quoted field was still open when the stream ended.
    #[error("Unterminated quoted field starting on line {line}")]
    MalformedQuoting { line: usize },

    /// An override that cannot be honoured.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// The options map could not be deserialized.
    #[error("Invalid options map: {0}")]
    Options(#[from] serde_json::Error),

    /// The file could not be decoded.
    #[error("Failed to decode input: {0}")]
    Encoding(String),

    /// Failed to read input.
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    /// The tokenizer rejected the input.
    #[error("Failed to tokenize input: {0}")]
    Csv(csv::Error),
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        // The quote tracker reports unterminated quotes through the reader's io channel.
        if let csv::ErrorKind::Io(io) = err.kind() {
            if let Some(quote) = io
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<UnterminatedQuote>())
            {
                return ImportError::MalformedQuoting { line: quote.line };
            }
        }
        ImportError::Csv(err)
    }
}

/// Marker carried inside an `io::Error` when the stream ends mid-quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UnterminatedQuote {
    pub line: usize,
}

impl std::fmt::Display for UnterminatedQuote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unterminated quoted field starting on line {}", self.line)
    }
}

impl std::error::Error for UnterminatedQuote {}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Result type for import operations.
pub type ImportResult<T> = Result<T, ImportError>;
