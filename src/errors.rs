//! Error types for treelm.

use thiserror::Error;

use crate::types::{Gram, WordId};

/// Top-level error type for model construction, queries and persistence.
#[derive(Debug, Error)]
pub enum TreeLmError {
    /// File magic, type line or count bookkeeping mismatch at load time.
    #[error("invalid model format: {0}")]
    InvalidFormat(String),

    /// I/O error wrapper.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// `add_gram` called with an out-of-order, duplicate or skip-order gram.
    #[error("gram out of order: {0}")]
    OrderViolation(String),

    /// The prefix of an inserted gram was never added.
    #[error("prefix not found for gram {0:?}")]
    PrefixNotFound(Gram),

    /// Word id outside `[0, num_words)`.
    #[error("word id {word} outside vocabulary of {vocab_size} words")]
    OutOfVocabulary {
        /// The offending word id.
        word: WordId,
        /// Vocabulary size at the time of the lookup.
        vocab_size: usize,
    },

    /// Vocabulary word that cannot survive the line-oriented file header.
    #[error("word {0:?} contains a newline")]
    InvalidWord(String),
}

/// Result type for treelm operations.
pub type Result<T> = std::result::Result<T, TreeLmError>;
