//! Error types for the tokenizer batch pipeline.
//!
//! Operation-level failures (`OperationError`) are local to one record. The
//! record processor decides whether to wrap them into an `ItemError` that aborts
//! the batch or to attach them to a skipped record and keep going.

use std::io;
use thiserror::Error;

/// Failures raised by the tokenizer adapter itself.
#[derive(Debug, Error)]
pub enum TokenizerError {
    #[error("Failed to load BPE vocabulary: {reason}")]
    VocabularyLoad { reason: String },

    #[error("Token {token} is not part of the vocabulary")]
    UnknownToken { token: u32 },

    #[error("Tokens do not decode to valid UTF-8: {reason}")]
    Decode { reason: String },
}

/// The two kinds of per-record failure an operation can produce.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error("{0}")]
    InvalidInput(String),

    /// Raised in place of a `false` within-limit result, which it still carries.
    #[error("String exceeds token limit of {max_tokens}")]
    LimitExceeded {
        max_tokens: usize,
        within_limit: bool,
    },
}

impl OperationError {
    pub fn invalid(message: impl Into<String>) -> Self {
        OperationError::InvalidInput(message.into())
    }

    /// Stable name used in serialized error objects.
    pub fn kind(&self) -> &'static str {
        match self {
            OperationError::InvalidInput(_) => "InvalidInput",
            OperationError::LimitExceeded { .. } => "LimitExceeded",
        }
    }
}

impl From<TokenizerError> for OperationError {
    fn from(e: TokenizerError) -> Self {
        OperationError::InvalidInput(e.to_string())
    }
}

/// An operation failure enriched with the index of the record that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{source} [item {item_index}]")]
pub struct ItemError {
    pub item_index: usize,
    #[source]
    pub source: OperationError,
}

impl ItemError {
    pub fn new(item_index: usize, source: OperationError) -> Self {
        Self { item_index, source }
    }
}

/// Top-level error for a whole run (I/O, configuration and aborted batches).
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),

    #[error(transparent)]
    Item(#[from] ItemError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_error_message_carries_index() {
        let err = ItemError::new(1, OperationError::invalid("Input String field is empty"));
        assert_eq!(err.to_string(), "Input String field is empty [item 1]");
        assert_eq!(err.source.kind(), "InvalidInput");
    }

    #[test]
    fn test_tokenizer_error_becomes_invalid_input() {
        let err: OperationError = TokenizerError::UnknownToken { token: 100_256 }.into();
        assert_eq!(
            err,
            OperationError::invalid("Token 100256 is not part of the vocabulary")
        );
    }
}
