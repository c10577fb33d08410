//! # Operation Executor
//!
//! One function per operation, each working against a [`TokenizerAdapter`].
//! Inputs arrive already typed (see [`crate::params`]); the functions here still
//! enforce the value-level rules (non-empty text, non-empty tokens, positive
//! token limit) so they can be called directly.
//!
//! [`execute`] dispatches a validated [`OperationRequest`] with an exhaustive
//! match, so every [`Operation`] variant is guaranteed a handler.

use crate::error::OperationError;
use crate::tokenizer::TokenizerAdapter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Token limit used when a record does not provide one.
pub const DEFAULT_MAX_TOKENS: i64 = 2048;

/// The closed set of operations. One is selected per batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    /// Text to token IDs.
    #[default]
    Encode,
    /// Token IDs to text.
    Decode,
    /// Number of tokens the text produces.
    CountTokens,
    /// Whether the text fits a token budget.
    IsWithinTokenLimit,
    /// Text split into slices that each fit a token budget.
    SliceMatchingTokenLimit,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Encode,
        Operation::Decode,
        Operation::CountTokens,
        Operation::IsWithinTokenLimit,
        Operation::SliceMatchingTokenLimit,
    ];

    /// Key the result is written under when no destination key is configured.
    pub fn default_destination_key(&self) -> &'static str {
        match self {
            Operation::Encode => "tokens",
            Operation::Decode => "data",
            Operation::CountTokens => "tokenCount",
            Operation::IsWithinTokenLimit => "isWithinTokenLimit",
            Operation::SliceMatchingTokenLimit => "slices",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Encode => "encode",
            Operation::Decode => "decode",
            Operation::CountTokens => "countTokens",
            Operation::IsWithinTokenLimit => "isWithinTokenLimit",
            Operation::SliceMatchingTokenLimit => "sliceMatchingTokenLimit",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved, typed request for one record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationRequest {
    Encode {
        text: String,
    },
    Decode {
        tokens: Vec<u32>,
    },
    CountTokens {
        text: String,
    },
    IsWithinTokenLimit {
        text: String,
        max_tokens: i64,
        error_on_exceed: bool,
    },
    SliceMatchingTokenLimit {
        text: String,
        max_tokens: i64,
    },
}

/// The value an operation produces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationOutput {
    Tokens(Vec<u32>),
    Text(String),
    Count(usize),
    WithinLimit(bool),
    Slices(Vec<String>),
}

impl From<OperationOutput> for Value {
    fn from(output: OperationOutput) -> Self {
        match output {
            OperationOutput::Tokens(tokens) => Value::from(tokens),
            OperationOutput::Text(text) => Value::String(text),
            OperationOutput::Count(count) => Value::from(count),
            OperationOutput::WithinLimit(within) => Value::Bool(within),
            OperationOutput::Slices(slices) => Value::from(slices),
        }
    }
}

impl OperationError {
    /// The result an operation had already computed when it failed, if any.
    pub fn partial_output(&self) -> Option<OperationOutput> {
        match self {
            OperationError::LimitExceeded { within_limit, .. } => {
                Some(OperationOutput::WithinLimit(*within_limit))
            }
            OperationError::InvalidInput(_) => None,
        }
    }
}

/// Runs a validated request.
pub fn execute<T>(
    tokenizer: &T,
    request: &OperationRequest,
) -> Result<OperationOutput, OperationError>
where
    T: TokenizerAdapter + ?Sized,
{
    match request {
        OperationRequest::Encode { text } => encode(tokenizer, text).map(OperationOutput::Tokens),
        OperationRequest::Decode { tokens } => decode(tokenizer, tokens).map(OperationOutput::Text),
        OperationRequest::CountTokens { text } => {
            count_tokens(tokenizer, text).map(OperationOutput::Count)
        }
        OperationRequest::IsWithinTokenLimit {
            text,
            max_tokens,
            error_on_exceed,
        } => is_within_token_limit(tokenizer, text, *max_tokens, *error_on_exceed)
            .map(OperationOutput::WithinLimit),
        OperationRequest::SliceMatchingTokenLimit { text, max_tokens } => {
            slice_matching_token_limit(tokenizer, text, *max_tokens).map(OperationOutput::Slices)
        }
    }
}

pub fn encode<T>(tokenizer: &T, text: &str) -> Result<Vec<u32>, OperationError>
where
    T: TokenizerAdapter + ?Sized,
{
    check_text(text)?;
    Ok(tokenizer.encode(text))
}

pub fn decode<T>(tokenizer: &T, tokens: &[u32]) -> Result<String, OperationError>
where
    T: TokenizerAdapter + ?Sized,
{
    if tokens.is_empty() {
        return Err(OperationError::invalid("Input Tokens field is empty"));
    }
    Ok(tokenizer.decode(tokens)?)
}

pub fn count_tokens<T>(tokenizer: &T, text: &str) -> Result<usize, OperationError>
where
    T: TokenizerAdapter + ?Sized,
{
    encode(tokenizer, text).map(|tokens| tokens.len())
}

/// Checks `text` against `max_tokens`.
///
/// With `error_on_exceed` set, an over-limit text still runs the full check
/// before `LimitExceeded` is returned in place of `Ok(false)`. The error keeps
/// the computed value, see [`OperationError::partial_output`].
pub fn is_within_token_limit<T>(
    tokenizer: &T,
    text: &str,
    max_tokens: i64,
    error_on_exceed: bool,
) -> Result<bool, OperationError>
where
    T: TokenizerAdapter + ?Sized,
{
    check_text(text)?;
    let limit = check_max_tokens(max_tokens)?;

    let within = tokenizer.is_within_token_limit(text, limit);
    if !within && error_on_exceed {
        return Err(OperationError::LimitExceeded {
            max_tokens: limit,
            within_limit: within,
        });
    }
    Ok(within)
}

/// Splits `text` into slices of at most `max_tokens` tokens each.
///
/// A text that already fits comes back untouched as a single slice. Anything
/// longer is encoded once and the token stream is cut into consecutive windows
/// of exactly `max_tokens` (the last one may be shorter), one slice per window.
/// Windows are not rebalanced at BPE merge boundaries, so re-encoding a slice
/// can occasionally differ from its window length.
///
/// A window that ends inside a multi-byte character hands the incomplete bytes
/// on to the next slice, so every slice is valid UTF-8 and the slices always
/// concatenate back to `text`. A window made only of such bytes yields `""`.
pub fn slice_matching_token_limit<T>(
    tokenizer: &T,
    text: &str,
    max_tokens: i64,
) -> Result<Vec<String>, OperationError>
where
    T: TokenizerAdapter + ?Sized,
{
    check_text(text)?;
    let limit = check_max_tokens(max_tokens)?;

    if tokenizer.is_within_token_limit(text, limit) {
        return Ok(vec![text.to_owned()]);
    }

    let tokens = tokenizer.encode(text);
    let mut slices = Vec::with_capacity(tokens.len().div_ceil(limit));
    let mut pending = Vec::new();
    for window in tokens.chunks(limit) {
        pending.extend(tokenizer.decode_bytes(window)?);
        let tail = pending.split_off(complete_utf8_len(&pending)?);
        let slice = std::mem::replace(&mut pending, tail);
        let slice = String::from_utf8(slice).map_err(|e| OperationError::invalid(e.to_string()))?;
        slices.push(slice);
    }
    if !pending.is_empty() {
        return Err(OperationError::invalid(
            "Tokens do not decode to valid UTF-8: text ends inside a character",
        ));
    }
    Ok(slices)
}

/// Length of the longest prefix of `bytes` that is complete UTF-8.
///
/// Only a trailing sequence that is cut short is left out; bytes that can
/// never form a character are an error.
fn complete_utf8_len(bytes: &[u8]) -> Result<usize, OperationError> {
    match std::str::from_utf8(bytes) {
        Ok(_) => Ok(bytes.len()),
        Err(e) if e.error_len().is_none() => Ok(e.valid_up_to()),
        Err(e) => Err(OperationError::invalid(format!(
            "Tokens do not decode to valid UTF-8: {e}"
        ))),
    }
}

fn check_text(text: &str) -> Result<(), OperationError> {
    if text.is_empty() {
        return Err(OperationError::invalid("Input String field is empty"));
    }
    Ok(())
}

fn check_max_tokens(max_tokens: i64) -> Result<usize, OperationError> {
    if max_tokens <= 0 {
        return Err(OperationError::invalid("Provide Max Tokens (bigger than 0)"));
    }
    usize::try_from(max_tokens)
        .map_err(|_| OperationError::invalid(format!("Max Tokens {max_tokens} is too large")))
}
