// gptok_core/src/tokenizer.rs
// The tokenizer seam: the `TokenizerAdapter` trait and its tiktoken-backed implementation.

use crate::error::TokenizerError;
use tiktoken_rs::CoreBPE;
use tracing::info;

/// Number of ordinary (mergeable) ranks in `cl100k_base`.
const CL100K_ORDINARY_RANKS: u32 = 100_256;
/// Special tokens of `cl100k_base`: endoftext, fim prefix/middle/suffix, endofprompt.
const CL100K_SPECIAL_TOKENS: [u32; 5] = [100_257, 100_258, 100_259, 100_260, 100_276];

/// Encode/decode primitives over a fixed BPE vocabulary.
///
/// Implementations must be deterministic and satisfy `decode(encode(s)) == s`
/// for every valid string. The vocabulary is loaded when the adapter is built
/// and never changes afterwards, so the adapter can be shared across records.
pub trait TokenizerAdapter: Send + Sync {
    /// Tokenizes `text` into BPE token IDs.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Turns token IDs back into raw bytes.
    ///
    /// Any run of tokens is accepted, even one that starts or ends inside a
    /// multi-byte UTF-8 sequence.
    fn decode_bytes(&self, tokens: &[u32]) -> Result<Vec<u8>, TokenizerError>;

    /// Turns token IDs back into text.
    fn decode(&self, tokens: &[u32]) -> Result<String, TokenizerError> {
        String::from_utf8(self.decode_bytes(tokens)?).map_err(|e| TokenizerError::Decode {
            reason: e.to_string(),
        })
    }

    /// Returns `true` when `text` tokenizes to at most `max_tokens` tokens.
    fn is_within_token_limit(&self, text: &str, max_tokens: usize) -> bool {
        self.encode(text).len() <= max_tokens
    }
}

/// `TokenizerAdapter` over the `cl100k_base` vocabulary used by the GPT-3.5/GPT-4 family.
pub struct TiktokenAdapter {
    bpe: CoreBPE,
}

impl TiktokenAdapter {
    /// Loads the `cl100k_base` ranks. This is the only expensive step and
    /// should happen once per process.
    pub fn cl100k_base() -> Result<Self, TokenizerError> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| TokenizerError::VocabularyLoad {
            reason: e.to_string(),
        })?;
        info!("Loaded cl100k_base BPE vocabulary");
        Ok(Self { bpe })
    }

    fn check_known(&self, tokens: &[u32]) -> Result<(), TokenizerError> {
        // CoreBPE panics on IDs missing from both decoders, so reject them up front.
        match tokens
            .iter()
            .find(|&&t| t >= CL100K_ORDINARY_RANKS && !CL100K_SPECIAL_TOKENS.contains(&t))
        {
            Some(&token) => Err(TokenizerError::UnknownToken { token }),
            None => Ok(()),
        }
    }
}

impl TokenizerAdapter for TiktokenAdapter {
    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe.encode_ordinary(text)
    }

    fn decode_bytes(&self, tokens: &[u32]) -> Result<Vec<u8>, TokenizerError> {
        self.check_known(tokens)?;
        Ok(self
            .bpe
            ._decode_native_and_split(tokens.to_vec())
            .flatten()
            .collect())
    }
}
