//! # GPT Tokenizer Batch Core Library (gptok_core)
//!
//! The `gptok_core` crate annotates batches of JSON records with BPE token data:
//! token IDs, decoded text, token counts, token-limit checks, or text slices that
//! each fit a token budget.
//!
//! ## Core Concepts
//!
//! - **Configuration (`CoreConfig`):** input/output locations, the operation to run,
//!   its parameters and the continue-on-fail policy.
//! - **Tokenizer (`tokenizer::TokenizerAdapter`):** the encode/decode seam. The
//!   production implementation wraps `tiktoken-rs` with the `cl100k_base` vocabulary.
//! - **Operations (`operations`):** one pure function per operation, plus the
//!   token-budget slicing algorithm.
//! - **Processor (`processor::RecordProcessor`):** runs the selected operation over
//!   every record in order and applies the failure policy.
//! - **I/O Handling (`io_handler`):** reads batches from files or stdin and writes
//!   the processed batch to files or stdout.
//!
//! ## Example Usage
//!
//! ```no_run
//! use gptok_core::{run_batch, CoreConfig, Operation};
//! use std::path::PathBuf;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let config = CoreConfig::new_from_cli(
//!         Some(PathBuf::from("records.json")),
//!         None, // write to stdout
//!         None, // no config file
//!         Some(Operation::CountTokens),
//!         Default::default(),
//!         true,
//!         false,
//!     )
//!     .unwrap();
//!
//!     if let Err(e) = run_batch(config).await {
//!         eprintln!("Error: {}", e);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::tokenizer::{TiktokenAdapter, TokenizerAdapter};

// --- Module declarations ---
/// Loads the node configuration file.
pub mod config_loader;
/// Error types for operations, records and whole runs.
pub mod error;
/// Reads and writes record batches from files or standard I/O.
pub mod io_handler;
/// The per-operation functions and the token-budget slicing algorithm.
pub mod operations;
/// Resolves configured parameters against individual records.
pub mod params;
/// Runs an operation over a batch and applies the failure policy.
pub mod processor;
/// The record data model.
pub mod record;
/// The `TokenizerAdapter` trait and its tiktoken implementation.
pub mod tokenizer;
/// Small parsing helpers shared with the CLI.
pub mod utils;

// --- Public API ---

pub use error::{Error, ItemError, OperationError, Result, TokenizerError};
pub use operations::{Operation, OperationOutput, OperationRequest};
pub use params::{ParameterSet, ParameterValue};
pub use processor::{RecordOutcome, RecordProcessor};
pub use record::Record;

/// Central configuration for one batch run.
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    /// Path to the input batch. If `None`, stdin will be used.
    pub input: Option<PathBuf>,
    /// Path to the output file. If `None`, stdout will be used.
    pub output: Option<PathBuf>,
    /// The operation applied to every record.
    pub operation: Operation,
    /// Parameter sources, resolved per record.
    pub parameters: ParameterSet,
    /// Skip failing records instead of aborting the batch.
    pub continue_on_fail: bool,
    /// Pretty-print the output JSON.
    pub pretty: bool,
}

impl CoreConfig {
    /// Creates a new `CoreConfig` from command-line arguments.
    ///
    /// Values from the optional node config file are loaded first; the
    /// operation, any parameter set in `overrides`, and a `true`
    /// `continue_on_fail` from the command line take precedence.
    ///
    /// # Arguments
    ///
    /// * `input`: Optional path to the input batch.
    /// * `output`: Optional path to the output file.
    /// * `config_file`: Optional path to a JSON node config.
    /// * `operation`: Optional operation overriding the config file.
    /// * `overrides`: Parameters given on the command line.
    /// * `continue_on_fail`: Skip failing records instead of aborting.
    /// * `pretty`: Pretty-print the output.
    pub fn new_from_cli(
        input: Option<PathBuf>,
        output: Option<PathBuf>,
        config_file: Option<PathBuf>,
        operation: Option<Operation>,
        overrides: ParameterSet,
        continue_on_fail: bool,
        pretty: bool,
    ) -> Result<Self> {
        let node = match config_file {
            Some(path) => config_loader::load_node_config_from_path(&path)?,
            None => config_loader::NodeConfig::default(),
        };

        Ok(CoreConfig {
            input,
            output,
            operation: operation.unwrap_or(node.operation),
            parameters: node.parameters.merge(overrides),
            continue_on_fail: continue_on_fail || node.continue_on_fail,
            pretty,
        })
    }
}

/// Runs a whole batch with the `cl100k_base` tokenizer.
///
/// Loads the vocabulary once, reads the input batch, processes it and writes
/// the result.
///
/// # Errors
///
/// Returns an error on I/O or JSON failures, when the vocabulary cannot be
/// loaded, or when a record fails while `continue_on_fail` is unset.
pub async fn run_batch(config: CoreConfig) -> Result<()> {
    let tokenizer = Arc::new(TiktokenAdapter::cl100k_base()?);
    run_batch_with(config, tokenizer).await
}

/// Same as [`run_batch`] with a caller-provided tokenizer.
#[instrument(skip_all, fields(input = ?config.input, output = ?config.output, operation = %config.operation))]
pub async fn run_batch_with(config: CoreConfig, tokenizer: Arc<dyn TokenizerAdapter>) -> Result<()> {
    info!("Starting batch");

    let batch = io_handler::read_batch(&config).await?;
    info!(items = batch.len(), "Input batch loaded");

    let processor = RecordProcessor::new(tokenizer, config.parameters.clone());
    let output = processor.process(batch, config.operation, config.continue_on_fail)?;

    io_handler::write_batch(&config, &output).await?;
    info!(items = output.len(), "Batch run completed successfully");
    Ok(())
}
