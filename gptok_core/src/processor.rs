//! # Record Processor
//!
//! Runs one operation over a whole batch, strictly in batch order and on the
//! calling thread. Each record is folded into a [`RecordOutcome`]; the
//! continue-on-fail policy is then applied to the stream of outcomes:
//!
//! - **abort**: the first `Skipped` outcome stops the fold and its error, which
//!   carries the record's index, is returned. No further records are touched.
//! - **continue**: successful records are kept in their original order and a
//!   failure clone of every skipped record is appended after them.

use crate::error::{ItemError, OperationError};
use crate::operations::{self, Operation};
use crate::params::ParameterSet;
use crate::record::Record;
use crate::tokenizer::TokenizerAdapter;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// What happened to a single record.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordOutcome {
    /// The record with its result written under the destination key.
    Success(Record),
    /// The record as it stood when the operation failed, and the reason.
    /// Only a result computed before the failure has been written to it.
    Skipped(Record, ItemError),
}

impl RecordOutcome {
    fn into_result(self) -> Result<Record, ItemError> {
        match self {
            RecordOutcome::Success(record) => Ok(record),
            RecordOutcome::Skipped(_, e) => Err(e),
        }
    }
}

pub struct RecordProcessor {
    tokenizer: Arc<dyn TokenizerAdapter>,
    parameters: ParameterSet,
}

impl RecordProcessor {
    pub fn new(tokenizer: Arc<dyn TokenizerAdapter>, parameters: ParameterSet) -> Self {
        Self {
            tokenizer,
            parameters,
        }
    }

    /// Applies `operation` to every record of `batch`.
    ///
    /// # Errors
    ///
    /// With `continue_on_fail` unset, returns the first failing record's
    /// [`ItemError`] and discards the batch.
    #[instrument(skip_all, fields(operation = %operation, items = batch.len(), continue_on_fail = continue_on_fail))]
    pub fn process(
        &self,
        batch: Vec<Record>,
        operation: Operation,
        continue_on_fail: bool,
    ) -> Result<Vec<Record>, ItemError> {
        let outcomes = batch
            .into_iter()
            .enumerate()
            .map(|(index, record)| self.process_record(operation, index, record));

        if !continue_on_fail {
            let records = outcomes
                .map(RecordOutcome::into_result)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| {
                    error!(item_index = e.item_index, "Aborting batch: {}", e.source);
                    e
                })?;
            info!(processed = records.len(), "Batch completed");
            return Ok(records);
        }

        let mut output = Vec::new();
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                RecordOutcome::Success(record) => output.push(record),
                RecordOutcome::Skipped(record, e) => {
                    warn!(item_index = e.item_index, "Skipping record: {}", e.source);
                    skipped.push(record.failed_clone(&e));
                }
            }
        }
        info!(
            processed = output.len(),
            skipped = skipped.len(),
            "Batch completed"
        );
        output.append(&mut skipped);
        Ok(output)
    }

    /// Resolves parameters for one record, runs the operation and writes the result.
    pub fn process_record(
        &self,
        operation: Operation,
        index: usize,
        mut record: Record,
    ) -> RecordOutcome {
        match self.run(operation, &mut record) {
            Ok(key) => {
                debug!(item_index = index, destination_key = %key, "Record processed");
                RecordOutcome::Success(record)
            }
            Err(source) => RecordOutcome::Skipped(record, ItemError::new(index, source)),
        }
    }

    /// Writes the result under the destination key and returns that key.
    fn run(&self, operation: Operation, record: &mut Record) -> Result<String, OperationError> {
        let resolved = self.parameters.resolve(operation, &record.json)?;
        let (output, failure) = match operations::execute(self.tokenizer.as_ref(), &resolved.request) {
            Ok(output) => (output, None),
            Err(e) => match e.partial_output() {
                Some(output) => (output, Some(e)),
                None => return Err(e),
            },
        };
        record
            .json
            .insert(resolved.destination_key.clone(), output.into());
        match failure {
            Some(e) => Err(e),
            None => Ok(resolved.destination_key),
        }
    }
}
