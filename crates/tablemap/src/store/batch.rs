use crate::{
    key::{KeyError, validate_row_key},
    store::{BatchOp, StoreLimits},
};
use std::collections::HashMap;
use thiserror::Error as ThisError;

///
/// BatchError
///

#[derive(Debug, ThisError)]
pub enum BatchError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("row key already present in batch for a strict operation: {row_key}")]
    DuplicateRowKey { row_key: String },

    #[error("batch is full: {max_ops} operations")]
    Full { max_ops: usize },
}

///
/// Batch
///
/// An ordered, size-bounded list of write operations sharing one partition
/// key. Row-key constraint checking happens here, where keys enter the
/// batch. Upsert/delete re-adds replace the prior entry for the same row
/// key in place; insert/update re-adds are rejected.
///

#[derive(Debug)]
pub struct Batch {
    partition_key: String,
    limits: StoreLimits,
    ops: Vec<BatchOp>,
    positions: HashMap<String, usize>,
}

impl Batch {
    #[must_use]
    pub fn new(partition_key: impl Into<String>, limits: StoreLimits) -> Self {
        Self {
            partition_key: partition_key.into(),
            limits,
            ops: Vec::new(),
            positions: HashMap::new(),
        }
    }

    #[must_use]
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.ops.len() >= self.limits.max_batch_ops
    }

    pub fn push(&mut self, op: BatchOp) -> Result<(), BatchError> {
        validate_row_key(op.row_key(), self.limits.max_row_key_bytes)?;

        if let Some(&position) = self.positions.get(op.row_key()) {
            if op.replaces_duplicates() {
                self.ops[position] = op;
                return Ok(());
            }
            return Err(BatchError::DuplicateRowKey {
                row_key: op.row_key().to_string(),
            });
        }

        if self.is_full() {
            return Err(BatchError::Full {
                max_ops: self.limits.max_batch_ops,
            });
        }

        self.positions.insert(op.row_key().to_string(), self.ops.len());
        self.ops.push(op);

        Ok(())
    }

    #[must_use]
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    #[must_use]
    pub fn to_ops(&self) -> Vec<BatchOp> {
        self.ops.clone()
    }

    pub fn row_keys(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().map(BatchOp::row_key)
    }
}

///
/// TESTS
///
