pub mod batch;
pub mod memory;

use crate::{MAX_BATCH_OPS, MAX_ROW_KEY_BYTES, value::AttrMap};
use async_trait::async_trait;
use thiserror::Error as ThisError;

// re-exports
pub use batch::{Batch, BatchError};
pub use memory::MemoryStore;

///
/// StoreError
///
/// Failures surfaced by a partition store adapter. A cancelled I/O call
/// surfaces as one of these and drives the same compensation path as any
/// other submission failure.
///

#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    #[error("row already exists: {row_key}")]
    RowExists { row_key: String },

    #[error("row not found: {row_key}")]
    RowNotFound { row_key: String },

    #[error("batch rejected: {message}")]
    BatchRejected { message: String },

    #[error("store backend error: {message}")]
    Backend { message: String },
}

///
/// Row
///
/// One stored row: partition key, row key, flat attribute map.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub partition_key: String,
    pub row_key: String,
    pub attrs: AttrMap,
}

///
/// BatchOp
///
/// One write operation inside an atomic batch.
///

#[derive(Clone, Debug, PartialEq)]
pub enum BatchOp {
    /// Insert or replace.
    Upsert { row_key: String, attrs: AttrMap },
    /// Fail if the row already exists.
    Insert { row_key: String, attrs: AttrMap },
    /// Fail if the row is absent.
    Update { row_key: String, attrs: AttrMap },
    Delete { row_key: String },
}

impl BatchOp {
    #[must_use]
    pub fn row_key(&self) -> &str {
        match self {
            Self::Upsert { row_key, .. }
            | Self::Insert { row_key, .. }
            | Self::Update { row_key, .. }
            | Self::Delete { row_key } => row_key,
        }
    }

    /// Re-adding a key replaces the prior entry for these kinds; the
    /// strict kinds reject duplicates instead.
    #[must_use]
    pub const fn replaces_duplicates(&self) -> bool {
        matches!(self, Self::Upsert { .. } | Self::Delete { .. })
    }
}

///
/// StoreLimits
///
/// Contract bounds reported by a store adapter.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StoreLimits {
    pub max_batch_ops: usize,
    pub max_row_key_bytes: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_batch_ops: MAX_BATCH_OPS,
            max_row_key_bytes: MAX_ROW_KEY_BYTES,
        }
    }
}

///
/// PartitionStore
///
/// The abstract store this layer is built against. A batch submission is
/// atomic within one call and bounded by `limits().max_batch_ops`; nothing
/// stronger is assumed, which is why multi-batch saves compensate instead
/// of committing atomically.
///

#[async_trait]
pub trait PartitionStore: Send + Sync {
    /// Fetch every row in one partition, ordered by row key.
    async fn get_partition(&self, partition_key: &str) -> Result<Vec<Row>, StoreError>;

    /// Atomically apply one batch of operations to one partition.
    async fn submit_batch(
        &self,
        partition_key: &str,
        ops: Vec<BatchOp>,
    ) -> Result<(), StoreError>;

    async fn get_row(&self, partition_key: &str, row_key: &str)
    -> Result<Option<Row>, StoreError>;

    async fn put_row(&self, row: Row) -> Result<(), StoreError>;

    async fn delete_row(&self, partition_key: &str, row_key: &str) -> Result<(), StoreError>;

    fn limits(&self) -> StoreLimits {
        StoreLimits::default()
    }
}
