//! Core runtime for tablemap: schema descriptors, the row-key codec,
//! collection classification, the batch planner with compensating rollback,
//! and the repository facade over an abstract partition store.
#![warn(unreachable_pub)]

pub mod db;
pub mod error;
pub mod key;
pub mod schema;
pub mod serialize;
pub mod store;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

///
/// CONSTANTS
///

/// Maximum number of operations the store accepts in one atomic batch.
///
/// Batches are atomic only within a single submission, so this bound is
/// also the granularity of the compensating-rollback machinery.
pub const MAX_BATCH_OPS: usize = 100;

/// Maximum UTF-8 length of a row key accepted by the store.
pub const MAX_ROW_KEY_BYTES: usize = 1024;

///
/// Prelude
///
/// Domain vocabulary only. Errors, executors, and helpers stay addressable
/// through their own modules.
///

pub mod prelude {
    pub use crate::{
        db::Repository,
        error::Error,
        key::{KeyContext, KeySlot, PropertySource, RowKey},
        schema::{RootEntity, RootSchema, RowEntity, SchemaBuilder},
        store::{BatchOp, MemoryStore, PartitionStore, Row, StoreLimits},
        value::{AttrMap, Value},
    };
}
