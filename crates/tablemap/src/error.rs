use crate::{
    db::save::RollbackError,
    key::{KeyError, TemplateError},
    schema::ConfigError,
    serialize::SerializeError,
    store::{BatchError, StoreError},
};
use thiserror::Error as ThisError;

///
/// Error
///
/// Top-level error for repository operations. Configuration and validation
/// faults surface before any I/O; store faults surface after compensation
/// has been attempted, with [`RollbackError`] superseding the original
/// failure only when compensation itself failed.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Rollback(#[from] RollbackError),

    #[error("entity not found for partition key: {partition_key}")]
    NotFound { partition_key: String },

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl Error {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True when a failed save also failed to compensate, meaning stored
    /// data may be in an inconsistent state.
    #[must_use]
    pub const fn is_rollback_failure(&self) -> bool {
        matches!(self, Self::Rollback(_))
    }
}
