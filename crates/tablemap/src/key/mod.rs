pub mod template;

#[cfg(test)]
mod tests;

use crate::{MAX_ROW_KEY_BYTES, value::AttrMap};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

// re-exports
pub use template::{KeyTemplate, TemplateError};

/// Characters the store refuses inside a row key.
pub const FORBIDDEN_KEY_CHARS: [char; 4] = ['/', '\\', '#', '?'];

///
/// KeyError
///

#[derive(Debug, ThisError)]
pub enum KeyError {
    #[error("row key is empty")]
    Empty,

    #[error("row key contains forbidden character {ch:?}: {key}")]
    ForbiddenCharacter { key: String, ch: char },

    #[error("row key exceeds {max} bytes: {len} bytes")]
    TooLong { len: usize, max: usize },

    #[error("partition key property is empty at save time")]
    EmptyPartitionKey,

    #[error("row key already assigned: {existing}")]
    AlreadyAssigned { existing: String },
}

/// Check a row key against the store's key constraints.
///
/// Constraint checking belongs to batch build, not to the codec: a template
/// may legally produce an out-of-contract key, and the failure surfaces when
/// the key is about to enter a batch.
pub fn validate_row_key(key: &str, max_bytes: usize) -> Result<(), KeyError> {
    if key.is_empty() {
        return Err(KeyError::Empty);
    }
    if key.len() > max_bytes {
        return Err(KeyError::TooLong {
            len: key.len(),
            max: max_bytes,
        });
    }
    for ch in key.chars() {
        if ch.is_control() || FORBIDDEN_KEY_CHARS.contains(&ch) {
            return Err(KeyError::ForbiddenCharacter {
                key: key.to_string(),
                ch,
            });
        }
    }

    Ok(())
}

///
/// RowKey
///
/// Identity of a record within one partition. A `RowKey` is plain text;
/// store-contract validation happens where keys enter a batch.
///

#[derive(
    Clone, Debug, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[display("{_0}")]
pub struct RowKey(String);

impl RowKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }

    /// Validate against the default store contract.
    pub fn validate(&self) -> Result<(), KeyError> {
        validate_row_key(&self.0, MAX_ROW_KEY_BYTES)
    }
}

impl AsRef<str> for RowKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

///
/// KeySlot
///
/// Assign-once identity holder. The slot starts empty and transitions to a
/// key exactly once; regeneration attempts are rejected rather than
/// silently overwriting identity.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct KeySlot(Option<RowKey>);

impl KeySlot {
    #[must_use]
    pub const fn new() -> Self {
        Self(None)
    }

    #[must_use]
    pub const fn get(&self) -> Option<&RowKey> {
        self.0.as_ref()
    }

    #[must_use]
    pub const fn is_assigned(&self) -> bool {
        self.0.is_some()
    }

    pub fn assign(&mut self, key: RowKey) -> Result<(), KeyError> {
        match &self.0 {
            Some(existing) => Err(KeyError::AlreadyAssigned {
                existing: existing.as_str().to_string(),
            }),
            None => {
                self.0 = Some(key);
                Ok(())
            }
        }
    }
}

///
/// PropertySource
///
/// Named-property lookup used by the row-key codec. Items resolve through
/// their serialized attribute map; roots resolve through the schema's
/// registered accessor map.
///

pub trait PropertySource {
    fn property(&self, name: &str) -> Option<String>;
}

impl PropertySource for AttrMap {
    fn property(&self, name: &str) -> Option<String> {
        self.get(name).and_then(crate::value::Value::as_property)
    }
}

///
/// KeyContext
///
/// Context handed to a self-keyed record's own key-construction routine:
/// the parent root's properties, the collection's literal prefix, and the
/// partition key of the save in progress.
///

pub struct KeyContext<'a> {
    pub partition_key: &'a str,
    pub prefix: &'a str,
    pub parent: &'a dyn PropertySource,
}
