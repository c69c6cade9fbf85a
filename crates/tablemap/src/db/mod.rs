mod delete;
mod load;
pub mod save;

#[cfg(test)]
mod tests;

use crate::{
    db::{delete::DeleteExecutor, load::LoadExecutor, save::SaveExecutor},
    error::Error,
    schema::{ConfigError, RootEntity, RootSchema, RowEntity},
    store::{PartitionStore, Row, StoreLimits},
};
use std::collections::BTreeMap;

// re-exports
pub use save::{RollbackError, RollbackFailure};

///
/// Repository
///
/// The facade over one root type and one partition store. The schema is
/// built once at construction and shared read-only across concurrent
/// calls; each call owns its own batch bookkeeping, so no locking exists
/// at this layer.
///

pub struct Repository<R: RootEntity, S: PartitionStore> {
    schema: RootSchema<R>,
    store: S,
    limits: StoreLimits,
}

impl<R: RootEntity, S: PartitionStore> Repository<R, S> {
    /// Build the repository, running schema registration. Configuration
    /// faults surface here, before any I/O is possible.
    pub fn new(store: S) -> Result<Self, Error> {
        let schema = R::schema()?;
        let limits = store.limits();

        Ok(Self {
            schema,
            store,
            limits,
        })
    }

    #[must_use]
    pub const fn schema(&self) -> &RootSchema<R> {
        &self.schema
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Load the root for one partition key. An empty partition loads as
    /// `None`; not-found is a normal outcome, not an error.
    pub async fn find(&self, partition_key: &str) -> Result<Option<R>, Error> {
        LoadExecutor::new(&self.schema, &self.store)
            .find(partition_key)
            .await
    }

    /// Load the root for one partition key, raising for callers that
    /// require existence.
    pub async fn find_or_err(&self, partition_key: &str) -> Result<R, Error> {
        self.find(partition_key)
            .await?
            .ok_or_else(|| Error::NotFound {
                partition_key: partition_key.to_string(),
            })
    }

    /// Persist the root and every record of its collections as upserts,
    /// in size-bounded atomic batches with best-effort compensation.
    /// Records gain their row keys here, assigned exactly once.
    pub async fn save(&self, root: &mut R) -> Result<(), Error> {
        SaveExecutor::new(&self.schema, &self.store, self.limits)
            .save(root)
            .await
    }

    /// Delete every row of one partition; returns the rows removed.
    pub async fn delete_partition(&self, partition_key: &str) -> Result<usize, Error> {
        DeleteExecutor::new(&self.store, self.limits)
            .delete_partition(partition_key)
            .await
    }

    /// Load only the collection of item type `T`, classified out of the
    /// partition's rows. An empty partition yields an empty list.
    pub async fn query<T: RowEntity>(&self, partition_key: &str) -> Result<Vec<T>, Error> {
        let Some(collection) = self.schema.collection_for::<T>() else {
            return Err(ConfigError::NoSuchCollection {
                type_name: std::any::type_name::<T>(),
            }
            .into());
        };

        let rows = self.store.get_partition(partition_key).await?;
        let bucket: Vec<&Row> = rows
            .iter()
            .filter(|row| collection.matcher().matches(&row.row_key))
            .collect();

        let mut scratch = BTreeMap::new();
        let boxed = collection.hydrate(&bucket, self.schema.partition_key().name, &mut scratch)?;
        let items = boxed
            .downcast::<Vec<T>>()
            .map_err(|_| Error::Internal("typed query downcast mismatch".to_string()))?;

        Ok(*items)
    }

    /// Row-key prefix scan over one partition, returning raw rows.
    pub async fn query_prefix(
        &self,
        partition_key: &str,
        prefix: &str,
    ) -> Result<Vec<Row>, Error> {
        let rows = self.store.get_partition(partition_key).await?;

        Ok(rows
            .into_iter()
            .filter(|row| row.row_key.starts_with(prefix))
            .collect())
    }
}
