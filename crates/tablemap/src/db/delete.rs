use crate::{
    error::Error,
    store::{BatchOp, PartitionStore, StoreLimits},
};
use tracing::debug;

///
/// DeleteExecutor
///
/// Purges one partition in size-bounded delete batches. No compensation:
/// deletion is self-compensating, since a partial delete leaves fewer rows
/// rather than corrupt state.
///

pub(crate) struct DeleteExecutor<'a, S: PartitionStore> {
    store: &'a S,
    limits: StoreLimits,
}

impl<'a, S: PartitionStore> DeleteExecutor<'a, S> {
    pub(crate) const fn new(store: &'a S, limits: StoreLimits) -> Self {
        Self { store, limits }
    }

    /// Delete every row of the partition; returns the row count removed.
    pub(crate) async fn delete_partition(&self, partition_key: &str) -> Result<usize, Error> {
        let rows = self.store.get_partition(partition_key).await?;
        if rows.is_empty() {
            return Ok(0);
        }
        debug!(partition_key = %partition_key, rows = rows.len(), "deleting partition");

        for chunk in rows.chunks(self.limits.max_batch_ops) {
            let ops = chunk
                .iter()
                .map(|row| BatchOp::Delete {
                    row_key: row.row_key.clone(),
                })
                .collect();
            self.store.submit_batch(partition_key, ops).await?;
        }

        Ok(rows.len())
    }
}
