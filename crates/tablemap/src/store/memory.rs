use crate::{
    store::{BatchOp, PartitionStore, Row, StoreError, StoreLimits},
    value::AttrMap,
};
use async_trait::async_trait;
use std::{
    collections::BTreeMap,
    sync::{PoisonError, RwLock},
};

///
/// MemoryStore
///
/// In-process reference implementation of the partition-store contract.
/// Batches stage against a copy of the partition and swap in only when
/// every operation validates, so a failed batch has no observable partial
/// effects.
///

#[derive(Debug, Default)]
pub struct MemoryStore {
    partitions: RwLock<BTreeMap<String, BTreeMap<String, AttrMap>>>,
    limits: StoreLimits,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_limits(limits: StoreLimits) -> Self {
        Self {
            partitions: RwLock::new(BTreeMap::new()),
            limits,
        }
    }

    /// Number of rows currently stored in one partition.
    #[must_use]
    pub fn row_count(&self, partition_key: &str) -> usize {
        self.partitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(partition_key)
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl PartitionStore for MemoryStore {
    async fn get_partition(&self, partition_key: &str) -> Result<Vec<Row>, StoreError> {
        let partitions = self
            .partitions
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let rows = partitions
            .get(partition_key)
            .map(|partition| {
                partition
                    .iter()
                    .map(|(row_key, attrs)| Row {
                        partition_key: partition_key.to_string(),
                        row_key: row_key.clone(),
                        attrs: attrs.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(rows)
    }

    async fn submit_batch(
        &self,
        partition_key: &str,
        ops: Vec<BatchOp>,
    ) -> Result<(), StoreError> {
        if ops.is_empty() {
            return Err(StoreError::BatchRejected {
                message: "batch contains no operations".to_string(),
            });
        }
        if ops.len() > self.limits.max_batch_ops {
            return Err(StoreError::BatchRejected {
                message: format!(
                    "{} operations exceed the {}-operation limit",
                    ops.len(),
                    self.limits.max_batch_ops
                ),
            });
        }

        let mut partitions = self
            .partitions
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        // Stage against a copy; swap in only if every operation passes.
        let mut staged = partitions.get(partition_key).cloned().unwrap_or_default();
        for op in ops {
            match op {
                BatchOp::Upsert { row_key, attrs } => {
                    staged.insert(row_key, attrs);
                }
                BatchOp::Insert { row_key, attrs } => {
                    if staged.contains_key(&row_key) {
                        return Err(StoreError::RowExists { row_key });
                    }
                    staged.insert(row_key, attrs);
                }
                BatchOp::Update { row_key, attrs } => {
                    if !staged.contains_key(&row_key) {
                        return Err(StoreError::RowNotFound { row_key });
                    }
                    staged.insert(row_key, attrs);
                }
                BatchOp::Delete { row_key } => {
                    // Absent deletes are tolerated so compensation sweeps
                    // stay idempotent.
                    staged.remove(&row_key);
                }
            }
        }

        if staged.is_empty() {
            partitions.remove(partition_key);
        } else {
            partitions.insert(partition_key.to_string(), staged);
        }

        Ok(())
    }

    async fn get_row(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<Row>, StoreError> {
        let partitions = self
            .partitions
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        Ok(partitions
            .get(partition_key)
            .and_then(|partition| partition.get(row_key))
            .map(|attrs| Row {
                partition_key: partition_key.to_string(),
                row_key: row_key.to_string(),
                attrs: attrs.clone(),
            }))
    }

    async fn put_row(&self, row: Row) -> Result<(), StoreError> {
        let mut partitions = self
            .partitions
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        partitions
            .entry(row.partition_key)
            .or_default()
            .insert(row.row_key, row.attrs);

        Ok(())
    }

    async fn delete_row(&self, partition_key: &str, row_key: &str) -> Result<(), StoreError> {
        let mut partitions = self
            .partitions
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(partition) = partitions.get_mut(partition_key) {
            partition.remove(row_key);
            if partition.is_empty() {
                partitions.remove(partition_key);
            }
        }

        Ok(())
    }

    fn limits(&self) -> StoreLimits {
        self.limits
    }
}

///
/// TESTS
///
