use crate::{
    error::Error,
    key::KeyError,
    schema::{RootEntity, RootSchema},
    store::{Batch, BatchOp, PartitionStore, StoreError, StoreLimits},
};
use std::collections::HashSet;
use thiserror::Error as ThisError;
use tracing::{debug, warn};

///
/// RollbackFailure
///
/// One compensation batch that failed to apply, leaving its row keys
/// possibly present in the store.
///

#[derive(Debug)]
pub struct RollbackFailure {
    pub batch_index: usize,
    pub row_keys: Vec<String>,
    pub error: StoreError,
}

///
/// RollbackError
///
/// A save failed AND one or more of its compensation batches failed. This
/// supersedes the original save error because inconsistent stored state is
/// the more urgent operational fact; the original error stays attached.
///

#[derive(Debug, ThisError)]
#[error(
    "rollback incomplete after failed save: {} compensation batch(es) failed and data may be in an inconsistent state (original error: {original})",
    .failures.len()
)]
pub struct RollbackError {
    pub original: Box<Error>,
    pub failures: Vec<RollbackFailure>,
}

///
/// SaveTransaction
///
/// Committed batches of one save call, in submission order. Lives only for
/// the duration of the call; on failure it becomes the rollback input.
///

pub(crate) struct SaveTransaction {
    partition_key: String,
    committed: Vec<Batch>,
}

impl SaveTransaction {
    fn new(partition_key: &str) -> Self {
        Self {
            partition_key: partition_key.to_string(),
            committed: Vec::new(),
        }
    }

    fn record(&mut self, batch: Batch) {
        self.committed.push(batch);
    }

    fn partition_key(&self) -> &str {
        &self.partition_key
    }

    fn committed(&self) -> &[Batch] {
        &self.committed
    }

    /// Compensating delete operations covering every committed row key, in
    /// commit order, re-chunked to the store's batch bound.
    fn rollback_ops(&self, limits: StoreLimits) -> Vec<Vec<BatchOp>> {
        let mut seen = HashSet::new();
        let mut chunks = Vec::new();
        let mut current = Vec::new();

        for batch in &self.committed {
            for row_key in batch.row_keys() {
                if !seen.insert(row_key.to_string()) {
                    continue;
                }
                if current.len() == limits.max_batch_ops {
                    chunks.push(std::mem::take(&mut current));
                }
                current.push(BatchOp::Delete {
                    row_key: row_key.to_string(),
                });
            }
        }
        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }
}

///
/// SaveExecutor
///
/// Plans a root's records into size-bounded batches, submits them in order
/// (sequentially, so compensation can walk the same order), and compensates
/// committed batches when a later step fails.
///

pub(crate) struct SaveExecutor<'a, R: RootEntity, S: PartitionStore> {
    schema: &'a RootSchema<R>,
    store: &'a S,
    limits: StoreLimits,
}

impl<'a, R: RootEntity, S: PartitionStore> SaveExecutor<'a, R, S> {
    pub(crate) const fn new(schema: &'a RootSchema<R>, store: &'a S, limits: StoreLimits) -> Self {
        Self {
            schema,
            store,
            limits,
        }
    }

    pub(crate) async fn save(&self, root: &mut R) -> Result<(), Error> {
        let partition_key = (self.schema.partition_key().get)(root);
        if partition_key.is_empty() {
            return Err(KeyError::EmptyPartitionKey.into());
        }

        let mut ops = Vec::new();
        for collection in self.schema.collections() {
            ops.extend(collection.plan_upserts(
                root,
                self.schema.partition_key(),
                self.schema.parent_props(),
                &partition_key,
            )?);
        }
        debug!(partition_key = %partition_key, ops = ops.len(), "planned save");

        // Reconcile removals: a record dropped from a collection leaves a
        // stale stored row, which a full-state save must delete. Rollback
        // cannot restore these rows; that is part of the best-effort
        // contract.
        let planned: HashSet<String> = ops.iter().map(|op| op.row_key().to_string()).collect();
        let stale: Vec<BatchOp> = self
            .store
            .get_partition(&partition_key)
            .await?
            .into_iter()
            .filter(|row| !planned.contains(&row.row_key))
            .map(|row| BatchOp::Delete {
                row_key: row.row_key,
            })
            .collect();
        if !stale.is_empty() {
            debug!(partition_key = %partition_key, stale = stale.len(), "deleting removed rows");
            ops.extend(stale);
        }

        let mut txn = SaveTransaction::new(&partition_key);
        match self.submit_all(&partition_key, ops, &mut txn).await {
            Ok(()) => Ok(()),
            Err(original) => {
                warn!(
                    partition_key = %partition_key,
                    committed = txn.committed().len(),
                    %original,
                    "save failed; compensating committed batches",
                );
                let failures = self.roll_back(&txn).await;
                if failures.is_empty() {
                    // The caller must see the real cause, not a wrapper.
                    Err(original)
                } else {
                    Err(RollbackError {
                        original: Box::new(original),
                        failures,
                    }
                    .into())
                }
            }
        }
    }

    /// Stream operations into a running batch; each batch submits as soon
    /// as it fills, so a later validation fault still finds earlier batches
    /// committed and compensable.
    async fn submit_all(
        &self,
        partition_key: &str,
        ops: Vec<BatchOp>,
        txn: &mut SaveTransaction,
    ) -> Result<(), Error> {
        let mut batch = Batch::new(partition_key, self.limits);
        for op in ops {
            batch.push(op)?;
            if batch.is_full() {
                let sealed = std::mem::replace(&mut batch, Batch::new(partition_key, self.limits));
                self.submit(txn, sealed).await?;
            }
        }
        if !batch.is_empty() {
            self.submit(txn, batch).await?;
        }

        Ok(())
    }

    async fn submit(&self, txn: &mut SaveTransaction, batch: Batch) -> Result<(), Error> {
        debug!(
            batch = txn.committed().len(),
            ops = batch.len(),
            "submitting batch",
        );
        self.store
            .submit_batch(batch.partition_key(), batch.to_ops())
            .await?;
        txn.record(batch);

        Ok(())
    }

    /// Best-effort compensation: every batch is attempted even when an
    /// earlier one fails, and every failure is collected for the caller.
    async fn roll_back(&self, txn: &SaveTransaction) -> Vec<RollbackFailure> {
        let mut failures = Vec::new();

        for (batch_index, ops) in txn.rollback_ops(self.limits).into_iter().enumerate() {
            let row_keys: Vec<String> = ops.iter().map(|op| op.row_key().to_string()).collect();
            if let Err(error) = self.store.submit_batch(txn.partition_key(), ops).await {
                warn!(
                    batch = batch_index,
                    rows = row_keys.len(),
                    %error,
                    "compensation batch failed",
                );
                failures.push(RollbackFailure {
                    batch_index,
                    row_keys,
                    error,
                });
            }
        }

        failures
    }
}
