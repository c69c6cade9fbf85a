use crate::{
    error::Error,
    schema::{RootEntity, RootSchema},
    store::{PartitionStore, Row},
};
use std::{any::Any, collections::BTreeMap};
use tracing::debug;

///
/// LoadExecutor
///
/// Rebuilds a root and its typed collections from the flat row list of one
/// partition fetch. An empty partition is indistinguishable from a missing
/// entity and loads as "not found".
///

pub(crate) struct LoadExecutor<'a, R: RootEntity, S: PartitionStore> {
    schema: &'a RootSchema<R>,
    store: &'a S,
}

impl<'a, R: RootEntity, S: PartitionStore> LoadExecutor<'a, R, S> {
    pub(crate) const fn new(schema: &'a RootSchema<R>, store: &'a S) -> Self {
        Self { schema, store }
    }

    pub(crate) async fn find(&self, partition_key: &str) -> Result<Option<R>, Error> {
        let rows = self.store.get_partition(partition_key).await?;
        if rows.is_empty() {
            return Ok(None);
        }
        debug!(partition_key = %partition_key, rows = rows.len(), "hydrating partition");

        self.hydrate(partition_key, &rows).map(Some)
    }

    fn hydrate(&self, partition_key: &str, rows: &[Row]) -> Result<R, Error> {
        let mut root = R::default();
        (self.schema.partition_key().set)(&mut root, partition_key.to_string());

        let partition_key_name = self.schema.partition_key().name;
        let mut parent_props: BTreeMap<String, String> = BTreeMap::new();
        let mut hydrated: Vec<Box<dyn Any>> = Vec::with_capacity(self.schema.collections().len());

        for collection in self.schema.collections() {
            let bucket: Vec<&Row> = rows
                .iter()
                .filter(|row| collection.matcher().matches(&row.row_key))
                .collect();
            hydrated.push(collection.hydrate(&bucket, partition_key_name, &mut parent_props)?);
        }

        // Ancestor properties accumulated across every collection apply
        // before any item list attaches.
        for (name, value) in parent_props {
            match self.schema.parent_property(&name) {
                Some(prop) => (prop.set)(&mut root, value),
                None => {
                    debug!(
                        property = %name,
                        "decoded ancestor property has no registered setter",
                    );
                }
            }
        }

        for (collection, items) in self.schema.collections().iter().zip(hydrated) {
            collection.attach(&mut root, items)?;
        }

        Ok(root)
    }
}
