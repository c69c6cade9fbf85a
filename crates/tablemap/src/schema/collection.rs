use crate::{
    error::Error,
    key::{KeyContext, KeyTemplate, RowKey},
    schema::{ConfigError, ParentProperty, ParentView, RootEntity, RowEntity, RowMatcher},
    serialize::{from_attrs, to_attrs},
    store::{BatchOp, Row},
};
use std::{
    any::{Any, TypeId},
    collections::BTreeMap,
};
use tracing::debug;

///
/// Collection
///
/// One registered child collection of a root: display name, optional
/// literal prefix, the pre-built classifier, and the type-erased binding
/// that carries the item type's codec and accessors.
///

pub struct Collection<R> {
    name: &'static str,
    prefix: &'static str,
    matcher: RowMatcher,
    binding: Box<dyn CollectionBinding<R>>,
}

impl<R: RootEntity> Collection<R> {
    pub(crate) fn bind<T: RowEntity>(
        name: &'static str,
        prefix: &'static str,
        template: Option<KeyTemplate>,
        matcher: RowMatcher,
        get_mut: fn(&mut R) -> &mut Vec<T>,
    ) -> Self {
        Self {
            name,
            prefix,
            matcher,
            binding: Box::new(TypedBinding {
                name,
                prefix,
                template,
                get_mut,
            }),
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        self.prefix
    }

    #[must_use]
    pub const fn matcher(&self) -> &RowMatcher {
        &self.matcher
    }

    #[must_use]
    pub fn item_type_id(&self) -> TypeId {
        self.binding.item_type_id()
    }

    #[must_use]
    pub fn item_type_name(&self) -> &'static str {
        self.binding.item_type_name()
    }

    pub(crate) fn plan_upserts(
        &self,
        root: &mut R,
        partition_key_prop: &ParentProperty<R>,
        parent_props: &[ParentProperty<R>],
        partition_key: &str,
    ) -> Result<Vec<BatchOp>, Error> {
        self.binding
            .plan_upserts(root, partition_key_prop, parent_props, partition_key)
    }

    pub(crate) fn hydrate(
        &self,
        rows: &[&Row],
        partition_key_name: &str,
        parent_out: &mut BTreeMap<String, String>,
    ) -> Result<Box<dyn Any>, Error> {
        self.binding.hydrate(rows, partition_key_name, parent_out)
    }

    pub(crate) fn attach(&self, root: &mut R, items: Box<dyn Any>) -> Result<(), Error> {
        self.binding.attach(root, items)
    }
}

///
/// CollectionBinding
///
/// Object-safe face of one item type: key resolution, row codec, and the
/// accessor that ties the hydrated list back onto the root.
///

pub(crate) trait CollectionBinding<R>: Send + Sync {
    fn item_type_id(&self) -> TypeId;

    fn item_type_name(&self) -> &'static str;

    fn plan_upserts(
        &self,
        root: &mut R,
        partition_key_prop: &ParentProperty<R>,
        parent_props: &[ParentProperty<R>],
        partition_key: &str,
    ) -> Result<Vec<BatchOp>, Error>;

    fn hydrate(
        &self,
        rows: &[&Row],
        partition_key_name: &str,
        parent_out: &mut BTreeMap<String, String>,
    ) -> Result<Box<dyn Any>, Error>;

    fn attach(&self, root: &mut R, items: Box<dyn Any>) -> Result<(), Error>;
}

struct TypedBinding<R, T> {
    name: &'static str,
    prefix: &'static str,
    template: Option<KeyTemplate>,
    get_mut: fn(&mut R) -> &mut Vec<T>,
}

impl<R: RootEntity, T: RowEntity> CollectionBinding<R> for TypedBinding<R, T> {
    fn item_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn item_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn plan_upserts(
        &self,
        root: &mut R,
        partition_key_prop: &ParentProperty<R>,
        parent_props: &[ParentProperty<R>],
        partition_key: &str,
    ) -> Result<Vec<BatchOp>, Error> {
        let mut items = std::mem::take((self.get_mut)(root));

        let result = self.plan_items(&mut items, root, partition_key_prop, parent_props, partition_key);

        *(self.get_mut)(root) = items;
        result
    }

    fn hydrate(
        &self,
        rows: &[&Row],
        partition_key_name: &str,
        parent_out: &mut BTreeMap<String, String>,
    ) -> Result<Box<dyn Any>, Error> {
        let mut items: Vec<T> = Vec::with_capacity(rows.len());

        for row in rows {
            let mut item: T = match from_attrs(&row.attrs) {
                Ok(item) => item,
                Err(error) => {
                    // A read degrades per row, never aborts the load.
                    debug!(
                        collection = self.name,
                        row_key = %row.row_key,
                        %error,
                        "skipping row that no longer restores",
                    );
                    continue;
                }
            };
            item.key_slot().assign(RowKey::new(row.row_key.clone()))?;

            if let Some(template) = &self.template {
                match template.decode(&row.row_key) {
                    Some(captures) => {
                        for (name, value) in captures {
                            // Item-own captures are redundant with stored
                            // attributes; the partition key is already known.
                            if row.attrs.contains_key(&name) || name == partition_key_name {
                                continue;
                            }
                            // First writer wins across all collections.
                            parent_out.entry(name).or_insert(value);
                        }
                    }
                    None => {
                        debug!(
                            collection = self.name,
                            row_key = %row.row_key,
                            "row key does not match template; skipping ancestor extraction",
                        );
                    }
                }
            }

            items.push(item);
        }

        Ok(Box::new(items))
    }

    fn attach(&self, root: &mut R, items: Box<dyn Any>) -> Result<(), Error> {
        let items = items.downcast::<Vec<T>>().map_err(|_| {
            Error::Internal(format!(
                "collection {:?} attach received a foreign item list",
                self.name
            ))
        })?;
        *(self.get_mut)(root) = *items;

        Ok(())
    }
}

impl<R: RootEntity, T: RowEntity> TypedBinding<R, T> {
    fn plan_items(
        &self,
        items: &mut [T],
        root: &R,
        partition_key_prop: &ParentProperty<R>,
        parent_props: &[ParentProperty<R>],
        partition_key: &str,
    ) -> Result<Vec<BatchOp>, Error> {
        let mut ops = Vec::with_capacity(items.len());

        for item in items.iter_mut() {
            let attrs = to_attrs(item)?;

            let row_key = match item.row_key() {
                Some(key) => key.clone(),
                None => {
                    let parent = ParentView::new(partition_key_prop, parent_props, root);
                    let resolved = match &self.template {
                        Some(template) => template.encode(&attrs, &parent)?,
                        None => {
                            let ctx = KeyContext {
                                partition_key,
                                prefix: self.prefix,
                                parent: &parent,
                            };
                            item.build_row_key(&ctx).ok_or(ConfigError::NoKeySource {
                                collection: self.name,
                                type_name: std::any::type_name::<T>(),
                            })?
                        }
                    };
                    let key = RowKey::new(resolved);
                    item.key_slot().assign(key.clone())?;
                    key
                }
            };

            ops.push(BatchOp::Upsert {
                row_key: row_key.into_string(),
                attrs,
            });
        }

        Ok(ops)
    }
}
