pub mod builder;
pub mod classify;
pub mod collection;


use crate::key::{KeyContext, KeySlot, PropertySource, RowKey, TemplateError};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error as ThisError;

// re-exports
pub use builder::SchemaBuilder;
pub use classify::RowMatcher;
pub use collection::Collection;

///
/// ConfigError
///
/// Schema registration faults. Raised at repository construction or at
/// first use; never retried.
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("root type {root} declares no partition-key property")]
    MissingPartitionKey { root: &'static str },

    #[error("root type {root} declares collection {collection:?} more than once")]
    DuplicateCollection {
        root: &'static str,
        collection: &'static str,
    },

    #[error("collection {collection:?} has a malformed key template: {source}")]
    Template {
        collection: &'static str,
        #[source]
        source: TemplateError,
    },

    #[error(
        "collection {collection:?} ({type_name}) has no key source: no template, no key routine, and the record carries no key"
    )]
    NoKeySource {
        collection: &'static str,
        type_name: &'static str,
    },

    #[error("no collection is registered for item type {type_name}")]
    NoSuchCollection { type_name: &'static str },
}

///
/// RootEntity
///
/// A partition root: one entity type whose declared schema maps it and its
/// child collections onto partition/row key space. The schema is built from
/// static registration code exactly once, at repository construction.
///

pub trait RootEntity: Default + Send + Sync + Sized + 'static {
    fn schema() -> Result<RootSchema<Self>, ConfigError>;
}

///
/// RowEntity
///
/// One record inside a root's collection. Identity lives in a [`KeySlot`]
/// kept out of the attribute bag (`#[serde(skip)]` on the field). Restore
/// tolerance expects the type to accept missing fields (`#[serde(default)]`
/// or `Option` fields).
///

pub trait RowEntity:
    Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Declared row-key template, resolved item-first then parent.
    const KEY_TEMPLATE: Option<&'static str> = None;

    /// Literal token that uniquely appears in this type's row keys.
    const KEYWORD: Option<&'static str> = None;

    fn key_slot(&mut self) -> &mut KeySlot;

    fn row_key(&self) -> Option<&RowKey>;

    /// Key-construction routine for self-keyed types that build their row
    /// key programmatically instead of declaring a template.
    fn build_row_key(&self, _ctx: &KeyContext<'_>) -> Option<String> {
        None
    }
}

///
/// ParentProperty
///
/// One registered root-level string property: the accessor pair replaces
/// reflection for placeholder resolution and decode write-back.
///

pub struct ParentProperty<R> {
    pub name: &'static str,
    pub get: fn(&R) -> String,
    pub set: fn(&mut R, String),
}

///
/// RootSchema
///
/// Immutable descriptor set for one root type: the partition-key accessor,
/// the registered parent properties, and the collection bindings with their
/// pre-built classifiers. Computed once and shared read-only across
/// concurrent repository calls.
///

pub struct RootSchema<R> {
    root_name: &'static str,
    partition_key: ParentProperty<R>,
    parent_props: Vec<ParentProperty<R>>,
    collections: Vec<Collection<R>>,
}

impl<R: RootEntity> RootSchema<R> {
    #[must_use]
    pub fn builder(root_name: &'static str) -> SchemaBuilder<R> {
        SchemaBuilder::new(root_name)
    }

    #[must_use]
    pub const fn root_name(&self) -> &'static str {
        self.root_name
    }

    #[must_use]
    pub const fn partition_key(&self) -> &ParentProperty<R> {
        &self.partition_key
    }

    #[must_use]
    pub fn parent_props(&self) -> &[ParentProperty<R>] {
        &self.parent_props
    }

    #[must_use]
    pub fn parent_property(&self, name: &str) -> Option<&ParentProperty<R>> {
        self.parent_props.iter().find(|prop| prop.name == name)
    }

    #[must_use]
    pub fn collections(&self) -> &[Collection<R>] {
        &self.collections
    }

    #[must_use]
    pub fn collection_for<T: 'static>(&self) -> Option<&Collection<R>> {
        self.collections
            .iter()
            .find(|collection| collection.item_type_id() == std::any::TypeId::of::<T>())
    }

    pub(crate) const fn from_parts(
        root_name: &'static str,
        partition_key: ParentProperty<R>,
        parent_props: Vec<ParentProperty<R>>,
        collections: Vec<Collection<R>>,
    ) -> Self {
        Self {
            root_name,
            partition_key,
            parent_props,
            collections,
        }
    }
}

///
/// ParentView
///
/// Property lookup over one root instance, driven by the registered
/// accessor map: the partition-key property plus every parent property.
///

pub(crate) struct ParentView<'a, R> {
    partition_key: &'a ParentProperty<R>,
    props: &'a [ParentProperty<R>],
    root: &'a R,
}

impl<'a, R> ParentView<'a, R> {
    pub(crate) const fn new(
        partition_key: &'a ParentProperty<R>,
        props: &'a [ParentProperty<R>],
        root: &'a R,
    ) -> Self {
        Self {
            partition_key,
            props,
            root,
        }
    }
}

impl<R> PropertySource for ParentView<'_, R> {
    fn property(&self, name: &str) -> Option<String> {
        if name == self.partition_key.name {
            return Some((self.partition_key.get)(self.root));
        }
        self.props
            .iter()
            .find(|prop| prop.name == name)
            .map(|prop| (prop.get)(self.root))
    }
}
