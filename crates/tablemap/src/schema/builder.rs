use crate::{
    key::KeyTemplate,
    schema::{
        Collection, ConfigError, ParentProperty, RootEntity, RootSchema, RowEntity,
        classify::build_matcher,
    },
};

type BuildFn<R> =
    Box<dyn FnOnce(&ParentProperty<R>, &[ParentProperty<R>]) -> Result<Collection<R>, ConfigError>>;

struct PendingCollection<R> {
    name: &'static str,
    build: BuildFn<R>,
}

///
/// SchemaBuilder
///
/// Static registration surface for one root type. Collection bindings are
/// deferred until `build` so classifier synthesis sees the full parent
/// accessor map regardless of registration order.
///

pub struct SchemaBuilder<R: RootEntity> {
    root_name: &'static str,
    partition_key: Option<ParentProperty<R>>,
    parent_props: Vec<ParentProperty<R>>,
    pending: Vec<PendingCollection<R>>,
}

impl<R: RootEntity> SchemaBuilder<R> {
    pub(crate) const fn new(root_name: &'static str) -> Self {
        Self {
            root_name,
            partition_key: None,
            parent_props: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Register the single property that sources the partition key.
    #[must_use]
    pub fn partition_key(
        mut self,
        name: &'static str,
        get: fn(&R) -> String,
        set: fn(&mut R, String),
    ) -> Self {
        self.partition_key = Some(ParentProperty { name, get, set });
        self
    }

    /// Register a root-level string property that key templates may
    /// reference and that decode writes back onto the root.
    #[must_use]
    pub fn parent_property(
        mut self,
        name: &'static str,
        get: fn(&R) -> String,
        set: fn(&mut R, String),
    ) -> Self {
        self.parent_props.push(ParentProperty { name, get, set });
        self
    }

    /// Register a child collection keyed by the item type's declarations.
    #[must_use]
    pub fn collection<T: RowEntity>(
        self,
        name: &'static str,
        get_mut: fn(&mut R) -> &mut Vec<T>,
    ) -> Self {
        self.collection_inner(name, "", get_mut)
    }

    /// Register a child collection carrying a literal row-key prefix.
    #[must_use]
    pub fn collection_with_prefix<T: RowEntity>(
        self,
        name: &'static str,
        prefix: &'static str,
        get_mut: fn(&mut R) -> &mut Vec<T>,
    ) -> Self {
        self.collection_inner(name, prefix, get_mut)
    }

    fn collection_inner<T: RowEntity>(
        mut self,
        name: &'static str,
        prefix: &'static str,
        get_mut: fn(&mut R) -> &mut Vec<T>,
    ) -> Self {
        self.pending.push(PendingCollection {
            name,
            build: Box::new(move |partition_key, parent_props| {
                let template = match T::KEY_TEMPLATE {
                    Some(raw) => Some(KeyTemplate::parse(raw).map_err(|source| {
                        ConfigError::Template {
                            collection: name,
                            source,
                        }
                    })?),
                    None => None,
                };

                let matcher = build_matcher::<R, T>(
                    prefix,
                    template.as_ref(),
                    partition_key,
                    parent_props,
                );

                Ok(Collection::bind::<T>(
                    name, prefix, template, matcher, get_mut,
                ))
            }),
        });
        self
    }

    /// Materialize the immutable schema. Fails fast on a missing
    /// partition-key registration, duplicate collection names, or a
    /// malformed template.
    pub fn build(self) -> Result<RootSchema<R>, ConfigError> {
        let partition_key = self
            .partition_key
            .ok_or(ConfigError::MissingPartitionKey {
                root: self.root_name,
            })?;

        let mut collections = Vec::with_capacity(self.pending.len());
        for pending in self.pending {
            if collections
                .iter()
                .any(|existing: &Collection<R>| existing.name() == pending.name)
            {
                return Err(ConfigError::DuplicateCollection {
                    root: self.root_name,
                    collection: pending.name,
                });
            }
            collections.push((pending.build)(&partition_key, &self.parent_props)?);
        }

        Ok(RootSchema::from_parts(
            self.root_name,
            partition_key,
            self.parent_props,
            collections,
        ))
    }
}
