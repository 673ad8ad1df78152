//! Process-wide lookup of schemas by namespace and name.

use std::{
    collections::HashMap,
    sync::{Arc, LazyLock},
};

use parking_lot::RwLock;

use crate::{
    error::{MapperError, MapperResult},
    schema::DocumentSchema,
};

static GLOBAL: LazyLock<Arc<Registry>> = LazyLock::new(|| Arc::new(Registry::new()));

type Namespaced = HashMap<String, HashMap<String, Arc<DocumentSchema>>>;

#[derive(Debug, Default)]
struct RegistryState {
    types: Namespaced,
    collections: Namespaced,
}

/// Schemas keyed by namespace and type name, and by namespace and collection.
///
/// Registration is append-only: registering a name twice in one namespace is rejected.
/// Named document references are resolved in a second phase by [`Registry::link`].
#[derive(Debug, Default)]
pub struct Registry {
    state: RwLock<RegistryState>,
}

impl Registry {
    /// Creates an empty private registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by [`SchemaBuilder::build`](crate::schema::SchemaBuilder::build).
    pub fn global() -> Arc<Registry> {
        Arc::clone(&GLOBAL)
    }

    /// Registers a schema under its namespace.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::InvalidConfig`] if the schema has no namespace or its name
    /// is already taken in that namespace.
    pub fn register(&self, schema: Arc<DocumentSchema>) -> MapperResult<()> {
        let namespace = schema.namespace().ok_or_else(|| {
            MapperError::InvalidConfig(format!("{} has no namespace", schema.name()))
        })?;

        let mut state = self.state.write();

        let types = state.types.entry(namespace.to_string()).or_default();
        if types.contains_key(schema.name()) {
            return Err(MapperError::InvalidConfig(format!(
                "{namespace}.{} is already registered",
                schema.name()
            )));
        }
        types.insert(schema.name().to_string(), Arc::clone(&schema));

        state
            .collections
            .entry(namespace.to_string())
            .or_default()
            .entry(schema.collection().to_string())
            .or_insert_with(|| Arc::clone(&schema));

        log::debug!(
            "registered schema {namespace}.{} for collection {}",
            schema.name(),
            schema.collection()
        );

        Ok(())
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<Arc<DocumentSchema>> {
        self.state
            .read()
            .types
            .get(namespace)
            .and_then(|types| types.get(name))
            .cloned()
    }

    /// The first schema registered for `collection` in `namespace`.
    pub fn by_collection(&self, namespace: &str, collection: &str) -> Option<Arc<DocumentSchema>> {
        self.state
            .read()
            .collections
            .get(namespace)
            .and_then(|collections| collections.get(collection))
            .cloned()
    }

    /// Every registered schema, in no particular order.
    pub fn schemas(&self) -> Vec<Arc<DocumentSchema>> {
        self.state
            .read()
            .types
            .values()
            .flat_map(|types| types.values().cloned())
            .collect()
    }

    /// Resolves every named document reference of every registered schema.
    ///
    /// Resolution is idempotent; already resolved references are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::BadFieldSpecification`] naming the first reference whose
    /// target is not registered in the referring schema's namespace.
    pub fn link(&self) -> MapperResult<()> {
        let state = self.state.read();

        for (namespace, types) in &state.types {
            for schema in types.values() {
                let mut missing = None;

                for (_, field) in schema.fields() {
                    field.walk(&mut |field| {
                        let Some(target) = field.kind().document_target() else {
                            return;
                        };
                        let Some(name) = target.pending_name() else {
                            return;
                        };

                        match types.get(name) {
                            Some(resolved) => target.resolve_with(Arc::clone(resolved)),
                            None => {
                                missing.get_or_insert_with(|| name.to_string());
                            }
                        }
                    });
                }

                if let Some(name) = missing {
                    return Err(MapperError::BadFieldSpecification(format!(
                        "{namespace}.{} refers to unknown type {name}",
                        schema.name()
                    )));
                }
            }
        }

        log::trace!("linked {} namespaces", state.types.len());
        Ok(())
    }
}
