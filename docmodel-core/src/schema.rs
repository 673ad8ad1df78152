//! Document schemas.
//!
//! A [`DocumentSchema`] is the ordered set of fields that make up one document type,
//! together with its collection name, namespace, extra-field policy, indexes and default
//! sort. Schemas are built once with a [`SchemaBuilder`] and shared through an `Arc`;
//! they are immutable afterwards.
//!
//! A schema may extend another one. The subclass inherits every field and, when the
//! parent stores its subclasses in its own collection, the collection too. A parent
//! that is polymorphic names a discriminator field; each subclass declares the value it
//! stores there, and loading a record picks the most specific subclass it names.
//!
//! # Example
//!
//! ```ignore
//! use docmodel_core::{field::{Field, IntField, StringField}, schema::DocumentSchema};
//!
//! let person = DocumentSchema::builder("Person")
//!     .collection("people")
//!     .field("name", StringField::new())
//!     .field("age", Field::new(IntField::new().min(0)).optional())
//!     .build()?;
//! ```

use std::{
    collections::HashSet,
    sync::{Arc, Weak},
};

use bson::Bson;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{
    error::{MapperError, MapperResult},
    field::{ComputedField, Field, ObjectIdField, OnUpdate, PolymorphicField},
    index::Index,
    query::SortDirection,
    registry::Registry,
    value::Value,
};

/// Namespace schemas are registered in unless configured otherwise.
pub const DEFAULT_NAMESPACE: &str = "global";

/// Storage key of the identity field.
pub const ID_KEY: &str = "_id";

/// Name of the identity field added when a schema declares none.
pub const DEFAULT_ID_FIELD: &str = "mongo_id";

/// What to do with keys that do not match a declared field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtraFields {
    /// Reject them with [`MapperError::ExtraValue`].
    #[default]
    Error,
    /// Keep them verbatim alongside the declared fields.
    Ignore,
}

/// An immutable document type description.
#[derive(Debug)]
pub struct DocumentSchema {
    name: String,
    namespace: Option<String>,
    collection: String,
    extra_fields: ExtraFields,
    fields: IndexMap<String, Arc<Field>>,
    id_field: String,
    indexes: Vec<Index>,
    default_sort: Vec<(String, SortDirection)>,
    parent: Option<Arc<DocumentSchema>>,
    polymorphic_on: Option<String>,
    polymorphic_identity: Option<String>,
    polymorphic_collection: bool,
    subclasses: RwLock<IndexMap<String, Weak<DocumentSchema>>>,
}

impl DocumentSchema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn extra_fields(&self) -> ExtraFields {
        self.extra_fields
    }

    /// Declared fields in declaration order, the identity field included.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields
            .iter()
            .map(|(name, field)| (name.as_str(), field.as_ref()))
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name).map(Arc::as_ref)
    }

    /// Looks up a field by the key it is stored under.
    pub fn field_by_storage_name(&self, storage: &str) -> Option<(&str, &Field)> {
        self.fields()
            .find(|(_, field)| field.storage_name() == storage)
    }

    pub fn id_name(&self) -> &str {
        &self.id_field
    }

    pub fn id_field(&self) -> Option<&Field> {
        self.field(&self.id_field)
    }

    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    /// Default sort as storage paths.
    pub fn default_sort(&self) -> &[(String, SortDirection)] {
        &self.default_sort
    }

    /// The schema this one extends.
    pub fn parent(&self) -> Option<&Arc<DocumentSchema>> {
        self.parent.as_ref()
    }

    /// Name of the field whose value selects a subclass on load.
    pub fn polymorphic_on(&self) -> Option<&str> {
        self.polymorphic_on.as_deref()
    }

    /// The discriminator value identifying this schema among its parent's subclasses.
    pub fn polymorphic_identity(&self) -> Option<&str> {
        self.polymorphic_identity.as_deref()
    }

    pub fn is_polymorphic_collection(&self) -> bool {
        self.polymorphic_collection
    }

    /// The direct subclasses that are still alive, keyed by identity.
    pub fn subclasses(&self) -> Vec<Arc<DocumentSchema>> {
        self.subclasses
            .read()
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Whether `self` is `other` or extends it, directly or not.
    pub fn is_subclass_of(&self, other: &DocumentSchema) -> bool {
        let mut current = Some(self);

        while let Some(schema) = current {
            if std::ptr::eq(schema, other) {
                return true;
            }
            current = schema.parent.as_deref();
        }

        false
    }

    /// The most specific subclass the discriminators of `native` name, or `None` when
    /// `self` is the right schema for it.
    pub fn subclass_for(&self, native: &bson::Document) -> Option<Arc<DocumentSchema>> {
        let key = self.polymorphic_on.as_deref()?;
        let storage = self.field(key)?.storage_name();
        let identity = native.get(storage)?.as_str()?;
        let subclass = self.subclasses.read().get(identity)?.upgrade()?;

        Some(subclass.subclass_for(native).unwrap_or(subclass))
    }

    /// Field name and value of every discriminator a new document of this schema
    /// carries, the most specific first.
    pub fn discriminators(&self) -> Vec<(&str, &str)> {
        let mut stamped: Vec<(&str, &str)> = Vec::new();
        let mut current = self;

        while let Some(parent) = current.parent.as_deref() {
            if let (Some(identity), Some(key)) = (
                current.polymorphic_identity.as_deref(),
                parent.polymorphic_on.as_deref(),
            ) {
                if !stamped.iter().any(|(name, _)| *name == key) {
                    stamped.push((key, identity));
                }
            }
            current = parent;
        }

        stamped
    }

    /// Storage key and value this schema is registered under in its parent.
    fn registration(&self) -> Option<(&str, &str)> {
        let key = self.parent.as_deref()?.polymorphic_on.as_deref()?;
        let storage = self.field(key)?.storage_name();
        Some((storage, self.polymorphic_identity.as_deref()?))
    }

    fn collect_identities(&self, storage: &str, out: &mut Vec<Bson>) {
        for subclass in self.subclasses() {
            if let Some((key, identity)) = subclass.registration() {
                if key == storage {
                    out.push(Bson::String(identity.to_string()));
                }
            }
            subclass.collect_identities(storage, out);
        }
    }

    /// The predicate every query on this schema starts from.
    ///
    /// A subclass matches records carrying its identity, or one of its subclasses'
    /// identities. With `exclude_subclasses`, records of any subclass are left out.
    /// Schemas outside any hierarchy get an empty predicate.
    pub fn base_filter(&self, exclude_subclasses: bool) -> bson::Document {
        let mut filter = bson::Document::new();
        let registered = self.registration();

        if let Some((storage, identity)) = registered {
            let mut identities = vec![Bson::String(identity.to_string())];
            if !exclude_subclasses {
                self.collect_identities(storage, &mut identities);
            }

            let condition = match identities.len() {
                1 => identities.remove(0),
                _ => Bson::Document(bson::doc! { "$in": identities }),
            };
            filter.insert(storage, condition);
        }

        if exclude_subclasses {
            let mut excluded: IndexMap<String, Vec<Bson>> = IndexMap::new();

            for subclass in self.subclasses() {
                let Some((storage, identity)) = subclass.registration() else {
                    continue;
                };
                if registered.is_some_and(|(own, _)| own == storage) {
                    continue;
                }

                let identities = excluded.entry(storage.to_string()).or_default();
                identities.push(Bson::String(identity.to_string()));
                subclass.collect_identities(storage, identities);
            }

            for (storage, identities) in excluded {
                filter.insert(storage, bson::doc! { "$nin": identities });
            }
        }

        filter
    }

    /// Resolves a dotted path of declared names to the field it ends at and its storage
    /// path.
    ///
    /// Segments descend through nested documents, sequences (transparently, or
    /// explicitly with the positional `$` segment), dictionaries and key/value fields.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::FieldNotFound`] if a segment does not resolve, and
    /// [`MapperError::BadQuery`] for a `$` segment below a non-sequence field.
    pub fn resolve_path(&self, path: &str) -> MapperResult<(&Field, String)> {
        let mut segments = path.split('.');
        let head = segments.next().unwrap_or_default();

        let mut field = self
            .field(head)
            .ok_or_else(|| MapperError::FieldNotFound(format!("{}.{head}", self.name)))?;
        let mut storage = vec![field.storage_name().to_string()];

        for segment in segments {
            if segment == "$" {
                field = field.item().filter(|_| field.is_sequence()).ok_or_else(|| {
                    MapperError::BadQuery(format!(
                        "positional operator used below non-sequence field {}",
                        field.name()
                    ))
                })?;
                storage.push(segment.to_string());
                continue;
            }

            let (sub, sub_storage) = field
                .subfield(segment)
                .ok_or_else(|| MapperError::FieldNotFound(format!("{}.{path}", self.name)))?;
            field = sub;
            storage.push(sub_storage);
        }

        Ok((field, storage.join(".")))
    }
}

/// Declares a [`DocumentSchema`].
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    namespace: Option<String>,
    collection: Option<String>,
    extra_fields: Option<ExtraFields>,
    fields: Vec<(String, Field)>,
    indexes: Vec<Index>,
    default_sort: Vec<(String, SortDirection)>,
    parent: Option<Arc<DocumentSchema>>,
    polymorphic_on: Option<String>,
    polymorphic_identity: Option<String>,
    polymorphic_collection: bool,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(DEFAULT_NAMESPACE.to_string()),
            collection: None,
            extra_fields: None,
            fields: Vec::new(),
            indexes: Vec::new(),
            default_sort: Vec::new(),
            parent: None,
            polymorphic_on: None,
            polymorphic_identity: None,
            polymorphic_collection: false,
        }
    }

    /// Collection name. Defaults to the type name.
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Keeps the schema out of every namespace. Such schemas cannot use named references.
    pub fn no_namespace(mut self) -> Self {
        self.namespace = None;
        self
    }

    /// Extra-field policy. Inherited from the parent when not given.
    pub fn extra_fields(mut self, policy: ExtraFields) -> Self {
        self.extra_fields = Some(policy);
        self
    }

    /// Inherits the fields, indexes, default sort and polymorphic setup of `parent`.
    /// Fields declared here replace inherited fields of the same name.
    pub fn extends(mut self, parent: &Arc<DocumentSchema>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    /// Selects subclasses on load by the value of field `name`.
    pub fn polymorphic_on(mut self, name: impl Into<String>) -> Self {
        self.polymorphic_on = Some(name.into());
        self
    }

    /// The value this schema stores in its parent's discriminator field.
    pub fn polymorphic_identity(mut self, identity: impl Into<String>) -> Self {
        self.polymorphic_identity = Some(identity.into());
        self
    }

    /// Subclasses without their own collection name share this schema's collection.
    pub fn polymorphic_collection(mut self) -> Self {
        self.polymorphic_collection = true;
        self
    }

    pub fn field(mut self, name: impl Into<String>, field: impl Into<Field>) -> Self {
        self.fields.push((name.into(), field.into()));
        self
    }

    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn default_sort(mut self, path: impl Into<String>, direction: SortDirection) -> Self {
        self.default_sort.push((path.into(), direction));
        self
    }

    /// Builds the schema and registers it in the process-wide registry.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::InvalidConfig`] or [`MapperError::BadFieldSpecification`]
    /// for a malformed declaration, and [`MapperError::InvalidConfig`] if the name is
    /// already registered.
    pub fn build(self) -> MapperResult<Arc<DocumentSchema>> {
        self.build_in(&Registry::global())
    }

    /// Builds the schema and registers it in `registry`.
    pub fn build_in(self, registry: &Registry) -> MapperResult<Arc<DocumentSchema>> {
        let schema = Arc::new(self.assemble()?);

        if schema.namespace.is_some() {
            registry.register(Arc::clone(&schema))?;
        }

        Ok(attach(schema))
    }

    /// Builds the schema without registering it anywhere.
    pub fn build_unregistered(self) -> MapperResult<Arc<DocumentSchema>> {
        self.assemble().map(Arc::new).map(attach)
    }

    fn inherited_fields(&self) -> IndexMap<String, Arc<Field>> {
        self.parent
            .as_ref()
            .map(|parent| parent.fields.clone())
            .unwrap_or_default()
    }

    fn check_identity(&self) -> MapperResult<()> {
        let Some(identity) = &self.polymorphic_identity else {
            return Ok(());
        };

        let parent = self.parent.as_ref().ok_or_else(|| {
            MapperError::InvalidConfig(format!(
                "{} has a polymorphic identity but extends nothing",
                self.name
            ))
        })?;

        if parent.polymorphic_on.is_none() {
            return Err(MapperError::InvalidConfig(format!(
                "{} extends {}, which is not polymorphic",
                self.name,
                parent.name
            )));
        }

        let taken = parent
            .subclasses
            .read()
            .get(identity)
            .is_some_and(|existing| existing.strong_count() > 0);
        if taken {
            return Err(MapperError::InvalidConfig(format!(
                "{} already has a subclass with identity {identity}",
                parent.name
            )));
        }

        Ok(())
    }

    fn assemble(mut self) -> MapperResult<DocumentSchema> {
        self.check_identity()?;

        let mut own = IndexMap::with_capacity(self.fields.len());
        for (name, mut field) in std::mem::take(&mut self.fields) {
            if own.contains_key(&name) {
                return Err(MapperError::InvalidConfig(format!(
                    "{} declares field {name} twice",
                    self.name
                )));
            }

            field.bind(&name);
            field.check()?;
            own.insert(name, Arc::new(field));
        }

        let mut fields = self.inherited_fields();
        if own.values().any(|field| field.is_id()) && !own.contains_key(DEFAULT_ID_FIELD) {
            fields.shift_remove(DEFAULT_ID_FIELD);
        }
        fields.extend(own);

        let ids: Vec<&str> = fields
            .iter()
            .filter(|(_, field)| field.is_id())
            .map(|(name, _)| name.as_str())
            .collect();

        if ids.len() > 1 {
            return Err(MapperError::InvalidConfig(format!(
                "{} declares more than one id field: {}",
                self.name,
                ids.join(", ")
            )));
        }

        let id_field = match ids.first() {
            Some(name) => name.to_string(),
            None => {
                let mut default_id = Field::new(ObjectIdField::new())
                    .optional()
                    .id()
                    .on_update(OnUpdate::Ignore);
                default_id.bind(DEFAULT_ID_FIELD);
                fields.shift_insert(0, DEFAULT_ID_FIELD.to_string(), Arc::new(default_id));
                DEFAULT_ID_FIELD.to_string()
            }
        };

        let parent = self.parent;
        let collection = self
            .collection
            .or_else(|| {
                parent
                    .as_ref()
                    .filter(|parent| parent.polymorphic_collection)
                    .map(|parent| parent.collection.clone())
            })
            .unwrap_or_else(|| self.name.clone());

        let mut schema = DocumentSchema {
            collection,
            name: self.name,
            namespace: self.namespace,
            extra_fields: self
                .extra_fields
                .or_else(|| parent.as_ref().map(|parent| parent.extra_fields))
                .unwrap_or_default(),
            fields,
            id_field,
            indexes: Vec::new(),
            default_sort: Vec::new(),
            polymorphic_on: self
                .polymorphic_on
                .or_else(|| parent.as_ref().and_then(|parent| parent.polymorphic_on.clone())),
            polymorphic_identity: self.polymorphic_identity,
            polymorphic_collection: self.polymorphic_collection
                || parent.as_ref().is_some_and(|parent| parent.polymorphic_collection),
            subclasses: RwLock::new(IndexMap::new()),
            parent,
        };

        check_storage_names(&schema)?;
        check_computed(&schema)?;
        check_polymorphic(&schema)?;
        check_discriminators(&schema)?;
        check_named_targets(&schema)?;

        let bad_spec = |err: MapperError| MapperError::BadFieldSpecification(err.to_string());

        schema.default_sort = self
            .default_sort
            .iter()
            .map(|(path, direction)| {
                schema
                    .resolve_path(path)
                    .map(|(_, storage)| (storage, *direction))
                    .map_err(bad_spec)
            })
            .collect::<MapperResult<Vec<_>>>()?;

        let own_indexes = self
            .indexes
            .iter()
            .map(|index| {
                index.map_paths(|path| {
                    schema
                        .resolve_path(path)
                        .map(|(_, storage)| storage)
                        .map_err(bad_spec)
                })
            })
            .collect::<MapperResult<Vec<_>>>()?;

        if let Some(parent) = &schema.parent {
            if schema.default_sort.is_empty() {
                schema.default_sort = parent.default_sort.clone();
            }
            schema.indexes = parent.indexes.clone();
        }
        schema.indexes.extend(own_indexes);

        Ok(schema)
    }
}

fn check_storage_names(schema: &DocumentSchema) -> MapperResult<()> {
    let mut seen = HashSet::new();

    for (name, field) in schema.fields() {
        if !seen.insert(field.storage_name()) {
            return Err(MapperError::InvalidConfig(format!(
                "{}.{name} reuses storage name {}",
                schema.name(),
                field.storage_name()
            )));
        }
    }

    Ok(())
}

fn check_computed(schema: &DocumentSchema) -> MapperResult<()> {
    for (name, field) in schema.fields() {
        let Some(computed) = field.kind_as::<ComputedField>() else {
            continue;
        };

        for dep in computed.dependencies() {
            match schema.field(dep) {
                None => {
                    return Err(MapperError::BadFieldSpecification(format!(
                        "computed field {name} depends on unknown field {dep}"
                    )));
                }
                Some(target) if target.kind_as::<ComputedField>().is_some() => {
                    return Err(MapperError::BadFieldSpecification(format!(
                        "computed field {name} depends on computed field {dep}"
                    )));
                }
                Some(_) => {}
            }
        }
    }

    Ok(())
}

fn check_polymorphic(schema: &DocumentSchema) -> MapperResult<()> {
    for (name, field) in schema.fields() {
        let Some(polymorphic) = field.kind_as::<PolymorphicField>() else {
            continue;
        };

        if schema.field(polymorphic.type_field()).is_none() {
            return Err(MapperError::BadFieldSpecification(format!(
                "polymorphic field {name} is discriminated by unknown field {}",
                polymorphic.type_field()
            )));
        }
    }

    Ok(())
}

fn attach(schema: Arc<DocumentSchema>) -> Arc<DocumentSchema> {
    if let (Some(parent), Some(identity)) = (&schema.parent, &schema.polymorphic_identity) {
        log::debug!("{} is subclass {identity} of {}", schema.name, parent.name);
        parent
            .subclasses
            .write()
            .insert(identity.clone(), Arc::downgrade(&schema));
    }

    schema
}

fn check_discriminators(schema: &DocumentSchema) -> MapperResult<()> {
    if let Some(key) = schema.polymorphic_on() {
        if schema.field(key).is_none() {
            return Err(MapperError::BadFieldSpecification(format!(
                "{} is polymorphic on unknown field {key}",
                schema.name()
            )));
        }
    }

    for (name, identity) in schema.discriminators() {
        let field = schema.field(name).ok_or_else(|| {
            MapperError::BadFieldSpecification(format!(
                "{} has no discriminator field {name}",
                schema.name()
            ))
        })?;

        field
            .wrap(&Value::from(identity))
            .map_err(|err| MapperError::BadFieldSpecification(err.to_string()))?;
    }

    Ok(())
}

fn check_named_targets(schema: &DocumentSchema) -> MapperResult<()> {
    if schema.namespace().is_some() {
        return Ok(());
    }

    let mut pending = None;
    for (_, field) in schema.fields() {
        field.walk(&mut |field| {
            if let Some(name) = field.kind().document_target().and_then(|t| t.pending_name()) {
                pending.get_or_insert_with(|| name.to_string());
            }
        });
    }

    match pending {
        Some(name) => Err(MapperError::BadFieldSpecification(format!(
            "{} refers to {name} by name but has no namespace",
            schema.name()
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{
        DictField, DocumentField, IntField, KeyValueField, ListField, StringField,
    };

    fn address() -> Arc<DocumentSchema> {
        DocumentSchema::builder("Address")
            .field("street", Field::new(StringField::new()).db_field("s"))
            .field("city", StringField::new())
            .build_unregistered()
            .unwrap()
    }

    #[test]
    fn test_default_identity_field_is_added_first() {
        let schema = DocumentSchema::builder("Thing")
            .field("name", StringField::new())
            .build_unregistered()
            .unwrap();

        let names: Vec<&str> = schema.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec![DEFAULT_ID_FIELD, "name"]);
        assert_eq!(schema.id_name(), DEFAULT_ID_FIELD);
        assert_eq!(schema.id_field().map(Field::storage_name), Some(ID_KEY));
        assert_eq!(schema.collection(), "Thing");
    }

    #[test]
    fn test_custom_identity_suppresses_default() {
        let schema = DocumentSchema::builder("Keyed")
            .field("key", Field::new(StringField::new()).id())
            .build_unregistered()
            .unwrap();

        assert!(schema.field(DEFAULT_ID_FIELD).is_none());
        assert_eq!(schema.id_name(), "key");
        assert_eq!(schema.field_by_storage_name(ID_KEY).map(|(name, _)| name), Some("key"));
    }

    #[test]
    fn test_two_identity_fields_are_invalid() {
        let result = DocumentSchema::builder("Twice")
            .field("a", Field::new(StringField::new()).id())
            .field("b", Field::new(StringField::new()).db_field("_id"))
            .build_unregistered();

        assert!(matches!(result, Err(MapperError::InvalidConfig(_))));
    }

    #[test]
    fn test_duplicate_names_are_invalid() {
        let result = DocumentSchema::builder("Dup")
            .field("a", StringField::new())
            .field("a", IntField::new())
            .build_unregistered();

        assert!(matches!(result, Err(MapperError::InvalidConfig(_))));

        let result = DocumentSchema::builder("DupStorage")
            .field("a", StringField::new())
            .field("b", Field::new(IntField::new()).db_field("a"))
            .build_unregistered();

        assert!(matches!(result, Err(MapperError::InvalidConfig(_))));
    }

    #[test]
    fn test_computed_dependencies_must_exist() {
        let result = DocumentSchema::builder("Computed")
            .field(
                "total",
                ComputedField::new(IntField::new(), |_| 1.into()).deps(["missing"]),
            )
            .build_unregistered();

        assert!(matches!(result, Err(MapperError::BadFieldSpecification(_))));
    }

    #[test]
    fn test_polymorphic_type_field_must_exist() {
        let result = DocumentSchema::builder("Poly")
            .field("value", PolymorphicField::new("kind").variant("i", IntField::new()))
            .build_unregistered();

        assert!(matches!(result, Err(MapperError::BadFieldSpecification(_))));
    }

    fn animals() -> (Arc<DocumentSchema>, Arc<DocumentSchema>, Arc<DocumentSchema>) {
        let animal = DocumentSchema::builder("Animal")
            .collection("animals")
            .polymorphic_on("kind")
            .polymorphic_collection()
            .field("kind", Field::new(StringField::new()).db_field("k"))
            .field("name", StringField::new())
            .index(Index::new().ascending("name"))
            .build_unregistered()
            .unwrap();
        let dog = DocumentSchema::builder("Dog")
            .extends(&animal)
            .polymorphic_identity("dog")
            .field("barks", IntField::new())
            .build_unregistered()
            .unwrap();
        let puppy = DocumentSchema::builder("Puppy")
            .extends(&dog)
            .polymorphic_identity("puppy")
            .build_unregistered()
            .unwrap();

        (animal, dog, puppy)
    }

    #[test]
    fn test_subclasses_inherit_fields_and_collection() {
        let (animal, dog, puppy) = animals();

        let names: Vec<&str> = puppy.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec![DEFAULT_ID_FIELD, "kind", "name", "barks"]);
        assert_eq!(puppy.collection(), "animals");
        assert_eq!(puppy.indexes().len(), 1);
        assert_eq!(puppy.polymorphic_on(), Some("kind"));
        assert_eq!(puppy.discriminators(), vec![("kind", "puppy")]);

        assert!(puppy.is_subclass_of(&animal));
        assert!(!animal.is_subclass_of(&dog));
        assert_eq!(animal.subclasses().len(), 1);

        let native = bson::doc! { "k": "puppy", "name": "Rex" };
        let selected = animal.subclass_for(&native).unwrap();
        assert!(Arc::ptr_eq(&selected, &puppy));
        assert!(animal.subclass_for(&bson::doc! { "k": "cat" }).is_none());
    }

    #[test]
    fn test_base_filter_covers_descendants() {
        let (animal, dog, puppy) = animals();

        assert_eq!(animal.base_filter(false), bson::doc! {});
        assert_eq!(
            animal.base_filter(true),
            bson::doc! { "k": { "$nin": ["dog", "puppy"] } }
        );
        assert_eq!(
            dog.base_filter(false),
            bson::doc! { "k": { "$in": ["dog", "puppy"] } }
        );
        assert_eq!(dog.base_filter(true), bson::doc! { "k": "dog" });
        assert_eq!(puppy.base_filter(false), bson::doc! { "k": "puppy" });
    }

    #[test]
    fn test_subclass_identities_are_checked() {
        let (animal, dog, _puppy) = animals();

        let duplicate = DocumentSchema::builder("Hound")
            .extends(&animal)
            .polymorphic_identity("dog")
            .build_unregistered();
        assert!(matches!(duplicate, Err(MapperError::InvalidConfig(_))));

        let orphan = DocumentSchema::builder("Orphan")
            .polymorphic_identity("x")
            .build_unregistered();
        assert!(matches!(orphan, Err(MapperError::InvalidConfig(_))));

        let plain = DocumentSchema::builder("Plain").build_unregistered().unwrap();
        let not_polymorphic = DocumentSchema::builder("Sub")
            .extends(&plain)
            .polymorphic_identity("x")
            .build_unregistered();
        assert!(matches!(not_polymorphic, Err(MapperError::InvalidConfig(_))));
        assert_eq!(dog.subclasses().len(), 1);
    }

    #[test]
    fn test_named_targets_need_a_namespace() {
        let result = DocumentSchema::builder("Loose")
            .no_namespace()
            .field("child", DocumentField::named("Other"))
            .build_unregistered();

        assert!(matches!(result, Err(MapperError::BadFieldSpecification(_))));
    }

    #[test]
    fn test_resolve_path_through_nested_structures() {
        let address = address();
        let schema = DocumentSchema::builder("Person")
            .field("home", Field::new(DocumentField::new(&address)).db_field("h"))
            .field("past", ListField::new(DocumentField::new(&address)))
            .field("scores", DictField::new(IntField::new()))
            .field("props", KeyValueField::new(StringField::new(), IntField::new()))
            .build_unregistered()
            .unwrap();

        assert_eq!(schema.resolve_path("home.street").unwrap().1, "h.s");
        assert_eq!(schema.resolve_path("past.street").unwrap().1, "past.s");
        assert_eq!(schema.resolve_path("past.$.city").unwrap().1, "past.$.city");
        assert_eq!(schema.resolve_path("scores.math").unwrap().1, "scores.math");
        assert_eq!(schema.resolve_path("props.v").unwrap().1, "props.v");

        assert!(matches!(
            schema.resolve_path("home.zip"),
            Err(MapperError::FieldNotFound(_))
        ));
        assert!(matches!(
            schema.resolve_path("home.$"),
            Err(MapperError::BadQuery(_))
        ));
    }

    #[test]
    fn test_default_sort_and_indexes_use_storage_paths() {
        let schema = DocumentSchema::builder("Sorted")
            .field("name", Field::new(StringField::new()).db_field("n"))
            .default_sort("name", SortDirection::Desc)
            .index(Index::new().ascending("name").unique())
            .build_unregistered()
            .unwrap();

        assert_eq!(schema.default_sort(), &[("n".to_string(), SortDirection::Desc)]);
        assert_eq!(schema.indexes()[0].keys(), bson::doc! { "n": 1 });

        let result = DocumentSchema::builder("BadSort")
            .default_sort("nope", SortDirection::Asc)
            .build_unregistered();
        assert!(matches!(result, Err(MapperError::BadFieldSpecification(_))));
    }
}
