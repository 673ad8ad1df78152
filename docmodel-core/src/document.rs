//! Document instances.
//!
//! A [`Document`] holds one value cell per field of its schema. Cells remember whether a
//! value was assigned, whether it changed since the last load or save, whether it was
//! part of a partial load, and which update operator the change maps to. That state
//! drives [`Document::dirty_ops`], which computes the minimal update for the session.
//!
//! A document must not be mutated from several threads at once; share it behind a lock
//! if that is needed.

use std::{borrow::Cow, fmt, sync::Arc};

use bson::Bson;
use indexmap::IndexMap;

use crate::{
    error::{MapperError, MapperResult},
    field::{ComputedArgs, ComputedField, DocumentField, Field, PolymorphicField, UpdateOp},
    schema::{DocumentSchema, ExtraFields},
    value::{DbRef, Value},
};

#[derive(Debug, Clone, PartialEq)]
struct ValueCell {
    value: Value,
    set: bool,
    dirty: bool,
    retrieved: bool,
    from_db: bool,
    update_op: Option<UpdateOp>,
}

impl ValueCell {
    fn empty() -> Self {
        Self {
            value: Value::Null,
            set: false,
            dirty: false,
            retrieved: true,
            from_db: false,
            update_op: None,
        }
    }

    fn loaded(value: Value) -> Self {
        Self {
            value,
            set: true,
            dirty: false,
            retrieved: true,
            from_db: true,
            update_op: None,
        }
    }

    fn assign(&mut self, value: Value, op: Option<UpdateOp>) {
        self.value = value;
        self.set = true;
        self.dirty = true;
        self.retrieved = true;
        self.from_db = false;
        self.update_op = op;
    }

    fn delete(&mut self) {
        self.value = Value::Null;
        self.set = false;
        self.dirty = true;
        self.update_op = Some(UpdateOp::Unset);
    }

    fn clear_dirty(&mut self) {
        self.dirty = false;
        self.update_op = None;
    }
}

/// Per-operator update maps, in first-use order.
#[derive(Debug, Default)]
struct UpdateOps(IndexMap<String, bson::Document>);

impl UpdateOps {
    fn insert(&mut self, key: &str, path: String, value: Bson) {
        self.0.entry(key.to_string()).or_default().insert(path, value);
    }

    fn insert_op(&mut self, op: UpdateOp, path: String, native: Bson) {
        match op {
            UpdateOp::Unset => self.insert(op.native_key(), path, Bson::Boolean(true)),
            UpdateOp::PushAll => {
                self.insert(op.native_key(), path, Bson::Document(bson::doc! { "$each": native }))
            }
            _ => self.insert(op.native_key(), path, native),
        }
    }

    fn into_document(self) -> bson::Document {
        self.0
            .into_iter()
            .map(|(key, entries)| (key, Bson::Document(entries)))
            .collect()
    }
}

/// An instance of a [`DocumentSchema`].
///
/// # Example
///
/// ```ignore
/// use docmodel_core::{document::Document, value::Value};
///
/// let mut person = Document::new(&person_schema, [("name", Value::from("Ada"))])?;
/// person.set("age", 36)?;
/// assert_eq!(person.get("name")?, &Value::from("Ada"));
/// ```
#[derive(Clone)]
pub struct Document {
    schema: Arc<DocumentSchema>,
    cells: IndexMap<String, ValueCell>,
    extra: IndexMap<String, Value>,
    saved_extra: IndexMap<String, Value>,
    retrieved: Option<Vec<String>>,
}

impl Document {
    /// Creates a document from name/value pairs.
    ///
    /// Every value is validated on assignment. Required fields are not enforced until
    /// the document is wrapped.
    ///
    /// # Errors
    ///
    /// - [`MapperError::BadValue`] if a value fails its field's validation.
    /// - [`MapperError::ExtraValue`] for an undeclared name when the schema's policy is
    ///   [`ExtraFields::Error`].
    /// - [`MapperError::BadValue`] for an assignment to a computed field.
    pub fn new<K, V>(
        schema: &Arc<DocumentSchema>,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> MapperResult<Self>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let mut document = Self::blank(schema, None);
        let mut deferred = Vec::new();

        for (name, value) in values {
            let name = name.into();
            let value = value.into();

            match schema.field(&name) {
                Some(field) if field.kind_as::<PolymorphicField>().is_some() => {
                    deferred.push((name, value));
                }
                Some(_) => document.set(&name, value)?,
                None => match schema.extra_fields() {
                    ExtraFields::Error => return Err(MapperError::ExtraValue(name)),
                    ExtraFields::Ignore => {
                        document.extra.insert(name, value);
                    }
                },
            }
        }

        for (name, value) in deferred {
            document.set(&name, value)?;
        }

        document.saved_extra = document.extra.clone();
        Ok(document)
    }

    /// Creates a document with no values.
    pub fn empty(schema: &Arc<DocumentSchema>) -> Self {
        Self::blank(schema, None)
    }

    fn blank(schema: &Arc<DocumentSchema>, retrieved: Option<&[String]>) -> Self {
        let mut document = Self {
            schema: Arc::clone(schema),
            cells: schema
                .fields()
                .map(|(name, _)| (name.to_string(), ValueCell::empty()))
                .collect(),
            extra: IndexMap::new(),
            saved_extra: IndexMap::new(),
            retrieved: retrieved.map(<[String]>::to_vec),
        };

        for (name, identity) in schema.discriminators() {
            let op = schema.field(name).and_then(|field| field.update_mode().op());
            if let Some(cell) = document.cells.get_mut(name) {
                cell.assign(Value::from(identity), op);
            }
        }

        document
    }

    pub fn schema(&self) -> &Arc<DocumentSchema> {
        &self.schema
    }

    fn field(&self, name: &str) -> MapperResult<&Field> {
        self.schema
            .field(name)
            .ok_or_else(|| MapperError::FieldNotFound(format!("{}.{name}", self.schema.name())))
    }

    fn cell(&self, name: &str) -> MapperResult<&ValueCell> {
        self.cells
            .get(name)
            .ok_or_else(|| MapperError::FieldNotFound(format!("{}.{name}", self.schema.name())))
    }

    fn cell_mut(&mut self, name: &str) -> MapperResult<&mut ValueCell> {
        let schema = self.schema.name();

        self.cells
            .get_mut(name)
            .ok_or_else(|| MapperError::FieldNotFound(format!("{schema}.{name}")))
    }

    /// Reads a field.
    ///
    /// A missing value with a default takes on the default, which then counts as an
    /// assignment. Computed fields are computed; one-time computed fields keep their
    /// first result.
    ///
    /// # Errors
    ///
    /// - [`MapperError::FieldNotFound`] if `name` is not declared.
    /// - [`MapperError::FieldNotRetrieved`] if a partial load excluded the field.
    /// - [`MapperError::FieldNotSet`] if the field has no value and no default.
    pub fn get(&mut self, name: &str) -> MapperResult<&Value> {
        let schema = Arc::clone(&self.schema);
        let field = schema
            .field(name)
            .ok_or_else(|| MapperError::FieldNotFound(format!("{}.{name}", schema.name())))?;

        if let Some(computed) = field.kind_as::<ComputedField>() {
            let cached = computed.is_one_time() && self.cell(name)?.set;

            if !cached {
                let value = self.compute(name)?;
                let cell = self.cell_mut(name)?;

                match computed.is_one_time() {
                    true => cell.assign(value, field.update_mode().op()),
                    false => cell.value = value,
                }
            }

            return Ok(&self.cell(name)?.value);
        }

        let cell = self.cell(name)?;
        if !cell.retrieved {
            return Err(MapperError::FieldNotRetrieved(name.to_string()));
        }

        if !cell.set {
            let default = field
                .default_value()
                .ok_or_else(|| MapperError::FieldNotSet(name.to_string()))?;
            self.cell_mut(name)?.assign(default, field.update_mode().op());
        }

        Ok(&self.cell(name)?.value)
    }

    /// Reads a field for in-place mutation and marks it dirty.
    pub fn get_mut(&mut self, name: &str) -> MapperResult<&mut Value> {
        let schema = Arc::clone(&self.schema);
        let field = schema
            .field(name)
            .ok_or_else(|| MapperError::FieldNotFound(name.to_string()))?;

        if field.kind_as::<ComputedField>().is_some() {
            return Err(MapperError::bad_value(name, &"<computed>", "Computed fields cannot be assigned"));
        }

        self.get(name)?;

        let cell = self.cell_mut(name)?;
        cell.dirty = true;
        if cell.update_op.is_none() {
            cell.update_op = field.update_mode().op();
        }

        Ok(&mut cell.value)
    }

    /// Mutable access to a nested document. Changes show up in the parent's dirty ops.
    pub fn document_mut(&mut self, name: &str) -> MapperResult<&mut Document> {
        match self.get_mut(name)? {
            Value::Document(document) => Ok(document),
            other => Err(MapperError::bad_value(
                name,
                other,
                "Field does not hold a document",
            )),
        }
    }

    /// The assigned value, without applying defaults or computing anything.
    pub fn peek(&self, name: &str) -> Option<&Value> {
        self.cells
            .get(name)
            .filter(|cell| cell.set)
            .map(|cell| &cell.value)
    }

    /// Whether the field currently holds an assigned or loaded value.
    pub fn has(&self, name: &str) -> bool {
        self.peek(name).is_some()
    }

    /// Assigns a field after validating the value.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::BadValue`] if validation fails or the field is computed.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> MapperResult<()> {
        let value = value.into();
        let schema = Arc::clone(&self.schema);
        let field = schema
            .field(name)
            .ok_or_else(|| MapperError::FieldNotFound(format!("{}.{name}", schema.name())))?;

        if field.kind_as::<ComputedField>().is_some() {
            return Err(MapperError::bad_value(
                name,
                &value,
                "Computed fields cannot be assigned",
            ));
        }

        let discriminant = self.discriminant_for(field)?;
        field.validate_wrap_as(&value, discriminant.as_ref())?;

        self.cell_mut(name)?.assign(value, field.update_mode().op());
        Ok(())
    }

    /// Removes a field's value; the next update unsets it in storage.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::FieldNotSet`] if the field holds no value.
    pub fn unset(&mut self, name: &str) -> MapperResult<()> {
        let cell = self.cell_mut(name)?;

        if !cell.set {
            return Err(MapperError::FieldNotSet(name.to_string()));
        }

        cell.delete();
        Ok(())
    }

    /// Runs a computed field's computation without storing the result. A one-time field
    /// that already holds a value returns it.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::MissingValue`] naming a dependency with no value, or
    /// [`MapperError::BadValue`] if the computation returned an invalid value.
    pub fn compute(&self, name: &str) -> MapperResult<Value> {
        let field = self.field(name)?;
        let computed = field.kind_as::<ComputedField>().ok_or_else(|| {
            MapperError::BadFieldSpecification(format!("{name} is not a computed field"))
        })?;

        let cell = self.cell(name)?;
        if computed.is_one_time() && cell.set {
            return Ok(cell.value.clone());
        }

        field.compute(&self.compute_args(computed)?)
    }

    fn compute_args(&self, computed: &ComputedField) -> MapperResult<ComputedArgs> {
        let mut args = ComputedArgs::new();

        for dep in computed.dependencies() {
            let value = self
                .current(dep)?
                .ok_or_else(|| MapperError::MissingValue(dep.clone()))?;
            args.insert(dep.clone(), value.into_owned());
        }

        Ok(args)
    }

    /// The value a field would have if read now, without storing defaults.
    fn current(&self, name: &str) -> MapperResult<Option<Cow<'_, Value>>> {
        let field = self.field(name)?;
        let cell = self.cell(name)?;

        if let Some(computed) = field.kind_as::<ComputedField>() {
            if computed.is_one_time() && cell.set {
                return Ok(Some(Cow::Borrowed(&cell.value)));
            }

            return match self.compute_args(computed) {
                Ok(args) => field.compute(&args).map(|value| Some(Cow::Owned(value))),
                Err(MapperError::MissingValue(_)) => Ok(None),
                Err(err) => Err(err),
            };
        }

        if !cell.retrieved {
            return Err(MapperError::FieldNotRetrieved(name.to_string()));
        }

        if cell.set {
            return Ok(Some(Cow::Borrowed(&cell.value)));
        }

        Ok(field.default_value().map(Cow::Owned))
    }

    fn discriminant_for(&self, field: &Field) -> MapperResult<Option<Value>> {
        match field.kind_as::<PolymorphicField>() {
            Some(polymorphic) => Ok(self.current(polymorphic.type_field())?.map(Cow::into_owned)),
            None => Ok(None),
        }
    }

    /// Stores the default of every retrieved field that holds no value.
    pub fn materialize_defaults(&mut self) {
        let schema = Arc::clone(&self.schema);

        for (name, field) in schema.fields() {
            let Some(cell) = self.cells.get_mut(name) else {
                continue;
            };

            if cell.set || !cell.retrieved || field.kind_as::<ComputedField>().is_some() {
                continue;
            }

            if let Some(default) = field.default_value() {
                cell.assign(default, field.update_mode().op());
            }
        }
    }

    pub fn extra(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// Undeclared values kept under [`ExtraFields::Ignore`].
    pub fn extras(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.extra.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Sets an undeclared value.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::ExtraValue`] unless the schema's policy is
    /// [`ExtraFields::Ignore`].
    pub fn set_extra(&mut self, name: impl Into<String>, value: impl Into<Value>) -> MapperResult<()> {
        let name = name.into();

        match self.schema.extra_fields() {
            ExtraFields::Error => Err(MapperError::ExtraValue(name)),
            ExtraFields::Ignore => {
                self.extra.insert(name, value.into());
                Ok(())
            }
        }
    }

    pub fn remove_extra(&mut self, name: &str) -> Option<Value> {
        self.extra.shift_remove(name)
    }

    /// The identity value.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::FieldNotSet`] if the document has no identity yet.
    pub fn id(&self) -> MapperResult<&Value> {
        let name = self.schema.id_name();

        match self.peek(name) {
            Some(value) if !value.is_null() => Ok(value),
            _ => Err(MapperError::FieldNotSet(name.to_string())),
        }
    }

    pub fn has_id(&self) -> bool {
        self.id().is_ok()
    }

    /// A database reference to this document.
    pub fn to_ref(&self) -> MapperResult<DbRef> {
        let field = self
            .schema
            .id_field()
            .ok_or_else(|| MapperError::FieldNotFound(self.schema.id_name().to_string()))?;

        Ok(DbRef::new(self.schema.collection(), field.wrap(self.id()?)?))
    }

    /// Stores an identity handed back by the backend.
    pub(crate) fn assign_id(&mut self, id: &Bson) -> MapperResult<()> {
        let schema = Arc::clone(&self.schema);
        let field = schema
            .id_field()
            .ok_or_else(|| MapperError::FieldNotFound(schema.id_name().to_string()))?;

        let value = field.unwrap(id)?;
        *self.cell_mut(schema.id_name())? = ValueCell::loaded(value);
        Ok(())
    }

    /// Whether this document came from a partial load.
    pub fn is_partial(&self) -> bool {
        self.retrieved.is_some()
    }

    /// The storage paths a partial load retrieved.
    pub fn retrieved_fields(&self) -> Option<&[String]> {
        self.retrieved.as_deref()
    }

    /// Converts the document into its storage form.
    ///
    /// Extra values come first, then every field with a value in declaration order.
    /// Defaults are applied but not stored; call [`Document::materialize_defaults`]
    /// first when generated defaults must stay stable.
    ///
    /// # Errors
    ///
    /// - [`MapperError::MissingValue`] for a required field with no value.
    /// - [`MapperError::FieldNotRetrieved`] for a required field excluded by a partial
    ///   load.
    /// - [`MapperError::BadValue`] if a value fails validation.
    pub fn wrap(&self) -> MapperResult<bson::Document> {
        let mut native = bson::Document::new();

        for (key, value) in &self.extra {
            native.insert(key.clone(), value.to_bson()?);
        }

        for (name, field) in self.schema.fields() {
            let value = match self.current(name) {
                Ok(Some(value)) => value,
                Ok(None) if field.is_required() => {
                    return Err(MapperError::MissingValue(name.to_string()));
                }
                Ok(None) => continue,
                Err(MapperError::FieldNotRetrieved(_)) if !field.is_required() => continue,
                Err(err) => return Err(err),
            };

            let discriminant = self.discriminant_for(field)?;
            native.insert(
                field.storage_name(),
                field.wrap_as(&value, discriminant.as_ref())?,
            );
        }

        Ok(native)
    }

    /// Builds a document from its storage form.
    ///
    /// A record naming a subclass of `schema` through its discriminators is loaded
    /// with that subclass.
    ///
    /// `retrieved` lists the storage paths of a partial load. Dotted paths are grouped by
    /// their first segment and passed down to nested documents. Fields outside the list
    /// raise [`MapperError::FieldNotRetrieved`] when read.
    ///
    /// # Errors
    ///
    /// - [`MapperError::BadValue`] if a stored value does not fit its field.
    /// - [`MapperError::ExtraValue`] for an undeclared key under [`ExtraFields::Error`].
    pub fn unwrap(
        schema: &Arc<DocumentSchema>,
        native: &bson::Document,
        retrieved: Option<&[String]>,
    ) -> MapperResult<Self> {
        if let Some(subclass) = schema.subclass_for(native) {
            return Self::unwrap(&subclass, native, retrieved);
        }

        let groups = retrieved.map(group_paths);
        let mut document = Self::blank(schema, retrieved);

        if let Some(groups) = &groups {
            for (name, field) in schema.fields() {
                if !groups.contains_key(field.storage_name()) {
                    document.cell_mut(name)?.retrieved = false;
                }
            }
        }

        let mut deferred = Vec::new();

        for (key, item) in native {
            let Some((name, field)) = schema.field_by_storage_name(key) else {
                match schema.extra_fields() {
                    ExtraFields::Error => return Err(MapperError::ExtraValue(key.clone())),
                    ExtraFields::Ignore => {
                        document.extra.insert(key.clone(), Value::from_bson(item));
                        continue;
                    }
                }
            };

            if field.kind_as::<PolymorphicField>().is_some() {
                deferred.push((name, field, item));
                continue;
            }

            let sub_paths = groups
                .as_ref()
                .and_then(|groups| groups.get(key))
                .and_then(Option::as_deref);

            let value = match sub_paths {
                Some(sub_paths) => field.unwrap_partial(item, sub_paths)?,
                None => field.unwrap(item)?,
            };
            *document.cell_mut(name)? = ValueCell::loaded(value);
        }

        for (name, field, item) in deferred {
            let discriminant = document.discriminant_for(field)?;
            let value = field.unwrap_as(item, discriminant.as_ref())?;
            *document.cell_mut(name)? = ValueCell::loaded(value);
        }

        document.mark_clean();
        Ok(document)
    }

    /// Forgets pending changes, in nested documents too.
    pub fn mark_clean(&mut self) {
        for cell in self.cells.values_mut() {
            cell.clear_dirty();

            if let Some(nested) = cell.value.as_document_mut() {
                nested.mark_clean();
            }
        }

        self.saved_extra = self.extra.clone();
    }

    /// Whether any field or extra value changed since the last load or save.
    pub fn is_dirty(&self) -> bool {
        self.cells.values().any(|cell| cell.dirty) || self.extra != self.saved_extra
    }

    /// The update operators that bring the stored record in line with this instance.
    ///
    /// Operators are merged across fields and keyed by storage path. Nested documents
    /// contribute their own operators under a `parent.` prefix. The identity field never
    /// appears. With `with_required`, every required field is included even when clean,
    /// as an upsert needs.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::MissingValue`] when `with_required` is set and a required
    /// field has no value, and [`MapperError::BadValue`] if a value fails validation.
    pub fn dirty_ops(&self, with_required: bool) -> MapperResult<bson::Document> {
        let mut ops = UpdateOps::default();

        for (name, field) in self.schema.fields() {
            if field.is_id() {
                continue;
            }

            let emitted = self.field_ops(name, field, &mut ops)?;

            if !emitted && with_required && field.is_required() {
                let value = self
                    .current(name)?
                    .ok_or_else(|| MapperError::MissingValue(name.to_string()))?;
                let discriminant = self.discriminant_for(field)?;
                let op = field.update_mode().op().unwrap_or(UpdateOp::Set);

                ops.insert_op(
                    op,
                    field.storage_name().to_string(),
                    field.wrap_as(&value, discriminant.as_ref())?,
                );
            }
        }

        if self.schema.extra_fields() == ExtraFields::Ignore {
            for (key, value) in &self.extra {
                if self.saved_extra.get(key) != Some(value) {
                    ops.insert(UpdateOp::Set.native_key(), key.clone(), value.to_bson()?);
                }
            }

            for key in self.saved_extra.keys() {
                if !self.extra.contains_key(key) {
                    ops.insert(UpdateOp::Unset.native_key(), key.clone(), Bson::Boolean(true));
                }
            }
        }

        Ok(ops.into_document())
    }

    fn field_ops(&self, name: &str, field: &Field, ops: &mut UpdateOps) -> MapperResult<bool> {
        let cell = self.cell(name)?;
        let storage = field.storage_name();

        if let Some(computed) = field.kind_as::<ComputedField>() {
            let deps = computed.dependencies();
            let deps_dirty = deps
                .iter()
                .any(|dep| self.cells.get(dep).is_some_and(|cell| cell.dirty));

            if !deps.is_empty() && !deps_dirty {
                return Ok(false);
            }

            let (Some(op), Some(value)) = (field.update_mode().op(), self.current(name)?) else {
                return Ok(false);
            };

            ops.insert_op(op, storage.to_string(), field.wrap(&value)?);
            return Ok(true);
        }

        if field.kind_as::<DocumentField>().is_some() && cell.update_op != Some(UpdateOp::Unset) {
            if let Some(nested) = cell.value.as_document().filter(|_| cell.set) {
                if !cell.dirty && nested.schema.extra_fields() != ExtraFields::Ignore {
                    return Ok(false);
                }

                let mut emitted = false;
                for (op, entries) in nested.dirty_ops(false)? {
                    let Bson::Document(entries) = entries else {
                        continue;
                    };

                    for (path, value) in entries {
                        ops.insert(&op, format!("{storage}.{path}"), value);
                        emitted = true;
                    }
                }

                return Ok(emitted);
            }
        }

        if !cell.dirty {
            return Ok(false);
        }

        match cell.update_op {
            None => Ok(false),
            Some(UpdateOp::Unset) => {
                ops.insert_op(UpdateOp::Unset, storage.to_string(), Bson::Null);
                Ok(true)
            }
            Some(op) => {
                let discriminant = self.discriminant_for(field)?;
                ops.insert_op(
                    op,
                    storage.to_string(),
                    field.wrap_as(&cell.value, discriminant.as_ref())?,
                );
                Ok(true)
            }
        }
    }
}

/// Groups dotted storage paths by their first segment. A bare segment means the whole
/// field was retrieved.
fn group_paths(paths: &[String]) -> IndexMap<String, Option<Vec<String>>> {
    let mut groups: IndexMap<String, Option<Vec<String>>> = IndexMap::new();

    for path in paths {
        match path.split_once('.') {
            Some((head, rest)) => {
                if let Some(sub_paths) = groups
                    .entry(head.to_string())
                    .or_insert_with(|| Some(Vec::new()))
                {
                    sub_paths.push(rest.to_string());
                }
            }
            None => {
                groups.insert(path.clone(), None);
            }
        }
    }

    groups
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.schema, &other.schema)
            && self.extra == other.extra
            && self.cells.iter().all(|(name, cell)| {
                let theirs = other.cells.get(name);
                match (cell.set, theirs) {
                    (true, Some(theirs)) => theirs.set && theirs.value == cell.value,
                    (false, Some(theirs)) => !theirs.set,
                    (_, None) => false,
                }
            })
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct(self.schema.name());

        for (name, cell) in &self.cells {
            if cell.set {
                debug.field(name, &cell.value);
            }
        }

        for (name, value) in &self.extra {
            debug.field(name, value);
        }

        debug.finish()
    }
}
