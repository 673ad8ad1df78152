//! References to documents stored elsewhere.

use bson::Bson;

use crate::{
    document::Document,
    error::{MapperError, MapperResult},
    field::{DocumentField, FieldKind, KindResult, Rejection},
    value::{DbRef, Value},
};

/// A simple reference: stored as a bare object id, resolved against the target
/// schema's collection.
#[derive(Debug)]
pub struct SRefField {
    target: DocumentField,
    db: Option<String>,
}

impl SRefField {
    pub fn new(target: DocumentField) -> Self {
        Self { target, db: None }
    }

    pub fn db(mut self, db: impl Into<String>) -> Self {
        self.db = Some(db.into());
        self
    }

    pub fn target(&self) -> &DocumentField {
        &self.target
    }

    /// The full reference an id held by this field points at.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::BadValue`] if `id` is not an object id, or
    /// [`MapperError::BadFieldSpecification`] if the target is unresolved.
    pub fn reference(&self, id: &Value) -> MapperResult<DbRef> {
        let oid = id.as_object_id().ok_or_else(|| {
            MapperError::bad_value(self.target.target_name(), id, "Reference is not an object id")
        })?;
        let reference = DbRef::new(self.target.schema()?.collection(), oid);

        Ok(match &self.db {
            Some(db) => reference.with_database(db.clone()),
            None => reference,
        })
    }

    /// The value to store for a reference to `document`.
    pub fn to_ref(&self, document: &Document) -> MapperResult<Value> {
        document.id().cloned()
    }
}

impl FieldKind for SRefField {
    fn type_name(&self) -> &'static str {
        "SRefField"
    }

    fn validate_wrap(&self, value: &Value) -> KindResult<()> {
        match value {
            Value::ObjectId(_) => Ok(()),
            other => Err(Rejection::type_mismatch("object id", other)),
        }
    }

    fn validate_unwrap(&self, native: &Bson) -> KindResult<()> {
        match native {
            Bson::ObjectId(_) => Ok(()),
            other => Err(Rejection::native_mismatch("an object id", other)),
        }
    }

    fn wrap(&self, value: &Value) -> KindResult<Bson> {
        match value {
            Value::ObjectId(oid) => Ok(Bson::ObjectId(*oid)),
            other => Err(Rejection::type_mismatch("object id", other)),
        }
    }

    fn unwrap(&self, native: &Bson) -> KindResult<Value> {
        match native {
            Bson::ObjectId(oid) => Ok(Value::ObjectId(*oid)),
            other => Err(Rejection::native_mismatch("an object id", other)),
        }
    }

    fn document_target(&self) -> Option<&DocumentField> {
        Some(&self.target)
    }
}

/// A full database reference, stored in the native DBRef layout.
#[derive(Debug, Default)]
pub struct RefField {
    target: Option<DocumentField>,
    db: Option<String>,
    db_required: bool,
}

impl RefField {
    /// A reference to any collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// A reference that must point into the target schema's collection.
    pub fn to(target: DocumentField) -> Self {
        Self {
            target: Some(target),
            ..Self::default()
        }
    }

    /// The database references must point into, when they name one.
    pub fn db(mut self, db: impl Into<String>) -> Self {
        self.db = Some(db.into());
        self
    }

    pub fn db_required(mut self) -> Self {
        self.db_required = true;
        self
    }

    pub fn target(&self) -> Option<&DocumentField> {
        self.target.as_ref()
    }

    /// The reference to store for `document`.
    pub fn to_ref(&self, document: &Document) -> MapperResult<Value> {
        let reference = document.to_ref()?;

        Ok(Value::Ref(match &self.db {
            Some(db) => reference.with_database(db.clone()),
            None => reference,
        }))
    }

    fn check_reference(&self, reference: &DbRef) -> KindResult<()> {
        if let Some(target) = &self.target {
            let expected = target.schema()?.collection();
            if reference.collection != expected {
                return Err(Rejection::new(format!(
                    "Wrong collection for reference: got \"{}\" instead of \"{expected}\"",
                    reference.collection
                )));
            }
        }

        if self.db_required && reference.database.is_none() {
            return Err(Rejection::new(
                "db_required is set, but no database was specified",
            ));
        }

        match (&self.db, &reference.database) {
            (Some(expected), Some(got)) if expected != got => Err(Rejection::new(format!(
                "Wrong database for reference: got \"{got}\" instead of \"{expected}\""
            ))),
            _ => Ok(()),
        }
    }

    fn native_reference(native: &Bson) -> KindResult<DbRef> {
        native
            .as_document()
            .and_then(DbRef::from_document)
            .ok_or_else(|| Rejection::native_mismatch("a database reference", native))
    }
}

impl FieldKind for RefField {
    fn type_name(&self) -> &'static str {
        "RefField"
    }

    fn validate_wrap(&self, value: &Value) -> KindResult<()> {
        let reference = value
            .as_dbref()
            .ok_or_else(|| Rejection::type_mismatch("reference", value))?;

        self.check_reference(reference)
    }

    fn validate_unwrap(&self, native: &Bson) -> KindResult<()> {
        self.check_reference(&Self::native_reference(native)?)
    }

    fn wrap(&self, value: &Value) -> KindResult<Bson> {
        self.validate_wrap(value)?;

        match value.as_dbref() {
            Some(reference) => Ok(Bson::Document(reference.to_document())),
            None => Err(Rejection::type_mismatch("reference", value)),
        }
    }

    fn unwrap(&self, native: &Bson) -> KindResult<Value> {
        let reference = Self::native_reference(native)?;

        self.check_reference(&reference)?;
        Ok(Value::Ref(reference))
    }

    fn document_target(&self) -> Option<&DocumentField> {
        self.target.as_ref()
    }
}
