//! Embedded documents.

use std::sync::{Arc, OnceLock};

use bson::Bson;

use crate::{
    document::Document,
    error::{MapperError, MapperResult},
    field::{Field, FieldKind, KindResult, Rejection},
    schema::DocumentSchema,
    value::Value,
};

#[derive(Debug)]
enum Target {
    Schema(Arc<DocumentSchema>),
    /// Resolved by name through the registry when schemas are linked.
    Named {
        name: String,
        resolved: OnceLock<Arc<DocumentSchema>>,
    },
}

/// A document of another schema, stored as a sub-document.
///
/// The target is either a schema handle or the name of a schema registered in the same
/// namespace, which allows self-referential and mutually recursive schemas. Named
/// targets are resolved by [`Registry::link`](crate::registry::Registry::link).
#[derive(Debug)]
pub struct DocumentField {
    target: Target,
}

impl DocumentField {
    pub fn new(schema: &Arc<DocumentSchema>) -> Self {
        Self {
            target: Target::Schema(Arc::clone(schema)),
        }
    }

    /// Targets a schema by its registered name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            target: Target::Named {
                name: name.into(),
                resolved: OnceLock::new(),
            },
        }
    }

    /// The target schema.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::BadFieldSpecification`] if the target is a name that has
    /// not been resolved yet.
    pub fn schema(&self) -> MapperResult<&Arc<DocumentSchema>> {
        match &self.target {
            Target::Schema(schema) => Ok(schema),
            Target::Named { name, resolved } => resolved.get().ok_or_else(|| {
                MapperError::BadFieldSpecification(format!(
                    "no type found for {name}; it may not be registered yet"
                ))
            }),
        }
    }

    pub fn target_name(&self) -> &str {
        match &self.target {
            Target::Schema(schema) => schema.name(),
            Target::Named { name, .. } => name,
        }
    }

    /// The target name while it is still unresolved.
    pub fn pending_name(&self) -> Option<&str> {
        match &self.target {
            Target::Named { name, resolved } if resolved.get().is_none() => Some(name),
            _ => None,
        }
    }

    pub(crate) fn resolve_with(&self, schema: Arc<DocumentSchema>) {
        if let Target::Named { resolved, .. } = &self.target {
            let _ = resolved.set(schema);
        }
    }

    pub(crate) fn unwrap_retrieved(
        &self,
        native: &Bson,
        retrieved: Option<&[String]>,
    ) -> KindResult<Value> {
        let schema = self.schema()?;
        let native = native
            .as_document()
            .ok_or_else(|| Rejection::native_mismatch("a document", native))?;

        Ok(Document::unwrap(schema, native, retrieved).map(Value::from)?)
    }
}

impl FieldKind for DocumentField {
    fn type_name(&self) -> &'static str {
        "DocumentField"
    }

    fn validate_wrap(&self, value: &Value) -> KindResult<()> {
        let schema = self.schema()?;

        match value.as_document() {
            Some(document) if Arc::ptr_eq(document.schema(), schema) => Ok(()),
            _ => Err(Rejection::new(format!(
                "Value is not an instance of {} (got: {})",
                schema.name(),
                value.type_name()
            ))),
        }
    }

    fn validate_unwrap(&self, native: &Bson) -> KindResult<()> {
        match native {
            Bson::Document(_) => Ok(()),
            other => Err(Rejection::native_mismatch("a document", other)),
        }
    }

    fn wrap(&self, value: &Value) -> KindResult<Bson> {
        self.validate_wrap(value)?;

        match value.as_document() {
            Some(document) => Ok(Bson::Document(document.wrap()?)),
            None => Err(Rejection::type_mismatch("document", value)),
        }
    }

    fn unwrap(&self, native: &Bson) -> KindResult<Value> {
        self.unwrap_retrieved(native, None)
    }

    fn subfield(&self, name: &str) -> Option<(&Field, String)> {
        let field = self.schema().ok()?.field(name)?;
        Some((field, field.storage_name().to_string()))
    }

    fn document_target(&self) -> Option<&DocumentField> {
        Some(self)
    }
}
