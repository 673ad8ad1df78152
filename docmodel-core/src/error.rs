//! Error types and result types for mapping operations.
//!
//! Every fallible operation in this crate returns [`MapperResult<T>`]. The variants of
//! [`MapperError`] are kinds rather than call sites: a validation failure deep inside a
//! nested field surfaces as a [`MapperError::BadValue`] whose `cause` chain points at the
//! field that actually rejected the value.

use bson::error::Error as BsonError;
use thiserror::Error;

/// Represents all possible errors raised while declaring schemas, converting values,
/// building expressions, or talking to a store backend.
#[derive(Error, Debug)]
pub enum MapperError {
    /// A value failed a field's validation step.
    #[error("Bad value for field \"{field}\": {reason} (value: {value})")]
    BadValue {
        /// Name of the field that rejected the value.
        field: String,
        /// Debug rendering of the offending value.
        value: String,
        /// Human readable reason.
        reason: String,
        /// Failure reported by a nested field, if any.
        #[source]
        cause: Option<Box<MapperError>>,
    },
    /// A required field had no value when one was demanded.
    #[error("Missing value for required field: {0}")]
    MissingValue(String),
    /// An undeclared key was supplied while the extra-fields policy is `error`.
    #[error("Unexpected value for undeclared field: {0}")]
    ExtraValue(String),
    /// The field was excluded from a partial load.
    #[error("Field was not retrieved: {0}")]
    FieldNotRetrieved(String),
    /// The field was retrieved (or never loaded) but holds no value.
    #[error("Field has no value: {0}")]
    FieldNotSet(String),
    /// The name does not refer to a declared field.
    #[error("Unknown field: {0}")]
    FieldNotFound(String),
    /// A field was misconfigured when its schema was declared.
    #[error("Bad field specification: {0}")]
    BadFieldSpecification(String),
    /// Mutually exclusive or out-of-range configuration options.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// A query builder call is structurally illegal.
    #[error("Bad query: {0}")]
    BadQuery(String),
    /// An update operator is not legal for the target field's kind.
    #[error("Invalid modifier {op} for {kind} field \"{field}\"")]
    InvalidModifier {
        /// Storage path of the targeted field.
        field: String,
        /// Kind name of the targeted field.
        kind: String,
        /// The rejected operator.
        op: String,
    },
    /// A result-shape expectation was violated.
    #[error("Bad result: {0}")]
    BadResult(String),
    /// Conversion between native and application representations failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during backend initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for mapping operations.
pub type MapperResult<T> = Result<T, MapperError>;

impl MapperError {
    /// Builds a [`MapperError::BadValue`] without an inner cause.
    pub fn bad_value(
        field: impl Into<String>,
        value: &impl std::fmt::Debug,
        reason: impl Into<String>,
    ) -> Self {
        MapperError::BadValue {
            field: field.into(),
            value: format!("{value:?}"),
            reason: reason.into(),
            cause: None,
        }
    }

    /// Returns the innermost error of a `BadValue` cause chain.
    pub fn root_cause(&self) -> &MapperError {
        match self {
            MapperError::BadValue { cause: Some(inner), .. } => inner.root_cause(),
            other => other,
        }
    }
}

impl From<BsonError> for MapperError {
    fn from(err: BsonError) -> Self {
        MapperError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_follows_nested_bad_values() {
        let inner = MapperError::bad_value("street", &3, "Value is not a string");
        let outer = MapperError::BadValue {
            field: "address".into(),
            value: "{..}".into(),
            reason: "Bad value for nested document".into(),
            cause: Some(Box::new(inner)),
        };

        match outer.root_cause() {
            MapperError::BadValue { field, .. } => assert_eq!(field, "street"),
            other => panic!("unexpected root cause: {other:?}"),
        }
    }

    #[test]
    fn test_display_includes_field_and_reason() {
        let err = MapperError::bad_value("age", &-1, "Value too small");
        let rendered = err.to_string();

        assert!(rendered.contains("age"));
        assert!(rendered.contains("Value too small"));
    }
}
