//! Convenient re-exports of commonly used types from docmodel.
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```
//!
//! This provides access to:
//! - Field kinds and field configuration
//! - Schemas, the registry and documents
//! - Query and update construction
//! - Store backends, builders and sessions
//! - Error types

pub use docmodel_core::{
    backend::{FindSpec, ModifyAction, ModifySpec, StoreBackend, StoreBackendBuilder, UpdateAck},
    document::Document,
    error::{MapperError, MapperResult},
    field::{
        AnythingField, BinaryField, BoolField, ComputedArgs, ComputedField, DateTimeField,
        DictField, DocumentField, EnumField, Field, FloatField, IntField, KeyValueField,
        ListField, ObjectIdField, OnUpdate, PolymorphicField, RefField, RegexStringField,
        SRefField, SetField, StringField, TupleField, UpdateOp, UuidField,
    },
    index::Index,
    query::{Query, QueryExpression, SortDirection},
    registry::Registry,
    schema::{DocumentSchema, ExtraFields},
    session::{Session, UpdateOptions},
    update::{FindAndModifyExpression, UpdateExpression},
    value::{DbRef, Value},
};
