//! Application-side values.
//!
//! [`Value`] is what callers assign to and read from document fields. Fields convert a
//! `Value` into storage-native [`Bson`] on wrap and back on unwrap. A handful of variants
//! have no direct native counterpart (sets, tuples, maps with non-string keys) and only
//! make sense through the field that declares them.

use bson::{Binary, Bson, doc, oid::ObjectId, spec::BinarySubtype};
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::{
    document::Document,
    error::{MapperError, MapperResult},
};

/// A database reference: collection, identity and optionally the database holding it.
#[derive(Debug, Clone, PartialEq)]
pub struct DbRef {
    pub collection: String,
    pub id: Bson,
    pub database: Option<String>,
}

impl DbRef {
    pub fn new(collection: impl Into<String>, id: impl Into<Bson>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            database: None,
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Native DBRef layout: `{"$ref": .., "$id": .., "$db": ..}`.
    pub fn to_document(&self) -> bson::Document {
        let mut native = doc! {
            "$ref": self.collection.clone(),
            "$id": self.id.clone(),
        };

        if let Some(database) = &self.database {
            native.insert("$db", database.clone());
        }

        native
    }

    pub fn from_document(native: &bson::Document) -> Option<Self> {
        let collection = native.get_str("$ref").ok()?;
        let id = native.get("$id")?;
        let database = native.get_str("$db").ok().map(str::to_string);

        Some(Self {
            collection: collection.to_string(),
            id: id.clone(),
            database,
        })
    }
}

/// A typed application value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
    ObjectId(ObjectId),
    Uuid(bson::Uuid),
    /// A datetime without timezone information.
    DateTime(NaiveDateTime),
    /// A timezone-aware datetime.
    DateTimeUtc(DateTime<Utc>),
    List(Vec<Value>),
    /// Unordered, duplicate-free collection. Build with [`Value::set`].
    Set(Vec<Value>),
    Tuple(Vec<Value>),
    /// Unordered mapping with arbitrary keys.
    Map(Vec<(Value, Value)>),
    Document(Box<Document>),
    Ref(DbRef),
    /// A native value with no typed counterpart, kept verbatim.
    Native(Bson),
}

impl Value {
    pub fn list<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Builds a set, dropping duplicates while keeping first-seen order.
    pub fn set<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Value::Set(dedup(items.into_iter().map(Into::into).collect()))
    }

    pub fn tuple<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Value::Tuple(items.into_iter().map(Into::into).collect())
    }

    /// Builds a map; a later entry replaces an earlier one with an equal key.
    pub fn map<K: Into<Value>, V: Into<Value>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        let mut out: Vec<(Value, Value)> = Vec::new();

        for (key, value) in entries {
            let key = key.into();
            let value = value.into();

            match out.iter_mut().find(|(existing, _)| *existing == key) {
                Some(slot) => slot.1 = value,
                None => out.push((key, value)),
            }
        }

        Value::Map(out)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Value::ObjectId(value) => Some(*value),
            _ => None,
        }
    }

    /// Elements of a list, set or tuple.
    pub fn as_items(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Set(items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_items_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::List(items) | Value::Set(items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Looks up a map entry by string key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(document) => Some(document),
            _ => None,
        }
    }

    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Value::Document(document) => Some(document),
            _ => None,
        }
    }

    pub fn as_dbref(&self) -> Option<&DbRef> {
        match self {
            Value::Ref(reference) => Some(reference),
            _ => None,
        }
    }

    /// Short kind name used in validation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Binary(_) => "binary",
            Value::ObjectId(_) => "object id",
            Value::Uuid(_) => "uuid",
            Value::DateTime(_) => "datetime",
            Value::DateTimeUtc(_) => "aware datetime",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Tuple(_) => "tuple",
            Value::Map(_) => "map",
            Value::Document(_) => "document",
            Value::Ref(_) => "reference",
            Value::Native(_) => "native",
        }
    }

    /// Generic conversion used for untyped data (extra fields, `AnythingField`).
    ///
    /// # Errors
    ///
    /// Fails with [`MapperError::Serialization`] for maps with non-string keys and
    /// propagates failures from nested documents.
    pub fn to_bson(&self) -> MapperResult<Bson> {
        Ok(match self {
            Value::Null => Bson::Null,
            Value::Bool(value) => Bson::Boolean(*value),
            Value::Int(value) => int_to_bson(*value),
            Value::Float(value) => Bson::Double(*value),
            Value::String(value) => Bson::String(value.clone()),
            Value::Binary(bytes) => binary_to_bson(bytes),
            Value::ObjectId(oid) => Bson::ObjectId(*oid),
            Value::Uuid(uuid) => Bson::from(*uuid),
            Value::DateTime(naive) => naive_to_bson(naive),
            Value::DateTimeUtc(aware) => Bson::DateTime(bson::DateTime::from_chrono(*aware)),
            Value::List(items) | Value::Tuple(items) => Bson::Array(
                items
                    .iter()
                    .map(Value::to_bson)
                    .collect::<MapperResult<Vec<_>>>()?,
            ),
            Value::Set(items) => Bson::Array(
                dedup(items.clone())
                    .iter()
                    .map(Value::to_bson)
                    .collect::<MapperResult<Vec<_>>>()?,
            ),
            Value::Map(entries) => {
                let mut native = bson::Document::new();

                for (key, value) in entries {
                    let key = key.as_str().ok_or_else(|| {
                        MapperError::Serialization(format!(
                            "map key {key:?} is not a string"
                        ))
                    })?;
                    native.insert(key, value.to_bson()?);
                }

                Bson::Document(native)
            }
            Value::Document(document) => Bson::Document(document.wrap()?),
            Value::Ref(reference) => Bson::Document(reference.to_document()),
            Value::Native(native) => native.clone(),
        })
    }

    /// Inverse of [`Value::to_bson`]. Native arrays come back as lists, sub-documents
    /// as string-keyed maps (or references when shaped like a DBRef), and datetimes as
    /// UTC datetimes.
    pub fn from_bson(native: &Bson) -> Value {
        match native {
            Bson::Null | Bson::Undefined => Value::Null,
            Bson::Boolean(value) => Value::Bool(*value),
            Bson::Int32(value) => Value::Int(i64::from(*value)),
            Bson::Int64(value) => Value::Int(*value),
            Bson::Double(value) => Value::Float(*value),
            Bson::String(value) => Value::String(value.clone()),
            Bson::Binary(binary) => match uuid_from_binary(binary) {
                Some(uuid) => Value::Uuid(uuid),
                None => Value::Binary(binary.bytes.clone()),
            },
            Bson::ObjectId(oid) => Value::ObjectId(*oid),
            Bson::DateTime(datetime) => Value::DateTimeUtc(datetime.to_chrono()),
            Bson::Array(items) => Value::List(items.iter().map(Value::from_bson).collect()),
            Bson::Document(native) => match DbRef::from_document(native) {
                Some(reference) => Value::Ref(reference),
                None => Value::Map(
                    native
                        .iter()
                        .map(|(k, v)| (Value::String(k.clone()), Value::from_bson(v)))
                        .collect(),
                ),
            },
            other => Value::Native(other.clone()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (Value::ObjectId(a), Value::ObjectId(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::DateTimeUtc(a), Value::DateTimeUtc(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => {
                a.iter().all(|item| b.contains(item)) && b.iter().all(|item| a.contains(item))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, value)| {
                        b.iter().any(|(other_key, other_value)| {
                            key == other_key && value == other_value
                        })
                    })
            }
            (Value::Document(a), Value::Document(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => a == b,
            (Value::Native(a), Value::Native(b)) => a == b,
            _ => false,
        }
    }
}

pub(crate) fn dedup(items: Vec<Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(items.len());

    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }

    out
}

pub(crate) fn int_to_bson(value: i64) -> Bson {
    match i32::try_from(value) {
        Ok(small) => Bson::Int32(small),
        Err(_) => Bson::Int64(value),
    }
}

pub(crate) fn binary_to_bson(bytes: &[u8]) -> Bson {
    Bson::Binary(Binary {
        subtype: BinarySubtype::Generic,
        bytes: bytes.to_vec(),
    })
}

pub(crate) fn naive_to_bson(naive: &NaiveDateTime) -> Bson {
    Bson::DateTime(bson::DateTime::from_millis(
        naive.and_utc().timestamp_millis(),
    ))
}

pub(crate) fn uuid_from_binary(binary: &Binary) -> Option<bson::Uuid> {
    if binary.subtype != BinarySubtype::Uuid {
        return None;
    }

    <[u8; 16]>::try_from(binary.bytes.as_slice())
        .ok()
        .map(bson::Uuid::from_bytes)
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<ObjectId> for Value {
    fn from(value: ObjectId) -> Self {
        Value::ObjectId(value)
    }
}

impl From<bson::Uuid> for Value {
    fn from(value: bson::Uuid) -> Self {
        Value::Uuid(value)
    }
}

impl From<uuid::Uuid> for Value {
    fn from(value: uuid::Uuid) -> Self {
        Value::Uuid(bson::Uuid::from(value))
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTimeUtc(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<Document> for Value {
    fn from(value: Document) -> Self {
        Value::Document(Box::new(value))
    }
}

impl From<DbRef> for Value {
    fn from(value: DbRef) -> Self {
        Value::Ref(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_equality_ignores_order_and_duplicates() {
        let left = Value::set(["a", "b", "a"]);
        let right = Value::set(["b", "a"]);

        assert_eq!(left, right);
        assert_eq!(left.as_items().map(<[Value]>::len), Some(2));
    }

    #[test]
    fn test_map_equality_ignores_order() {
        let left = Value::map([("x", 1), ("y", 2)]);
        let right = Value::map([("y", 2), ("x", 1)]);

        assert_eq!(left, right);
        assert_ne!(left, Value::map([("x", 1)]));
    }

    #[test]
    fn test_int_and_float_are_distinct() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }

    #[test]
    fn test_generic_conversion_keeps_dbrefs() {
        let oid = ObjectId::new();
        let reference = DbRef::new("people", oid).with_database("main");
        let native = Value::Ref(reference.clone()).to_bson().unwrap();

        assert_eq!(Value::from_bson(&native), Value::Ref(reference));
    }

    #[test]
    fn test_generic_conversion_rejects_non_string_keys() {
        let value = Value::map([(1, "one")]);

        assert!(matches!(value.to_bson(), Err(MapperError::Serialization(_))));
    }

    #[test]
    fn test_small_ints_wrap_to_int32() {
        assert_eq!(Value::Int(5).to_bson().unwrap(), Bson::Int32(5));
        assert_eq!(
            Value::Int(i64::from(i32::MAX) + 1).to_bson().unwrap(),
            Bson::Int64(i64::from(i32::MAX) + 1)
        );
    }
}
