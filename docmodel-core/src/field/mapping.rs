//! Mapping kinds: string-keyed dictionaries and arbitrary key/value collections.

use bson::Bson;

use crate::{
    error::MapperError,
    field::{Field, FieldKind, KindResult, Rejection},
    value::Value,
};

const KEY: &str = "k";
const VALUE: &str = "v";

/// A mapping from strings to values of one field, stored as a sub-document.
///
/// Keys may not contain `.` or `$`.
#[derive(Debug)]
pub struct DictField {
    value: Field,
}

impl DictField {
    pub fn new(value: impl Into<Field>) -> Self {
        Self {
            value: value.into(),
        }
    }

    fn check_key(key: &Value) -> KindResult<&str> {
        let key = key
            .as_str()
            .ok_or_else(|| Rejection::new(format!("Dictionary key {key:?} is not a string")))?;

        if key.contains('.') || key.contains('$') {
            return Err(Rejection::new(format!(
                "Dictionary key {key:?} cannot contain '.' or '$'"
            )));
        }

        Ok(key)
    }

    fn entries(value: &Value) -> KindResult<&[(Value, Value)]> {
        value
            .as_map()
            .ok_or_else(|| Rejection::type_mismatch("map", value))
    }

    fn bad_entry(key: &str, err: MapperError) -> Rejection {
        Rejection::because(format!("Bad value for key {key:?}"), err)
    }
}

impl FieldKind for DictField {
    fn type_name(&self) -> &'static str {
        "DictField"
    }

    fn validate_wrap(&self, value: &Value) -> KindResult<()> {
        Self::entries(value)?.iter().try_for_each(|(key, item)| {
            let key = Self::check_key(key)?;
            self.value
                .validate_wrap(item)
                .map_err(|err| Self::bad_entry(key, err))
        })
    }

    fn validate_unwrap(&self, native: &Bson) -> KindResult<()> {
        let native = native
            .as_document()
            .ok_or_else(|| Rejection::native_mismatch("a document", native))?;

        native.iter().try_for_each(|(key, item)| {
            self.value
                .validate_unwrap(item)
                .map_err(|err| Self::bad_entry(key, err))
        })
    }

    fn wrap(&self, value: &Value) -> KindResult<Bson> {
        let mut native = bson::Document::new();

        for (key, item) in Self::entries(value)? {
            let key = Self::check_key(key)?;
            let item = self
                .value
                .wrap(item)
                .map_err(|err| Self::bad_entry(key, err))?;
            native.insert(key, item);
        }

        Ok(Bson::Document(native))
    }

    fn unwrap(&self, native: &Bson) -> KindResult<Value> {
        let native = native
            .as_document()
            .ok_or_else(|| Rejection::native_mismatch("a document", native))?;

        native
            .iter()
            .map(|(key, item)| {
                self.value
                    .unwrap(item)
                    .map(|item| (Value::String(key.clone()), item))
                    .map_err(|err| Self::bad_entry(key, err))
            })
            .collect::<KindResult<Vec<_>>>()
            .map(Value::Map)
    }

    fn subfield(&self, name: &str) -> Option<(&Field, String)> {
        Some((&self.value, name.to_string()))
    }

    fn children(&self) -> Vec<&Field> {
        vec![&self.value]
    }

    fn bind_children(&mut self, name: &str) {
        self.value.bind(name);
    }
}

/// A mapping with arbitrary typed keys, stored as an array of `{k, v}` documents.
#[derive(Debug)]
pub struct KeyValueField {
    key: Field,
    value: Field,
}

impl KeyValueField {
    pub fn new(key: impl Into<Field>, value: impl Into<Field>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    fn entries(value: &Value) -> KindResult<&[(Value, Value)]> {
        value
            .as_map()
            .ok_or_else(|| Rejection::type_mismatch("map", value))
    }

    fn native_pairs(native: &Bson) -> KindResult<Vec<(&Bson, &Bson)>> {
        let natives = native
            .as_array()
            .ok_or_else(|| Rejection::native_mismatch("an array", native))?;

        natives
            .iter()
            .map(|entry| {
                let pair = entry
                    .as_document()
                    .and_then(|entry| Some((entry.get(KEY)?, entry.get(VALUE)?)));

                pair.ok_or_else(|| Rejection::native_mismatch("a {k, v} document", entry))
            })
            .collect()
    }
}

impl FieldKind for KeyValueField {
    fn type_name(&self) -> &'static str {
        "KVField"
    }

    fn validate_wrap(&self, value: &Value) -> KindResult<()> {
        Self::entries(value)?.iter().try_for_each(|(key, item)| {
            self.key
                .validate_wrap(key)
                .map_err(|err| Rejection::because("Bad key", err))?;
            self.value
                .validate_wrap(item)
                .map_err(|err| Rejection::because("Bad value", err))
        })
    }

    fn validate_unwrap(&self, native: &Bson) -> KindResult<()> {
        Self::native_pairs(native)?
            .into_iter()
            .try_for_each(|(key, item)| {
                self.key
                    .validate_unwrap(key)
                    .map_err(|err| Rejection::because("Bad stored key", err))?;
                self.value
                    .validate_unwrap(item)
                    .map_err(|err| Rejection::because("Bad stored value", err))
            })
    }

    fn wrap(&self, value: &Value) -> KindResult<Bson> {
        let mut natives = Vec::new();

        for (key, item) in Self::entries(value)? {
            let mut entry = bson::Document::new();
            entry.insert(
                KEY,
                self.key
                    .wrap(key)
                    .map_err(|err| Rejection::because("Bad key", err))?,
            );
            entry.insert(
                VALUE,
                self.value
                    .wrap(item)
                    .map_err(|err| Rejection::because("Bad value", err))?,
            );
            natives.push(Bson::Document(entry));
        }

        Ok(Bson::Array(natives))
    }

    fn unwrap(&self, native: &Bson) -> KindResult<Value> {
        let mut entries = Vec::new();

        for (key, item) in Self::native_pairs(native)? {
            let key = self
                .key
                .unwrap(key)
                .map_err(|err| Rejection::because("Bad stored key", err))?;
            let item = self
                .value
                .unwrap(item)
                .map_err(|err| Rejection::because("Bad stored value", err))?;
            entries.push((key, item));
        }

        Ok(Value::Map(entries))
    }

    fn subfield(&self, name: &str) -> Option<(&Field, String)> {
        match name {
            KEY => Some((&self.key, KEY.to_string())),
            VALUE => Some((&self.value, VALUE.to_string())),
            _ => None,
        }
    }

    fn children(&self) -> Vec<&Field> {
        vec![&self.key, &self.value]
    }

    fn bind_children(&mut self, _name: &str) {
        self.key.bind(KEY);
        self.value.bind(VALUE);
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;
    use crate::field::{IntField, StringField};

    #[test]
    fn test_dict_wraps_to_subdocument() {
        let field = Field::new(DictField::new(IntField::new()));
        let value = Value::map([("a", 1), ("b", 2)]);

        let native = field.wrap(&value).unwrap();
        assert_eq!(native, Bson::Document(doc! { "a": 1, "b": 2 }));
        assert_eq!(field.unwrap(&native).unwrap(), value);
    }

    #[test]
    fn test_dict_rejects_reserved_key_characters() {
        let field = Field::new(DictField::new(IntField::new()));

        assert!(field.wrap(&Value::map([("a.b", 1)])).is_err());
        assert!(field.wrap(&Value::map([("$a", 1)])).is_err());
        assert!(field.wrap(&Value::map([(1, 1)])).is_err());
    }

    #[test]
    fn test_dict_value_errors_name_the_key() {
        let field = Field::new(DictField::new(IntField::new()));
        let err = field.wrap(&Value::map([("a", "x")])).unwrap_err();

        match err {
            MapperError::BadValue { reason, cause, .. } => {
                assert!(reason.contains("Bad value for key"));
                assert!(cause.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_key_value_stores_pairs() {
        let field = Field::new(KeyValueField::new(IntField::new(), StringField::new()));
        let value = Value::map([(1, "one"), (2, "two")]);

        let native = field.wrap(&value).unwrap();
        assert_eq!(
            native,
            Bson::Array(vec![
                Bson::Document(doc! { "k": 1, "v": "one" }),
                Bson::Document(doc! { "k": 2, "v": "two" }),
            ])
        );
        assert_eq!(field.unwrap(&native).unwrap(), value);
    }

    #[test]
    fn test_key_value_subfields() {
        let field = Field::new(KeyValueField::new(IntField::new(), StringField::new()));

        assert_eq!(field.subfield("k").map(|(_, path)| path), Some("k".to_string()));
        assert!(field.subfield("x").is_none());
    }
}
