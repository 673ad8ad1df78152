//! Homogeneous sequence kinds.

use bson::Bson;

use crate::{
    field::{Field, FieldKind, KindResult, Modifiers, Rejection},
    value::{Value, dedup},
};

#[derive(Debug)]
struct Sequence {
    item: Field,
    min_capacity: Option<usize>,
    max_capacity: Option<usize>,
    default_empty: bool,
}

impl Sequence {
    fn new(item: Field) -> Self {
        Self {
            item,
            min_capacity: None,
            max_capacity: None,
            default_empty: false,
        }
    }

    fn check(&self) -> Result<(), String> {
        match (self.min_capacity, self.max_capacity) {
            (Some(min), Some(max)) if min > max => {
                Err(format!("min_capacity {min} is greater than max_capacity {max}"))
            }
            _ => Ok(()),
        }
    }

    fn check_length(&self, length: usize) -> KindResult<()> {
        if self.min_capacity.is_some_and(|min| length < min) {
            return Err(Rejection::new("Value has too few elements"));
        }
        if self.max_capacity.is_some_and(|max| length > max) {
            return Err(Rejection::new("Value has too many elements"));
        }

        Ok(())
    }

    fn validate_items(&self, items: &[Value]) -> KindResult<()> {
        self.check_length(items.len())?;

        items.iter().try_for_each(|item| {
            self.item
                .validate_wrap(item)
                .map_err(|err| Rejection::because("Bad value in sequence", err))
        })
    }

    fn validate_natives(&self, natives: &[Bson]) -> KindResult<()> {
        natives.iter().try_for_each(|native| {
            self.item
                .validate_unwrap(native)
                .map_err(|err| Rejection::because("Bad stored value in sequence", err))
        })
    }

    fn wrap_items(&self, items: &[Value]) -> KindResult<Bson> {
        items
            .iter()
            .map(|item| {
                self.item
                    .wrap(item)
                    .map_err(|err| Rejection::because("Bad value in sequence", err))
            })
            .collect::<KindResult<Vec<_>>>()
            .map(Bson::Array)
    }

    fn unwrap_items(&self, native: &Bson) -> KindResult<Vec<Value>> {
        let natives = native
            .as_array()
            .ok_or_else(|| Rejection::native_mismatch("an array", native))?;

        natives
            .iter()
            .map(|native| {
                self.item
                    .unwrap(native)
                    .map_err(|err| Rejection::because("Bad stored value in sequence", err))
            })
            .collect()
    }
}

/// An ordered list of values of one item field.
#[derive(Debug)]
pub struct ListField {
    inner: Sequence,
}

impl ListField {
    pub fn new(item: impl Into<Field>) -> Self {
        Self {
            inner: Sequence::new(item.into()),
        }
    }

    pub fn min_capacity(mut self, min: usize) -> Self {
        self.inner.min_capacity = Some(min);
        self
    }

    pub fn max_capacity(mut self, max: usize) -> Self {
        self.inner.max_capacity = Some(max);
        self
    }

    /// Defaults a missing value to an empty list.
    pub fn default_empty(mut self) -> Self {
        self.inner.default_empty = true;
        self
    }

    fn items(value: &Value) -> KindResult<&[Value]> {
        match value {
            Value::List(items) => Ok(items),
            other => Err(Rejection::type_mismatch("list", other)),
        }
    }
}

impl FieldKind for ListField {
    fn type_name(&self) -> &'static str {
        "ListField"
    }

    fn valid_modifiers(&self) -> Modifiers {
        Modifiers::LIST
    }

    fn check(&self) -> Result<(), String> {
        self.inner.check()
    }

    fn validate_wrap(&self, value: &Value) -> KindResult<()> {
        self.inner.validate_items(Self::items(value)?)
    }

    fn validate_unwrap(&self, native: &Bson) -> KindResult<()> {
        let natives = native
            .as_array()
            .ok_or_else(|| Rejection::native_mismatch("an array", native))?;

        self.inner.check_length(natives.len())?;
        self.inner.validate_natives(natives)
    }

    fn wrap(&self, value: &Value) -> KindResult<Bson> {
        let items = Self::items(value)?;

        self.inner.validate_items(items)?;
        self.inner.wrap_items(items)
    }

    fn unwrap(&self, native: &Bson) -> KindResult<Value> {
        self.inner.unwrap_items(native).map(Value::List)
    }

    fn generated_default(&self) -> Option<Value> {
        self.inner.default_empty.then(|| Value::List(Vec::new()))
    }

    fn is_sequence(&self) -> bool {
        true
    }

    fn item(&self) -> Option<&Field> {
        Some(&self.inner.item)
    }

    fn subfield(&self, name: &str) -> Option<(&Field, String)> {
        self.inner.item.subfield(name)
    }

    fn children(&self) -> Vec<&Field> {
        vec![&self.inner.item]
    }

    fn bind_children(&mut self, name: &str) {
        self.inner.item.bind(name);
    }
}

/// An unordered collection of distinct values, stored as an array.
///
/// Duplicates are dropped on both wrap and unwrap; capacity bounds count distinct items.
#[derive(Debug)]
pub struct SetField {
    inner: Sequence,
}

impl SetField {
    pub fn new(item: impl Into<Field>) -> Self {
        Self {
            inner: Sequence::new(item.into()),
        }
    }

    pub fn min_capacity(mut self, min: usize) -> Self {
        self.inner.min_capacity = Some(min);
        self
    }

    pub fn max_capacity(mut self, max: usize) -> Self {
        self.inner.max_capacity = Some(max);
        self
    }

    pub fn default_empty(mut self) -> Self {
        self.inner.default_empty = true;
        self
    }

    fn distinct(value: &Value) -> KindResult<Vec<Value>> {
        match value {
            Value::Set(items) | Value::List(items) => Ok(dedup(items.clone())),
            other => Err(Rejection::type_mismatch("set", other)),
        }
    }
}

impl FieldKind for SetField {
    fn type_name(&self) -> &'static str {
        "SetField"
    }

    fn valid_modifiers(&self) -> Modifiers {
        Modifiers::LIST
    }

    fn check(&self) -> Result<(), String> {
        self.inner.check()
    }

    fn validate_wrap(&self, value: &Value) -> KindResult<()> {
        self.inner.validate_items(&Self::distinct(value)?)
    }

    fn validate_unwrap(&self, native: &Bson) -> KindResult<()> {
        let natives = native
            .as_array()
            .ok_or_else(|| Rejection::native_mismatch("an array", native))?;

        self.inner.validate_natives(natives)?;

        let distinct = dedup(natives.iter().map(Value::from_bson).collect());
        self.inner.check_length(distinct.len())
    }

    fn wrap(&self, value: &Value) -> KindResult<Bson> {
        let items = Self::distinct(value)?;

        self.inner.validate_items(&items)?;
        self.inner.wrap_items(&items)
    }

    fn unwrap(&self, native: &Bson) -> KindResult<Value> {
        self.inner
            .unwrap_items(native)
            .map(|items| Value::Set(dedup(items)))
    }

    fn generated_default(&self) -> Option<Value> {
        self.inner.default_empty.then(|| Value::Set(Vec::new()))
    }

    fn is_sequence(&self) -> bool {
        true
    }

    fn item(&self) -> Option<&Field> {
        Some(&self.inner.item)
    }

    fn subfield(&self, name: &str) -> Option<(&Field, String)> {
        self.inner.item.subfield(name)
    }

    fn children(&self) -> Vec<&Field> {
        vec![&self.inner.item]
    }

    fn bind_children(&mut self, name: &str) {
        self.inner.item.bind(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::MapperError,
        field::{IntField, StringField},
    };

    #[test]
    fn test_list_capacity() {
        let field = Field::new(ListField::new(IntField::new()).min_capacity(1).max_capacity(2));

        assert!(field.wrap(&Value::list([1])).is_ok());
        assert!(field.wrap(&Value::List(Vec::new())).is_err());
        assert!(field.wrap(&Value::list([1, 2, 3])).is_err());
    }

    #[test]
    fn test_list_item_errors_carry_cause() {
        let mut field = Field::new(ListField::new(IntField::new().max(5)));
        field.bind("scores");

        let err = field.wrap(&Value::list([1, 9])).unwrap_err();
        match err {
            MapperError::BadValue { field, cause, .. } => {
                assert_eq!(field, "scores");
                assert!(matches!(cause.as_deref(), Some(MapperError::BadValue { .. })));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_list_rejects_sets() {
        let field = Field::new(ListField::new(StringField::new()));

        assert!(field.wrap(&Value::set(["a"])).is_err());
    }

    #[test]
    fn test_set_drops_duplicates() {
        let field = Field::new(SetField::new(StringField::new()).max_capacity(2));

        let native = field.wrap(&Value::list(["a", "b", "a"])).unwrap();
        assert_eq!(native, Bson::Array(vec!["a".into(), "b".into()]));

        let value = field
            .unwrap(&Bson::Array(vec!["b".into(), "b".into(), "a".into()]))
            .unwrap();
        assert_eq!(value, Value::set(["a", "b"]));
    }

    #[test]
    fn test_default_empty() {
        assert_eq!(
            Field::new(ListField::new(IntField::new()).default_empty()).default_value(),
            Some(Value::List(Vec::new()))
        );
        assert!(Field::new(ListField::new(IntField::new())).default_value().is_none());
    }
}
