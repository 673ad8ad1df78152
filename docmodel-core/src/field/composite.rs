//! Fixed-shape kinds: tuples and enumerations.

use bson::Bson;

use crate::{
    field::{Field, FieldKind, FloatField, KindResult, Modifiers, Rejection},
    value::Value,
};

/// A fixed-length heterogeneous sequence, stored as an array.
#[derive(Debug)]
pub struct TupleField {
    items: Vec<Field>,
}

impl TupleField {
    pub fn new<F: Into<Field>>(items: impl IntoIterator<Item = F>) -> Self {
        Self {
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    /// An `(x, y)` pair of floats, the layout geospatial operators expect.
    pub fn geo() -> Self {
        Self::new([FloatField::new(), FloatField::new()])
    }

    pub fn arity(&self) -> usize {
        self.items.len()
    }

    fn elements(value: &Value) -> KindResult<&[Value]> {
        match value {
            Value::Tuple(items) | Value::List(items) => Ok(items),
            other => Err(Rejection::type_mismatch("tuple", other)),
        }
    }

    fn check_arity(&self, length: usize) -> KindResult<()> {
        match length == self.items.len() {
            true => Ok(()),
            false => Err(Rejection::new(format!(
                "Value has {length} elements, expected {}",
                self.items.len()
            ))),
        }
    }

    fn natives<'a>(&self, native: &'a Bson) -> KindResult<&'a [Bson]> {
        let natives = native
            .as_array()
            .ok_or_else(|| Rejection::native_mismatch("an array", native))?;

        self.check_arity(natives.len())?;
        Ok(natives)
    }
}

impl FieldKind for TupleField {
    fn type_name(&self) -> &'static str {
        "TupleField"
    }

    fn check(&self) -> Result<(), String> {
        match self.items.is_empty() {
            true => Err("a tuple needs at least one item field".into()),
            false => Ok(()),
        }
    }

    fn validate_wrap(&self, value: &Value) -> KindResult<()> {
        let elements = Self::elements(value)?;
        self.check_arity(elements.len())?;

        self.items
            .iter()
            .zip(elements)
            .try_for_each(|(field, element)| {
                field
                    .validate_wrap(element)
                    .map_err(|err| Rejection::because("Bad value in tuple", err))
            })
    }

    fn validate_unwrap(&self, native: &Bson) -> KindResult<()> {
        self.items
            .iter()
            .zip(self.natives(native)?)
            .try_for_each(|(field, element)| {
                field
                    .validate_unwrap(element)
                    .map_err(|err| Rejection::because("Bad stored value in tuple", err))
            })
    }

    fn wrap(&self, value: &Value) -> KindResult<Bson> {
        let elements = Self::elements(value)?;
        self.check_arity(elements.len())?;

        self.items
            .iter()
            .zip(elements)
            .map(|(field, element)| {
                field
                    .wrap(element)
                    .map_err(|err| Rejection::because("Bad value in tuple", err))
            })
            .collect::<KindResult<Vec<_>>>()
            .map(Bson::Array)
    }

    fn unwrap(&self, native: &Bson) -> KindResult<Value> {
        self.items
            .iter()
            .zip(self.natives(native)?)
            .map(|(field, element)| {
                field
                    .unwrap(element)
                    .map_err(|err| Rejection::because("Bad stored value in tuple", err))
            })
            .collect::<KindResult<Vec<_>>>()
            .map(Value::Tuple)
    }

    fn children(&self) -> Vec<&Field> {
        self.items.iter().collect()
    }

    fn bind_children(&mut self, name: &str) {
        for item in &mut self.items {
            item.bind(name);
        }
    }
}

/// A value of the item field restricted to a fixed set of allowed values.
#[derive(Debug)]
pub struct EnumField {
    item: Field,
    values: Vec<Value>,
}

impl EnumField {
    pub fn new<V: Into<Value>>(item: impl Into<Field>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            item: item.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    fn check_member(&self, value: &Value) -> KindResult<()> {
        match self.values.contains(value) {
            true => Ok(()),
            false => Err(Rejection::new("Value was not in the enum values")),
        }
    }
}

impl FieldKind for EnumField {
    fn type_name(&self) -> &'static str {
        "EnumField"
    }

    fn valid_modifiers(&self) -> Modifiers {
        self.item.valid_modifiers()
    }

    fn check(&self) -> Result<(), String> {
        if self.values.is_empty() {
            return Err("an enum needs at least one allowed value".into());
        }

        match self.values.iter().find(|value| !self.item.is_valid_wrap(value)) {
            Some(value) => Err(format!(
                "enum value {value:?} is not valid for {}",
                self.item.type_name()
            )),
            None => Ok(()),
        }
    }

    fn validate_wrap(&self, value: &Value) -> KindResult<()> {
        self.item.validate_wrap(value)?;
        self.check_member(value)
    }

    fn validate_unwrap(&self, native: &Bson) -> KindResult<()> {
        self.item.validate_unwrap(native)?;
        Ok(())
    }

    fn wrap(&self, value: &Value) -> KindResult<Bson> {
        self.check_member(value)?;
        Ok(self.item.wrap(value)?)
    }

    fn unwrap(&self, native: &Bson) -> KindResult<Value> {
        let value = self.item.unwrap(native)?;

        self.check_member(&value)?;
        Ok(value)
    }

    fn children(&self) -> Vec<&Field> {
        vec![&self.item]
    }

    fn bind_children(&mut self, name: &str) {
        self.item.bind(name);
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
    fn test_tuple_accepts_lists_and_unwraps_to_tuples() {
        let field = Field::new(TupleField::new([
            Field::new(StringField::new()),
            Field::new(IntField::new()),
        ]));

        let native = field.wrap(&Value::list([Value::from("a"), Value::Int(1)])).unwrap();
        assert_eq!(
            field.unwrap(&native).unwrap(),
            Value::tuple([Value::from("a"), Value::Int(1)])
        );
    }

    #[test]
    fn test_tuple_arity_mismatch_is_bad_value() {
        let field = Field::new(TupleField::geo());

        assert!(matches!(
            field.wrap(&Value::tuple([1.0])),
            Err(MapperError::BadValue { .. })
        ));
        assert!(field.unwrap(&Bson::Array(vec![Bson::Double(1.0)])).is_err());
        assert!(field.wrap(&Value::tuple([1.0, 2.0])).is_ok());
    }

    #[test]
    fn test_enum_membership() {
        let field = Field::new(EnumField::new(StringField::new(), ["red", "green"]));

        assert!(field.wrap(&Value::from("red")).is_ok());
        assert!(field.wrap(&Value::from("blue")).is_err());
        assert!(field.unwrap(&Bson::String("blue".into())).is_err());
    }

    #[test]
    fn test_enum_values_must_fit_item() {
        let field = Field::new(EnumField::new(IntField::new(), [Value::from("x")]));

        assert!(matches!(field.check(), Err(MapperError::InvalidConfig(_))));
    }
}
