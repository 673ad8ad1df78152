//! A field whose kind depends on the value of a sibling discriminant field.

use bson::Bson;

use crate::{
    field::{Field, FieldKind, KindResult, Rejection},
    value::Value,
};

/// Chooses one of several variant fields by the value of `type_field` in the same
/// document.
///
/// Documents route through [`Field::wrap_as`] and [`Field::unwrap_as`] with the
/// discriminant. Without one, validation always passes and conversion uses the first
/// variant that accepts the value.
#[derive(Debug)]
pub struct PolymorphicField {
    type_field: String,
    variants: Vec<(Value, Field)>,
}

impl PolymorphicField {
    pub fn new(type_field: impl Into<String>) -> Self {
        Self {
            type_field: type_field.into(),
            variants: Vec::new(),
        }
    }

    pub fn variant(mut self, discriminant: impl Into<Value>, field: impl Into<Field>) -> Self {
        self.variants.push((discriminant.into(), field.into()));
        self
    }

    /// Name of the sibling field holding the discriminant.
    pub fn type_field(&self) -> &str {
        &self.type_field
    }

    pub fn variant_for(&self, discriminant: &Value) -> Option<&Field> {
        self.variants
            .iter()
            .find(|(value, _)| value == discriminant)
            .map(|(_, field)| field)
    }

    fn accepting(&self, value: &Value) -> KindResult<&Field> {
        self.variants
            .iter()
            .map(|(_, field)| field)
            .find(|field| field.is_valid_wrap(value))
            .ok_or_else(|| Rejection::new("No variant accepts this value"))
    }

    fn accepting_native(&self, native: &Bson) -> KindResult<&Field> {
        self.variants
            .iter()
            .map(|(_, field)| field)
            .find(|field| field.is_valid_unwrap(native))
            .ok_or_else(|| Rejection::new("No variant accepts this stored value"))
    }
}

impl FieldKind for PolymorphicField {
    fn type_name(&self) -> &'static str {
        "PolymorphicField"
    }

    fn check(&self) -> Result<(), String> {
        if self.variants.is_empty() {
            return Err("a polymorphic field needs at least one variant".into());
        }

        for (index, (discriminant, _)) in self.variants.iter().enumerate() {
            if self.variants[..index].iter().any(|(seen, _)| seen == discriminant) {
                return Err(format!("duplicate discriminant {discriminant:?}"));
            }
        }

        Ok(())
    }

    fn validate_wrap(&self, _value: &Value) -> KindResult<()> {
        Ok(())
    }

    fn validate_unwrap(&self, _native: &Bson) -> KindResult<()> {
        Ok(())
    }

    fn wrap(&self, value: &Value) -> KindResult<Bson> {
        Ok(self.accepting(value)?.wrap(value)?)
    }

    fn unwrap(&self, native: &Bson) -> KindResult<Value> {
        Ok(self.accepting_native(native)?.unwrap(native)?)
    }

    fn children(&self) -> Vec<&Field> {
        self.variants.iter().map(|(_, field)| field).collect()
    }

    fn bind_children(&mut self, name: &str) {
        for (_, field) in &mut self.variants {
            field.bind(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::MapperError,
        field::{IntField, StringField},
    };

    fn payload() -> Field {
        Field::new(
            PolymorphicField::new("kind")
                .variant("count", IntField::new())
                .variant("label", StringField::new()),
        )
    }

    #[test]
    fn test_discriminant_selects_variant() {
        let field = payload();

        assert_eq!(
            field.wrap_as(&Value::Int(3), Some(&Value::from("count"))).unwrap(),
            Bson::Int32(3)
        );
        assert!(field.wrap_as(&Value::Int(3), Some(&Value::from("label"))).is_err());
        assert!(matches!(
            field.wrap_as(&Value::Int(3), Some(&Value::from("other"))),
            Err(MapperError::BadValue { .. })
        ));
    }

    #[test]
    fn test_without_discriminant_first_accepting_variant_wins() {
        let field = payload();

        assert_eq!(field.wrap(&Value::from("x")).unwrap(), Bson::String("x".into()));
        assert_eq!(field.unwrap(&Bson::Int32(2)).unwrap(), Value::Int(2));
        assert!(field.validate_wrap(&Value::Bool(true)).is_ok());
        assert!(field.wrap(&Value::Bool(true)).is_err());
    }

    #[test]
    fn test_duplicate_discriminants_are_invalid() {
        let field = Field::new(
            PolymorphicField::new("kind")
                .variant("a", IntField::new())
                .variant("a", StringField::new()),
        );

        assert!(matches!(field.check(), Err(MapperError::InvalidConfig(_))));
    }
}
