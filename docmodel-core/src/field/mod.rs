//! Field descriptors: typed converters and validators for one document attribute.
//!
//! A [`Field`] pairs the options every field shares (requiredness, defaults, storage
//! name, update operator, user validators) with a [`FieldKind`] that knows how to
//! validate and convert one conceptual type. Fields are schema, not data: a schema owns
//! its fields and every document of that schema shares them.
//!
//! The contract every kind honours:
//!
//! - `validate_wrap` / `validate_unwrap` are side-effect free checks.
//! - `wrap` turns a valid [`Value`] into storage-native [`Bson`].
//! - `unwrap` is the inverse, so `unwrap(wrap(v)) == v` for valid `v` (modulo
//!   normalization such as set deduplication).
//!
//! # Example
//!
//! ```ignore
//! use docmodel_core::field::{Field, IntField, StringField};
//!
//! let age = Field::new(IntField::new().min(0)).optional();
//! let name = Field::new(StringField::new().max_length(40)).db_field("n");
//! ```

pub mod composite;
pub mod computed;
pub mod embedded;
pub mod mapping;
pub mod polymorphic;
pub mod primitive;
pub mod reference;
pub mod sequence;

pub use composite::{EnumField, TupleField};
pub use computed::{ComputedArgs, ComputedField};
pub use embedded::DocumentField;
pub use mapping::{DictField, KeyValueField};
pub use polymorphic::PolymorphicField;
pub use primitive::{
    AnythingField, BinaryField, BoolField, DateTimeField, FloatField, IntField, ObjectIdField,
    RegexStringField, StringField, UuidField,
};
pub use reference::{RefField, SRefField};
pub use sequence::{ListField, SetField};

use std::{
    any::Any,
    fmt::{self, Debug},
    sync::Arc,
};

use bson::Bson;
use serde::{Deserialize, Serialize};

use crate::{
    error::{MapperError, MapperResult},
    value::Value,
};

/// Native atomic update operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateOp {
    #[serde(rename = "$set")]
    Set,
    #[serde(rename = "$unset")]
    Unset,
    #[serde(rename = "$inc")]
    Inc,
    #[serde(rename = "$push")]
    Push,
    /// Push several items at once, emitted as `$push` with `$each`.
    #[serde(rename = "$pushAll")]
    PushAll,
    #[serde(rename = "$addToSet")]
    AddToSet,
    #[serde(rename = "$pull")]
    Pull,
    #[serde(rename = "$pullAll")]
    PullAll,
    #[serde(rename = "$pop")]
    Pop,
}

impl UpdateOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateOp::Set => "$set",
            UpdateOp::Unset => "$unset",
            UpdateOp::Inc => "$inc",
            UpdateOp::Push => "$push",
            UpdateOp::PushAll => "$pushAll",
            UpdateOp::AddToSet => "$addToSet",
            UpdateOp::Pull => "$pull",
            UpdateOp::PullAll => "$pullAll",
            UpdateOp::Pop => "$pop",
        }
    }

    /// The operator key that carries this operation in an update document.
    pub fn native_key(&self) -> &'static str {
        match self {
            UpdateOp::PushAll => "$push",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for UpdateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of update operators legal for a field kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modifiers(&'static [UpdateOp]);

impl Modifiers {
    pub const SCALAR: Modifiers = Modifiers(&[UpdateOp::Set, UpdateOp::Unset]);
    pub const NUMBER: Modifiers = Modifiers(&[UpdateOp::Set, UpdateOp::Unset, UpdateOp::Inc]);
    pub const LIST: Modifiers = Modifiers(&[
        UpdateOp::Set,
        UpdateOp::Unset,
        UpdateOp::Push,
        UpdateOp::PushAll,
        UpdateOp::AddToSet,
        UpdateOp::Pull,
        UpdateOp::PullAll,
        UpdateOp::Pop,
    ]);
    pub const ANY: Modifiers = Modifiers(&[
        UpdateOp::Set,
        UpdateOp::Unset,
        UpdateOp::Inc,
        UpdateOp::Push,
        UpdateOp::PushAll,
        UpdateOp::AddToSet,
        UpdateOp::Pull,
        UpdateOp::PullAll,
        UpdateOp::Pop,
    ]);

    pub fn contains(&self, op: UpdateOp) -> bool {
        self.0.contains(&op)
    }

    pub fn iter(&self) -> impl Iterator<Item = UpdateOp> + '_ {
        self.0.iter().copied()
    }
}

/// What an assignment to a field turns into when dirty ops are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnUpdate {
    Op(UpdateOp),
    /// Assignments never produce an update operator.
    Ignore,
}

impl OnUpdate {
    pub fn op(&self) -> Option<UpdateOp> {
        match self {
            OnUpdate::Op(op) => Some(*op),
            OnUpdate::Ignore => None,
        }
    }
}

impl Default for OnUpdate {
    fn default() -> Self {
        OnUpdate::Op(UpdateOp::Set)
    }
}

/// Why a kind refused a value.
///
/// `Invalid` is turned into [`MapperError::BadValue`] carrying the owning field's name;
/// `Propagate` passes an error from a nested field through untouched.
#[derive(Debug)]
pub enum Rejection {
    Invalid {
        reason: String,
        cause: Option<MapperError>,
    },
    Propagate(MapperError),
}

pub type KindResult<T> = Result<T, Rejection>;

impl Rejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Rejection::Invalid {
            reason: reason.into(),
            cause: None,
        }
    }

    pub fn because(reason: impl Into<String>, cause: MapperError) -> Self {
        Rejection::Invalid {
            reason: reason.into(),
            cause: Some(cause),
        }
    }

    pub fn type_mismatch(expected: &str, got: &Value) -> Self {
        Rejection::new(format!(
            "Value is not an instance of {expected} (got: {})",
            got.type_name()
        ))
    }

    pub fn native_mismatch(expected: &str, got: &Bson) -> Self {
        Rejection::new(format!(
            "Stored value is not {expected} (got: {:?})",
            got.element_type()
        ))
    }
}

impl From<MapperError> for Rejection {
    fn from(err: MapperError) -> Self {
        Rejection::Propagate(err)
    }
}

/// Upcast to [`Any`] so callers can recover the concrete kind behind a `dyn FieldKind`.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The per-type half of a field.
///
/// Implement this to add a custom field type. The owning [`Field`] takes care of
/// `allow_none`, user validators and error reporting.
pub trait FieldKind: AsAny + Debug + Send + Sync {
    /// Kind name used in error messages.
    fn type_name(&self) -> &'static str;

    fn valid_modifiers(&self) -> Modifiers {
        Modifiers::SCALAR
    }

    /// Checks the kind's own configuration. Called once when the schema is built.
    fn check(&self) -> Result<(), String> {
        Ok(())
    }

    fn validate_wrap(&self, value: &Value) -> KindResult<()>;

    fn validate_unwrap(&self, native: &Bson) -> KindResult<()>;

    fn wrap(&self, value: &Value) -> KindResult<Bson>;

    fn unwrap(&self, native: &Bson) -> KindResult<Value>;

    /// A value to use when the field has no explicit default.
    fn generated_default(&self) -> Option<Value> {
        None
    }

    fn is_sequence(&self) -> bool {
        false
    }

    /// The element field of a container kind.
    fn item(&self) -> Option<&Field> {
        None
    }

    /// Resolves one path segment below this kind, returning the field and the
    /// storage segment to use for it.
    fn subfield(&self, _name: &str) -> Option<(&Field, String)> {
        None
    }

    /// Child fields owned by this kind.
    fn children(&self) -> Vec<&Field> {
        Vec::new()
    }

    /// Names child fields after their parent. Called once at schema build time.
    fn bind_children(&mut self, _name: &str) {}

    /// The document type this kind points at, for nested documents and references.
    fn document_target(&self) -> Option<&DocumentField> {
        None
    }
}

pub type Validator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
pub type NativeValidator = Arc<dyn Fn(&Bson) -> bool + Send + Sync>;
pub type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;

#[derive(Clone)]
enum DefaultSource {
    Value(Value),
    Factory(DefaultFactory),
}

/// A field descriptor: shared options plus a [`FieldKind`].
pub struct Field {
    name: String,
    kind: Box<dyn FieldKind>,
    required: bool,
    default: Option<DefaultSource>,
    allow_none: bool,
    db_field: Option<String>,
    is_id: bool,
    on_update: OnUpdate,
    validator: Option<Validator>,
    wrap_validator: Option<Validator>,
    unwrap_validator: Option<NativeValidator>,
    config_errors: Vec<String>,
}

impl Field {
    /// Creates a required field with `$set` as its update operator.
    pub fn new(kind: impl FieldKind + 'static) -> Self {
        let name = format!("Unbound_{}", kind.type_name());

        Self {
            name,
            kind: Box::new(kind),
            required: true,
            default: None,
            allow_none: false,
            db_field: None,
            is_id: false,
            on_update: OnUpdate::default(),
            validator: None,
            wrap_validator: None,
            unwrap_validator: None,
            config_errors: Vec::new(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Sets a default value. A null default implies `allow_none`.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        if self.default.is_some() {
            self.config_errors
                .push("only one of default and default_fn may be given".into());
        }

        let value = value.into();
        if value.is_null() {
            self.allow_none = true;
        }

        self.default = Some(DefaultSource::Value(value));
        self
    }

    /// Sets a factory producing a fresh default on every use.
    pub fn default_fn<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        if self.default.is_some() {
            self.config_errors
                .push("only one of default and default_fn may be given".into());
        }

        self.default = Some(DefaultSource::Factory(Arc::new(factory)));
        self
    }

    pub fn allow_none(mut self) -> Self {
        self.allow_none = true;
        self
    }

    pub fn db_field(mut self, name: impl Into<String>) -> Self {
        if self.is_id {
            self.config_errors
                .push("an id field cannot also set db_field".into());
        }

        self.db_field = Some(name.into());
        self
    }

    /// Marks this field as the document identity, stored under `_id`.
    pub fn id(mut self) -> Self {
        if self.db_field.is_some() {
            self.config_errors
                .push("an id field cannot also set db_field".into());
        }

        self.is_id = true;
        self
    }

    pub fn on_update(mut self, on_update: OnUpdate) -> Self {
        self.on_update = on_update;
        self
    }

    /// A check applied to application values in both directions.
    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn wrap_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.wrap_validator = Some(Arc::new(validator));
        self
    }

    pub fn unwrap_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Bson) -> bool + Send + Sync + 'static,
    {
        self.unwrap_validator = Some(Arc::new(validator));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The key this field is stored under.
    pub fn storage_name(&self) -> &str {
        if self.is_id {
            return crate::schema::ID_KEY;
        }

        self.db_field.as_deref().unwrap_or(&self.name)
    }

    pub fn is_id(&self) -> bool {
        self.is_id || self.db_field.as_deref() == Some(crate::schema::ID_KEY)
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn allows_none(&self) -> bool {
        self.allow_none
    }

    pub fn update_mode(&self) -> OnUpdate {
        self.on_update
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn valid_modifiers(&self) -> Modifiers {
        self.kind.valid_modifiers()
    }

    pub fn kind(&self) -> &dyn FieldKind {
        &*self.kind
    }

    /// Downcasts the kind to a concrete type.
    pub fn kind_as<T: FieldKind + 'static>(&self) -> Option<&T> {
        let kind: &dyn FieldKind = &*self.kind;
        kind.as_any().downcast_ref::<T>()
    }

    pub fn item(&self) -> Option<&Field> {
        self.kind.item()
    }

    pub fn is_sequence(&self) -> bool {
        self.kind.is_sequence()
    }

    pub fn subfield(&self, name: &str) -> Option<(&Field, String)> {
        self.kind.subfield(name)
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.kind.generated_default().is_some()
    }

    /// The value a missing field takes on first read, if any.
    pub fn default_value(&self) -> Option<Value> {
        match &self.default {
            Some(DefaultSource::Value(value)) => Some(value.clone()),
            Some(DefaultSource::Factory(factory)) => Some(factory()),
            None => self.kind.generated_default(),
        }
    }

    pub(crate) fn bind(&mut self, name: &str) {
        self.name = name.to_string();
        self.kind.bind_children(name);
    }

    /// Verifies this field's configuration and that of its children.
    pub(crate) fn check(&self) -> MapperResult<()> {
        if let Some(message) = self.config_errors.first() {
            return Err(MapperError::InvalidConfig(format!("{}: {message}", self.name)));
        }

        if let OnUpdate::Op(op) = self.on_update {
            if !self.valid_modifiers().contains(op) {
                return Err(MapperError::InvalidConfig(format!(
                    "{}: on_update {op} is not a valid modifier for {}",
                    self.name,
                    self.type_name()
                )));
            }
        }

        self.kind
            .check()
            .map_err(|message| MapperError::InvalidConfig(format!("{}: {message}", self.name)))?;

        self.kind.children().into_iter().try_for_each(Field::check)
    }

    /// Visits this field and every descendant, parents first.
    pub(crate) fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Field)) {
        visit(self);
        for child in self.kind.children() {
            child.walk(visit);
        }
    }

    pub(crate) fn reject(&self, value: &dyn Debug, rejection: Rejection) -> MapperError {
        match rejection {
            Rejection::Invalid { reason, cause } => MapperError::BadValue {
                field: self.name.clone(),
                value: format!("{value:?}"),
                reason,
                cause: cause.map(Box::new),
            },
            Rejection::Propagate(err) => err,
        }
    }

    pub fn validate_wrap(&self, value: &Value) -> MapperResult<()> {
        if value.is_null() && self.allow_none {
            return Ok(());
        }

        self.kind
            .validate_wrap(value)
            .map_err(|rejection| self.reject(value, rejection))?;

        self.run_value_validators(value, self.wrap_validator.as_ref())
    }

    pub fn validate_unwrap(&self, native: &Bson) -> MapperResult<()> {
        if matches!(native, Bson::Null) && self.allow_none {
            return Ok(());
        }

        self.kind
            .validate_unwrap(native)
            .map_err(|rejection| self.reject(native, rejection))?;

        match &self.unwrap_validator {
            Some(validator) if !validator(native) => Err(MapperError::bad_value(
                &self.name,
                native,
                "user unwrap validation function failed",
            )),
            _ => Ok(()),
        }
    }

    pub fn is_valid_wrap(&self, value: &Value) -> bool {
        self.validate_wrap(value).is_ok()
    }

    pub fn is_valid_unwrap(&self, native: &Bson) -> bool {
        self.validate_unwrap(native).is_ok()
    }

    /// Validates `value` and converts it to its storage form.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::BadValue`] if validation fails.
    pub fn wrap(&self, value: &Value) -> MapperResult<Bson> {
        if value.is_null() && self.allow_none {
            return Ok(Bson::Null);
        }

        self.validate_wrap(value)?;
        self.kind
            .wrap(value)
            .map_err(|rejection| self.reject(value, rejection))
    }

    /// Validates a stored value and converts it back to an application value.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::BadValue`] if the stored shape is not what this field writes.
    pub fn unwrap(&self, native: &Bson) -> MapperResult<Value> {
        if matches!(native, Bson::Null) && self.allow_none {
            return Ok(Value::Null);
        }

        self.validate_unwrap(native)?;
        let value = self
            .kind
            .unwrap(native)
            .map_err(|rejection| self.reject(native, rejection))?;

        self.run_value_validators(&value, None)?;
        Ok(value)
    }

    /// Wraps a literal used in a query comparison. Sequence fields accept either a
    /// single item or a whole sequence.
    pub fn wrap_query_value(&self, value: &Value) -> MapperResult<Bson> {
        let item = match self.kind.item() {
            Some(item) if self.kind.is_sequence() => item,
            _ => return self.wrap(value),
        };

        if let Ok(native) = item.wrap_query_value(value) {
            return Ok(native);
        }

        self.wrap(value).map_err(|cause| MapperError::BadValue {
            field: self.name.clone(),
            value: format!("{value:?}"),
            reason: format!(
                "Could not wrap value as {} or as {}",
                item.type_name(),
                self.type_name()
            ),
            cause: Some(Box::new(cause)),
        })
    }

    /// Runs the computation of a [`ComputedField`] and validates its output.
    pub fn compute(&self, args: &ComputedArgs) -> MapperResult<Value> {
        let computed = self.kind_as::<ComputedField>().ok_or_else(|| {
            MapperError::BadFieldSpecification(format!("{} is not a computed field", self.name))
        })?;

        let value = computed.evaluate(args);
        computed
            .computed_field()
            .validate_wrap(&value)
            .map_err(|cause| MapperError::BadValue {
                field: self.name.clone(),
                value: format!("{value:?}"),
                reason: "Computed function returned a bad value".into(),
                cause: Some(Box::new(cause)),
            })?;

        Ok(value)
    }

    /// Like [`Field::validate_wrap`], selecting the variant of a polymorphic field.
    pub fn validate_wrap_as(&self, value: &Value, discriminant: Option<&Value>) -> MapperResult<()> {
        match (self.polymorphic_variant(discriminant)?, value.is_null() && self.allow_none) {
            (_, true) => Ok(()),
            (Some(variant), false) => variant.validate_wrap(value),
            (None, false) => self.validate_wrap(value),
        }
    }

    /// Like [`Field::wrap`], selecting the variant of a polymorphic field.
    pub fn wrap_as(&self, value: &Value, discriminant: Option<&Value>) -> MapperResult<Bson> {
        match (self.polymorphic_variant(discriminant)?, value.is_null() && self.allow_none) {
            (_, true) => Ok(Bson::Null),
            (Some(variant), false) => variant.wrap(value),
            (None, false) => self.wrap(value),
        }
    }

    /// Like [`Field::unwrap`], selecting the variant of a polymorphic field.
    pub fn unwrap_as(&self, native: &Bson, discriminant: Option<&Value>) -> MapperResult<Value> {
        let is_null = matches!(native, Bson::Null) && self.allow_none;

        match (self.polymorphic_variant(discriminant)?, is_null) {
            (_, true) => Ok(Value::Null),
            (Some(variant), false) => variant.unwrap(native),
            (None, false) => self.unwrap(native),
        }
    }

    /// Unwraps a nested document that was only partially retrieved.
    pub(crate) fn unwrap_partial(&self, native: &Bson, retrieved: &[String]) -> MapperResult<Value> {
        let embedded = match self.kind_as::<DocumentField>() {
            Some(embedded) => embedded,
            None => return self.unwrap(native),
        };

        if matches!(native, Bson::Null) && self.allow_none {
            return Ok(Value::Null);
        }

        self.validate_unwrap(native)?;
        embedded
            .unwrap_retrieved(native, Some(retrieved))
            .map_err(|rejection| self.reject(native, rejection))
    }

    fn polymorphic_variant(&self, discriminant: Option<&Value>) -> MapperResult<Option<&Field>> {
        let (polymorphic, discriminant) = match (self.kind_as::<PolymorphicField>(), discriminant) {
            (Some(polymorphic), Some(discriminant)) => (polymorphic, discriminant),
            _ => return Ok(None),
        };

        polymorphic
            .variant_for(discriminant)
            .map(Some)
            .ok_or_else(|| {
                MapperError::bad_value(
                    &self.name,
                    discriminant,
                    "No field registered for this discriminant",
                )
            })
    }

    fn run_value_validators(&self, value: &Value, extra: Option<&Validator>) -> MapperResult<()> {
        if let Some(validator) = &self.validator {
            if !validator(value) {
                return Err(MapperError::bad_value(
                    &self.name,
                    value,
                    "user validation function failed",
                ));
            }
        }

        match extra {
            Some(validator) if !validator(value) => Err(MapperError::bad_value(
                &self.name,
                value,
                "user wrap validation function failed",
            )),
            _ => Ok(()),
        }
    }
}

impl<K: FieldKind + 'static> From<K> for Field {
    fn from(kind: K) -> Self {
        Field::new(kind)
    }
}

impl Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("db_field", &self.storage_name())
            .field("required", &self.required)
            .field("allow_none", &self.allow_none)
            .field("on_update", &self.on_update)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_none_short_circuits_both_directions() {
        let field = Field::new(IntField::new()).allow_none();

        assert_eq!(field.wrap(&Value::Null).unwrap(), Bson::Null);
        assert_eq!(field.unwrap(&Bson::Null).unwrap(), Value::Null);
        assert!(Field::new(IntField::new()).wrap(&Value::Null).is_err());
    }

    #[test]
    fn test_null_default_implies_allow_none() {
        let field = Field::new(StringField::new()).default(Value::Null);

        assert!(field.allows_none());
        assert_eq!(field.default_value(), Some(Value::Null));
    }

    #[test]
    fn test_conflicting_defaults_are_invalid_config() {
        let field = Field::new(IntField::new())
            .default(3)
            .default_fn(|| Value::Int(4));

        assert!(matches!(field.check(), Err(MapperError::InvalidConfig(_))));
    }

    #[test]
    fn test_id_with_db_field_is_invalid_config() {
        let field = Field::new(StringField::new()).db_field("key").id();

        assert!(matches!(field.check(), Err(MapperError::InvalidConfig(_))));
    }

    #[test]
    fn test_on_update_must_be_a_valid_modifier() {
        let field = Field::new(StringField::new()).on_update(OnUpdate::Op(UpdateOp::Inc));
        assert!(matches!(field.check(), Err(MapperError::InvalidConfig(_))));

        let field = Field::new(IntField::new()).on_update(OnUpdate::Op(UpdateOp::Inc));
        assert!(field.check().is_ok());
    }

    #[test]
    fn test_user_validators_run_after_type_checks() {
        let field = Field::new(IntField::new()).validator(|value| value.as_i64() != Some(13));

        assert!(field.wrap(&Value::Int(12)).is_ok());
        assert!(matches!(
            field.wrap(&Value::Int(13)),
            Err(MapperError::BadValue { .. })
        ));
        assert!(matches!(
            field.unwrap(&Bson::Int32(13)),
            Err(MapperError::BadValue { .. })
        ));
    }

    #[test]
    fn test_unwrap_validator_sees_native_value() {
        let field = Field::new(IntField::new())
            .unwrap_validator(|native| !matches!(native, Bson::Int64(_)));

        assert!(field.unwrap(&Bson::Int32(1)).is_ok());
        assert!(field.unwrap(&Bson::Int64(1)).is_err());
    }

    #[test]
    fn test_kind_downcast() {
        let field = Field::new(ListField::new(StringField::new()));

        assert!(field.kind_as::<ListField>().is_some());
        assert!(field.kind_as::<SetField>().is_none());
    }

    #[test]
    fn test_query_value_for_sequences_tries_item_first() {
        let field = Field::new(ListField::new(IntField::new()));

        assert_eq!(field.wrap_query_value(&Value::Int(3)).unwrap(), Bson::Int32(3));
        assert_eq!(
            field.wrap_query_value(&Value::list([1, 2])).unwrap(),
            Bson::Array(vec![Bson::Int32(1), Bson::Int32(2)])
        );
        assert!(field.wrap_query_value(&Value::from("x")).is_err());
    }

    #[test]
    fn test_modifier_sets() {
        assert!(Modifiers::NUMBER.contains(UpdateOp::Inc));
        assert!(!Modifiers::SCALAR.contains(UpdateOp::Inc));
        assert!(Modifiers::LIST.contains(UpdateOp::Pop));
        assert!(!Modifiers::LIST.contains(UpdateOp::Inc));
        assert_eq!(Modifiers::ANY.iter().count(), 9);
    }
}
