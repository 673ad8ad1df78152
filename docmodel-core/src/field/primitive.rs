//! Scalar field kinds.

use bson::{Bson, oid::ObjectId};
use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use regex::Regex;

use crate::{
    error::{MapperError, MapperResult},
    field::{FieldKind, KindResult, Modifiers, Rejection},
    value::{Value, binary_to_bson, int_to_bson, naive_to_bson, uuid_from_binary},
};

/// A UTF-8 string with optional length bounds, counted in characters.
#[derive(Debug, Clone, Default)]
pub struct StringField {
    min_length: Option<usize>,
    max_length: Option<usize>,
}

impl StringField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    fn check_length(&self, value: &str) -> KindResult<()> {
        let length = value.chars().count();

        if self.min_length.is_some_and(|min| length < min) {
            return Err(Rejection::new("Value too short"));
        }
        if self.max_length.is_some_and(|max| length > max) {
            return Err(Rejection::new("Value too long"));
        }

        Ok(())
    }
}

impl FieldKind for StringField {
    fn type_name(&self) -> &'static str {
        "StringField"
    }

    fn check(&self) -> Result<(), String> {
        match (self.min_length, self.max_length) {
            (Some(min), Some(max)) if min > max => {
                Err(format!("min_length {min} is greater than max_length {max}"))
            }
            _ => Ok(()),
        }
    }

    fn validate_wrap(&self, value: &Value) -> KindResult<()> {
        let value = value
            .as_str()
            .ok_or_else(|| Rejection::type_mismatch("string", value))?;

        self.check_length(value)
    }

    fn validate_unwrap(&self, native: &Bson) -> KindResult<()> {
        match native {
            Bson::String(value) => self.check_length(value),
            other => Err(Rejection::native_mismatch("a string", other)),
        }
    }

    fn wrap(&self, value: &Value) -> KindResult<Bson> {
        self.validate_wrap(value)?;
        Ok(Bson::String(value.as_str().unwrap_or_default().to_string()))
    }

    fn unwrap(&self, native: &Bson) -> KindResult<Value> {
        match native {
            Bson::String(value) => Ok(Value::String(value.clone())),
            other => Err(Rejection::native_mismatch("a string", other)),
        }
    }
}

/// A string that must match a regular expression, anchored at its start.
#[derive(Debug, Clone)]
pub struct RegexStringField {
    inner: StringField,
    regex: Regex,
}

impl RegexStringField {
    pub fn new(regex: Regex) -> Self {
        Self {
            inner: StringField::new(),
            regex,
        }
    }

    /// Compiles `pattern` into a new field.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::BadFieldSpecification`] if the pattern does not compile.
    pub fn pattern(pattern: &str) -> MapperResult<Self> {
        Regex::new(pattern)
            .map(Self::new)
            .map_err(|err| MapperError::BadFieldSpecification(err.to_string()))
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.inner = self.inner.min_length(min);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.inner = self.inner.max_length(max);
        self
    }

    fn check_match(&self, value: &str) -> KindResult<()> {
        match self.regex.find(value) {
            Some(found) if found.start() == 0 => Ok(()),
            _ => Err(Rejection::new(format!(
                "Value did not match regex {}",
                self.regex.as_str()
            ))),
        }
    }
}

impl FieldKind for RegexStringField {
    fn type_name(&self) -> &'static str {
        "RegExStringField"
    }

    fn check(&self) -> Result<(), String> {
        self.inner.check()
    }

    fn validate_wrap(&self, value: &Value) -> KindResult<()> {
        self.inner.validate_wrap(value)?;
        self.check_match(value.as_str().unwrap_or_default())
    }

    fn validate_unwrap(&self, native: &Bson) -> KindResult<()> {
        self.inner.validate_unwrap(native)?;
        self.check_match(native.as_str().unwrap_or_default())
    }

    fn wrap(&self, value: &Value) -> KindResult<Bson> {
        self.validate_wrap(value)?;
        self.inner.wrap(value)
    }

    fn unwrap(&self, native: &Bson) -> KindResult<Value> {
        self.inner.unwrap(native)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BoolField;

impl BoolField {
    pub fn new() -> Self {
        Self
    }
}

impl FieldKind for BoolField {
    fn type_name(&self) -> &'static str {
        "BoolField"
    }

    fn validate_wrap(&self, value: &Value) -> KindResult<()> {
        match value {
            Value::Bool(_) => Ok(()),
            other => Err(Rejection::type_mismatch("bool", other)),
        }
    }

    fn validate_unwrap(&self, native: &Bson) -> KindResult<()> {
        match native {
            Bson::Boolean(_) => Ok(()),
            other => Err(Rejection::native_mismatch("a boolean", other)),
        }
    }

    fn wrap(&self, value: &Value) -> KindResult<Bson> {
        match value {
            Value::Bool(flag) => Ok(Bson::Boolean(*flag)),
            other => Err(Rejection::type_mismatch("bool", other)),
        }
    }

    fn unwrap(&self, native: &Bson) -> KindResult<Value> {
        match native {
            Bson::Boolean(flag) => Ok(Value::Bool(*flag)),
            other => Err(Rejection::native_mismatch("a boolean", other)),
        }
    }
}

/// An integer with optional inclusive bounds. Stored as a 32-bit integer when it fits.
#[derive(Debug, Clone, Default)]
pub struct IntField {
    min: Option<i64>,
    max: Option<i64>,
}

impl IntField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min(mut self, min: i64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: i64) -> Self {
        self.max = Some(max);
        self
    }

    fn check_bounds(&self, value: i64) -> KindResult<()> {
        if self.min.is_some_and(|min| value < min) {
            return Err(Rejection::new("Value too small"));
        }
        if self.max.is_some_and(|max| value > max) {
            return Err(Rejection::new("Value too large"));
        }

        Ok(())
    }

    fn native_int(native: &Bson) -> KindResult<i64> {
        match native {
            Bson::Int32(value) => Ok(i64::from(*value)),
            Bson::Int64(value) => Ok(*value),
            other => Err(Rejection::native_mismatch("an integer", other)),
        }
    }
}

impl FieldKind for IntField {
    fn type_name(&self) -> &'static str {
        "IntField"
    }

    fn valid_modifiers(&self) -> Modifiers {
        Modifiers::NUMBER
    }

    fn check(&self) -> Result<(), String> {
        match (self.min, self.max) {
            (Some(min), Some(max)) if min > max => {
                Err(format!("min {min} is greater than max {max}"))
            }
            _ => Ok(()),
        }
    }

    fn validate_wrap(&self, value: &Value) -> KindResult<()> {
        let value = value
            .as_i64()
            .ok_or_else(|| Rejection::type_mismatch("int", value))?;

        self.check_bounds(value)
    }

    fn validate_unwrap(&self, native: &Bson) -> KindResult<()> {
        self.check_bounds(Self::native_int(native)?)
    }

    fn wrap(&self, value: &Value) -> KindResult<Bson> {
        self.validate_wrap(value)?;
        Ok(int_to_bson(value.as_i64().unwrap_or_default()))
    }

    fn unwrap(&self, native: &Bson) -> KindResult<Value> {
        Self::native_int(native).map(Value::Int)
    }
}

/// A double-precision float with optional inclusive bounds.
#[derive(Debug, Clone, Default)]
pub struct FloatField {
    min: Option<f64>,
    max: Option<f64>,
}

impl FloatField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    fn check_bounds(&self, value: f64) -> KindResult<()> {
        if self.min.is_some_and(|min| value < min) {
            return Err(Rejection::new("Value too small"));
        }
        if self.max.is_some_and(|max| value > max) {
            return Err(Rejection::new("Value too large"));
        }

        Ok(())
    }
}

impl FieldKind for FloatField {
    fn type_name(&self) -> &'static str {
        "FloatField"
    }

    fn valid_modifiers(&self) -> Modifiers {
        Modifiers::NUMBER
    }

    fn check(&self) -> Result<(), String> {
        match (self.min, self.max) {
            (Some(min), Some(max)) if min > max => {
                Err(format!("min {min} is greater than max {max}"))
            }
            _ => Ok(()),
        }
    }

    fn validate_wrap(&self, value: &Value) -> KindResult<()> {
        let value = value
            .as_f64()
            .ok_or_else(|| Rejection::type_mismatch("float", value))?;

        self.check_bounds(value)
    }

    fn validate_unwrap(&self, native: &Bson) -> KindResult<()> {
        match native {
            Bson::Double(value) => self.check_bounds(*value),
            other => Err(Rejection::native_mismatch("a double", other)),
        }
    }

    fn wrap(&self, value: &Value) -> KindResult<Bson> {
        self.validate_wrap(value)?;
        Ok(Bson::Double(value.as_f64().unwrap_or_default()))
    }

    fn unwrap(&self, native: &Bson) -> KindResult<Value> {
        match native {
            Bson::Double(value) => Ok(Value::Float(*value)),
            other => Err(Rejection::native_mismatch("a double", other)),
        }
    }
}

/// Raw bytes, stored with the generic binary subtype.
#[derive(Debug, Clone, Default)]
pub struct BinaryField;

impl BinaryField {
    pub fn new() -> Self {
        Self
    }
}

impl FieldKind for BinaryField {
    fn type_name(&self) -> &'static str {
        "BinaryField"
    }

    fn validate_wrap(&self, value: &Value) -> KindResult<()> {
        match value {
            Value::Binary(_) => Ok(()),
            other => Err(Rejection::type_mismatch("binary", other)),
        }
    }

    fn validate_unwrap(&self, native: &Bson) -> KindResult<()> {
        match native {
            Bson::Binary(_) => Ok(()),
            other => Err(Rejection::native_mismatch("binary data", other)),
        }
    }

    fn wrap(&self, value: &Value) -> KindResult<Bson> {
        match value {
            Value::Binary(bytes) => Ok(binary_to_bson(bytes)),
            other => Err(Rejection::type_mismatch("binary", other)),
        }
    }

    fn unwrap(&self, native: &Bson) -> KindResult<Value> {
        match native {
            Bson::Binary(binary) => Ok(Value::Binary(binary.bytes.clone())),
            other => Err(Rejection::native_mismatch("binary data", other)),
        }
    }
}

/// A database object id. Hex strings are accepted on wrap.
#[derive(Debug, Clone, Default)]
pub struct ObjectIdField {
    auto: bool,
}

impl ObjectIdField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a fresh id as the default value.
    pub fn auto(mut self) -> Self {
        self.auto = true;
        self
    }

    fn coerce(value: &Value) -> KindResult<ObjectId> {
        match value {
            Value::ObjectId(oid) => Ok(*oid),
            Value::String(hex) => ObjectId::parse_str(hex)
                .map_err(|err| Rejection::new(format!("Invalid object id string: {err}"))),
            other => Err(Rejection::type_mismatch("object id", other)),
        }
    }
}

impl FieldKind for ObjectIdField {
    fn type_name(&self) -> &'static str {
        "ObjectIdField"
    }

    fn generated_default(&self) -> Option<Value> {
        self.auto.then(|| Value::ObjectId(ObjectId::new()))
    }

    fn validate_wrap(&self, value: &Value) -> KindResult<()> {
        Self::coerce(value).map(|_| ())
    }

    fn validate_unwrap(&self, native: &Bson) -> KindResult<()> {
        match native {
            Bson::ObjectId(_) => Ok(()),
            other => Err(Rejection::native_mismatch("an object id", other)),
        }
    }

    fn wrap(&self, value: &Value) -> KindResult<Bson> {
        Self::coerce(value).map(Bson::ObjectId)
    }

    fn unwrap(&self, native: &Bson) -> KindResult<Value> {
        match native {
            Bson::ObjectId(oid) => Ok(Value::ObjectId(*oid)),
            other => Err(Rejection::native_mismatch("an object id", other)),
        }
    }
}

/// A UUID stored with the UUID binary subtype.
#[derive(Debug, Clone, Default)]
pub struct UuidField {
    auto: bool,
}

impl UuidField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto(mut self) -> Self {
        self.auto = true;
        self
    }

    fn coerce(value: &Value) -> KindResult<bson::Uuid> {
        match value {
            Value::Uuid(uuid) => Ok(*uuid),
            Value::String(text) => bson::Uuid::parse_str(text)
                .map_err(|err| Rejection::new(format!("Invalid uuid string: {err}"))),
            other => Err(Rejection::type_mismatch("uuid", other)),
        }
    }

    fn native_uuid(native: &Bson) -> KindResult<bson::Uuid> {
        match native {
            Bson::Binary(binary) => uuid_from_binary(binary)
                .ok_or_else(|| Rejection::native_mismatch("a uuid", native)),
            other => Err(Rejection::native_mismatch("a uuid", other)),
        }
    }
}

impl FieldKind for UuidField {
    fn type_name(&self) -> &'static str {
        "UuidField"
    }

    fn generated_default(&self) -> Option<Value> {
        self.auto.then(|| Value::Uuid(bson::Uuid::new()))
    }

    fn validate_wrap(&self, value: &Value) -> KindResult<()> {
        Self::coerce(value).map(|_| ())
    }

    fn validate_unwrap(&self, native: &Bson) -> KindResult<()> {
        Self::native_uuid(native).map(|_| ())
    }

    fn wrap(&self, value: &Value) -> KindResult<Bson> {
        Self::coerce(value).map(Bson::from)
    }

    fn unwrap(&self, native: &Bson) -> KindResult<Value> {
        Self::native_uuid(native).map(Value::Uuid)
    }
}

/// A datetime with millisecond precision.
///
/// By default the field holds naive datetimes interpreted as UTC. With
/// [`DateTimeField::use_tz`] it holds timezone-aware UTC datetimes instead. Bounds only
/// apply to naive fields.
#[derive(Debug, Clone, Default)]
pub struct DateTimeField {
    min: Option<NaiveDateTime>,
    max: Option<NaiveDateTime>,
    use_tz: bool,
}

impl DateTimeField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min(mut self, min: NaiveDateTime) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: NaiveDateTime) -> Self {
        self.max = Some(max);
        self
    }

    pub fn use_tz(mut self) -> Self {
        self.use_tz = true;
        self
    }

    fn check_bounds(&self, value: &NaiveDateTime) -> KindResult<()> {
        if self.min.is_some_and(|min| *value < min) {
            return Err(Rejection::new("Date too early"));
        }
        if self.max.is_some_and(|max| *value > max) {
            return Err(Rejection::new("Date too late"));
        }

        Ok(())
    }

    /// Stored datetimes carry milliseconds; finer values would not survive a round trip.
    fn check_precision(value: &impl Timelike) -> KindResult<()> {
        match value.nanosecond() % 1_000_000 {
            0 => Ok(()),
            _ => Err(Rejection::new("Datetime is more precise than milliseconds")),
        }
    }

    fn native_datetime(native: &Bson) -> KindResult<DateTime<Utc>> {
        match native {
            Bson::DateTime(datetime) => Ok(datetime.to_chrono()),
            other => Err(Rejection::native_mismatch("a datetime", other)),
        }
    }
}

impl FieldKind for DateTimeField {
    fn type_name(&self) -> &'static str {
        "DateTimeField"
    }

    fn check(&self) -> Result<(), String> {
        if self.use_tz && (self.min.is_some() || self.max.is_some()) {
            return Err("bounds cannot be combined with use_tz".into());
        }

        match (self.min, self.max) {
            (Some(min), Some(max)) if min > max => {
                Err(format!("min {min} is later than max {max}"))
            }
            _ => Ok(()),
        }
    }

    fn validate_wrap(&self, value: &Value) -> KindResult<()> {
        match (value, self.use_tz) {
            (Value::DateTime(naive), false) => {
                Self::check_precision(naive)?;
                self.check_bounds(naive)
            }
            (Value::DateTimeUtc(aware), true) => Self::check_precision(aware),
            (other, true) => Err(Rejection::type_mismatch("aware datetime", other)),
            (other, false) => Err(Rejection::type_mismatch("datetime", other)),
        }
    }

    fn validate_unwrap(&self, native: &Bson) -> KindResult<()> {
        let datetime = Self::native_datetime(native)?;

        match self.use_tz {
            true => Ok(()),
            false => self.check_bounds(&datetime.naive_utc()),
        }
    }

    fn wrap(&self, value: &Value) -> KindResult<Bson> {
        self.validate_wrap(value)?;

        match value {
            Value::DateTime(naive) => Ok(naive_to_bson(naive)),
            Value::DateTimeUtc(aware) => Ok(Bson::DateTime(bson::DateTime::from_chrono(*aware))),
            other => Err(Rejection::type_mismatch("datetime", other)),
        }
    }

    fn unwrap(&self, native: &Bson) -> KindResult<Value> {
        let datetime = Self::native_datetime(native)?;

        Ok(match self.use_tz {
            true => Value::DateTimeUtc(datetime),
            false => Value::DateTime(datetime.naive_utc()),
        })
    }
}

/// Accepts any value, converted generically.
#[derive(Debug, Clone, Default)]
pub struct AnythingField;

impl AnythingField {
    pub fn new() -> Self {
        Self
    }
}

impl FieldKind for AnythingField {
    fn type_name(&self) -> &'static str {
        "AnythingField"
    }

    fn valid_modifiers(&self) -> Modifiers {
        Modifiers::ANY
    }

    fn validate_wrap(&self, _value: &Value) -> KindResult<()> {
        Ok(())
    }

    fn validate_unwrap(&self, _native: &Bson) -> KindResult<()> {
        Ok(())
    }

    fn wrap(&self, value: &Value) -> KindResult<Bson> {
        value.to_bson().map_err(Rejection::from)
    }

    fn unwrap(&self, native: &Bson) -> KindResult<Value> {
        Ok(Value::from_bson(native))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};

    use super::*;
    use crate::field::Field;

    fn date(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_string_length_bounds() {
        let field = Field::new(StringField::new().min_length(2).max_length(4));

        assert!(field.wrap(&Value::from("abc")).is_ok());
        assert!(field.wrap(&Value::from("a")).is_err());
        assert!(field.wrap(&Value::from("abcde")).is_err());
        assert!(field.wrap(&Value::Int(3)).is_err());
    }

    #[test]
    fn test_string_bounds_misconfigured() {
        let field = Field::new(StringField::new().min_length(5).max_length(1));

        assert!(matches!(field.check(), Err(MapperError::InvalidConfig(_))));
    }

    #[test]
    fn test_regex_match_is_anchored_at_start() {
        let field = Field::new(RegexStringField::pattern("[a-z]+").unwrap());

        assert!(field.wrap(&Value::from("abc123")).is_ok());
        assert!(field.wrap(&Value::from("123abc")).is_err());
        assert!(field.unwrap(&Bson::String("9".into())).is_err());
    }

    #[test]
    fn test_regex_pattern_must_compile() {
        assert!(matches!(
            RegexStringField::pattern("("),
            Err(MapperError::BadFieldSpecification(_))
        ));
    }

    #[test]
    fn test_int_bounds_and_width() {
        let field = Field::new(IntField::new().min(0).max(10));

        assert_eq!(field.wrap(&Value::Int(3)).unwrap(), Bson::Int32(3));
        assert!(field.wrap(&Value::Int(-1)).is_err());
        assert!(field.wrap(&Value::Int(11)).is_err());
        assert!(field.wrap(&Value::Float(3.0)).is_err());

        let wide = Field::new(IntField::new());
        assert_eq!(wide.unwrap(&Bson::Int64(1 << 40)).unwrap(), Value::Int(1 << 40));
    }

    #[test]
    fn test_float_rejects_ints() {
        let field = Field::new(FloatField::new().max(1.5));

        assert_eq!(field.wrap(&Value::Float(1.0)).unwrap(), Bson::Double(1.0));
        assert!(field.wrap(&Value::Float(2.0)).is_err());
        assert!(field.wrap(&Value::Int(1)).is_err());
    }

    #[test]
    fn test_object_id_accepts_hex() {
        let oid = ObjectId::new();
        let field = Field::new(ObjectIdField::new());

        assert_eq!(field.wrap(&Value::from(oid.to_hex())).unwrap(), Bson::ObjectId(oid));
        assert!(field.wrap(&Value::from("nope")).is_err());
        assert_eq!(field.unwrap(&Bson::ObjectId(oid)).unwrap(), Value::ObjectId(oid));
    }

    #[test]
    fn test_auto_ids_generate_defaults() {
        assert!(matches!(
            Field::new(ObjectIdField::new().auto()).default_value(),
            Some(Value::ObjectId(_))
        ));
        assert!(Field::new(ObjectIdField::new()).default_value().is_none());
        assert!(matches!(
            Field::new(UuidField::new().auto()).default_value(),
            Some(Value::Uuid(_))
        ));
    }

    #[test]
    fn test_uuid_conversion() {
        let field = Field::new(UuidField::new());
        let uuid = bson::Uuid::new();
        let native = field.wrap(&Value::Uuid(uuid)).unwrap();

        assert_eq!(field.unwrap(&native).unwrap(), Value::Uuid(uuid));
        assert!(field.unwrap(&Bson::String("x".into())).is_err());
    }

    #[test]
    fn test_naive_datetime_bounds() {
        let field = Field::new(DateTimeField::new().min(date(2000, 1, 1)).max(date(2010, 1, 1)));

        assert!(field.wrap(&Value::DateTime(date(2005, 6, 1))).is_ok());
        assert!(field.wrap(&Value::DateTime(date(1999, 6, 1))).is_err());
        assert!(field.wrap(&Value::DateTime(date(2011, 6, 1))).is_err());
    }

    #[test]
    fn test_datetime_rejects_sub_millisecond_values() {
        let field = Field::new(DateTimeField::new());
        let millis = date(2020, 5, 1) + chrono::Duration::milliseconds(250);
        let micros = millis + chrono::Duration::microseconds(7);

        assert!(field.wrap(&Value::DateTime(micros)).is_err());

        let native = field.wrap(&Value::DateTime(millis)).unwrap();
        assert_eq!(field.unwrap(&native).unwrap(), Value::DateTime(millis));

        let aware = Field::new(DateTimeField::new().use_tz());
        assert!(aware.wrap(&Value::DateTimeUtc(micros.and_utc())).is_err());
        assert!(aware.wrap(&Value::DateTimeUtc(millis.and_utc())).is_ok());
    }

    #[test]
    fn test_datetime_awareness_must_match() {
        let naive = Field::new(DateTimeField::new());
        let aware = Field::new(DateTimeField::new().use_tz());
        let utc = Utc.with_ymd_and_hms(2020, 5, 1, 12, 0, 0).unwrap();

        assert!(naive.wrap(&Value::DateTimeUtc(utc)).is_err());
        assert!(aware.wrap(&Value::DateTime(date(2020, 5, 1))).is_err());

        let native = aware.wrap(&Value::DateTimeUtc(utc)).unwrap();
        assert_eq!(aware.unwrap(&native).unwrap(), Value::DateTimeUtc(utc));
        assert_eq!(naive.unwrap(&native).unwrap(), Value::DateTime(utc.naive_utc()));
    }

    #[test]
    fn test_use_tz_with_bounds_is_invalid() {
        let field = Field::new(DateTimeField::new().use_tz().min(date(2000, 1, 1)));

        assert!(matches!(field.check(), Err(MapperError::InvalidConfig(_))));
    }

    #[test]
    fn test_anything_round_trips_generic_values() {
        let field = Field::new(AnythingField::new());
        let value = Value::list([Value::from("a"), Value::Int(2)]);

        let native = field.wrap(&value).unwrap();
        assert_eq!(field.unwrap(&native).unwrap(), value);
    }
}
