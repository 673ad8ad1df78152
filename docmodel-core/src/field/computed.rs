//! Fields whose value is derived from other fields of the same document.

use std::{fmt, sync::Arc};

use bson::Bson;
use indexmap::IndexMap;

use crate::{
    field::{DateTimeField, Field, FieldKind, KindResult, Modifiers},
    value::Value,
};

/// Dependency values handed to a computation, keyed by field name.
pub type ComputedArgs = IndexMap<String, Value>;

pub type ComputeFn = Arc<dyn Fn(&ComputedArgs) -> Value + Send + Sync>;

/// A derived field.
///
/// Reading the field runs the computation over the current values of its dependencies
/// and validates the result against the inner field. A one-time field computes once and
/// keeps the result; otherwise every read recomputes.
pub struct ComputedField {
    computed: Field,
    fun: ComputeFn,
    deps: Vec<String>,
    one_time: bool,
}

impl ComputedField {
    pub fn new<F>(computed: impl Into<Field>, fun: F) -> Self
    where
        F: Fn(&ComputedArgs) -> Value + Send + Sync + 'static,
    {
        Self {
            computed: computed.into(),
            fun: Arc::new(fun),
            deps: Vec::new(),
            one_time: false,
        }
    }

    /// Names of the fields the computation reads.
    pub fn deps<S: Into<String>>(mut self, deps: impl IntoIterator<Item = S>) -> Self {
        self.deps = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn one_time(mut self) -> Self {
        self.one_time = true;
        self
    }

    /// A creation timestamp, computed once.
    pub fn created() -> Self {
        Self::new(DateTimeField::new(), |_| now()).one_time()
    }

    /// A modification timestamp, recomputed on every read.
    pub fn modified() -> Self {
        Self::new(DateTimeField::new(), |_| now())
    }

    pub fn dependencies(&self) -> &[String] {
        &self.deps
    }

    pub fn is_one_time(&self) -> bool {
        self.one_time
    }

    pub fn computed_field(&self) -> &Field {
        &self.computed
    }

    pub(crate) fn evaluate(&self, args: &ComputedArgs) -> Value {
        (self.fun)(args)
    }
}

fn now() -> Value {
    Value::DateTime(bson::DateTime::now().to_chrono().naive_utc())
}

impl fmt::Debug for ComputedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedField")
            .field("computed", &self.computed)
            .field("deps", &self.deps)
            .field("one_time", &self.one_time)
            .finish_non_exhaustive()
    }
}

impl FieldKind for ComputedField {
    fn type_name(&self) -> &'static str {
        "ComputedField"
    }

    fn valid_modifiers(&self) -> Modifiers {
        self.computed.valid_modifiers()
    }

    fn validate_wrap(&self, value: &Value) -> KindResult<()> {
        Ok(self.computed.validate_wrap(value)?)
    }

    fn validate_unwrap(&self, native: &Bson) -> KindResult<()> {
        Ok(self.computed.validate_unwrap(native)?)
    }

    fn wrap(&self, value: &Value) -> KindResult<Bson> {
        Ok(self.computed.wrap(value)?)
    }

    fn unwrap(&self, native: &Bson) -> KindResult<Value> {
        Ok(self.computed.unwrap(native)?)
    }

    fn children(&self) -> Vec<&Field> {
        vec![&self.computed]
    }

    fn bind_children(&mut self, name: &str) {
        self.computed.bind(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::MapperError, field::IntField};

    fn doubled() -> Field {
        let mut field = Field::new(
            ComputedField::new(IntField::new().max(100), |args| {
                Value::Int(args.get("x").and_then(Value::as_i64).unwrap_or(0) * 2)
            })
            .deps(["x"]),
        );
        field.bind("doubled");
        field
    }

    #[test]
    fn test_compute_runs_over_args() {
        let mut args = ComputedArgs::new();
        args.insert("x".into(), Value::Int(4));

        assert_eq!(doubled().compute(&args).unwrap(), Value::Int(8));
    }

    #[test]
    fn test_compute_validates_output() {
        let mut args = ComputedArgs::new();
        args.insert("x".into(), Value::Int(400));

        match doubled().compute(&args) {
            Err(MapperError::BadValue { reason, .. }) => {
                assert_eq!(reason, "Computed function returned a bad value");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_timestamps() {
        let created = ComputedField::created();
        let modified = ComputedField::modified();

        assert!(created.is_one_time());
        assert!(!modified.is_one_time());
        assert!(matches!(created.evaluate(&ComputedArgs::new()), Value::DateTime(_)));
    }
}
