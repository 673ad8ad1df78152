//! Query construction.
//!
//! Predicates start from a [`QueryField`], a schema path resolved to its field and
//! storage path. Every literal goes through the field's wrap before it reaches the
//! native predicate tree, so an invalid comparison fails when the query is built rather
//! than when it runs.
//!
//! # Example
//!
//! ```ignore
//! use docmodel_core::query::Query;
//!
//! let adults = Query::new(&person)
//!     .filter(person.query_field("age")?.gte(18)?)?
//!     .filter(person.query_field("name")?.startswith("A", false)?)?
//!     .descending("age")?
//!     .limit(10);
//! ```

use std::sync::Arc;

use bson::Bson;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    backend::FindSpec,
    error::{MapperError, MapperResult},
    field::{DocumentField, Field},
    schema::{DocumentSchema, ID_KEY},
    update::{FindAndModifyExpression, UpdateExpression},
    value::Value,
};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl SortDirection {
    pub fn to_bson(&self) -> Bson {
        match self {
            SortDirection::Asc => Bson::Int32(1),
            SortDirection::Desc => Bson::Int32(-1),
        }
    }
}

/// A schema path bound to its field, used to build predicates.
#[derive(Debug, Clone)]
pub struct QueryField<'s> {
    field: &'s Field,
    path: String,
}

impl DocumentSchema {
    /// Resolves `path` (declared names, dot separated) for use in predicates.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::FieldNotFound`] for an unknown segment and
    /// [`MapperError::BadQuery`] for a misplaced `$` segment.
    pub fn query_field(&self, path: &str) -> MapperResult<QueryField<'_>> {
        let (field, path) = self.resolve_path(path)?;
        Ok(QueryField { field, path })
    }
}

impl<'s> QueryField<'s> {
    pub fn field(&self) -> &'s Field {
        self.field
    }

    /// The storage path used in native predicates.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn expression(&self, predicate: impl Into<Bson>) -> QueryExpression {
        let mut obj = bson::Document::new();
        obj.insert(self.path.clone(), predicate.into());
        QueryExpression { obj }
    }

    fn compare(&self, op: &str, value: impl Into<Value>) -> MapperResult<QueryExpression> {
        let mut predicate = bson::Document::new();
        predicate.insert(op, self.field.wrap(&value.into())?);
        Ok(self.expression(predicate))
    }

    fn wrap_all<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> MapperResult<Vec<Bson>> {
        values
            .into_iter()
            .map(|value| self.field.wrap_query_value(&value.into()))
            .collect()
    }

    /// `field == value`. For sequence fields `value` may be a single item.
    pub fn eq(&self, value: impl Into<Value>) -> MapperResult<QueryExpression> {
        Ok(self.expression(self.field.wrap_query_value(&value.into())?))
    }

    pub fn ne(&self, value: impl Into<Value>) -> MapperResult<QueryExpression> {
        let native = self.field.wrap_query_value(&value.into())?;
        Ok(self.expression(bson::doc! { "$ne": native }))
    }

    pub fn lt(&self, value: impl Into<Value>) -> MapperResult<QueryExpression> {
        self.compare("$lt", value)
    }

    pub fn lte(&self, value: impl Into<Value>) -> MapperResult<QueryExpression> {
        self.compare("$lte", value)
    }

    pub fn gt(&self, value: impl Into<Value>) -> MapperResult<QueryExpression> {
        self.compare("$gt", value)
    }

    pub fn gte(&self, value: impl Into<Value>) -> MapperResult<QueryExpression> {
        self.compare("$gte", value)
    }

    /// The field equals one of `values`.
    pub fn in_<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> MapperResult<QueryExpression> {
        let natives = self.wrap_all(values)?;
        Ok(self.expression(bson::doc! { "$in": natives }))
    }

    /// The field equals none of `values`.
    pub fn nin<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> MapperResult<QueryExpression> {
        let natives = self.wrap_all(values)?;
        Ok(self.expression(bson::doc! { "$nin": natives }))
    }

    pub fn exists(&self, exists: bool) -> QueryExpression {
        self.expression(bson::doc! { "$exists": exists })
    }

    /// Matches string values against a regular expression.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::BadQuery`] if `pattern` does not compile.
    pub fn regex(&self, pattern: &str, ignore_case: bool) -> MapperResult<QueryExpression> {
        regex::Regex::new(pattern)
            .map_err(|err| MapperError::BadQuery(format!("bad pattern for {}: {err}", self.path)))?;

        let mut predicate = bson::doc! { "$regex": pattern };
        if ignore_case {
            predicate.insert("$options", "i");
        }

        Ok(self.expression(predicate))
    }

    pub fn startswith(&self, prefix: &str, ignore_case: bool) -> MapperResult<QueryExpression> {
        self.regex(&format!("^{}", regex::escape(prefix)), ignore_case)
    }

    pub fn endswith(&self, suffix: &str, ignore_case: bool) -> MapperResult<QueryExpression> {
        self.regex(&format!("{}$", regex::escape(suffix)), ignore_case)
    }

    pub fn near(&self, x: f64, y: f64, max_distance: Option<f64>) -> QueryExpression {
        self.near_op("$near", x, y, max_distance)
    }

    pub fn near_sphere(&self, x: f64, y: f64, max_distance: Option<f64>) -> QueryExpression {
        self.near_op("$nearSphere", x, y, max_distance)
    }

    fn near_op(&self, op: &str, x: f64, y: f64, max_distance: Option<f64>) -> QueryExpression {
        let mut predicate = bson::Document::new();
        predicate.insert(op, point(x, y));
        if let Some(max_distance) = max_distance {
            predicate.insert("$maxDistance", max_distance);
        }
        self.expression(predicate)
    }

    fn within(&self, shape: &str, value: Bson) -> QueryExpression {
        let mut area = bson::Document::new();
        area.insert(shape, value);
        self.expression(bson::doc! { "$within": area })
    }

    pub fn within_box(&self, corner1: (f64, f64), corner2: (f64, f64)) -> QueryExpression {
        self.within(
            "$box",
            Bson::Array(vec![point(corner1.0, corner1.1), point(corner2.0, corner2.1)]),
        )
    }

    pub fn within_radius(&self, x: f64, y: f64, radius: f64) -> QueryExpression {
        self.within("$center", Bson::Array(vec![point(x, y), Bson::Double(radius)]))
    }

    pub fn within_radius_sphere(&self, x: f64, y: f64, radius: f64) -> QueryExpression {
        self.within("$centerSphere", Bson::Array(vec![point(x, y), Bson::Double(radius)]))
    }

    pub fn within_polygon(&self, points: &[(f64, f64)]) -> QueryExpression {
        let points = points
            .iter()
            .map(|(x, y)| point(*x, *y))
            .collect::<Vec<_>>();

        self.within("$polygon", Bson::Array(points))
    }

    /// Matches sequence fields holding at least one element that satisfies `expression`.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::BadQuery`] if the field is not a sequence.
    pub fn elem_match(&self, expression: QueryExpression) -> MapperResult<QueryExpression> {
        if !self.field.is_sequence() {
            return Err(MapperError::BadQuery(format!(
                "elem_match called on a non-sequence field: {}",
                self.path
            )));
        }

        Ok(self.expression(bson::doc! { "$elemMatch": expression.obj }))
    }
}

fn point(x: f64, y: f64) -> Bson {
    Bson::Array(vec![Bson::Double(x), Bson::Double(y)])
}

fn is_operator(key: &str) -> bool {
    key.starts_with('$')
}

/// A native predicate tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryExpression {
    obj: bson::Document,
}

impl QueryExpression {
    /// Wraps a native predicate as is, without any validation.
    pub fn raw(obj: bson::Document) -> Self {
        Self { obj }
    }

    pub fn as_document(&self) -> &bson::Document {
        &self.obj
    }

    pub fn into_document(self) -> bson::Document {
        self.obj
    }

    /// Negates every clause.
    ///
    /// Plain values become `$ne`, operator documents are wrapped in `$not`, and a
    /// disjunction becomes a `$nor`.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::BadQuery`] for a clause mixing operators and plain keys.
    pub fn not_(self) -> MapperResult<QueryExpression> {
        let mut negated = bson::Document::new();

        for (key, value) in self.obj {
            match key.as_str() {
                "$or" => {
                    negated.insert("$nor", value);
                    continue;
                }
                "$nor" => {
                    negated.insert("$or", value);
                    continue;
                }
                _ => {}
            }

            let Bson::Document(clause) = value else {
                negated.insert(key, bson::doc! { "$ne": value });
                continue;
            };

            let operators = clause.keys().filter(|name| is_operator(name)).count();

            if operators == 0 {
                negated.insert(key, bson::doc! { "$ne": clause });
            } else if operators == clause.len() {
                negated.insert(key, bson::doc! { "$not": clause });
            } else {
                return Err(MapperError::BadQuery(format!(
                    "$ operator used in field name under {key}"
                )));
            }
        }

        Ok(QueryExpression { obj: negated })
    }

    /// Disjunction. Extends an existing top-level `$or` instead of nesting.
    pub fn or_(mut self, other: QueryExpression) -> QueryExpression {
        if let Ok(clauses) = self.obj.get_array_mut("$or") {
            clauses.push(Bson::Document(other.obj));
            return self;
        }

        QueryExpression {
            obj: bson::doc! { "$or": [self.obj, other.obj] },
        }
    }
}

impl From<bson::Document> for QueryExpression {
    fn from(obj: bson::Document) -> Self {
        Self::raw(obj)
    }
}

/// Which parts of each record a query returns.
#[derive(Debug, Clone, PartialEq)]
enum Projection {
    /// These storage paths and the identity. A path maps to `1` or to an `$elemMatch`.
    Include(IndexMap<String, Bson>),
    /// Everything but these storage paths.
    Exclude(Vec<String>),
}

/// Storage paths of `schema` left after removing `excluded`, descending into nested
/// documents that are only partly excluded.
fn retained_paths(schema: &DocumentSchema, prefix: &str, excluded: &[String], out: &mut Vec<String>) {
    for (_, field) in schema.fields() {
        let path = format!("{prefix}{}", field.storage_name());

        if excluded.contains(&path) {
            continue;
        }

        let nested_prefix = format!("{path}.");
        let nested = field
            .kind_as::<DocumentField>()
            .and_then(|embedded| embedded.schema().ok())
            .filter(|_| excluded.iter().any(|other| other.starts_with(&nested_prefix)));

        match nested {
            Some(nested) => retained_paths(nested, &nested_prefix, excluded, out),
            None => out.push(path),
        }
    }
}

/// Query state for one schema: predicate, projection, sort, hint and paging.
#[derive(Debug, Clone)]
pub struct Query {
    schema: Arc<DocumentSchema>,
    filter: bson::Document,
    projection: Option<Projection>,
    sort: Vec<(String, SortDirection)>,
    hints: Vec<(String, SortDirection)>,
    limit: Option<i64>,
    skip: Option<u64>,
}

impl Query {
    /// A query over `schema` and, for a polymorphic hierarchy, its subclasses.
    pub fn new(schema: &Arc<DocumentSchema>) -> Self {
        Self::with_base(schema, false)
    }

    /// A query over records of `schema` itself, leaving out those of its subclasses.
    pub fn excluding_subclasses(schema: &Arc<DocumentSchema>) -> Self {
        Self::with_base(schema, true)
    }

    fn with_base(schema: &Arc<DocumentSchema>, exclude_subclasses: bool) -> Self {
        Self {
            schema: Arc::clone(schema),
            filter: schema.base_filter(exclude_subclasses),
            projection: None,
            sort: Vec::new(),
            hints: Vec::new(),
            limit: None,
            skip: None,
        }
    }

    pub fn schema(&self) -> &Arc<DocumentSchema> {
        &self.schema
    }

    /// Adds a predicate. Repeated paths are merged when both sides are operator
    /// documents.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::BadQuery`] if a path is assigned twice and either value
    /// is not a document.
    pub fn filter(mut self, expression: QueryExpression) -> MapperResult<Self> {
        for (key, value) in expression.obj {
            match (self.filter.get_mut(&key), value) {
                (None, value) => {
                    self.filter.insert(key, value);
                }
                (Some(Bson::Document(existing)), Bson::Document(value)) => existing.extend(value),
                (Some(_), _) => {
                    return Err(MapperError::BadQuery(format!(
                        "Multiple assignments to {key} must all be documents"
                    )));
                }
            }
        }

        Ok(self)
    }

    /// Equality on a declared path.
    pub fn filter_by(self, path: &str, value: impl Into<Value>) -> MapperResult<Self> {
        let expression = self.schema.query_field(path)?.eq(value)?;
        self.filter(expression)
    }

    /// Adds the negation of each expression.
    pub fn not_(mut self, expressions: impl IntoIterator<Item = QueryExpression>) -> MapperResult<Self> {
        for expression in expressions {
            self = self.filter(expression.not_()?)?;
        }
        Ok(self)
    }

    /// Adds the disjunction of the expressions.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::BadQuery`] if `expressions` is empty.
    pub fn or_(self, expressions: impl IntoIterator<Item = QueryExpression>) -> MapperResult<Self> {
        let disjunction = expressions
            .into_iter()
            .reduce(QueryExpression::or_)
            .ok_or_else(|| MapperError::BadQuery("or_ needs at least one expression".into()))?;

        self.filter(disjunction)
    }

    pub fn in_<V: Into<Value>>(self, path: &str, values: impl IntoIterator<Item = V>) -> MapperResult<Self> {
        let expression = self.schema.query_field(path)?.in_(values)?;
        self.filter(expression)
    }

    pub fn nin<V: Into<Value>>(self, path: &str, values: impl IntoIterator<Item = V>) -> MapperResult<Self> {
        let expression = self.schema.query_field(path)?.nin(values)?;
        self.filter(expression)
    }

    pub fn ascending(self, path: &str) -> MapperResult<Self> {
        self.sort(path, SortDirection::Asc)
    }

    pub fn descending(self, path: &str) -> MapperResult<Self> {
        self.sort(path, SortDirection::Desc)
    }

    /// Adds a sort key after any existing ones.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::BadQuery`] if the query already sorts by `path`.
    pub fn sort(mut self, path: &str, direction: SortDirection) -> MapperResult<Self> {
        let storage = self.schema.query_field(path)?.path;

        if self.sort.iter().any(|(existing, _)| *existing == storage) {
            return Err(MapperError::BadQuery(format!("Already sorting by {storage}")));
        }

        self.sort.push((storage, direction));
        Ok(self)
    }

    pub fn hint_asc(self, path: &str) -> MapperResult<Self> {
        self.hint(path, SortDirection::Asc)
    }

    pub fn hint_desc(self, path: &str) -> MapperResult<Self> {
        self.hint(path, SortDirection::Desc)
    }

    fn hint(mut self, path: &str, direction: SortDirection) -> MapperResult<Self> {
        let storage = self.schema.query_field(path)?.path;

        if self.hints.iter().any(|(existing, _)| *existing == storage) {
            return Err(MapperError::BadQuery(format!("Already gave hint for {storage}")));
        }

        self.hints.push((storage, direction));
        Ok(self)
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    fn included(&mut self) -> MapperResult<&mut IndexMap<String, Bson>> {
        let projection = self
            .projection
            .get_or_insert_with(|| Projection::Include(IndexMap::new()));

        match projection {
            Projection::Include(paths) => Ok(paths),
            Projection::Exclude(_) => Err(MapperError::BadQuery(
                "Cannot mix included and excluded fields".into(),
            )),
        }
    }

    fn include(mut self, path: String, selector: Bson) -> MapperResult<Self> {
        let included = self.included()?;
        included.insert(path, selector);

        if !included.contains_key(ID_KEY) {
            included.insert(ID_KEY.to_string(), Bson::Int32(1));
        }

        Ok(self)
    }

    /// Restricts results to the given paths plus the identity. Documents loaded from
    /// such a query are partial.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::BadQuery`] if the query already excludes fields.
    pub fn fields<S: AsRef<str>>(mut self, paths: impl IntoIterator<Item = S>) -> MapperResult<Self> {
        for path in paths {
            let storage = self.schema.query_field(path.as_ref())?.path;
            if !self.included()?.contains_key(&storage) {
                self = self.include(storage, Bson::Int32(1))?;
            }
        }

        Ok(self)
    }

    /// Retrieves the sequence at `path` with only its first element matching
    /// `expression`. Counts as an included field.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::BadQuery`] if the field is not a sequence or the query
    /// already excludes fields.
    pub fn fields_elem_match(self, path: &str, expression: QueryExpression) -> MapperResult<Self> {
        let selector = self.schema.query_field(path)?.elem_match(expression)?;
        let (storage, selector) = selector
            .obj
            .into_iter()
            .next()
            .ok_or_else(|| MapperError::BadQuery(format!("empty elem_match on {path}")))?;

        self.include(storage, selector)
    }

    /// Retrieves everything but the given paths.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::BadQuery`] if the query already restricts to included
    /// fields.
    pub fn exclude<S: AsRef<str>>(mut self, paths: impl IntoIterator<Item = S>) -> MapperResult<Self> {
        let mut excluded = match self.projection.take() {
            None => Vec::new(),
            Some(Projection::Exclude(excluded)) => excluded,
            Some(included @ Projection::Include(_)) => {
                self.projection = Some(included);
                return Err(MapperError::BadQuery(
                    "Cannot mix included and excluded fields".into(),
                ));
            }
        };

        for path in paths {
            let storage = self.schema.query_field(path.as_ref())?.path;
            if !excluded.contains(&storage) {
                excluded.push(storage);
            }
        }

        self.projection = Some(Projection::Exclude(excluded));
        Ok(self)
    }

    /// Starts an update of every document this query matches.
    pub fn update(&self) -> UpdateExpression {
        UpdateExpression::new(self.clone())
    }

    /// Starts a find-and-remove of the first document this query matches.
    pub fn find_and_remove(&self) -> FindAndModifyExpression {
        FindAndModifyExpression::removal(self.clone())
    }

    pub fn filter_document(&self) -> &bson::Document {
        &self.filter
    }

    /// Storage paths a projected query retrieves, `None` when it retrieves everything.
    pub fn retrieved_fields(&self) -> Option<Vec<String>> {
        match self.projection.as_ref()? {
            Projection::Include(paths) => Some(paths.keys().cloned().collect()),
            Projection::Exclude(excluded) => {
                let mut retained = Vec::new();
                retained_paths(&self.schema, "", excluded, &mut retained);
                Some(retained)
            }
        }
    }

    /// The native projection document, if any.
    pub fn projection_document(&self) -> Option<bson::Document> {
        self.projection.as_ref().map(|projection| match projection {
            Projection::Include(paths) => paths
                .iter()
                .map(|(path, selector)| (path.clone(), selector.clone()))
                .collect(),
            Projection::Exclude(excluded) => excluded
                .iter()
                .map(|path| (path.clone(), Bson::Int32(0)))
                .collect(),
        })
    }

    /// The explicit sort, or the schema's default sort when none was given.
    pub fn sort_document(&self) -> bson::Document {
        let sort = match self.sort.is_empty() {
            true => self.schema.default_sort(),
            false => &self.sort,
        };

        sort.iter()
            .map(|(path, direction)| (path.clone(), direction.to_bson()))
            .collect()
    }

    /// Everything a backend needs to run the query.
    pub fn find_spec(&self) -> FindSpec {
        let sort = self.sort_document();

        FindSpec {
            filter: self.filter.clone(),
            projection: self.projection_document(),
            sort: (!sort.is_empty()).then_some(sort),
            limit: self.limit,
            skip: self.skip,
            hint: (!self.hints.is_empty()).then(|| {
                self.hints
                    .iter()
                    .map(|(path, direction)| (path.clone(), direction.to_bson()))
                    .collect()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;
    use crate::field::{DocumentField, Field, IntField, ListField, StringField};

    fn person() -> Arc<DocumentSchema> {
        let address = DocumentSchema::builder("QAddress")
            .no_namespace()
            .field("city", Field::new(StringField::new()).db_field("c"))
            .build_unregistered()
            .unwrap();

        DocumentSchema::builder("QPerson")
            .no_namespace()
            .field("name", StringField::new())
            .field("age", Field::new(IntField::new().min(0)).db_field("a"))
            .field("tags", ListField::new(StringField::new()))
            .field("address", DocumentField::new(&address))
            .field("homes", ListField::new(DocumentField::new(&address)))
            .default_sort("name", SortDirection::Asc)
            .build_unregistered()
            .unwrap()
    }

    #[test]
    fn test_comparisons_use_storage_paths() {
        let schema = person();
        let age = schema.query_field("age").unwrap();

        assert_eq!(age.eq(3).unwrap().into_document(), doc! { "a": 3 });
        assert_eq!(age.gt(3).unwrap().into_document(), doc! { "a": { "$gt": 3 } });
        assert_eq!(age.in_([1, 2]).unwrap().into_document(), doc! { "a": { "$in": [1, 2] } });
        assert_eq!(age.exists(false).into_document(), doc! { "a": { "$exists": false } });
    }

    #[test]
    fn test_literals_are_validated() {
        let schema = person();
        let age = schema.query_field("age").unwrap();

        assert!(matches!(age.eq("4"), Err(MapperError::BadValue { .. })));
        assert!(matches!(age.lt(-1), Err(MapperError::BadValue { .. })));
    }

    #[test]
    fn test_sequence_equality_accepts_an_item() {
        let schema = person();
        let tags = schema.query_field("tags").unwrap();

        assert_eq!(tags.eq("x").unwrap().into_document(), doc! { "tags": "x" });
        assert_eq!(
            tags.eq(Value::list(["x", "y"])).unwrap().into_document(),
            doc! { "tags": ["x", "y"] }
        );
        assert!(tags.elem_match(QueryExpression::raw(doc! { "$eq": "x" })).is_ok());

        let name = schema.query_field("name").unwrap();
        assert!(matches!(
            name.elem_match(QueryExpression::default()),
            Err(MapperError::BadQuery(_))
        ));
    }

    #[test]
    fn test_nested_paths() {
        let schema = person();

        assert_eq!(schema.query_field("address.city").unwrap().path(), "address.c");
        assert_eq!(schema.query_field("homes.city").unwrap().path(), "homes.c");
        assert_eq!(schema.query_field("homes.$.city").unwrap().path(), "homes.$.c");
        assert!(matches!(
            schema.query_field("name.$"),
            Err(MapperError::BadQuery(_))
        ));
        assert!(matches!(
            schema.query_field("address.zip"),
            Err(MapperError::FieldNotFound(_))
        ));
    }

    #[test]
    fn test_regex_helpers() {
        let schema = person();
        let name = schema.query_field("name").unwrap();

        assert_eq!(
            name.startswith("a.b", true).unwrap().into_document(),
            doc! { "name": { "$regex": "^a\\.b", "$options": "i" } }
        );
        assert_eq!(
            name.endswith("z", false).unwrap().into_document(),
            doc! { "name": { "$regex": "z$" } }
        );
        assert!(matches!(name.regex("(", false), Err(MapperError::BadQuery(_))));
    }

    #[test]
    fn test_geo_predicates() {
        let schema = person();
        let name = schema.query_field("name").unwrap();

        assert_eq!(
            name.near(1.0, 2.0, Some(5.0)).into_document(),
            doc! { "name": { "$near": [1.0, 2.0], "$maxDistance": 5.0 } }
        );
        assert_eq!(
            name.within_radius(1.0, 2.0, 3.0).into_document(),
            doc! { "name": { "$within": { "$center": [[1.0, 2.0], 3.0] } } }
        );
    }

    #[test]
    fn test_not_rewrites_each_clause() {
        let schema = person();
        let age = schema.query_field("age").unwrap();
        let name = schema.query_field("name").unwrap();

        assert_eq!(
            age.gt(18).unwrap().not_().unwrap().into_document(),
            doc! { "a": { "$not": { "$gt": 18 } } }
        );
        assert_eq!(
            name.eq("x").unwrap().not_().unwrap().into_document(),
            doc! { "name": { "$ne": "x" } }
        );

        let mixed = QueryExpression::raw(doc! { "a": { "$gt": 1, "b": 2 } });
        assert!(matches!(mixed.not_(), Err(MapperError::BadQuery(_))));

        let either = name.eq("x").unwrap().or_(name.eq("y").unwrap());
        assert_eq!(
            either.not_().unwrap().into_document(),
            doc! { "$nor": [{ "name": "x" }, { "name": "y" }] }
        );
    }

    #[test]
    fn test_or_flattens() {
        let schema = person();
        let name = schema.query_field("name").unwrap();

        let expression = name
            .eq("a")
            .unwrap()
            .or_(name.eq("b").unwrap())
            .or_(name.eq("c").unwrap());

        assert_eq!(
            expression.into_document(),
            doc! { "$or": [{ "name": "a" }, { "name": "b" }, { "name": "c" }] }
        );
    }

    #[test]
    fn test_filter_merges_operator_documents() {
        let schema = person();
        let age = schema.query_field("age").unwrap();

        let query = Query::new(&schema)
            .filter(age.gt(1).unwrap())
            .unwrap()
            .filter(age.lt(9).unwrap())
            .unwrap();
        assert_eq!(query.filter_document(), &doc! { "a": { "$gt": 1, "$lt": 9 } });

        let conflict = Query::new(&schema)
            .filter_by("name", "x")
            .unwrap()
            .filter_by("name", "y");
        assert!(matches!(conflict, Err(MapperError::BadQuery(_))));
    }

    #[test]
    fn test_sort_hint_and_fields() {
        let schema = person();

        let query = Query::new(&schema);
        assert_eq!(query.sort_document(), doc! { "name": 1 });

        let query = query
            .descending("age")
            .unwrap()
            .hint_asc("name")
            .unwrap()
            .fields(["name", "address.city"])
            .unwrap()
            .limit(5)
            .skip(2);

        assert!(matches!(query.clone().ascending("age"), Err(MapperError::BadQuery(_))));
        assert!(matches!(query.clone().hint_desc("name"), Err(MapperError::BadQuery(_))));

        let spec = query.find_spec();
        assert_eq!(spec.sort, Some(doc! { "a": -1 }));
        assert_eq!(spec.hint, Some(doc! { "name": 1 }));
        assert_eq!(
            spec.projection,
            Some(doc! { "name": 1, "address.c": 1, "_id": 1 })
        );
        assert_eq!(spec.limit, Some(5));
        assert_eq!(spec.skip, Some(2));
        assert_eq!(
            query.retrieved_fields().unwrap(),
            ["name", "address.c", "_id"]
        );
    }

    #[test]
    fn test_or_needs_an_expression() {
        let schema = person();

        assert!(matches!(
            Query::new(&schema).or_(Vec::new()),
            Err(MapperError::BadQuery(_))
        ));
    }
}
