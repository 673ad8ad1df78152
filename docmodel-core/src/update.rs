//! Atomic update construction.
//!
//! An [`UpdateExpression`] collects operator maps for the documents a [`Query`]
//! matches. Each verb checks the target field's legal modifiers before accepting a
//! value; scalar verbs wrap through the field itself, list verbs through its item field.

use std::sync::Arc;

use bson::Bson;
use indexmap::IndexMap;

use crate::{
    backend::{ModifyAction, ModifySpec, StoreBackend, UpdateAck},
    document::Document,
    error::{MapperError, MapperResult},
    field::{Field, UpdateOp},
    query::{Query, QueryExpression},
    session::Session,
    value::Value,
};

/// Operator maps keyed by native operator, plus the upsert and multi flags.
///
/// # Example
///
/// ```ignore
/// let update = Query::new(&person)
///     .filter_by("name", "Ada")?
///     .update()
///     .set("age", 37)?
///     .append("tags", "math")?
///     .upsert();
/// session.execute_update(&update).await?;
/// ```
#[derive(Debug, Clone)]
pub struct UpdateExpression {
    query: Query,
    ops: IndexMap<&'static str, bson::Document>,
    upsert: bool,
    multi: bool,
}

impl UpdateExpression {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            ops: IndexMap::new(),
            upsert: false,
            multi: false,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Creates the document when nothing matches.
    pub fn upsert(mut self) -> Self {
        self.upsert = true;
        self
    }

    /// Updates every matching document instead of the first.
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    pub fn is_upsert(&self) -> bool {
        self.upsert
    }

    pub fn is_multi(&self) -> bool {
        self.multi
    }

    fn apply<F>(mut self, op: UpdateOp, path: &str, operand: F) -> MapperResult<Self>
    where
        F: FnOnce(&Field) -> MapperResult<Bson>,
    {
        let schema = Arc::clone(self.query.schema());
        let target = schema.query_field(path)?;
        let field = target.field();

        if !field.valid_modifiers().contains(op) {
            return Err(MapperError::InvalidModifier {
                field: target.path().to_string(),
                kind: field.type_name().to_string(),
                op: op.as_str().to_string(),
            });
        }

        let operand = operand(field)?;
        self.ops
            .entry(op.native_key())
            .or_default()
            .insert(target.path(), operand);

        Ok(self)
    }

    fn item_of(field: &Field) -> &Field {
        field.item().unwrap_or(field)
    }

    fn wrap_items<V: Into<Value>>(
        field: &Field,
        values: impl IntoIterator<Item = V>,
    ) -> MapperResult<Vec<Bson>> {
        let item = Self::item_of(field);

        values
            .into_iter()
            .map(|value| item.wrap(&value.into()))
            .collect()
    }

    pub fn set(self, path: &str, value: impl Into<Value>) -> MapperResult<Self> {
        let value = value.into();
        self.apply(UpdateOp::Set, path, |field| field.wrap(&value))
    }

    pub fn unset(self, path: &str) -> MapperResult<Self> {
        self.apply(UpdateOp::Unset, path, |_| Ok(Bson::Boolean(true)))
    }

    /// Adds `amount` to a numeric field.
    pub fn inc(self, path: &str, amount: impl Into<Value>) -> MapperResult<Self> {
        let amount = amount.into();
        self.apply(UpdateOp::Inc, path, |field| field.wrap(&amount))
    }

    /// Pushes one item onto a list.
    pub fn append(self, path: &str, value: impl Into<Value>) -> MapperResult<Self> {
        let value = value.into();
        self.apply(UpdateOp::Push, path, |field| Self::item_of(field).wrap(&value))
    }

    /// Pushes several items onto a list, emitted as `$push` with `$each`.
    pub fn extend<V: Into<Value>>(
        self,
        path: &str,
        values: impl IntoIterator<Item = V>,
    ) -> MapperResult<Self> {
        self.apply(UpdateOp::PushAll, path, |field| {
            let items = Self::wrap_items(field, values)?;
            Ok(Bson::Document(bson::doc! { "$each": items }))
        })
    }

    /// Pulls every occurrence of one item.
    pub fn remove(self, path: &str, value: impl Into<Value>) -> MapperResult<Self> {
        let value = value.into();
        self.apply(UpdateOp::Pull, path, |field| Self::item_of(field).wrap(&value))
    }

    /// Pulls the items matching a predicate.
    pub fn remove_matching(self, path: &str, expression: QueryExpression) -> MapperResult<Self> {
        self.apply(UpdateOp::Pull, path, |_| {
            Ok(Bson::Document(expression.into_document()))
        })
    }

    /// Pulls every occurrence of each of `values`.
    pub fn remove_all<V: Into<Value>>(
        self,
        path: &str,
        values: impl IntoIterator<Item = V>,
    ) -> MapperResult<Self> {
        self.apply(UpdateOp::PullAll, path, |field| {
            Ok(Bson::Array(Self::wrap_items(field, values)?))
        })
    }

    pub fn add_to_set(self, path: &str, value: impl Into<Value>) -> MapperResult<Self> {
        let value = value.into();
        self.apply(UpdateOp::AddToSet, path, |field| {
            Self::item_of(field).wrap(&value)
        })
    }

    pub fn pop_first(self, path: &str) -> MapperResult<Self> {
        self.apply(UpdateOp::Pop, path, |_| Ok(Bson::Int32(-1)))
    }

    pub fn pop_last(self, path: &str) -> MapperResult<Self> {
        self.apply(UpdateOp::Pop, path, |_| Ok(Bson::Int32(1)))
    }

    /// The native update document.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::BadQuery`] if no verb was applied.
    pub fn update_document(&self) -> MapperResult<bson::Document> {
        if self.ops.is_empty() {
            return Err(MapperError::BadQuery(
                "update expression has no operations".into(),
            ));
        }

        Ok(self
            .ops
            .iter()
            .map(|(op, entries)| (op.to_string(), Bson::Document(entries.clone())))
            .collect())
    }

    /// Runs the update through `session`.
    pub async fn execute<B: StoreBackend>(&self, session: &Session<B>) -> MapperResult<UpdateAck> {
        session.execute_update(self).await
    }

    /// Turns this update into a find-and-modify of the first matching document.
    /// With `return_new`, the document is returned as it is after the update.
    pub fn find_and_modify(self, return_new: bool) -> FindAndModifyExpression {
        FindAndModifyExpression {
            update: self,
            return_new,
            remove: false,
        }
    }
}

/// Atomically updates or removes the first document a query matches and returns it.
///
/// The query's sort picks the document and its projection shapes what comes back.
///
/// # Example
///
/// ```ignore
/// let next = Query::new(&ticket)
///     .filter_by("state", "open")?
///     .ascending("created")?
///     .update()
///     .set("state", "taken")?
///     .find_and_modify(true);
/// let taken = session.execute_find_and_modify(&next).await?;
/// ```
#[derive(Debug, Clone)]
pub struct FindAndModifyExpression {
    update: UpdateExpression,
    return_new: bool,
    remove: bool,
}

impl FindAndModifyExpression {
    /// Removes the first match instead of updating it.
    pub(crate) fn removal(query: Query) -> Self {
        Self {
            update: UpdateExpression::new(query),
            return_new: false,
            remove: true,
        }
    }

    pub fn query(&self) -> &Query {
        self.update.query()
    }

    pub fn is_remove(&self) -> bool {
        self.remove
    }

    pub fn returns_new(&self) -> bool {
        self.return_new
    }

    /// The native find-and-modify.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::BadQuery`] for an update with no operations.
    pub fn modify_spec(&self) -> MapperResult<ModifySpec> {
        let query = self.query();
        let action = match self.remove {
            true => ModifyAction::Remove,
            false => ModifyAction::Update(self.update.update_document()?),
        };
        let sort = query.sort_document();

        Ok(ModifySpec {
            filter: query.filter_document().clone(),
            sort: (!sort.is_empty()).then_some(sort),
            projection: query.projection_document(),
            action,
            upsert: self.update.is_upsert(),
            return_new: self.return_new,
        })
    }

    /// Runs the expression through `session`.
    pub async fn execute<B: StoreBackend>(&self, session: &Session<B>) -> MapperResult<Option<Document>> {
        session.execute_find_and_modify(self).await
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;
    use crate::{
        field::{AnythingField, Field, IntField, ListField, SetField, StringField},
        schema::DocumentSchema,
    };

    fn schema() -> Arc<crate::schema::DocumentSchema> {
        DocumentSchema::builder("UDoc")
            .no_namespace()
            .field("i", IntField::new())
            .field("j", Field::new(IntField::new()).db_field("jj"))
            .field("name", StringField::new())
            .field("tags", ListField::new(StringField::new()))
            .field("labels", SetField::new(StringField::new()))
            .field("blob", AnythingField::new())
            .build_unregistered()
            .unwrap()
    }

    fn update() -> UpdateExpression {
        Query::new(&schema()).update()
    }

    #[test]
    fn test_sets_merge_regardless_of_order() {
        let first = update().set("i", 5).unwrap().set("j", 7).unwrap();
        let second = update().set("j", 7).unwrap().set("i", 5).unwrap();

        assert_eq!(first.update_document().unwrap(), doc! { "$set": { "i": 5, "jj": 7 } });
        assert_eq!(first.update_document().unwrap(), second.update_document().unwrap());
    }

    #[test]
    fn test_modifier_legality() {
        assert!(matches!(
            update().inc("name", 1),
            Err(MapperError::InvalidModifier { op, .. }) if op == "$inc"
        ));
        assert!(matches!(
            update().append("i", 1),
            Err(MapperError::InvalidModifier { .. })
        ));

        let inc = update().inc("i", 2).unwrap();
        assert_eq!(inc.update_document().unwrap(), doc! { "$inc": { "i": 2 } });
    }

    #[test]
    fn test_list_verbs_wrap_items() {
        let update = update()
            .append("tags", "a")
            .unwrap()
            .add_to_set("labels", "b")
            .unwrap()
            .remove_all("tags", ["x", "y"])
            .unwrap()
            .pop_first("labels")
            .unwrap();

        assert_eq!(
            update.update_document().unwrap(),
            doc! {
                "$push": { "tags": "a" },
                "$addToSet": { "labels": "b" },
                "$pullAll": { "tags": ["x", "y"] },
                "$pop": { "labels": -1 },
            }
        );

        assert!(matches!(
            self::update().append("tags", 3),
            Err(MapperError::BadValue { .. })
        ));
    }

    #[test]
    fn test_extend_uses_each() {
        let update = update().extend("tags", ["a", "b"]).unwrap();

        assert_eq!(
            update.update_document().unwrap(),
            doc! { "$push": { "tags": { "$each": ["a", "b"] } } }
        );
    }

    #[test]
    fn test_remove_matching_and_anything() {
        let update = update()
            .remove_matching("tags", QueryExpression::raw(doc! { "$in": ["a"] }))
            .unwrap()
            .inc("blob", 1)
            .unwrap()
            .unset("name")
            .unwrap();

        assert_eq!(
            update.update_document().unwrap(),
            doc! {
                "$pull": { "tags": { "$in": ["a"] } },
                "$inc": { "blob": 1 },
                "$unset": { "name": true },
            }
        );
    }

    #[test]
    fn test_find_and_modify_spec() {
        let schema = schema();
        let query = Query::new(&schema).filter_by("name", "a").unwrap().descending("i").unwrap();

        let modify = query.update().inc("i", 1).unwrap().upsert().find_and_modify(true);
        let spec = modify.modify_spec().unwrap();
        assert_eq!(spec.filter, doc! { "name": "a" });
        assert_eq!(spec.sort, Some(doc! { "i": -1 }));
        assert_eq!(spec.action, ModifyAction::Update(doc! { "$inc": { "i": 1 } }));
        assert!(spec.upsert && spec.return_new);

        let removal = query.find_and_remove();
        assert!(removal.is_remove());
        assert_eq!(removal.modify_spec().unwrap().action, ModifyAction::Remove);

        let empty = query.update().find_and_modify(false);
        assert!(matches!(empty.modify_spec(), Err(MapperError::BadQuery(_))));
    }

    #[test]
    fn test_empty_update_is_rejected() {
        let update = update().upsert().multi();

        assert!(update.is_upsert());
        assert!(update.is_multi());
        assert!(matches!(update.update_document(), Err(MapperError::BadQuery(_))));
    }
}
