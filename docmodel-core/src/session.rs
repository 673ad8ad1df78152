//! Sessions tie schemas and documents to a [`StoreBackend`].
//!
//! A [`Session`] wraps documents before handing them to the backend and unwraps what
//! comes back. Before touching a collection it ensures the indexes declared on the
//! schema, once per collection. Updates and removals can be queued and are flushed
//! before any other operation runs.

use std::{collections::HashSet, sync::Arc};

use bson::{Bson, doc};
use parking_lot::Mutex;

use crate::{
    backend::{FindSpec, StoreBackend, UpdateAck},
    document::Document,
    error::{MapperError, MapperResult},
    field::{Field, RefField, SRefField, UpdateOp},
    query::{Query, QueryExpression},
    registry::Registry,
    schema::{DEFAULT_NAMESPACE, DocumentSchema, ID_KEY},
    update::{FindAndModifyExpression, UpdateExpression},
    value::{DbRef, Value},
};

#[derive(Debug, Clone)]
enum QueuedOp {
    Update {
        schema: Arc<DocumentSchema>,
        filter: bson::Document,
        update: bson::Document,
        upsert: bool,
    },
    Remove {
        schema: Arc<DocumentSchema>,
        filter: bson::Document,
    },
}

/// How [`Session::update_with`] selects the stored record and which operators it
/// sends.
///
/// By default the record is selected by the document's identity and every changed
/// field is sent with the operator its field declares.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    selector: Option<QueryExpression>,
    upsert: bool,
    ops: Vec<(String, UpdateOp)>,
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the record with `expression` instead of the document's identity.
    pub fn matching(mut self, expression: QueryExpression) -> Self {
        self.selector = Some(expression);
        self
    }

    /// Creates the record when nothing matches. Required fields are sent even when
    /// unchanged.
    pub fn upsert(mut self) -> Self {
        self.upsert = true;
        self
    }

    /// Sends the change of field `path` with `op` instead of its declared operator.
    pub fn op(mut self, path: impl Into<String>, op: UpdateOp) -> Self {
        self.ops.push((path.into(), op));
        self
    }
}

/// Moves the entry for `storage` under the operator `op`.
fn override_op(update: &mut bson::Document, storage: &str, op: UpdateOp) {
    let mut moved = None;

    for (_, entries) in update.iter_mut() {
        if let Bson::Document(entries) = entries {
            if let Some(value) = entries.remove(storage) {
                moved = Some(value);
                break;
            }
        }
    }

    let Some(value) = moved else {
        return;
    };

    *update = update
        .iter()
        .filter(|(_, entries)| !matches!(entries, Bson::Document(entries) if entries.is_empty()))
        .map(|(key, entries)| (key.clone(), entries.clone()))
        .collect();

    match update.get_mut(op.native_key()) {
        Some(Bson::Document(entries)) => {
            entries.insert(storage, value);
        }
        _ => {
            update.insert(op.native_key(), doc! { storage: value });
        }
    }
}

/// Documents produced by a query, unwrapped one at a time as they are consumed.
#[derive(Debug)]
pub struct QueryResults {
    schema: Arc<DocumentSchema>,
    retrieved: Option<Vec<String>>,
    records: std::vec::IntoIter<bson::Document>,
}

impl QueryResults {
    /// The raw records not consumed yet.
    pub fn into_raw(self) -> Vec<bson::Document> {
        self.records.collect()
    }
}

impl Iterator for QueryResults {
    type Item = MapperResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(Document::unwrap(&self.schema, &record, self.retrieved.as_deref()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

impl ExactSizeIterator for QueryResults {}

/// A unit of work over one backend.
///
/// # Example
///
/// ```ignore
/// use docmodel::{memory::InMemoryStore, prelude::*};
///
/// let session = Session::new(InMemoryStore::builder().build().await?);
///
/// let mut ada = Document::new(&person, [("name", "Ada")])?;
/// session.insert(&mut ada).await?;
///
/// let found = session.one(&Query::new(&person).filter_by("name", "Ada")?).await?;
/// ```
#[derive(Debug)]
pub struct Session<B> {
    backend: B,
    registry: Arc<Registry>,
    queue: Mutex<Vec<QueuedOp>>,
    ensured: Mutex<HashSet<String>>,
}

impl<B: StoreBackend> Session<B> {
    /// Creates a session resolving references through the global registry.
    pub fn new(backend: B) -> Self {
        Self::with_registry(backend, Registry::global())
    }

    pub fn with_registry(backend: B, registry: Arc<Registry>) -> Self {
        Self {
            backend,
            registry,
            queue: Mutex::new(Vec::new()),
            ensured: Mutex::new(HashSet::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    async fn ensure_indexes(&self, schema: &DocumentSchema) -> MapperResult<()> {
        let collection = schema.collection();

        if self.ensured.lock().contains(collection) {
            return Ok(());
        }

        for index in schema.indexes() {
            log::trace!("ensuring index {} on {collection}", index.name());
            self.backend.ensure_index(collection, index).await?;
        }

        self.ensured.lock().insert(collection.to_string());
        Ok(())
    }

    /// Runs every queued operation in order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing operation; the operations after it are dropped.
    pub async fn flush(&self) -> MapperResult<()> {
        let queued = std::mem::take(&mut *self.queue.lock());

        for op in queued {
            match op {
                QueuedOp::Update {
                    schema,
                    filter,
                    update,
                    upsert,
                } => {
                    let collection = schema.collection();
                    self.ensure_indexes(&schema).await?;

                    log::debug!("flushing update on {collection}: {filter} {update}");
                    self.backend
                        .update_documents(collection, &filter, &update, upsert, false)
                        .await?;
                }
                QueuedOp::Remove { schema, filter } => {
                    let collection = schema.collection();
                    self.ensure_indexes(&schema).await?;

                    log::debug!("flushing remove on {collection}: {filter}");
                    self.backend
                        .remove_documents(collection, &filter, false)
                        .await?;
                }
            }
        }

        Ok(())
    }

    /// Drops queued operations without running them.
    pub fn clear(&self) {
        let dropped = std::mem::take(&mut *self.queue.lock());

        if !dropped.is_empty() {
            log::warn!("dropping {} queued operations", dropped.len());
        }
    }

    /// Number of queued operations.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Flushes the queue and shuts the backend down.
    pub async fn end(self) -> MapperResult<()> {
        self.flush().await?;
        self.backend.shutdown().await
    }

    /// Stores a new document and assigns it the identity the backend returns.
    ///
    /// Defaults are materialized first, so generated values are stored and kept.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::MissingValue`] or [`MapperError::BadValue`] from wrapping,
    /// or a backend error.
    pub async fn insert(&self, document: &mut Document) -> MapperResult<()> {
        self.flush().await?;

        let schema = Arc::clone(document.schema());
        self.ensure_indexes(&schema).await?;

        document.materialize_defaults();
        let native = document.wrap()?;

        log::debug!("inserting into {}: {native}", schema.collection());
        let id = self.backend.save_document(schema.collection(), native).await?;

        document.assign_id(&id)?;
        document.mark_clean();
        Ok(())
    }

    fn identity_filter(document: &Document) -> MapperResult<bson::Document> {
        Ok(doc! { ID_KEY: document.to_ref()?.id })
    }

    fn pending_update(document: &Document, options: &UpdateOptions) -> MapperResult<Option<QueuedOp>> {
        let schema = document.schema();
        let filter = match &options.selector {
            Some(selector) => Query::new(schema)
                .filter(selector.clone())?
                .filter_document()
                .clone(),
            None => Self::identity_filter(document)?,
        };
        let mut update = document.dirty_ops(options.upsert)?;

        for (path, op) in &options.ops {
            let target = schema.query_field(path)?;
            let field = target.field();

            if !field.valid_modifiers().contains(*op) {
                return Err(MapperError::InvalidModifier {
                    field: target.path().to_string(),
                    kind: field.type_name().to_string(),
                    op: op.as_str().to_string(),
                });
            }

            override_op(&mut update, target.path(), *op);
        }

        if update.is_empty() {
            return Ok(None);
        }

        Ok(Some(QueuedOp::Update {
            schema: Arc::clone(schema),
            filter,
            update,
            upsert: options.upsert,
        }))
    }

    /// Sends the document's dirty ops, filtered by its identity.
    ///
    /// With `upsert`, required fields are included even when clean so the record can be
    /// created. A document without changes is not sent.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::FieldNotSet`] if the document has no identity.
    pub async fn update(&self, document: &mut Document, upsert: bool) -> MapperResult<UpdateAck> {
        let options = UpdateOptions {
            upsert,
            ..UpdateOptions::default()
        };

        self.update_with(document, &options).await
    }

    /// Sends the document's dirty ops, selected and shaped by `options`.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::FieldNotSet`] if no selector is given and the document has
    /// no identity, and [`MapperError::InvalidModifier`] for an operator override the
    /// field does not support.
    pub async fn update_with(&self, document: &mut Document, options: &UpdateOptions) -> MapperResult<UpdateAck> {
        self.flush().await?;
        self.ensure_indexes(document.schema()).await?;

        let Some(QueuedOp::Update {
            schema,
            filter,
            update,
            upsert,
        }) = Self::pending_update(document, options)?
        else {
            log::trace!("nothing to update for {:?}", document.id().ok());
            return Ok(UpdateAck::default());
        };

        log::debug!("updating {}: {filter} {update}", schema.collection());
        let ack = self
            .backend
            .update_documents(schema.collection(), &filter, &update, upsert, false)
            .await?;

        document.mark_clean();
        Ok(ack)
    }

    /// Removes the stored record of `document`. Returns `false` when the document has
    /// no identity.
    pub async fn remove(&self, document: &Document) -> MapperResult<bool> {
        self.flush().await?;

        if !document.has_id() {
            return Ok(false);
        }

        self.ensure_indexes(document.schema()).await?;

        let filter = Self::identity_filter(document)?;
        let collection = document.schema().collection();

        log::debug!("removing from {collection}: {filter}");
        let removed = self.backend.remove_documents(collection, &filter, false).await?;
        Ok(removed > 0)
    }

    /// Queues the document's dirty ops; they run on the next flush.
    pub fn enqueue_update(&self, document: &mut Document, upsert: bool) -> MapperResult<()> {
        let options = UpdateOptions {
            upsert,
            ..UpdateOptions::default()
        };

        if let Some(op) = Self::pending_update(document, &options)? {
            self.queue.lock().push(op);
        }

        document.mark_clean();
        Ok(())
    }

    /// Queues the removal of `document`. Documents without identity are ignored.
    pub fn enqueue_remove(&self, document: &Document) -> MapperResult<()> {
        if !document.has_id() {
            return Ok(());
        }

        let op = QueuedOp::Remove {
            schema: Arc::clone(document.schema()),
            filter: Self::identity_filter(document)?,
        };

        self.queue.lock().push(op);
        Ok(())
    }

    /// Runs `query` and returns its results, unwrapped lazily.
    pub async fn execute_query(&self, query: &Query) -> MapperResult<QueryResults> {
        self.flush().await?;

        let schema = query.schema();
        self.ensure_indexes(schema).await?;

        let spec = query.find_spec();
        log::debug!("querying {}: {}", schema.collection(), spec.filter);

        let records = self.backend.find_documents(schema.collection(), &spec).await?;

        Ok(QueryResults {
            schema: Arc::clone(schema),
            retrieved: query.retrieved_fields(),
            records: records.into_iter(),
        })
    }

    pub async fn all(&self, query: &Query) -> MapperResult<Vec<Document>> {
        self.execute_query(query).await?.collect()
    }

    /// The only matching document.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::BadResult`] when zero or several documents match.
    pub async fn one(&self, query: &Query) -> MapperResult<Document> {
        let mut results = self.execute_query(query).await?;

        match (results.next(), results.len()) {
            (Some(document), 0) => document,
            (None, _) => Err(MapperError::BadResult("Too few results for one()".into())),
            (Some(_), _) => Err(MapperError::BadResult("Too many results for one()".into())),
        }
    }

    pub async fn first(&self, query: &Query) -> MapperResult<Option<Document>> {
        self.execute_query(query).await?.next().transpose()
    }

    /// Counts matches, ignoring limit and skip.
    pub async fn count(&self, query: &Query) -> MapperResult<u64> {
        self.flush().await?;

        let schema = query.schema();
        self.ensure_indexes(schema).await?;

        self.backend
            .count_documents(schema.collection(), query.filter_document())
            .await
    }

    /// Runs an update expression.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::BadQuery`] if the expression holds no operations.
    pub async fn execute_update(&self, update: &UpdateExpression) -> MapperResult<UpdateAck> {
        let native = update.update_document()?;
        self.flush().await?;

        let query = update.query();
        let schema = query.schema();
        self.ensure_indexes(schema).await?;

        log::debug!(
            "updating {}: {} {native}",
            schema.collection(),
            query.filter_document()
        );

        self.backend
            .update_documents(
                schema.collection(),
                query.filter_document(),
                &native,
                update.is_upsert(),
                update.is_multi(),
            )
            .await
    }

    /// Updates or removes the first document the expression's query matches and
    /// returns it, unwrapped with the query's projection.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::BadQuery`] for an update with no operations.
    pub async fn execute_find_and_modify(
        &self,
        expression: &FindAndModifyExpression,
    ) -> MapperResult<Option<Document>> {
        let spec = expression.modify_spec()?;
        self.flush().await?;

        let query = expression.query();
        let schema = query.schema();
        self.ensure_indexes(schema).await?;

        log::debug!(
            "find and modify on {}: {} {:?}",
            schema.collection(),
            spec.filter,
            spec.action
        );
        let record = self
            .backend
            .find_and_modify(schema.collection(), &spec)
            .await?;

        let retrieved = query.retrieved_fields();
        record
            .map(|record| Document::unwrap(schema, &record, retrieved.as_deref()))
            .transpose()
    }

    /// The distinct values of field `path` among the documents `query` matches.
    /// Sequence fields contribute their items.
    pub async fn distinct(&self, query: &Query, path: &str) -> MapperResult<Vec<Value>> {
        let schema = query.schema();
        let target = schema.query_field(path)?;
        let field = match target.field().is_sequence() {
            true => target.field().item().unwrap_or(target.field()),
            false => target.field(),
        };

        self.flush().await?;
        self.ensure_indexes(schema).await?;

        self.backend
            .distinct(schema.collection(), target.path(), query.filter_document())
            .await?
            .iter()
            .map(|value| field.unwrap(value))
            .collect()
    }

    /// Removes every document `query` matches and returns how many were removed.
    pub async fn execute_remove(&self, query: &Query) -> MapperResult<u64> {
        self.flush().await?;

        let schema = query.schema();
        self.ensure_indexes(schema).await?;

        log::debug!("removing from {}: {}", schema.collection(), query.filter_document());
        self.backend
            .remove_documents(schema.collection(), query.filter_document(), true)
            .await
    }

    /// Removes every document of the schema's collection, indexes included.
    pub async fn clear_collection(&self, schema: &DocumentSchema) -> MapperResult<()> {
        self.flush().await?;

        log::debug!("dropping collection {}", schema.collection());
        self.backend.drop_collection(schema.collection()).await?;
        self.ensured.lock().remove(schema.collection());
        Ok(())
    }

    fn schema_for_collection(&self, collection: &str) -> MapperResult<Arc<DocumentSchema>> {
        self.registry
            .by_collection(DEFAULT_NAMESPACE, collection)
            .or_else(|| {
                self.registry
                    .schemas()
                    .into_iter()
                    .find(|schema| schema.collection() == collection)
            })
            .ok_or_else(|| {
                MapperError::BadResult(format!("no schema registered for collection {collection}"))
            })
    }

    async fn load(
        &self,
        schema: Option<Arc<DocumentSchema>>,
        reference: &DbRef,
    ) -> MapperResult<Option<Document>> {
        let schema = match schema {
            Some(schema) => schema,
            None => self.schema_for_collection(&reference.collection)?,
        };

        if let Some(database) = &reference.database {
            log::trace!("loading {} from database {database}", reference.collection);
        }

        self.flush().await?;
        self.ensure_indexes(&schema).await?;

        let spec = FindSpec {
            limit: Some(1),
            ..FindSpec::filter(doc! { ID_KEY: reference.id.clone() })
        };

        let record = self
            .backend
            .find_documents(&reference.collection, &spec)
            .await?
            .into_iter()
            .next();

        match record {
            Some(record) => Document::unwrap(&schema, &record, None).map(Some),
            None => {
                log::warn!(
                    "dangling reference to {} in {}",
                    reference.id,
                    reference.collection
                );
                Ok(None)
            }
        }
    }

    /// Loads the document a database reference points at. The schema is looked up by
    /// collection in the session's registry.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::BadResult`] if no schema is registered for the collection.
    pub async fn dereference(&self, reference: &DbRef) -> MapperResult<Option<Document>> {
        self.load(None, reference).await
    }

    fn reference_of(
        field: &Field,
        value: &Value,
    ) -> MapperResult<(Option<Arc<DocumentSchema>>, DbRef)> {
        if let Some(sref) = field.kind_as::<SRefField>() {
            let schema = Arc::clone(sref.target().schema()?);
            return Ok((Some(schema), sref.reference(value)?));
        }

        if let Some(field_ref) = field.kind_as::<RefField>() {
            let reference = value.as_dbref().cloned().ok_or_else(|| {
                MapperError::bad_value(field.name(), value, "Value is not a reference")
            })?;
            let schema = field_ref
                .target()
                .map(|target| target.schema().map(Arc::clone))
                .transpose()?;
            return Ok((schema, reference));
        }

        Err(MapperError::BadFieldSpecification(format!(
            "{} is not a reference field",
            field.name()
        )))
    }

    /// Loads the document referenced by field `name` of `document`.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::FieldNotSet`] if the field holds no reference, and
    /// [`MapperError::BadFieldSpecification`] if it is not a reference field.
    pub async fn resolve(&self, document: &Document, name: &str) -> MapperResult<Option<Document>> {
        let field = document
            .schema()
            .field(name)
            .ok_or_else(|| MapperError::FieldNotFound(name.to_string()))?;
        let value = document
            .peek(name)
            .ok_or_else(|| MapperError::FieldNotSet(name.to_string()))?;

        let (schema, reference) = Self::reference_of(field, value)?;
        self.load(schema, &reference).await
    }

    /// Loads every document referenced by the sequence field `name`. Dangling
    /// references are skipped.
    pub async fn resolve_all(&self, document: &Document, name: &str) -> MapperResult<Vec<Document>> {
        let field = document
            .schema()
            .field(name)
            .ok_or_else(|| MapperError::FieldNotFound(name.to_string()))?;
        let item = field.item().ok_or_else(|| {
            MapperError::BadFieldSpecification(format!("{name} is not a sequence field"))
        })?;
        let items = document
            .peek(name)
            .and_then(Value::as_items)
            .ok_or_else(|| MapperError::FieldNotSet(name.to_string()))?;

        let mut resolved = Vec::with_capacity(items.len());
        for value in items {
            let (schema, reference) = Self::reference_of(item, value)?;
            if let Some(target) = self.load(schema, &reference).await? {
                resolved.push(target);
            }
        }

        Ok(resolved)
    }
}

impl Document {
    /// Inserts this document through `session`.
    pub async fn save<B: StoreBackend>(&mut self, session: &Session<B>) -> MapperResult<()> {
        session.insert(self).await
    }
}
