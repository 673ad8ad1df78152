//! In-memory storage implementation for document stores.
//!
//! This module provides a simple in-memory backend that stores documents as BSON in
//! insertion-ordered maps guarded by async-safe read-write locks.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, oid::ObjectId};
use indexmap::IndexMap;
use mea::rwlock::RwLock;

use docmodel_core::{
    backend::{FindSpec, ModifyAction, ModifySpec, StoreBackend, StoreBackendBuilder, UpdateAck},
    error::{MapperError, MapperResult},
    index::Index,
};

use crate::{
    evaluator::{Comparable, DocumentEvaluator, compare_by, lookup},
    modifier::{apply_update, project, seed},
};

#[derive(Debug, Default)]
struct Collection {
    documents: IndexMap<String, bson::Document>,
    indexes: Vec<Index>,
}

type StoreMap = HashMap<String, Collection>;

fn id_key(id: &Bson) -> String {
    id.to_string()
}

fn with_object_id(document: bson::Document) -> bson::Document {
    let mut with_id = bson::doc! { "_id": ObjectId::new() };

    for (key, value) in document {
        with_id.insert(key, value);
    }

    with_id
}

fn index_key<'a>(index: &Index, document: &'a bson::Document) -> Vec<Comparable<'a>> {
    index
        .components()
        .iter()
        .map(|(path, _)| {
            lookup(document, path)
                .first()
                .map(|value| Comparable::from(*value))
                .unwrap_or(Comparable::Null)
        })
        .collect()
}

impl Collection {
    fn find_duplicate(&self, key: &str, document: &bson::Document) -> Option<String> {
        self.indexes
            .iter()
            .filter(|index| index.is_unique())
            .find_map(|index| {
                let wanted = index_key(index, document);

                self.documents
                    .iter()
                    .filter(|(other, _)| other.as_str() != key)
                    .any(|(_, stored)| index_key(index, stored) == wanted)
                    .then(|| index.name())
            })
    }

    fn store(&mut self, collection: &str, document: bson::Document) -> MapperResult<Bson> {
        let id = document
            .get("_id")
            .cloned()
            .ok_or_else(|| MapperError::Backend("document has no _id".into()))?;
        let key = id_key(&id);

        if let Some(index) = self.find_duplicate(&key, &document) {
            return Err(MapperError::Backend(format!(
                "duplicate key for unique index {index} on {collection}"
            )));
        }

        self.documents.insert(key, document);
        Ok(id)
    }

    /// Key of the first match in `sort` order, or in insertion order without a sort.
    fn first_key(
        &self,
        filter: &bson::Document,
        sort: Option<&bson::Document>,
    ) -> MapperResult<Option<String>> {
        let mut matched = Vec::new();

        for (key, document) in &self.documents {
            if DocumentEvaluator::new(document).matches(filter)? {
                matched.push((key, document));
            }
        }

        if let Some(sort) = sort {
            matched.sort_by(|(_, a), (_, b)| compare_by(sort, a, b));
        }

        Ok(matched.first().map(|(key, _)| (*key).clone()))
    }

    fn matching_keys(&self, filter: &bson::Document, multi: bool) -> MapperResult<Vec<String>> {
        let mut keys = Vec::new();

        for (key, document) in &self.documents {
            if DocumentEvaluator::new(document).matches(filter)? {
                keys.push(key.clone());

                if !multi {
                    break;
                }
            }
        }

        Ok(keys)
    }
}

/// Thread-safe in-memory document storage backend.
///
/// This struct implements the [`StoreBackend`] trait to provide a fully functional
/// document store that operates entirely in memory using async-aware read-write locks.
/// Filters, update operators, projections and unique indexes are evaluated locally;
/// geospatial operators are not supported.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Performance
///
/// Queries scan all documents in a collection. Indexes are only used to enforce
/// uniqueness.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel_core::backend::{FindSpec, StoreBackend};
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let id = store.save_document("users", doc! { "name": "Alice" }).await?;
///
/// let docs = store
///     .find_documents("users", &FindSpec::filter(doc! { "_id": id }))
///     .await?;
/// assert_eq!(docs.len(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> (identity -> document)
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use docmodel_memory::InMemoryStore;
    ///
    /// let store = InMemoryStore::builder().build().await.unwrap();
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Names of the collections currently holding documents or indexes.
    pub async fn collection_names(&self) -> Vec<String> {
        self.store.read().await.keys().cloned().collect()
    }

    /// Indexes ensured on `collection`.
    pub async fn indexes(&self, collection: &str) -> Vec<Index> {
        self.store
            .read()
            .await
            .get(collection)
            .map(|collection| collection.indexes.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn save_document(&self, collection: &str, document: bson::Document) -> MapperResult<Bson> {
        let document = if document.contains_key("_id") {
            document
        } else {
            with_object_id(document)
        };

        self.store
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .store(collection, document)
    }

    async fn ensure_index(&self, collection: &str, index: &Index) -> MapperResult<()> {
        let mut store = self.store.write().await;
        let target = store.entry(collection.to_string()).or_default();

        if target.indexes.contains(index) {
            return Ok(());
        }

        if index.is_unique() {
            let duplicates = {
                let mut seen: Vec<Vec<Comparable<'_>>> = Vec::new();
                let mut duplicates = Vec::new();

                for (key, document) in &target.documents {
                    let values = index_key(index, document);

                    if seen.contains(&values) {
                        duplicates.push(key.clone());
                    } else {
                        seen.push(values);
                    }
                }

                duplicates
            };

            if !duplicates.is_empty() {
                if !index.drops_dups() {
                    return Err(MapperError::Backend(format!(
                        "existing documents violate unique index {} on {collection}",
                        index.name()
                    )));
                }

                log::debug!(
                    "dropping {} duplicates for index {} on {collection}",
                    duplicates.len(),
                    index.name()
                );
                for key in duplicates {
                    target.documents.shift_remove(&key);
                }
            }
        }

        target.indexes.push(index.clone());
        Ok(())
    }

    async fn find_documents(
        &self,
        collection: &str,
        spec: &FindSpec,
    ) -> MapperResult<Vec<bson::Document>> {
        let store = self.store.read().await;
        let collection = match store.get(collection) {
            Some(collection) => collection,
            None => return Ok(vec![]),
        };

        let mut matched =
            DocumentEvaluator::filter_documents(collection.documents.values(), &spec.filter)?;

        if let Some(sort) = &spec.sort {
            matched.sort_by(|a, b| compare_by(sort, a, b));
        }

        let skip = spec.skip.map_or(0, |skip| skip as usize);
        let limit = match spec.limit {
            Some(limit) if limit != 0 => limit.unsigned_abs() as usize,
            _ => usize::MAX,
        };

        matched
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|document| match &spec.projection {
                Some(projection) => project(document, projection),
                None => Ok(document.clone()),
            })
            .collect()
    }

    async fn count_documents(&self, collection: &str, filter: &bson::Document) -> MapperResult<u64> {
        let store = self.store.read().await;

        match store.get(collection) {
            Some(collection) => Ok(collection.matching_keys(filter, true)?.len() as u64),
            None => Ok(0),
        }
    }

    async fn update_documents(
        &self,
        collection: &str,
        filter: &bson::Document,
        update: &bson::Document,
        upsert: bool,
        multi: bool,
    ) -> MapperResult<UpdateAck> {
        let mut store = self.store.write().await;
        let target = store.entry(collection.to_string()).or_default();
        let keys = target.matching_keys(filter, multi)?;

        if keys.is_empty() {
            if !upsert {
                return Ok(UpdateAck::default());
            }

            let mut document = seed(filter)?;
            apply_update(&mut document, update)?;

            if !document.contains_key("_id") {
                document = with_object_id(document);
            }

            let id = target.store(collection, document)?;
            log::trace!("upserted {id} into {collection}");

            return Ok(UpdateAck {
                upserted_id: Some(id),
                ..UpdateAck::default()
            });
        }

        let mut ack = UpdateAck {
            matched: keys.len() as u64,
            ..UpdateAck::default()
        };

        for key in keys {
            let Some(original) = target.documents.get(&key) else {
                continue;
            };

            let mut updated = original.clone();
            apply_update(&mut updated, update)?;

            if &updated == original {
                continue;
            }

            if let Some(index) = target.find_duplicate(&key, &updated) {
                return Err(MapperError::Backend(format!(
                    "duplicate key for unique index {index} on {collection}"
                )));
            }

            target.documents.insert(key, updated);
            ack.modified += 1;
        }

        Ok(ack)
    }

    async fn remove_documents(
        &self,
        collection: &str,
        filter: &bson::Document,
        multi: bool,
    ) -> MapperResult<u64> {
        let mut store = self.store.write().await;
        let Some(target) = store.get_mut(collection) else {
            return Ok(0);
        };

        let keys = target.matching_keys(filter, multi)?;
        for key in &keys {
            target.documents.shift_remove(key);
        }

        Ok(keys.len() as u64)
    }

    async fn find_and_modify(
        &self,
        collection: &str,
        spec: &ModifySpec,
    ) -> MapperResult<Option<bson::Document>> {
        let mut store = self.store.write().await;
        let target = store.entry(collection.to_string()).or_default();
        let shape = |document: &bson::Document| match &spec.projection {
            Some(projection) => project(document, projection),
            None => Ok(document.clone()),
        };

        let Some(key) = target.first_key(&spec.filter, spec.sort.as_ref())? else {
            let ModifyAction::Update(update) = &spec.action else {
                return Ok(None);
            };
            if !spec.upsert {
                return Ok(None);
            }

            let mut document = seed(&spec.filter)?;
            apply_update(&mut document, update)?;

            if !document.contains_key("_id") {
                document = with_object_id(document);
            }

            let id = target.store(collection, document.clone())?;
            log::trace!("upserted {id} into {collection}");

            return match spec.return_new {
                true => shape(&document).map(Some),
                false => Ok(None),
            };
        };

        match &spec.action {
            ModifyAction::Remove => target
                .documents
                .shift_remove(&key)
                .as_ref()
                .map(shape)
                .transpose(),
            ModifyAction::Update(update) => {
                let original = target
                    .documents
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| MapperError::Backend(format!("{key} vanished from {collection}")))?;

                let mut updated = original.clone();
                apply_update(&mut updated, update)?;

                if let Some(index) = target.find_duplicate(&key, &updated) {
                    return Err(MapperError::Backend(format!(
                        "duplicate key for unique index {index} on {collection}"
                    )));
                }

                target.documents.insert(key, updated.clone());

                match spec.return_new {
                    true => shape(&updated).map(Some),
                    false => shape(&original).map(Some),
                }
            }
        }
    }

    async fn distinct(
        &self,
        collection: &str,
        path: &str,
        filter: &bson::Document,
    ) -> MapperResult<Vec<Bson>> {
        let store = self.store.read().await;
        let Some(target) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut values: Vec<&Bson> = Vec::new();

        for document in DocumentEvaluator::filter_documents(target.documents.values(), filter)? {
            for value in lookup(document, path) {
                let items = match value {
                    Bson::Array(items) => items.iter().collect::<Vec<_>>(),
                    other => vec![other],
                };

                for item in items {
                    let candidate = Comparable::from(item);
                    if !values.iter().any(|seen| Comparable::from(*seen) == candidate) {
                        values.push(item);
                    }
                }
            }
        }

        Ok(values.into_iter().cloned().collect())
    }

    async fn drop_collection(&self, collection: &str) -> MapperResult<()> {
        self.store.write().await.remove(collection);
        Ok(())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel_core::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await.unwrap();
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance.
    async fn build(self) -> MapperResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[tokio::test]
    async fn test_save_assigns_object_id() {
        let store = InMemoryStore::new();
        let id = store.save_document("people", doc! { "name": "Ada" }).await.unwrap();

        assert!(matches!(id, Bson::ObjectId(_)));

        let found = store
            .find_documents("people", &FindSpec::filter(doc! { "_id": id.clone() }))
            .await
            .unwrap();
        assert_eq!(found, vec![doc! { "_id": id, "name": "Ada" }]);
    }

    #[tokio::test]
    async fn test_save_replaces_same_id() {
        let store = InMemoryStore::new();
        store.save_document("c", doc! { "_id": 1, "v": 1 }).await.unwrap();
        store.save_document("c", doc! { "_id": 1, "v": 2 }).await.unwrap();

        assert_eq!(store.count_documents("c", &doc! {}).await.unwrap(), 1);
        assert_eq!(store.count_documents("c", &doc! { "v": 2 }).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_sorts_pages_and_projects() {
        let store = InMemoryStore::new();
        for (id, age) in [(1, 30), (2, 10), (3, 20), (4, 40)] {
            store
                .save_document("c", doc! { "_id": id, "age": age, "name": format!("p{id}") })
                .await
                .unwrap();
        }

        let spec = FindSpec {
            filter: doc! { "age": { "$gte": 20 } },
            sort: Some(doc! { "age": -1 }),
            projection: Some(doc! { "age": 1 }),
            skip: Some(1),
            limit: Some(2),
            ..FindSpec::default()
        };

        let found = store.find_documents("c", &spec).await.unwrap();
        assert_eq!(found, vec![doc! { "_id": 1, "age": 30 }, doc! { "_id": 3, "age": 20 }]);
    }

    #[tokio::test]
    async fn test_update_single_multi_and_upsert() {
        let store = InMemoryStore::new();
        for id in 1..=3 {
            store.save_document("c", doc! { "_id": id, "n": 0 }).await.unwrap();
        }

        let single = store
            .update_documents("c", &doc! {}, &doc! { "$inc": { "n": 1 } }, false, false)
            .await
            .unwrap();
        assert_eq!((single.matched, single.modified), (1, 1));

        let multi = store
            .update_documents("c", &doc! {}, &doc! { "$inc": { "n": 1 } }, false, true)
            .await
            .unwrap();
        assert_eq!((multi.matched, multi.modified), (3, 3));
        assert_eq!(store.count_documents("c", &doc! { "n": 2 }).await.unwrap(), 1);

        let upserted = store
            .update_documents("c", &doc! { "_id": 9 }, &doc! { "$set": { "n": 5 } }, true, false)
            .await
            .unwrap();
        assert_eq!(upserted.upserted_id, Some(Bson::Int32(9)));
        assert_eq!(store.count_documents("c", &doc! { "n": 5 }).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unique_index() {
        let store = InMemoryStore::new();
        let index = Index::new().ascending("email").unique();

        store.ensure_index("users", &index).await.unwrap();
        store.ensure_index("users", &index).await.unwrap();
        assert_eq!(store.indexes("users").await.len(), 1);

        store.save_document("users", doc! { "email": "a@x" }).await.unwrap();
        let duplicate = store.save_document("users", doc! { "email": "a@x" }).await;

        assert!(matches!(duplicate, Err(MapperError::Backend(_))));
    }

    #[tokio::test]
    async fn test_large_integers_stay_distinct() {
        let store = InMemoryStore::new();
        store
            .ensure_index("c", &Index::new().ascending("n").unique())
            .await
            .unwrap();

        store.save_document("c", doc! { "n": 9_007_199_254_740_993_i64 }).await.unwrap();
        store.save_document("c", doc! { "n": 9_007_199_254_740_992_i64 }).await.unwrap();

        let filter = doc! { "n": 9_007_199_254_740_992_i64 };
        assert_eq!(store.count_documents("c", &filter).await.unwrap(), 1);
        assert_eq!(store.count_documents("c", &doc! {}).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_drop_dups_on_ensure() {
        let store = InMemoryStore::new();
        store.save_document("users", doc! { "_id": 1, "email": "a" }).await.unwrap();
        store.save_document("users", doc! { "_id": 2, "email": "a" }).await.unwrap();

        let strict = Index::new().ascending("email").unique();
        assert!(store.ensure_index("users", &strict).await.is_err());

        let lenient = Index::new().ascending("email").unique_drop_dups();
        store.ensure_index("users", &lenient).await.unwrap();
        assert_eq!(store.count_documents("users", &doc! {}).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_and_modify() {
        let store = InMemoryStore::new();
        for (id, n) in [(1, 5), (2, 1), (3, 3)] {
            store.save_document("c", doc! { "_id": id, "n": n }).await.unwrap();
        }

        let spec = ModifySpec {
            filter: doc! { "n": { "$gte": 2 } },
            sort: Some(doc! { "n": 1 }),
            projection: None,
            action: ModifyAction::Update(doc! { "$inc": { "n": 10 } }),
            upsert: false,
            return_new: false,
        };

        let before = store.find_and_modify("c", &spec).await.unwrap();
        assert_eq!(before, Some(doc! { "_id": 3, "n": 3 }));

        let after = store
            .find_and_modify("c", &ModifySpec { return_new: true, ..spec.clone() })
            .await
            .unwrap();
        assert_eq!(after, Some(doc! { "_id": 1, "n": 15 }));

        let removed = store
            .find_and_modify(
                "c",
                &ModifySpec {
                    filter: doc! { "_id": 2 },
                    action: ModifyAction::Remove,
                    ..spec.clone()
                },
            )
            .await
            .unwrap();
        assert_eq!(removed, Some(doc! { "_id": 2, "n": 1 }));
        assert_eq!(store.count_documents("c", &doc! {}).await.unwrap(), 2);

        let upserted = store
            .find_and_modify(
                "c",
                &ModifySpec {
                    filter: doc! { "_id": 9 },
                    upsert: true,
                    return_new: true,
                    ..spec
                },
            )
            .await
            .unwrap();
        assert_eq!(upserted, Some(doc! { "_id": 9, "n": 10 }));
    }

    #[tokio::test]
    async fn test_distinct_flattens_arrays() {
        let store = InMemoryStore::new();
        store.save_document("c", doc! { "tags": ["a", "b"], "n": 1 }).await.unwrap();
        store.save_document("c", doc! { "tags": ["b", "c"], "n": 1_i64 }).await.unwrap();
        store.save_document("c", doc! { "tags": ["d"], "n": 2 }).await.unwrap();

        let tags = store.distinct("c", "tags", &doc! { "n": 1 }).await.unwrap();
        assert_eq!(tags, vec![Bson::from("a"), Bson::from("b"), Bson::from("c")]);

        let numbers = store.distinct("c", "n", &doc! {}).await.unwrap();
        assert_eq!(numbers, vec![Bson::Int32(1), Bson::Int32(2)]);
        assert!(store.distinct("missing", "n", &doc! {}).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_and_drop() {
        let store = InMemoryStore::new();
        for id in 1..=3 {
            store.save_document("c", doc! { "_id": id, "odd": id % 2 == 1 }).await.unwrap();
        }

        assert_eq!(store.remove_documents("c", &doc! { "odd": true }, false).await.unwrap(), 1);
        assert_eq!(store.remove_documents("c", &doc! {}, true).await.unwrap(), 2);
        assert_eq!(store.remove_documents("missing", &doc! {}, true).await.unwrap(), 0);

        store.drop_collection("c").await.unwrap();
        store.drop_collection("c").await.unwrap();
        assert!(store.collection_names().await.is_empty());
    }
}
