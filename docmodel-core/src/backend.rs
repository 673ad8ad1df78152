//! Storage backend abstraction.
//!
//! The [`StoreBackend`] trait is the boundary between the mapper and a concrete document
//! store. It speaks native BSON only: the session wraps documents and builds predicate
//! and operator trees before calling it, and unwraps what it returns.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docmodel_core::backend::{FindSpec, StoreBackend};
//! use bson::doc;
//!
//! let id = backend.save_document("users", doc! { "name": "Alice" }).await?;
//! let found = backend
//!     .find_documents("users", &FindSpec::filter(doc! { "_id": id }))
//!     .await?;
//! ```

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use bson::Bson;

use crate::{error::MapperResult, index::Index};

/// Everything needed to run a find: predicate, projection, sort, paging and index hint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindSpec {
    pub filter: bson::Document,
    pub projection: Option<bson::Document>,
    pub sort: Option<bson::Document>,
    pub limit: Option<i64>,
    pub skip: Option<u64>,
    pub hint: Option<bson::Document>,
}

impl FindSpec {
    /// A spec with only a predicate.
    pub fn filter(filter: bson::Document) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }
}

/// What a find-and-modify does to the document it finds.
#[derive(Debug, Clone, PartialEq)]
pub enum ModifyAction {
    /// Apply an operator map.
    Update(bson::Document),
    /// Remove the document.
    Remove,
}

/// A single-document find-and-modify: the first match in `sort` order is updated or
/// removed atomically and returned.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifySpec {
    pub filter: bson::Document,
    pub sort: Option<bson::Document>,
    pub projection: Option<bson::Document>,
    pub action: ModifyAction,
    /// Create the document when nothing matches. Ignored for removals.
    pub upsert: bool,
    /// Return the document as it is after the update instead of before.
    pub return_new: bool,
}

/// Acknowledgement of an update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateAck {
    /// Documents matched by the predicate.
    pub matched: u64,
    /// Documents actually changed.
    pub modified: u64,
    /// Identity of a document created by an upsert.
    pub upserted_id: Option<Bson>,
}

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. The exact concurrency model is implementation-specific but should be
/// documented by the implementer.
///
/// # Error Handling
///
/// Store failures are reported as [`MapperError::Backend`](crate::error::MapperError::Backend);
/// BSON conversion failures as [`MapperError::Serialization`](crate::error::MapperError::Serialization).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Stores one document, replacing any document with the same `_id`.
    ///
    /// # Arguments
    ///
    /// * `collection` - The target collection. Created automatically if it doesn't exist.
    /// * `document` - The wrapped document. When it has no `_id`, the backend assigns one.
    ///
    /// # Returns
    ///
    /// The identity of the stored document.
    async fn save_document(&self, collection: &str, document: bson::Document) -> MapperResult<Bson>;

    /// Idempotently creates `index` on `collection`.
    ///
    /// # Note
    ///
    /// If the index is unique and existing documents violate it, the backend may
    /// return an error.
    async fn ensure_index(&self, collection: &str, index: &Index) -> MapperResult<()>;

    /// Returns the documents matching `spec`, in sort order when one is given.
    async fn find_documents(
        &self,
        collection: &str,
        spec: &FindSpec,
    ) -> MapperResult<Vec<bson::Document>>;

    /// Counts the documents matching `filter`.
    async fn count_documents(&self, collection: &str, filter: &bson::Document) -> MapperResult<u64>;

    /// Applies the operator map `update` to the first (or, with `multi`, every)
    /// document matching `filter`.
    ///
    /// # Arguments
    ///
    /// * `upsert` - Create a document from the predicate and the update when nothing
    ///   matches.
    /// * `multi` - Update every match instead of the first.
    async fn update_documents(
        &self,
        collection: &str,
        filter: &bson::Document,
        update: &bson::Document,
        upsert: bool,
        multi: bool,
    ) -> MapperResult<UpdateAck>;

    /// Removes the first (or, with `multi`, every) document matching `filter` and
    /// returns how many were removed.
    async fn remove_documents(
        &self,
        collection: &str,
        filter: &bson::Document,
        multi: bool,
    ) -> MapperResult<u64>;

    /// Updates or removes the first document matching `spec` and returns it, before or
    /// after the change depending on `spec.return_new`. `None` when nothing matched and
    /// nothing was upserted, or when a new upserted document was not asked for.
    async fn find_and_modify(
        &self,
        collection: &str,
        spec: &ModifySpec,
    ) -> MapperResult<Option<bson::Document>>;

    /// The distinct values at `path` among documents matching `filter`. Arrays
    /// contribute their elements.
    async fn distinct(
        &self,
        collection: &str,
        path: &str,
        filter: &bson::Document,
    ) -> MapperResult<Vec<Bson>>;

    /// Drops a collection and all its documents. Dropping a missing collection is not an
    /// error.
    async fn drop_collection(&self, collection: &str) -> MapperResult<()>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op, but backends with external connections
    /// should override this.
    async fn shutdown(self) -> MapperResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn save_document(&self, collection: &str, document: bson::Document) -> MapperResult<Bson> {
        (*self).save_document(collection, document).await
    }

    async fn ensure_index(&self, collection: &str, index: &Index) -> MapperResult<()> {
        (*self).ensure_index(collection, index).await
    }

    async fn find_documents(
        &self,
        collection: &str,
        spec: &FindSpec,
    ) -> MapperResult<Vec<bson::Document>> {
        (*self).find_documents(collection, spec).await
    }

    async fn count_documents(&self, collection: &str, filter: &bson::Document) -> MapperResult<u64> {
        (*self).count_documents(collection, filter).await
    }

    async fn update_documents(
        &self,
        collection: &str,
        filter: &bson::Document,
        update: &bson::Document,
        upsert: bool,
        multi: bool,
    ) -> MapperResult<UpdateAck> {
        (*self)
            .update_documents(collection, filter, update, upsert, multi)
            .await
    }

    async fn remove_documents(
        &self,
        collection: &str,
        filter: &bson::Document,
        multi: bool,
    ) -> MapperResult<u64> {
        (*self).remove_documents(collection, filter, multi).await
    }

    async fn find_and_modify(
        &self,
        collection: &str,
        spec: &ModifySpec,
    ) -> MapperResult<Option<bson::Document>> {
        (*self).find_and_modify(collection, spec).await
    }

    async fn distinct(
        &self,
        collection: &str,
        path: &str,
        filter: &bson::Document,
    ) -> MapperResult<Vec<Bson>> {
        (*self).distinct(collection, path, filter).await
    }

    async fn drop_collection(&self, collection: &str) -> MapperResult<()> {
        (*self).drop_collection(collection).await
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend,
{
    async fn save_document(&self, collection: &str, document: bson::Document) -> MapperResult<Bson> {
        (**self).save_document(collection, document).await
    }

    async fn ensure_index(&self, collection: &str, index: &Index) -> MapperResult<()> {
        (**self).ensure_index(collection, index).await
    }

    async fn find_documents(
        &self,
        collection: &str,
        spec: &FindSpec,
    ) -> MapperResult<Vec<bson::Document>> {
        (**self).find_documents(collection, spec).await
    }

    async fn count_documents(&self, collection: &str, filter: &bson::Document) -> MapperResult<u64> {
        (**self).count_documents(collection, filter).await
    }

    async fn update_documents(
        &self,
        collection: &str,
        filter: &bson::Document,
        update: &bson::Document,
        upsert: bool,
        multi: bool,
    ) -> MapperResult<UpdateAck> {
        (**self)
            .update_documents(collection, filter, update, upsert, multi)
            .await
    }

    async fn remove_documents(
        &self,
        collection: &str,
        filter: &bson::Document,
        multi: bool,
    ) -> MapperResult<u64> {
        (**self).remove_documents(collection, filter, multi).await
    }

    async fn find_and_modify(
        &self,
        collection: &str,
        spec: &ModifySpec,
    ) -> MapperResult<Option<bson::Document>> {
        (**self).find_and_modify(collection, spec).await
    }

    async fn distinct(
        &self,
        collection: &str,
        path: &str,
        filter: &bson::Document,
    ) -> MapperResult<Vec<Bson>> {
        (**self).distinct(collection, path, filter).await
    }

    async fn drop_collection(&self, collection: &str) -> MapperResult<()> {
        (**self).drop_collection(collection).await
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> MapperResult<Self::Backend>;
}
