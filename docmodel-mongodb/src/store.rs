use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    options::{
        ClientOptions, FindOneAndDeleteOptions, FindOneAndUpdateOptions, FindOptions, Hint,
        IndexOptions, ReturnDocument,
    },
};
use docmodel_core::{
    backend::{FindSpec, ModifyAction, ModifySpec, StoreBackend, StoreBackendBuilder, UpdateAck},
    error::{MapperError, MapperResult},
    index::Index,
};

fn backend_error(e: mongodb::error::Error) -> MapperError {
    MapperError::Backend(e.to_string())
}

/// Translates an index declaration into the driver's index model.
pub(crate) fn index_model(index: &Index) -> IndexModel {
    if index.drops_dups() {
        log::warn!(
            "index {} asks to drop duplicates, which the server no longer supports",
            index.name()
        );
    }

    IndexModel::builder()
        .keys(index.keys())
        .options(
            IndexOptions::builder()
                .name(index.name())
                .unique(index.is_unique().then_some(true))
                .expire_after(index.expire_after())
                .min(index.min())
                .max(index.max())
                .bucket_size(index.bucket_size())
                .build(),
        )
        .build()
}

fn find_options(spec: &FindSpec) -> FindOptions {
    let mut options = FindOptions::default();

    options.projection = spec.projection.clone();
    options.sort = spec.sort.clone();
    options.limit = spec.limit;
    options.skip = spec.skip;
    options.hint = spec.hint.clone().map(Hint::Keys);

    options
}

fn update_options(spec: &ModifySpec) -> FindOneAndUpdateOptions {
    let mut options = FindOneAndUpdateOptions::default();

    options.sort = spec.sort.clone();
    options.projection = spec.projection.clone();
    options.upsert = Some(spec.upsert);
    options.return_document = Some(match spec.return_new {
        true => ReturnDocument::After,
        false => ReturnDocument::Before,
    });

    options
}

fn delete_options(spec: &ModifySpec) -> FindOneAndDeleteOptions {
    let mut options = FindOneAndDeleteOptions::default();

    options.sort = spec.sort.clone();
    options.projection = spec.projection.clone();

    options
}

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn save_document(&self, collection: &str, document: Document) -> MapperResult<Bson> {
        let target = self.get_collection(collection);

        match document.get("_id").cloned() {
            Some(id) => {
                target
                    .replace_one(doc! { "_id": id.clone() }, document)
                    .upsert(true)
                    .await
                    .map_err(backend_error)?;

                Ok(id)
            }
            None => Ok(target
                .insert_one(document)
                .await
                .map_err(backend_error)?
                .inserted_id),
        }
    }

    async fn ensure_index(&self, collection: &str, index: &Index) -> MapperResult<()> {
        log::trace!("creating index {} on {collection}", index.name());

        self.get_collection(collection)
            .create_index(index_model(index))
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn find_documents(&self, collection: &str, spec: &FindSpec) -> MapperResult<Vec<Document>> {
        self.get_collection(collection)
            .find(spec.filter.clone())
            .with_options(find_options(spec))
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)
    }

    async fn count_documents(&self, collection: &str, filter: &Document) -> MapperResult<u64> {
        self.get_collection(collection)
            .count_documents(filter.clone())
            .await
            .map_err(backend_error)
    }

    async fn update_documents(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
        upsert: bool,
        multi: bool,
    ) -> MapperResult<UpdateAck> {
        let target = self.get_collection(collection);

        let result = if multi {
            target
                .update_many(filter.clone(), update.clone())
                .upsert(upsert)
                .await
        } else {
            target
                .update_one(filter.clone(), update.clone())
                .upsert(upsert)
                .await
        }
        .map_err(backend_error)?;

        Ok(UpdateAck {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn remove_documents(&self, collection: &str, filter: &Document, multi: bool) -> MapperResult<u64> {
        let target = self.get_collection(collection);

        let result = if multi {
            target.delete_many(filter.clone()).await
        } else {
            target.delete_one(filter.clone()).await
        }
        .map_err(backend_error)?;

        Ok(result.deleted_count)
    }

    async fn find_and_modify(&self, collection: &str, spec: &ModifySpec) -> MapperResult<Option<Document>> {
        let target = self.get_collection(collection);

        match &spec.action {
            ModifyAction::Update(update) => target
                .find_one_and_update(spec.filter.clone(), update.clone())
                .with_options(update_options(spec))
                .await
                .map_err(backend_error),
            ModifyAction::Remove => target
                .find_one_and_delete(spec.filter.clone())
                .with_options(delete_options(spec))
                .await
                .map_err(backend_error),
        }
    }

    async fn distinct(&self, collection: &str, path: &str, filter: &Document) -> MapperResult<Vec<Bson>> {
        self.get_collection(collection)
            .distinct(path, filter.clone())
            .await
            .map_err(backend_error)
    }

    async fn drop_collection(&self, collection: &str) -> MapperResult<()> {
        self.get_collection(collection)
            .drop()
            .await
            .map_err(backend_error)
    }

    async fn shutdown(self) -> MapperResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> MapperResult<Self::Backend> {
        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| MapperError::Initialization(e.to_string()))?,
            )
            .map_err(|e| MapperError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_index_model_carries_options() {
        let index = Index::new()
            .ascending("email")
            .descending("age")
            .unique()
            .expire(60);

        let model = index_model(&index);
        let options = model.options.unwrap();

        assert_eq!(model.keys, doc! { "email": 1, "age": -1 });
        assert_eq!(options.name.as_deref(), Some("email_1_age_-1"));
        assert_eq!(options.unique, Some(true));
        assert_eq!(options.expire_after, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_find_options_from_spec() {
        let spec = FindSpec {
            sort: Some(doc! { "age": -1 }),
            limit: Some(5),
            skip: Some(10),
            ..FindSpec::filter(doc! { "name": "Ada" })
        };

        let options = find_options(&spec);

        assert_eq!(options.sort, Some(doc! { "age": -1 }));
        assert_eq!(options.limit, Some(5));
        assert_eq!(options.skip, Some(10));
        assert!(options.projection.is_none());
    }

    #[test]
    fn test_modify_options_from_spec() {
        let spec = ModifySpec {
            filter: doc! { "name": "Ada" },
            sort: Some(doc! { "age": 1 }),
            projection: Some(doc! { "age": 1 }),
            action: ModifyAction::Update(doc! { "$inc": { "age": 1 } }),
            upsert: true,
            return_new: true,
        };

        let options = update_options(&spec);
        assert_eq!(options.sort, Some(doc! { "age": 1 }));
        assert_eq!(options.projection, Some(doc! { "age": 1 }));
        assert_eq!(options.upsert, Some(true));
        assert!(matches!(options.return_document, Some(ReturnDocument::After)));

        let options = update_options(&ModifySpec { return_new: false, ..spec.clone() });
        assert!(matches!(options.return_document, Some(ReturnDocument::Before)));

        let options = delete_options(&ModifySpec { action: ModifyAction::Remove, ..spec });
        assert_eq!(options.sort, Some(doc! { "age": 1 }));
        assert_eq!(options.projection, Some(doc! { "age": 1 }));
    }

    #[test]
    fn test_haystack_bucket_size_passes_through() {
        let model = index_model(&Index::new().geo_haystack("loc", 4).ascending("kind"));

        assert_eq!(model.options.unwrap().bucket_size, Some(4));
    }
}
