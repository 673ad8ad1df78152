//! Main docmodel crate providing a typed object-document mapper.
//!
//! This crate is the primary entry point for users of the docmodel framework.
//! It re-exports the core types and functionality from the sub-crates and provides
//! convenient access to the storage backends.
//!
//! # Features
//!
//! - **Declarative schemas** - Ordered, typed fields with validation and storage names
//! - **Dirty tracking** - Updates send only the operators for fields that changed
//! - **Partial loads** - Projected queries yield documents that know what was retrieved
//! - **Composable queries** - Predicates, sorting, paging and atomic update expressions
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> MapperResult<()> {
//!     let person = DocumentSchema::builder("Person")
//!         .field("name", StringField::new())
//!         .field("age", IntField::new().min(0))
//!         .index(Index::new().ascending("name").unique())
//!         .build()?;
//!
//!     let session = Session::new(InMemoryStore::builder().build().await?);
//!
//!     let mut ada = Document::new(&person, [("name", Value::from("Ada")), ("age", 36.into())])?;
//!     session.insert(&mut ada).await?;
//!
//!     // Change one field and send only that change
//!     ada.set("age", 37)?;
//!     session.update(&mut ada, false).await?;
//!
//!     // Atomic update of every matching document
//!     Query::new(&person)
//!         .filter(person.query_field("age")?.gte(30)?)?
//!         .update()
//!         .inc("age", 1)?
//!         .multi()
//!         .execute(&session)
//!         .await?;
//!
//!     let found = session.one(&Query::new(&person).filter_by("name", "Ada")?).await?;
//!     println!("{found:?}");
//!
//!     session.end().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use docmodel_core::{
    backend, document, error, field, index, query, registry, schema, session, update, value,
};

// Re-export BSON and chrono types for convenience
pub use bson;
pub use chrono;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmodel_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmodel_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
