//! In-memory document storage backend for docmodel.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is ideal for development
//! and testing.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Native filters** - Evaluates the same filter documents a server would receive
//! - **Update operators** - `$set`, `$unset`, `$inc`, `$push`, `$pull`, `$pullAll`, `$addToSet`, `$pop`
//! - **Unique indexes** - Enforced on save and update
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{memory::InMemoryStore, prelude::*};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let person = DocumentSchema::builder("Person")
//!         .field("name", StringField::new())
//!         .build()?;
//!
//!     let session = Session::new(InMemoryStore::builder().build().await?);
//!
//!     let mut ada = Document::new(&person, [("name", "Ada")])?;
//!     session.insert(&mut ada).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_memory;

pub mod evaluator;
mod modifier;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
