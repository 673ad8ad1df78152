//! A typed object-document mapper for BSON document stores.
//!
//! This crate is the core of the docmodel project and provides:
//!
//! - **Fields** ([`field`]) - Declarative field types that validate, wrap and unwrap values
//! - **Schemas** ([`schema`]) - Ordered field sets bound to a collection, with indexes
//! - **Registry** ([`registry`]) - Namespaced lookup of schemas by name and collection
//! - **Documents** ([`document`]) - Dynamic instances with dirty tracking and partial loads
//! - **Queries** ([`query`]) - Predicate, projection, sort and paging construction
//! - **Updates** ([`update`]) - Atomic update expressions with modifier checks
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Sessions** ([`session`]) - Unit of work tying documents to a backend
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use docmodel_core::{
//!     field::{IntField, StringField},
//!     schema::DocumentSchema,
//!     document::Document,
//! };
//!
//! let person = DocumentSchema::builder("Person")
//!     .field("name", StringField::new().max_length(64))
//!     .field("age", IntField::new().min(0))
//!     .build()?;
//!
//! let ada = Document::new(&person, [("name", "Ada".into()), ("age", 36.into())])?;
//! let native = ada.wrap()?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_core;

pub mod backend;
pub mod document;
pub mod error;
pub mod field;
pub mod index;
pub mod query;
pub mod registry;
pub mod schema;
pub mod session;
pub mod update;
pub mod value;
