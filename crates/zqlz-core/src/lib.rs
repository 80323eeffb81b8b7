//! ZQLZ Core - Core abstractions shared by the foreign key cache crates
//!
//! This crate defines:
//!
//! - `ForeignKeyProvider` - Trait for anything that can introspect foreign keys
//! - `SchemaChangeObserver` - Hook invoked before a table's schema is mutated
//! - `TableRef`, `ForeignKeyInfo`, `ForeignKeyOptions` - the shared metadata types
//! - `ZqlzError` / `Result` - the common error type

mod error;
mod schema;

pub use error::*;
pub use schema::*;
