//! SQLite foreign key provider
//!
//! Reads foreign keys with `pragma_foreign_key_list` and exposes them through
//! `zqlz_core::ForeignKeyProvider`, so the connection can sit behind a
//! `zqlz_schema_cache::CachedForeignKeyProvider`.

mod connection;

pub use connection::{DEFAULT_SCHEMA, SqliteConnection};
