//! ZQLZ Schema Cache - Read-through caching of schema metadata
//!
//! This crate provides:
//! - `ForeignKeyCache`, memoizing foreign key lookups per table
//! - `CachedForeignKeyProvider`, a provider decorator backed by the cache
//! - Dumping the cache to disk and loading it back for warm starts
//! - `ForeignKeyCacheSettings` for wiring the dump into startup code

pub mod foreign_keys;
mod settings;

pub use foreign_keys::{
    CachedForeignKeyProvider, FORMAT_VERSION, ForeignKeyCache, ForeignKeyCacheStats,
    SharedForeignKeyCache, new_shared_cache,
};
pub use settings::{ForeignKeyCacheSettings, PersistMode};

// Re-export core types that callers of the cache need
pub use zqlz_core::{
    ForeignKeyInfo, ForeignKeyOptions, ForeignKeyProvider, SchemaChangeObserver, TableRef,
};
