//! Foreign key metadata cache
//!
//! Memoizes `ForeignKeyProvider::get_foreign_keys` per table and persists the
//! result so later process starts can skip catalog queries.

mod cache;
mod dump;
mod provider;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::{ForeignKeyCache, ForeignKeyCacheStats, SharedForeignKeyCache, new_shared_cache};
pub use dump::FORMAT_VERSION;
pub use provider::CachedForeignKeyProvider;
