//! Read-through cache for foreign key metadata
//!
//! Lookups with default options are memoized per canonical table name. The
//! first lookup of a table goes to the provider; later lookups are served from
//! memory until the entry is invalidated or the store is replaced by loading a
//! dump.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use zqlz_core::{
    ForeignKeyInfo, ForeignKeyOptions, ForeignKeyProvider, Result, SchemaChangeObserver, TableRef,
};

/// Cached foreign keys for one process
///
/// All access to the store goes through one mutex owned by the instance.
/// The lock covers map reads and writes only and is never held while the
/// provider runs. Concurrent misses on the same table may each reach the
/// provider; the last result written wins. A miss still waiting on the
/// provider when the table is invalidated stores its result afterwards, so
/// that entry can predate the change that triggered the invalidation.
#[derive(Debug, Default)]
pub struct ForeignKeyCache {
    pub(super) entries: Mutex<HashMap<String, Vec<ForeignKeyInfo>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    bypasses: AtomicU64,
    provider_errors: AtomicU64,
}

impl ForeignKeyCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the foreign keys of `table`, asking `provider` on a miss.
    ///
    /// Non-default `options` skip the cache entirely: the provider is called
    /// and its result is returned without being stored. Provider errors are
    /// returned as-is and nothing is cached for the table.
    pub async fn lookup<P>(
        &self,
        provider: &P,
        table: &TableRef,
        options: &ForeignKeyOptions,
    ) -> Result<Vec<ForeignKeyInfo>>
    where
        P: ForeignKeyProvider + ?Sized,
    {
        if !options.is_default() {
            self.bypasses.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(table = %table, "non-default options, bypassing foreign key cache");
            return provider.get_foreign_keys(table, options).await;
        }

        let key = provider.quote_identifier(table);
        if let Some(foreign_keys) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(table = %key, "cache hit for foreign keys");
            return Ok(foreign_keys);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(table = %key, "cache miss for foreign keys");

        let foreign_keys = match provider.get_foreign_keys(table, options).await {
            Ok(foreign_keys) => foreign_keys,
            Err(e) => {
                self.provider_errors.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(table = %key, error = %e, "foreign key fetch failed, not caching");
                return Err(e);
            }
        };

        tracing::debug!(
            table = %key,
            foreign_key_count = foreign_keys.len(),
            "caching foreign keys"
        );
        self.entries.lock().insert(key, foreign_keys.clone());
        Ok(foreign_keys)
    }

    /// Get the cached foreign keys stored under a canonical key
    pub fn get(&self, key: &str) -> Option<Vec<ForeignKeyInfo>> {
        self.entries.lock().get(key).cloned()
    }

    /// Whether an entry exists for a canonical key
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Drop the entry for `table`, canonicalized the way `provider` would.
    /// Returns whether an entry was removed.
    pub fn invalidate<P>(&self, provider: &P, table: &TableRef) -> bool
    where
        P: ForeignKeyProvider + ?Sized,
    {
        self.invalidate_key(&provider.quote_identifier(table))
    }

    /// Drop the entry stored under a canonical key. Returns whether an entry
    /// was removed.
    pub fn invalidate_key(&self, key: &str) -> bool {
        let removed = self.entries.lock().remove(key).is_some();
        if removed {
            tracing::info!(table = %key, "invalidated cached foreign keys");
        } else {
            tracing::trace!(table = %key, "no cached foreign keys to invalidate");
        }
        removed
    }

    /// Number of cached tables
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Cached canonical keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Copy of every entry, sorted by key
    pub fn entries(&self) -> Vec<(String, Vec<ForeignKeyInfo>)> {
        let mut entries: Vec<_> = self
            .entries
            .lock()
            .iter()
            .map(|(key, foreign_keys)| (key.clone(), foreign_keys.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Get cache statistics for monitoring
    pub fn stats(&self) -> ForeignKeyCacheStats {
        ForeignKeyCacheStats {
            entry_count: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            bypasses: self.bypasses.load(Ordering::Relaxed),
            provider_errors: self.provider_errors.load(Ordering::Relaxed),
        }
    }
}

impl SchemaChangeObserver for ForeignKeyCache {
    fn before_table_change(&self, _table: &TableRef, quoted_name: &str) {
        self.invalidate_key(quoted_name);
    }
}

/// Counters describing how the cache has been used
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForeignKeyCacheStats {
    /// Number of cached tables
    pub entry_count: usize,
    /// Lookups answered from memory
    pub hits: u64,
    /// Lookups that went to the provider and were cached on success
    pub misses: u64,
    /// Lookups with non-default options, never cached
    pub bypasses: u64,
    /// Misses whose provider call failed
    pub provider_errors: u64,
}

impl ForeignKeyCacheStats {
    /// Total number of lookups
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses + self.bypasses
    }

    /// Fraction of cacheable lookups served from memory
    pub fn hit_ratio(&self) -> f64 {
        let cacheable = self.hits + self.misses;
        if cacheable == 0 {
            0.0
        } else {
            self.hits as f64 / cacheable as f64
        }
    }
}

/// Thread-safe wrapper for sharing ForeignKeyCache
pub type SharedForeignKeyCache = Arc<ForeignKeyCache>;

/// Create a new shared foreign key cache
pub fn new_shared_cache() -> SharedForeignKeyCache {
    Arc::new(ForeignKeyCache::new())
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
