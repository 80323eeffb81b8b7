//! Caching decorator for foreign key providers

use async_trait::async_trait;
use std::sync::Arc;
use zqlz_core::{ForeignKeyInfo, ForeignKeyOptions, ForeignKeyProvider, Result, TableRef};

use super::cache::{ForeignKeyCache, SharedForeignKeyCache};

/// Wraps a provider so default-option lookups are served from a
/// [`ForeignKeyCache`].
///
/// The wrapper is itself a `ForeignKeyProvider`, so it can be handed to any
/// code that expects the bare provider.
pub struct CachedForeignKeyProvider<P> {
    inner: P,
    cache: SharedForeignKeyCache,
}

impl<P: ForeignKeyProvider> CachedForeignKeyProvider<P> {
    /// Wrap a provider with a fresh, empty cache
    pub fn new(inner: P) -> Self {
        Self::with_cache(inner, Arc::new(ForeignKeyCache::new()))
    }

    /// Wrap a provider with an existing cache, e.g. one warmed from a dump
    pub fn with_cache(inner: P, cache: SharedForeignKeyCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &SharedForeignKeyCache {
        &self.cache
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn into_inner(self) -> P {
        self.inner
    }

    /// Drop the cached entry for `table`. Call this before changing the
    /// table's schema so the next lookup sees the new constraints.
    pub fn invalidate(&self, table: &TableRef) -> bool {
        self.cache.invalidate(&self.inner, table)
    }
}

#[async_trait]
impl<P: ForeignKeyProvider> ForeignKeyProvider for CachedForeignKeyProvider<P> {
    async fn get_foreign_keys(
        &self,
        table: &TableRef,
        options: &ForeignKeyOptions,
    ) -> Result<Vec<ForeignKeyInfo>> {
        self.cache.lookup(&self.inner, table, options).await
    }

    fn quote_identifier(&self, table: &TableRef) -> String {
        self.inner.quote_identifier(table)
    }
}
