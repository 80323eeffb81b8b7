//! Test doubles for foreign key providers

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use zqlz_core::{
    ForeignKeyInfo, ForeignKeyOptions, ForeignKeyProvider, Result, TableRef, ZqlzError,
};

/// Provider that serves canned foreign keys and records every call
pub(crate) struct CountingProvider {
    /// Foreign keys keyed by quoted table name
    responses: Mutex<HashMap<String, Vec<ForeignKeyInfo>>>,
    calls: AtomicUsize,
    /// Number of upcoming calls that should fail
    failures_remaining: AtomicUsize,
    seen_options: Mutex<Vec<ForeignKeyOptions>>,
}

impl CountingProvider {
    pub(crate) fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            failures_remaining: AtomicUsize::new(0),
            seen_options: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_table(self, table: &str, foreign_keys: Vec<ForeignKeyInfo>) -> Self {
        self.set_table(table, foreign_keys);
        self
    }

    /// Change what the "database" reports for a table
    pub(crate) fn set_table(&self, table: &str, foreign_keys: Vec<ForeignKeyInfo>) {
        let key = self.quote_identifier(&TableRef::parse(table));
        self.responses.lock().insert(key, foreign_keys);
    }

    pub(crate) fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn seen_options(&self) -> Vec<ForeignKeyOptions> {
        self.seen_options.lock().clone()
    }
}

#[async_trait]
impl ForeignKeyProvider for CountingProvider {
    async fn get_foreign_keys(
        &self,
        table: &TableRef,
        options: &ForeignKeyOptions,
    ) -> Result<Vec<ForeignKeyInfo>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_options.lock().push(options.clone());

        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ZqlzError::Connection("connection reset by peer".into()));
        }

        let table = match &options.schema_override {
            Some(schema) => TableRef::qualified(schema.clone(), table.name.clone()),
            None => table.clone(),
        };
        let key = self.quote_identifier(&table);
        Ok(self.responses.lock().get(&key).cloned().unwrap_or_default())
    }

    fn quote_identifier(&self, table: &TableRef) -> String {
        format!("\"{}\".\"{}\"", table.schema_or("public"), table.name)
    }
}

pub(crate) fn orders_foreign_keys() -> Vec<ForeignKeyInfo> {
    vec![ForeignKeyInfo::new(
        "orders_customer_id_fkey",
        "customer_id",
        "customers",
        "id",
    )]
}

pub(crate) fn line_items_foreign_keys() -> Vec<ForeignKeyInfo> {
    vec![
        ForeignKeyInfo::new("line_items_order_id_fkey", "order_id", "orders", "id"),
        ForeignKeyInfo::new("line_items_product_id_fkey", "product_id", "products", "id"),
    ]
}
