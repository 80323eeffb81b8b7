//! Implementations of the `zqlz-fk-cache` subcommands

use anyhow::{Context, Result};
use std::path::Path;
use zqlz_core::{ForeignKeyOptions, ForeignKeyProvider, TableRef};
use zqlz_driver_sqlite::SqliteConnection;
use zqlz_schema_cache::{CachedForeignKeyProvider, FORMAT_VERSION, ForeignKeyCache};

/// What a `dump` run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpOutcome {
    /// Number of tables whose foreign keys were read
    pub table_count: usize,
    /// False when `--unless-exists` found a dump already in place
    pub written: bool,
}

/// Read foreign keys for `tables` (all tables when empty) and dump them to `output`
pub async fn dump(
    database: &str,
    output: &Path,
    tables: &[String],
    unless_exists: bool,
) -> Result<DumpOutcome> {
    if unless_exists && output.exists() {
        tracing::info!(path = %output.display(), "dump already exists, skipping");
        return Ok(DumpOutcome {
            table_count: 0,
            written: false,
        });
    }

    let conn = SqliteConnection::open(database)
        .with_context(|| format!("failed to open database {}", database))?;
    let cached = CachedForeignKeyProvider::new(conn);

    let tables: Vec<TableRef> = if tables.is_empty() {
        cached
            .inner()
            .list_tables()
            .await
            .context("failed to list tables")?
    } else {
        tables.iter().map(|table| TableRef::parse(table)).collect()
    };

    let options = ForeignKeyOptions::default();
    for table in &tables {
        cached
            .get_foreign_keys(table, &options)
            .await
            .with_context(|| format!("failed to read foreign keys of {}", table))?;
    }

    let cache = cached.cache();
    let written = if unless_exists {
        cache.dump_to_file_unless_exists(output)
    } else {
        cache.dump_to_file(output).map(|_| true)
    }
    .with_context(|| format!("failed to write {}", output.display()))?;

    Ok(DumpOutcome {
        table_count: tables.len(),
        written,
    })
}

/// Load a dump into a fresh cache
pub fn load(path: &Path) -> zqlz_core::Result<ForeignKeyCache> {
    let cache = ForeignKeyCache::new();
    cache.load_from_file(path)?;
    Ok(cache)
}

/// JSON view of a loaded dump, optionally limited to one canonical key
pub fn render(cache: &ForeignKeyCache, key: Option<&str>) -> Result<serde_json::Value> {
    let mut tables = serde_json::Map::new();
    for (name, foreign_keys) in cache.entries() {
        if key.is_some_and(|key| key != name) {
            continue;
        }
        tables.insert(name, serde_json::to_value(foreign_keys)?);
    }

    Ok(serde_json::json!({
        "format_version": FORMAT_VERSION,
        "entry_count": tables.len(),
        "tables": tables,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    async fn database(dir: &TempDir) -> String {
        let path = dir.path().join("app.db");
        let path = path.to_str().unwrap().to_string();
        let conn = SqliteConnection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE customers (id INTEGER PRIMARY KEY);
             CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER REFERENCES customers(id));",
        )
        .await
        .unwrap();
        path
    }

    #[tokio::test]
    async fn test_dump_all_tables() {
        let dir = TempDir::new().unwrap();
        let db = database(&dir).await;
        let output = dir.path().join("fk.dump");

        let outcome = dump(&db, &output, &[], false).await.unwrap();

        assert_eq!(
            outcome,
            DumpOutcome {
                table_count: 2,
                written: true
            }
        );
        let cache = load(&output).unwrap();
        assert_eq!(
            cache.keys(),
            vec!["\"main\".\"customers\"".to_string(), "\"main\".\"orders\"".to_string()]
        );
    }

    #[tokio::test]
    async fn test_dump_selected_tables() {
        let dir = TempDir::new().unwrap();
        let db = database(&dir).await;
        let output = dir.path().join("fk.dump");

        dump(&db, &output, &["main.orders".to_string()], false)
            .await
            .unwrap();

        assert_eq!(load(&output).unwrap().keys(), vec!["\"main\".\"orders\"".to_string()]);
    }

    #[tokio::test]
    async fn test_dump_unless_exists_keeps_existing_file() {
        let dir = TempDir::new().unwrap();
        let db = database(&dir).await;
        let output = dir.path().join("fk.dump");
        std::fs::write(&output, b"keep me").unwrap();

        let outcome = dump(&db, &output, &[], true).await.unwrap();

        assert!(!outcome.written);
        assert_eq!(std::fs::read(&output).unwrap(), b"keep me");
    }

    #[tokio::test]
    async fn test_render_dump() {
        let dir = TempDir::new().unwrap();
        let db = database(&dir).await;
        let output = dir.path().join("fk.dump");
        dump(&db, &output, &[], false).await.unwrap();
        let cache = load(&output).unwrap();

        let all = render(&cache, None).unwrap();
        assert_eq!(all["entry_count"], 2);
        assert_eq!(all["format_version"], FORMAT_VERSION);

        let orders = render(&cache, Some("\"main\".\"orders\"")).unwrap();
        assert_eq!(orders["entry_count"], 1);
        assert_eq!(
            orders["tables"]["\"main\".\"orders\""][0]["referenced_table"],
            "customers"
        );
    }

    #[test]
    fn test_load_corrupt_dump_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fk.dump");
        std::fs::write(&path, vec![0u8; 64]).unwrap();

        assert!(load(&path).unwrap_err().is_cache_decode());
    }
}
