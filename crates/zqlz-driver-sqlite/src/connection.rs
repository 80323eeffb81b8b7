//! SQLite connection implementation

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rusqlite::{Connection as RusqliteConnection, OpenFlags, params};
use std::collections::BTreeMap;
use std::sync::Arc;
use zqlz_core::{
    ForeignKeyAction, ForeignKeyInfo, ForeignKeyOptions, ForeignKeyProvider, Result,
    SchemaChangeObserver, TableRef, ZqlzError,
};

/// Schema SQLite uses for the main database file
pub const DEFAULT_SCHEMA: &str = "main";

const FOREIGN_KEY_LIST_SQL: &str = "SELECT id, seq, \"table\", \"from\", \"to\", on_update, on_delete \
     FROM pragma_foreign_key_list(?1, ?2) ORDER BY id, seq";

/// SQLite connection wrapper
pub struct SqliteConnection {
    conn: Arc<Mutex<RusqliteConnection>>,
    observers: RwLock<Vec<Arc<dyn SchemaChangeObserver>>>,
}

impl SqliteConnection {
    /// Open a SQLite database
    pub fn open(path: &str) -> Result<Self> {
        tracing::info!(path = %path, "opening SQLite database");
        if path == ":memory:" {
            return Self::open_in_memory();
        }

        let expanded_path = Self::expand_path(path)?;

        // Validate that parent directory exists for non-URI paths
        if !expanded_path.starts_with("file:") {
            let file_path = std::path::Path::new(&expanded_path);
            if let Some(parent) = file_path.parent()
                && !parent.exists()
            {
                return Err(ZqlzError::Connection(format!(
                    "Parent directory does not exist: {}",
                    parent.display()
                )));
            }
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = RusqliteConnection::open_with_flags(&expanded_path, flags).map_err(|e| {
            ZqlzError::Connection(format!(
                "Failed to open SQLite database at '{}': {}",
                expanded_path, e
            ))
        })?;

        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = RusqliteConnection::open_in_memory().map_err(|e| {
            ZqlzError::Connection(format!("Failed to open in-memory database: {}", e))
        })?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: RusqliteConnection) -> Result<Self> {
        // Enable foreign keys (PRAGMA commands return results, so use pragma_update)
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| ZqlzError::Connection(format!("Failed to enable foreign keys: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            observers: RwLock::new(Vec::new()),
        })
    }

    /// Expand path to handle ~ (home directory) and relative paths
    fn expand_path(path: &str) -> Result<String> {
        if path.starts_with("file:") {
            return Ok(path.to_string());
        }

        let expanded = if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = std::env::var_os("HOME") {
                let home_path = std::path::PathBuf::from(home);
                home_path.join(rest).to_string_lossy().to_string()
            } else {
                return Err(ZqlzError::Configuration(
                    "Unable to determine HOME directory".into(),
                ));
            }
        } else if path.starts_with('~') {
            return Err(ZqlzError::Configuration(
                "User-specific home directories (~user) are not supported".into(),
            ));
        } else {
            path.to_string()
        };

        let path_buf = std::path::PathBuf::from(&expanded);
        let result = if path_buf.is_relative() {
            std::env::current_dir()
                .map_err(ZqlzError::Io)?
                .join(path_buf)
                .to_string_lossy()
                .to_string()
        } else {
            expanded
        };

        Ok(result)
    }

    /// Register an observer to be told about schema changes made through
    /// [`alter_table`](Self::alter_table)
    pub fn add_schema_observer(&self, observer: Arc<dyn SchemaChangeObserver>) {
        self.observers.write().push(observer);
    }

    /// Execute multiple SQL statements in a batch
    pub async fn execute_batch(&self, sql: &str) -> Result<()> {
        tracing::debug!("executing SQL batch");
        self.conn
            .lock()
            .execute_batch(sql)
            .map_err(|e| ZqlzError::Query(format!("Failed to execute batch: {}", e)))
    }

    /// Run DDL that changes `table`.
    ///
    /// Observers are notified before the statement runs so cached metadata for
    /// the table is gone by the time the change lands.
    #[tracing::instrument(skip(self, table, sql), fields(table = %table))]
    pub async fn alter_table(&self, table: &TableRef, sql: &str) -> Result<()> {
        let quoted_name = self.quote_identifier(table);
        for observer in self.observers.read().iter() {
            observer.before_table_change(table, &quoted_name);
        }
        self.execute_batch(sql).await
    }

    /// List user tables in the main database
    #[tracing::instrument(skip(self))]
    pub async fn list_tables(&self) -> Result<Vec<TableRef>> {
        tracing::debug!("listing tables from sqlite_master");
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .map_err(|e| ZqlzError::Query(e.to_string()))?;

        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| ZqlzError::Query(e.to_string()))?
            .map(|name| {
                name.map(|name| TableRef::qualified(DEFAULT_SCHEMA, name))
                    .map_err(|e| ZqlzError::Query(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(table_count = tables.len(), "tables listed");
        Ok(tables)
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("observer_count", &self.observers.read().len())
            .finish()
    }
}

/// One row of `pragma_foreign_key_list`
struct ForeignKeyRow {
    id: i64,
    referenced_table: String,
    from: String,
    to: Option<String>,
    on_update: String,
    on_delete: String,
}

#[async_trait]
impl ForeignKeyProvider for SqliteConnection {
    #[tracing::instrument(skip(self))]
    async fn get_foreign_keys(
        &self,
        table: &TableRef,
        options: &ForeignKeyOptions,
    ) -> Result<Vec<ForeignKeyInfo>> {
        let schema = options
            .schema_override
            .as_deref()
            .unwrap_or_else(|| table.schema_or(DEFAULT_SCHEMA));
        if options.include_inherited {
            tracing::trace!("SQLite has no table inheritance, ignoring include_inherited");
        }
        tracing::trace!(table = %table.name, schema = %schema, "fetching foreign key information");

        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(FOREIGN_KEY_LIST_SQL)
            .map_err(|e| ZqlzError::Query(e.to_string()))?;
        let rows = stmt
            .query_map(params![table.name, schema], |row| {
                Ok(ForeignKeyRow {
                    id: row.get(0)?,
                    referenced_table: row.get(2)?,
                    from: row.get(3)?,
                    to: row.get(4)?,
                    on_update: row.get(5)?,
                    on_delete: row.get(6)?,
                })
            })
            .map_err(|e| ZqlzError::Query(e.to_string()))?;

        // Multi-column constraints come back as one row per column, sharing an id
        let mut grouped: BTreeMap<i64, ForeignKeyInfo> = BTreeMap::new();
        for row in rows {
            let row = row.map_err(|e| ZqlzError::Query(e.to_string()))?;
            let fk = grouped.entry(row.id).or_insert_with(|| ForeignKeyInfo {
                name: format!("fk_{}_{}_{}", table.name, row.referenced_table, row.id),
                columns: Vec::new(),
                referenced_table: row.referenced_table.clone(),
                referenced_schema: Some(schema.to_string()),
                referenced_columns: Vec::new(),
                on_update: ForeignKeyAction::parse(&row.on_update),
                on_delete: ForeignKeyAction::parse(&row.on_delete),
                is_deferrable: false,
                initially_deferred: false,
            });
            fk.columns.push(row.from);
            // NULL when the constraint targets the parent's primary key implicitly
            if let Some(to) = row.to {
                fk.referenced_columns.push(to);
            }
        }

        let fks: Vec<ForeignKeyInfo> = grouped.into_values().collect();
        tracing::debug!(foreign_key_count = fks.len(), "foreign keys fetched");
        Ok(fks)
    }

    /// SQLite matches identifiers without regard to ASCII case, quoted or
    /// not, so the canonical name is folded to lowercase.
    fn quote_identifier(&self, table: &TableRef) -> String {
        format!(
            "{}.{}",
            quote_ident(&table.schema_or(DEFAULT_SCHEMA).to_ascii_lowercase()),
            quote_ident(&table.name.to_ascii_lowercase())
        )
    }
}

/// Double-quote an identifier, escaping embedded quotes
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("orders"), "\"orders\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_quote_identifier_defaults_to_main() {
        let conn = SqliteConnection::open_in_memory().unwrap();
        assert_eq!(
            conn.quote_identifier(&TableRef::new("orders")),
            "\"main\".\"orders\""
        );
        assert_eq!(
            conn.quote_identifier(&TableRef::new("orders")),
            conn.quote_identifier(&TableRef::qualified("main", "orders"))
        );
        assert_ne!(
            conn.quote_identifier(&TableRef::new("orders")),
            conn.quote_identifier(&TableRef::qualified("archive", "orders"))
        );
    }

    #[test]
    fn test_quote_identifier_folds_ascii_case() {
        let conn = SqliteConnection::open_in_memory().unwrap();
        assert_eq!(
            conn.quote_identifier(&TableRef::qualified("MAIN", "Customers")),
            conn.quote_identifier(&TableRef::new("customers"))
        );
        assert_eq!(
            conn.quote_identifier(&TableRef::new("Order\"Items")),
            "\"main\".\"order\"\"items\""
        );
    }

    #[test]
    fn test_debug_reports_observer_count() {
        let conn = SqliteConnection::open_in_memory().unwrap();
        assert_eq!(
            format!("{:?}", conn),
            "SqliteConnection { observer_count: 0 }"
        );
    }

    #[test]
    fn test_expand_path_keeps_uri() {
        assert_eq!(
            SqliteConnection::expand_path("file:test.db?mode=ro").unwrap(),
            "file:test.db?mode=ro"
        );
    }

    #[test]
    fn test_expand_path_rejects_other_users_home() {
        let err = SqliteConnection::expand_path("~alice/test.db").unwrap_err();
        assert!(matches!(err, ZqlzError::Configuration(_)));
    }

    #[test]
    fn test_expand_path_makes_relative_absolute() {
        let expanded = SqliteConnection::expand_path("test.db").unwrap();
        assert!(std::path::Path::new(&expanded).is_absolute());
    }

    #[test]
    fn test_open_fails_for_missing_parent_directory() {
        let err = SqliteConnection::open("/definitely/not/here/test.db").unwrap_err();
        assert!(matches!(err, ZqlzError::Connection(_)));
    }
}
