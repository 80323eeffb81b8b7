//! Schema metadata types and the provider traits the cache builds on

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Source of foreign key metadata, usually a live database connection
///
/// Implementations query the catalog on every call; callers that need
/// repeated lookups should wrap the provider in a cache.
#[async_trait]
pub trait ForeignKeyProvider: Send + Sync {
    /// Get foreign keys declared on a table
    async fn get_foreign_keys(
        &self,
        table: &TableRef,
        options: &ForeignKeyOptions,
    ) -> Result<Vec<ForeignKeyInfo>>;

    /// Render the fully qualified, quoted name of a table.
    ///
    /// Must be pure: two references to the same physical table have to
    /// produce the same string.
    fn quote_identifier(&self, table: &TableRef) -> String;
}

#[async_trait]
impl<P: ForeignKeyProvider + ?Sized> ForeignKeyProvider for Arc<P> {
    async fn get_foreign_keys(
        &self,
        table: &TableRef,
        options: &ForeignKeyOptions,
    ) -> Result<Vec<ForeignKeyInfo>> {
        (**self).get_foreign_keys(table, options).await
    }

    fn quote_identifier(&self, table: &TableRef) -> String {
        (**self).quote_identifier(table)
    }
}

/// Notified before the schema of a table is changed
///
/// Anything that mutates a table (adding or dropping a foreign key, renaming
/// or dropping the table) calls this before committing so cached metadata for
/// the table is dropped first.
pub trait SchemaChangeObserver: Send + Sync {
    /// `quoted_name` is the provider's `quote_identifier` for `table`
    fn before_table_change(&self, table: &TableRef, quoted_name: &str);
}

/// Reference to a table, optionally schema qualified
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    /// Unqualified table reference
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// Schema qualified table reference
    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Parse `schema.table` or `table`. Only the first dot separates the
    /// schema, so `a.b.c` is table `b.c` in schema `a`.
    pub fn parse(s: &str) -> Self {
        match s.split_once('.') {
            Some((schema, name)) if !schema.is_empty() && !name.is_empty() => {
                Self::qualified(schema, name)
            }
            _ => Self::new(s),
        }
    }

    /// Schema name, falling back to the given default
    pub fn schema_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.schema.as_deref().unwrap_or(default)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl From<&str> for TableRef {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

/// Options controlling how foreign key metadata is fetched
///
/// Results are only cached for the all-default options value; see
/// [`ForeignKeyOptions::is_default`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyOptions {
    /// Look the table up in this schema instead of the one on the `TableRef`
    pub schema_override: Option<String>,
    /// Include constraints inherited from parent tables, for databases with
    /// table inheritance
    pub include_inherited: bool,
}

impl ForeignKeyOptions {
    pub fn with_schema_override(mut self, schema: impl Into<String>) -> Self {
        self.schema_override = Some(schema.into());
        self
    }

    pub fn with_inherited(mut self) -> Self {
        self.include_inherited = true;
        self
    }

    /// True when no option has been set
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Foreign key information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_schema: Option<String>,
    pub referenced_columns: Vec<String>,
    pub on_update: ForeignKeyAction,
    pub on_delete: ForeignKeyAction,
    pub is_deferrable: bool,
    pub initially_deferred: bool,
}

impl ForeignKeyInfo {
    /// Single column foreign key with `NO ACTION` on update and delete
    pub fn new(
        name: impl Into<String>,
        column: impl Into<String>,
        referenced_table: impl Into<String>,
        referenced_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            columns: vec![column.into()],
            referenced_table: referenced_table.into(),
            referenced_schema: None,
            referenced_columns: vec![referenced_column.into()],
            on_update: ForeignKeyAction::NoAction,
            on_delete: ForeignKeyAction::NoAction,
            is_deferrable: false,
            initially_deferred: false,
        }
    }
}

/// Foreign key action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForeignKeyAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ForeignKeyAction {
    /// Parse the action as reported by database catalogs, e.g. `SET NULL`.
    /// Unknown spellings map to `NoAction`.
    pub fn parse(action: &str) -> Self {
        match action.trim().to_uppercase().as_str() {
            "CASCADE" => ForeignKeyAction::Cascade,
            "SET NULL" => ForeignKeyAction::SetNull,
            "SET DEFAULT" => ForeignKeyAction::SetDefault,
            "RESTRICT" => ForeignKeyAction::Restrict,
            _ => ForeignKeyAction::NoAction,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            ForeignKeyAction::NoAction => "NO ACTION",
            ForeignKeyAction::Restrict => "RESTRICT",
            ForeignKeyAction::Cascade => "CASCADE",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
        }
    }
}

#[cfg(test)]
mod tests;
