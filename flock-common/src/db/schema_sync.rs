//! Automatic schema synchronization
//!
//! Tables are created with `CREATE TABLE IF NOT EXISTS`, which never touches
//! an existing table. Columns introduced by later revisions are declared in
//! [`crate::db::table_schemas`] and added here with `ALTER TABLE ADD COLUMN`
//! when an older database is opened.
//!
//! Initialization order:
//! 1. CREATE TABLE IF NOT EXISTS
//! 2. Column sync (this module)
//! 3. Versioned migrations ([`crate::db::migrations`])

use crate::Result;
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

/// Column definition with SQL constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    /// SQL type (e.g., "TEXT", "INTEGER", "REAL")
    pub sql_type: String,
    pub not_null: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub default_value: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
            unique: false,
            default_value: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// DEFAULT expression, inserted verbatim (quote string literals)
    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// `ALTER TABLE ... ADD COLUMN` statement for this column
    ///
    /// SQLite cannot add PRIMARY KEY or UNIQUE columns, and NOT NULL only
    /// together with a DEFAULT; those constraints are dropped with a warning.
    pub fn add_column_sql(&self, table: &str) -> String {
        let mut sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, self.name, self.sql_type);

        if self.primary_key || self.unique {
            warn!(
                "Cannot add PRIMARY KEY/UNIQUE column {}.{} via ALTER TABLE; constraint skipped",
                table, self.name
            );
        }

        match (&self.default_value, self.not_null) {
            (Some(default), true) => sql.push_str(&format!(" NOT NULL DEFAULT {}", default)),
            (Some(default), false) => sql.push_str(&format!(" DEFAULT {}", default)),
            (None, true) => warn!(
                "Cannot add NOT NULL column {}.{} without DEFAULT; column will be nullable",
                table, self.name
            ),
            (None, false) => {}
        }

        sql
    }
}

/// Column as reported by `PRAGMA table_info`
#[derive(Debug, Clone)]
pub struct ActualColumn {
    pub cid: i32,
    pub name: String,
    pub type_name: String,
    pub not_null: bool,
    pub pk: bool,
}

/// Difference between declared and actual schema
#[derive(Debug, Clone)]
pub enum SchemaDrift {
    /// Can be fixed automatically
    MissingColumn { column: ColumnDefinition },
    /// Needs a manual migration
    TypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },
}

/// Declared schema of one table
pub trait TableSchema {
    fn table_name() -> &'static str;

    fn expected_columns() -> Vec<ColumnDefinition>;
}

/// Read the actual columns of a table, ordered by position
pub async fn introspect_table(pool: &SqlitePool, table_name: &str) -> Result<Vec<ActualColumn>> {
    let rows = sqlx::query(&format!("PRAGMA table_info({})", table_name))
        .fetch_all(pool)
        .await?;

    let mut columns: Vec<ActualColumn> = rows
        .iter()
        .map(|row| ActualColumn {
            cid: row.get("cid"),
            name: row.get("name"),
            type_name: row.get("type"),
            not_null: row.get::<i32, _>("notnull") != 0,
            pk: row.get::<i32, _>("pk") != 0,
        })
        .collect();
    columns.sort_by_key(|c| c.cid);

    Ok(columns)
}

pub async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
    )
    .bind(table_name)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Compare declared columns against the database
pub fn diff_columns(expected: &[ColumnDefinition], actual: &[ActualColumn]) -> Vec<SchemaDrift> {
    expected
        .iter()
        .filter_map(|col| match actual.iter().find(|a| a.name == col.name) {
            None => Some(SchemaDrift::MissingColumn { column: col.clone() }),
            Some(a) if !types_compatible(&col.sql_type, &a.type_name) => {
                Some(SchemaDrift::TypeMismatch {
                    column: col.name.clone(),
                    expected: col.sql_type.clone(),
                    actual: a.type_name.clone(),
                })
            }
            Some(_) => None,
        })
        .collect()
}

/// SQLite type affinity comparison
fn types_compatible(expected: &str, actual: &str) -> bool {
    fn affinity(t: &str) -> &'static str {
        let t = t.to_uppercase();
        if t.contains("INT") {
            "INTEGER"
        } else if t.contains("CHAR") || t.contains("CLOB") || t.contains("TEXT") {
            "TEXT"
        } else if t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB") {
            "REAL"
        } else if t.is_empty() || t.contains("BLOB") {
            "BLOB"
        } else {
            "NUMERIC"
        }
    }
    affinity(expected) == affinity(actual)
}

/// Add any declared column missing from the table
pub async fn sync_table<T: TableSchema>(pool: &SqlitePool) -> Result<()> {
    let table = T::table_name();

    if !table_exists(pool, table).await? {
        warn!("Schema sync: table '{}' does not exist, skipping", table);
        return Ok(());
    }

    let actual = introspect_table(pool, table).await?;
    let drift = diff_columns(&T::expected_columns(), &actual);

    if drift.is_empty() {
        info!("Schema sync: '{}' up to date", table);
        return Ok(());
    }

    for change in drift {
        match change {
            SchemaDrift::MissingColumn { column } => {
                info!("Schema sync: adding column {}.{} ({})", table, column.name, column.sql_type);
                match sqlx::query(&column.add_column_sql(table)).execute(pool).await {
                    Ok(_) => {}
                    // Another connection added it first
                    Err(sqlx::Error::Database(e)) if e.message().contains("duplicate column") => {}
                    Err(e) => return Err(e.into()),
                }
            }
            SchemaDrift::TypeMismatch { column, expected, actual } => {
                warn!(
                    "Schema sync: {}.{} is '{}', expected '{}'; manual migration required",
                    table, column, actual, expected
                );
            }
        }
    }

    Ok(())
}
