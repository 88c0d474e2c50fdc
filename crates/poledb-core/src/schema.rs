//! Static schema registry
//!
//! Every table the engine may touch is declared here with its ordered column
//! list. The primary key is always `<table>_id` and is listed first. Tables
//! carrying an `is_active` column opt into soft deletes.
//!
//! Identifiers handed out by the registry are `&'static str`, so SQL text built
//! from them never contains caller-supplied strings.

use std::collections::BTreeSet;

use rusqlite::{Connection, Result};

/// Name of the soft-delete flag column
pub const SOFT_DELETE_COLUMN: &str = "is_active";

/// A registered table and its ordered columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    pub primary_key: &'static str,
    pub columns: &'static [&'static str],
}

impl TableSchema {
    /// Whether deletes on this table deactivate rows instead of removing them
    pub fn has_soft_delete(&self) -> bool {
        self.columns.contains(&SOFT_DELETE_COLUMN)
    }

    /// Look up a column, returning the registry-owned identifier
    pub fn column(&self, name: &str) -> Option<&'static str> {
        self.columns.iter().copied().find(|c| *c == name)
    }

    /// Whether `name` is a column of this table
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Candidates that are not columns of this table
    pub fn invalid_columns<'a, I>(&self, candidates: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates
            .into_iter()
            .filter(|c| !self.has_column(c))
            .map(str::to_string)
            .collect()
    }
}

pub const USER_ACCOUNT: TableSchema = TableSchema {
    name: "user_account",
    primary_key: "user_account_id",
    columns: &["user_account_id", "email", "full_name", "uid", "is_active"],
};

pub const POLE: TableSchema = TableSchema {
    name: "pole",
    primary_key: "pole_id",
    columns: &["pole_id", "pole_number", "lat", "long"],
};

/// All registered tables
pub const TABLES: &[TableSchema] = &[USER_ACCOUNT, POLE];

/// Look up a registered table by name
pub fn table(name: &str) -> Option<&'static TableSchema> {
    TABLES.iter().find(|t| t.name == name)
}

/// Returns true if `name` is a registered table
pub fn is_valid_table(name: &str) -> bool {
    table(name).is_some()
}

/// Ordered column list for `name`, empty if the table is unknown
pub fn valid_columns(name: &str) -> &'static [&'static str] {
    table(name).map(|t| t.columns).unwrap_or(&[])
}

/// Candidates not present in the columns of `name`
///
/// Every candidate is invalid when the table is unknown.
pub fn invalid_columns<'a, I>(name: &str, candidates: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let valid = valid_columns(name);
    candidates
        .into_iter()
        .filter(|c| !valid.contains(c))
        .map(str::to_string)
        .collect()
}

/// Create the development tables on an SQLite connection
///
/// Only used for the local SQLite file; production schemas are managed
/// outside this crate.
pub fn init_sqlite_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS user_account (
            user_account_id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT,
            full_name TEXT,
            uid TEXT,
            is_active BOOLEAN NOT NULL DEFAULT TRUE
        );

        CREATE TABLE IF NOT EXISTS pole (
            pole_id INTEGER PRIMARY KEY AUTOINCREMENT,
            pole_number TEXT,
            lat REAL,
            long REAL
        );

        CREATE INDEX IF NOT EXISTS idx_pole_number ON pole(pole_number);
        CREATE INDEX IF NOT EXISTS idx_user_account_active ON user_account(is_active);
        "#,
    )
}

/// Check whether the development tables are missing
pub fn needs_init(conn: &Connection) -> bool {
    let mut found = 0;
    for schema in TABLES {
        let exists = conn
            .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name = ?1")
            .and_then(|mut stmt| stmt.exists([schema.name]))
            .unwrap_or(false);
        if exists {
            found += 1;
        }
    }
    found < TABLES.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_tables() {
        assert!(is_valid_table("pole"));
        assert!(is_valid_table("user_account"));
        assert!(!is_valid_table("user"));
        assert!(!is_valid_table(""));
    }

    #[test]
    fn test_valid_columns_ordered() {
        assert_eq!(
            valid_columns("pole"),
            &["pole_id", "pole_number", "lat", "long"]
        );
        assert!(valid_columns("missing").is_empty());
    }

    #[test]
    fn test_subsets_of_valid_columns_are_valid() {
        for schema in TABLES {
            let cols = schema.columns;
            for start in 0..cols.len() {
                for end in start..=cols.len() {
                    let subset = cols[start..end].iter().copied();
                    assert!(invalid_columns(schema.name, subset).is_empty());
                }
            }
        }
    }

    #[test]
    fn test_invalid_columns() {
        let invalid = invalid_columns("pole", ["pole_number", "bogus_col", "email"]);
        let expected: BTreeSet<String> =
            ["bogus_col".to_string(), "email".to_string()].into();
        assert_eq!(invalid, expected);

        // Unknown table: everything is invalid
        let invalid = invalid_columns("nope", ["pole_id"]);
        assert!(invalid.contains("pole_id"));
    }

    #[test]
    fn test_primary_key_and_soft_delete() {
        for schema in TABLES {
            assert_eq!(schema.primary_key, format!("{}_id", schema.name));
            assert_eq!(schema.columns[0], schema.primary_key);
        }
        assert!(USER_ACCOUNT.has_soft_delete());
        assert!(!POLE.has_soft_delete());
    }

    #[test]
    fn test_column_lookup_returns_registry_identifier() {
        let requested = String::from("lat");
        let col: &'static str = POLE.column(&requested).unwrap();
        assert_eq!(col, "lat");
        assert!(POLE.column("LAT").is_none());
    }

    #[test]
    fn test_init_sqlite_schema() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(needs_init(&conn));

        init_sqlite_schema(&conn).unwrap();
        assert!(!needs_init(&conn));

        // Idempotent
        init_sqlite_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();
        assert!(tables.contains(&"pole".to_string()));
        assert!(tables.contains(&"user_account".to_string()));
    }
}
