//! SQLite backend
//!
//! Used for local development. The database file is created on first open
//! and the development tables are bootstrapped if they are missing.
//!
//! SQLite has no boolean storage class, so columns declared `BOOLEAN` are
//! read back as [`Value::Bool`] based on their declared type.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql, Transaction};
use tracing::{debug, warn};

use super::{Backend, Dialect, Executor};
use crate::error::BackendError;
use crate::schema::{init_sqlite_schema, needs_init};
use crate::value::{Record, RowId, Value};

/// SQLite connection
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Open or create the database file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {:?}", parent))?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database at {:?}", path))?;
        debug!("opened SQLite database at {:?}", path);

        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        if needs_init(&conn) {
            init_sqlite_schema(&conn).context("Failed to initialize SQLite schema")?;
        }

        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Backend for SqliteBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Record>, BackendError> {
        Ok(query_records(&self.conn, sql, params)?)
    }

    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Executor) -> Result<T, E>,
        E: From<BackendError>,
    {
        let mut tx = self.conn.transaction().map_err(BackendError::from)?;

        match f(&mut tx) {
            Ok(value) => {
                tx.commit().map_err(BackendError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!("rollback failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }
}

impl Executor for Transaction<'_> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, BackendError> {
        let affected = Connection::execute(self, sql, params_from_iter(params.iter()))?;
        Ok(affected as u64)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Record>, BackendError> {
        Ok(query_records(self, sql, params)?)
    }

    fn last_insert_id(&mut self) -> Result<RowId, BackendError> {
        Ok(self.last_insert_rowid())
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Int(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

fn query_records(conn: &Connection, sql: &str, params: &[Value]) -> rusqlite::Result<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;

    // (name, declared boolean)
    let columns: Vec<(String, bool)> = stmt
        .columns()
        .iter()
        .map(|c| {
            let is_bool = c
                .decl_type()
                .map_or(false, |t| t.eq_ignore_ascii_case("BOOLEAN"));
            (c.name().to_string(), is_bool)
        })
        .collect();

    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut records = Vec::new();

    while let Some(row) = rows.next()? {
        let mut record = Record::new();
        for (idx, (name, is_bool)) in columns.iter().enumerate() {
            let value = match row.get_ref(idx)? {
                ValueRef::Null => Value::Null,
                ValueRef::Integer(i) if *is_bool => Value::Bool(i != 0),
                ValueRef::Integer(i) => Value::Int(i),
                ValueRef::Real(f) => Value::Float(f),
                ValueRef::Text(t) | ValueRef::Blob(t) => {
                    Value::Text(String::from_utf8_lossy(t).into_owned())
                }
            };
            record.insert(name.clone(), value);
        }
        records.push(record);
    }

    Ok(records)
}
