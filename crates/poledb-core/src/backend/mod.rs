//! Database backends
//!
//! Everything dialect-specific lives behind this module:
//!
//! - [`Dialect`]: placeholder syntax and how a generated id is read back
//! - [`Backend`]: a connection that can run queries and scoped transactions
//! - [`Executor`]: what a transaction can do while it is open
//!
//! Two implementations exist: [`SqliteBackend`] (development file database)
//! and [`PostgresBackend`] (production server). [`Database`] selects one at
//! runtime from [`Config`].

pub mod postgres;
pub mod sqlite;

use anyhow::{bail, Context, Result};

use crate::config::{BackendKind, Config};
use crate::error::BackendError;
use crate::value::{Record, RowId, Value};

pub use self::postgres::PostgresBackend;
pub use self::sqlite::SqliteBackend;

/// How the id of an inserted row is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdStrategy {
    /// The INSERT carries `RETURNING <pk>` and yields the id as a row
    Returning,
    /// The driver reports the last inserted id after execution
    LastInsertId,
}

/// SQL dialect of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Placeholder token for the parameter at `position` (1-based)
    pub fn placeholder(&self, position: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{}", position),
            Dialect::Postgres => format!("${}", position),
        }
    }

    /// Placeholder for a primary key compared against a bound [`RowId`]
    ///
    /// PostgreSQL infers the parameter type from the key column, which is
    /// `INT4` for a `SERIAL` key, so an id above `i32::MAX` could not be
    /// encoded. Casting the parameter to `BIGINT` makes the comparison
    /// `int4 = int8` and such an id simply matches no row.
    pub fn key_placeholder(&self, position: usize) -> String {
        match self {
            Dialect::Sqlite => self.placeholder(position),
            Dialect::Postgres => format!("CAST(${} AS BIGINT)", position),
        }
    }

    pub fn id_strategy(&self) -> IdStrategy {
        match self {
            Dialect::Sqlite => IdStrategy::LastInsertId,
            Dialect::Postgres => IdStrategy::Returning,
        }
    }
}

/// Statement execution inside an open transaction
pub trait Executor {
    /// Execute a statement, returning the number of affected rows
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, BackendError>;

    /// Run a query and collect its rows
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Record>, BackendError>;

    /// Id generated by the most recent insert on this connection
    fn last_insert_id(&mut self) -> Result<RowId, BackendError>;
}

/// A database connection
pub trait Backend {
    fn dialect(&self) -> Dialect;

    /// Run a read-only query outside of an explicit transaction
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Record>, BackendError>;

    /// Run `f` inside a transaction
    ///
    /// Commits when `f` returns `Ok`. Rolls back when `f` returns `Err` or
    /// panics. A failure to begin or commit is converted into `E`.
    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Executor) -> Result<T, E>,
        E: From<BackendError>;
}

impl<B: Backend> Backend for &mut B {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Record>, BackendError> {
        (**self).query(sql, params)
    }

    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Executor) -> Result<T, E>,
        E: From<BackendError>,
    {
        (**self).transaction(f)
    }
}

/// A backend chosen at runtime
pub enum Database {
    Sqlite(SqliteBackend),
    Postgres(PostgresBackend),
}

impl Database {
    /// Open the backend selected by `config`
    pub fn open(config: &Config) -> Result<Self> {
        match config.backend {
            BackendKind::Sqlite => {
                let backend = SqliteBackend::open(&config.sqlite_path)?;
                Ok(Database::Sqlite(backend))
            }
            BackendKind::Postgres => {
                let Some(url) = config.database_url.as_deref() else {
                    bail!("backend is postgres but no database_url is configured (set DATABASE_URL)");
                };
                let backend =
                    PostgresBackend::connect(url).context("Failed to connect to PostgreSQL")?;
                Ok(Database::Postgres(backend))
            }
        }
    }
}

impl Backend for Database {
    fn dialect(&self) -> Dialect {
        match self {
            Database::Sqlite(b) => b.dialect(),
            Database::Postgres(b) => b.dialect(),
        }
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Record>, BackendError> {
        match self {
            Database::Sqlite(b) => b.query(sql, params),
            Database::Postgres(b) => b.query(sql, params),
        }
    }

    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Executor) -> Result<T, E>,
        E: From<BackendError>,
    {
        match self {
            Database::Sqlite(b) => b.transaction(f),
            Database::Postgres(b) => b.transaction(f),
        }
    }
}
