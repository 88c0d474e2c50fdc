//! Data access error handling
//!
//! Typed failures for table operations. Callers can tell an unknown table,
//! bad column names, a missing row and a database failure apart, and map each
//! to a response status.

use thiserror::Error;

use crate::value::RowId;

/// Message returned in place of the engine diagnostic outside debug mode
pub const REDACTED_MESSAGE: &str =
    "Internal server db error. Actual message has been logged on server";

/// Status codes used by the service
pub mod status {
    pub const OK: u16 = 200;
    pub const CREATED: u16 = 201;
    pub const NOT_FOUND: u16 = 404;
    /// Request carried no data
    pub const NO_INPUT: u16 = 450;
    /// Request named columns the table does not have
    pub const INVALID_INPUT: u16 = 451;
    pub const INTERNAL_ERROR: u16 = 500;
}

/// Errors that can occur during table operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DbError {
    /// Table is not in the schema registry
    #[error("The table {table} was not found in the database")]
    UnknownTable { table: String },

    /// One or more columns are not valid for the table
    #[error("The table '{table}' has no column(s) {}", .columns.join(", "))]
    InvalidColumns { table: String, columns: Vec<String> },

    /// Update called without any data
    #[error("No data input provided for {table}")]
    NoData { table: String },

    /// An id-scoped operation matched no row
    #[error("The {table} with id {id} was not found")]
    EntryNotFound { table: String, id: RowId },

    /// Statement execution failed
    #[error("Database error on {table}: {message}")]
    Database {
        table: String,
        message: String,
        code: Option<String>,
    },
}

impl DbError {
    pub fn unknown_table(table: impl Into<String>) -> Self {
        DbError::UnknownTable {
            table: table.into(),
        }
    }

    pub fn invalid_columns<I, S>(table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        columns.sort();
        columns.dedup();
        DbError::InvalidColumns {
            table: table.into(),
            columns,
        }
    }

    pub fn entry_not_found(table: impl Into<String>, id: RowId) -> Self {
        DbError::EntryNotFound {
            table: table.into(),
            id,
        }
    }

    /// Wrap a backend failure
    ///
    /// The full diagnostic is logged here. It is only carried on the error
    /// when `debug` is set; otherwise callers get a fixed message.
    pub fn database(table: impl Into<String>, source: &BackendError, debug: bool) -> Self {
        let table = table.into();
        tracing::error!(
            table = %table,
            code = source.code.as_deref().unwrap_or("-"),
            "statement execution failed: {}",
            source.message
        );
        let message = if debug {
            source.message.replace('\n', " ")
        } else {
            REDACTED_MESSAGE.to_string()
        };
        DbError::Database {
            table,
            message,
            code: source.code.clone(),
        }
    }

    /// The table the failure relates to
    pub fn table(&self) -> &str {
        match self {
            DbError::UnknownTable { table }
            | DbError::InvalidColumns { table, .. }
            | DbError::NoData { table }
            | DbError::EntryNotFound { table, .. }
            | DbError::Database { table, .. } => table,
        }
    }

    /// Response status for this failure
    pub fn status_code(&self) -> u16 {
        match self {
            DbError::UnknownTable { .. } | DbError::EntryNotFound { .. } => status::NOT_FOUND,
            DbError::InvalidColumns { .. } => status::INVALID_INPUT,
            DbError::NoData { .. } => status::NO_INPUT,
            DbError::Database { .. } => status::INTERNAL_ERROR,
        }
    }

    /// Whether the caller caused this failure
    pub fn is_client_error(&self) -> bool {
        !matches!(self, DbError::Database { .. })
    }
}

/// Failure reported by a database driver
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
    /// Engine error code (SQLSTATE or SQLite extended result code)
    pub code: Option<String>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }
}

impl From<rusqlite::Error> for BackendError {
    fn from(err: rusqlite::Error) -> Self {
        let code = match &err {
            rusqlite::Error::SqliteFailure(e, _) => Some(e.extended_code.to_string()),
            _ => None,
        };
        Self {
            message: err.to_string(),
            code,
        }
    }
}

impl From<postgres::Error> for BackendError {
    fn from(err: postgres::Error) -> Self {
        let code = err.code().map(|c| c.code().to_string());
        // The database error carries the server message; Display on the
        // wrapper only says "db error"
        let message = match err.as_db_error() {
            Some(db) => db.message().to_string(),
            None => err.to_string(),
        };
        Self { message, code }
    }
}

/// Result type for table operations
pub type DbResult<T> = Result<T, DbError>;
