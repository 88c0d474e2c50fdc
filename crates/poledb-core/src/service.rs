//! Generic table access
//!
//! `DataService` turns insert/select/update/delete/search requests on any
//! registered table into parameterized statements and runs them on the
//! backend it was constructed with.
//!
//! All validation happens before a statement is sent. Mutations run inside a
//! transaction so a failed or rejected statement never leaves a partial write.
//!
//! ## Usage
//!
//! ```
//! use poledb_core::{data, DataService, SelectQuery, SqliteBackend};
//!
//! let backend = SqliteBackend::open_in_memory()?;
//! let mut service = DataService::new(backend);
//!
//! let id = service.insert("pole", data! { "pole_number" => "P1", "lat" => 1.0, "long" => 2.0 })?;
//! let pole = service.select_by_id("pole", id, SelectQuery::default())?;
//! assert_eq!(pole["pole_number"].as_str(), Some("P1"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use tracing::{debug, info};

use crate::backend::{Backend, Dialect, Executor, IdStrategy};
use crate::error::{BackendError, DbError, DbResult};
use crate::schema::{self, TableSchema};
use crate::statement::{Assignment, Statement};
use crate::value::{Data, Filters, Record, RowId, Value};

/// Options narrowing a select
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    /// Exact-match filters, ANDed
    pub filters: Filters,
    /// Columns left out of the returned records
    pub exclude: Vec<String>,
}

impl SelectQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an exact-match filter
    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(column.into(), value.into());
        self
    }

    /// Leave a column out of the result
    pub fn exclude(mut self, column: impl Into<String>) -> Self {
        self.exclude.push(column.into());
        self
    }
}

/// Failure inside a transaction: either the driver or a classified error
enum TxError {
    Backend(BackendError),
    Db(DbError),
}

impl From<BackendError> for TxError {
    fn from(err: BackendError) -> Self {
        TxError::Backend(err)
    }
}

/// CRUD operations over the registered tables
pub struct DataService<B: Backend> {
    backend: B,
    debug: bool,
}

impl<B: Backend> DataService<B> {
    /// Create a service on top of an open connection
    ///
    /// Database error messages are redacted unless debug mode is enabled.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            debug: false,
        }
    }

    /// Pass database diagnostics through to callers
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.backend.dialect()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_inner(self) -> B {
        self.backend
    }

    // ==================== Operations ====================

    /// Insert a row and return its generated id
    pub fn insert(&mut self, table: &str, data: Data) -> DbResult<RowId> {
        let schema = lookup(table)?;
        let values = resolve_columns(schema, data)?;

        let dialect = self.dialect();
        let stmt = Statement::insert(dialect, schema, values);
        debug!(sql = %stmt.sql, params = stmt.params.len(), "insert");

        let id = self.run_in_transaction(schema, |tx| match dialect.id_strategy() {
            IdStrategy::Returning => {
                let rows = tx.query(&stmt.sql, &stmt.params)?;
                rows.first()
                    .and_then(|row| row.get(schema.primary_key))
                    .and_then(Value::as_i64)
                    .ok_or_else(|| BackendError::new("insert did not return a row id").into())
            }
            IdStrategy::LastInsertId => {
                tx.execute(&stmt.sql, &stmt.params)?;
                Ok(tx.last_insert_id()?)
            }
        })?;

        info!(table = schema.name, id, "inserted row");
        Ok(id)
    }

    /// Update exactly one row
    ///
    /// Keys listed in `exclude` may not be updated; naming one is an
    /// `InvalidColumns` error. Fails with `EntryNotFound` when the id matches
    /// no row.
    pub fn update(
        &mut self,
        table: &str,
        id: RowId,
        new_data: Data,
        exclude: &[&str],
    ) -> DbResult<()> {
        let schema = lookup(table)?;

        let invalid = schema.invalid_columns(new_data.keys().map(String::as_str));
        if !invalid.is_empty() {
            return Err(DbError::invalid_columns(schema.name, invalid));
        }

        let protected: Vec<&str> = new_data
            .keys()
            .map(String::as_str)
            .filter(|k| exclude.contains(k))
            .collect();
        if !protected.is_empty() {
            return Err(DbError::invalid_columns(schema.name, protected));
        }

        if new_data.is_empty() {
            return Err(DbError::NoData {
                table: schema.name.to_string(),
            });
        }

        let set = resolve_columns(schema, new_data)?;
        let stmt = Statement::update(self.dialect(), schema, set, id);
        debug!(sql = %stmt.sql, params = stmt.params.len(), "update");

        self.execute_single_row(schema, id, &stmt)?;
        info!(table = schema.name, id, "updated row");
        Ok(())
    }

    /// Delete one row
    ///
    /// On soft-delete tables the row is deactivated instead. A row that is
    /// already inactive counts as not found.
    pub fn delete(&mut self, table: &str, id: RowId) -> DbResult<()> {
        let schema = lookup(table)?;

        let stmt = if schema.has_soft_delete() {
            Statement::deactivate(self.dialect(), schema, id)
        } else {
            Statement::delete(self.dialect(), schema, id)
        };
        debug!(sql = %stmt.sql, "delete");

        self.execute_single_row(schema, id, &stmt)?;
        info!(
            table = schema.name,
            id,
            soft = schema.has_soft_delete(),
            "deleted row"
        );
        Ok(())
    }

    /// Select the rows matching `query`
    ///
    /// Rows come back in database order. Soft-deleted rows are never
    /// returned.
    pub fn select(&mut self, table: &str, query: SelectQuery) -> DbResult<Vec<Record>> {
        self.select_rows(table, None, query)
    }

    /// Select a single row by id
    ///
    /// Additional filters in `query` still apply. Fails with `EntryNotFound`
    /// when nothing matches.
    pub fn select_by_id(&mut self, table: &str, id: RowId, query: SelectQuery) -> DbResult<Record> {
        self.select_rows(table, Some(id), query)?
            .into_iter()
            .next()
            .ok_or_else(|| DbError::entry_not_found(table, id))
    }

    /// Case-insensitive substring search on one column
    ///
    /// Scans every active row and filters in memory, keeping the order of
    /// [`select`](Self::select).
    pub fn search(&mut self, table: &str, column: &str, key: &str) -> DbResult<Vec<Record>> {
        let schema = lookup(table)?;
        let column = schema
            .column(column)
            .ok_or_else(|| DbError::invalid_columns(schema.name, [column]))?;

        let needle = key.to_uppercase();
        let rows = self.select(schema.name, SelectQuery::default())?;

        Ok(rows
            .into_iter()
            .filter(|row| {
                row.get(column)
                    .map_or(false, |v| v.search_text().to_uppercase().contains(&needle))
            })
            .collect())
    }

    // ==================== Internals ====================

    fn select_rows(
        &mut self,
        table: &str,
        id: Option<RowId>,
        query: SelectQuery,
    ) -> DbResult<Vec<Record>> {
        let schema = lookup(table)?;
        let SelectQuery {
            mut filters,
            exclude,
        } = query;

        if let Some(id) = id {
            filters.insert(schema.primary_key.to_string(), Value::Int(id));
        }

        let mut invalid = schema.invalid_columns(filters.keys().map(String::as_str));
        invalid.extend(schema.invalid_columns(exclude.iter().map(String::as_str)));
        if !invalid.is_empty() {
            return Err(DbError::invalid_columns(schema.name, invalid));
        }

        let projection: Vec<&'static str> = schema
            .columns
            .iter()
            .copied()
            .filter(|c| !exclude.iter().any(|e| e == c))
            .collect();
        if projection.is_empty() {
            return Err(DbError::invalid_columns(schema.name, exclude));
        }

        let filters = resolve_columns(schema, filters)?;
        let stmt = Statement::select(self.dialect(), schema, &projection, filters);
        debug!(sql = %stmt.sql, params = stmt.params.len(), "select");

        let debug = self.debug;
        self.backend
            .query(&stmt.sql, &stmt.params)
            .map_err(|e| DbError::database(schema.name, &e, debug))
    }

    /// Run a mutation that must affect exactly one row
    fn execute_single_row(
        &mut self,
        schema: &'static TableSchema,
        id: RowId,
        stmt: &Statement,
    ) -> DbResult<()> {
        self.run_in_transaction(schema, |tx| {
            let affected = tx.execute(&stmt.sql, &stmt.params)?;
            if affected != 1 {
                return Err(TxError::Db(DbError::entry_not_found(schema.name, id)));
            }
            Ok(())
        })
    }

    fn run_in_transaction<T, F>(&mut self, schema: &'static TableSchema, f: F) -> DbResult<T>
    where
        F: FnOnce(&mut dyn Executor) -> Result<T, TxError>,
    {
        let debug = self.debug;
        self.backend.transaction(f).map_err(|err| match err {
            TxError::Backend(e) => DbError::database(schema.name, &e, debug),
            TxError::Db(e) => e,
        })
    }
}

fn lookup(table: &str) -> DbResult<&'static TableSchema> {
    schema::table(table).ok_or_else(|| DbError::unknown_table(table))
}

/// Swap caller column names for registry identifiers
fn resolve_columns(schema: &'static TableSchema, data: Data) -> DbResult<Vec<Assignment>> {
    let invalid = schema.invalid_columns(data.keys().map(String::as_str));
    if !invalid.is_empty() {
        return Err(DbError::invalid_columns(schema.name, invalid));
    }

    Ok(data
        .into_iter()
        .filter_map(|(name, value)| schema.column(&name).map(|col| (col, value)))
        .collect())
}
