//! Command handlers
//!
//! `show`, `update` and `delete` work the same way on every table and live
//! here. Table-specific commands are in their own modules.

pub mod config;
pub mod pole;
pub mod user;

use anyhow::{bail, Result};

use poledb_core::{schema, Backend, Data, DataService, DbError, RowId, SelectQuery, Value};

use crate::output::Output;

/// Parse `column=value` arguments
///
/// Values are read as literals: `null`, `true`/`false`, integers, floats,
/// anything else is text. A later assignment to the same column wins.
pub fn parse_assignments(args: &[String]) -> Result<Data> {
    let mut data = Data::new();
    for arg in args {
        let Some((column, raw)) = arg.split_once('=') else {
            bail!("Invalid assignment '{}'. Expected column=value", arg);
        };
        let column = column.trim();
        if column.is_empty() {
            bail!("Invalid assignment '{}'. Column name is empty", arg);
        }
        data.insert(column.to_string(), Value::parse_literal(raw));
    }
    Ok(data)
}

/// Build a select from `--filter column=value` arguments
pub fn parse_filters(args: &[String]) -> Result<SelectQuery> {
    Ok(SelectQuery {
        filters: parse_assignments(args)?,
        ..SelectQuery::default()
    })
}

/// Name shown to users for a table's rows
pub fn entity_name(table: &str) -> &str {
    match table {
        "user_account" => "user",
        other => other,
    }
}

/// Show a single row
pub fn show<B: Backend>(
    service: &mut DataService<B>,
    table: &str,
    id: RowId,
    output: &Output,
) -> Result<()> {
    let record = service.select_by_id(table, id, SelectQuery::default())?;
    output.print_record(table, &record);
    Ok(())
}

/// Update a row; the primary key cannot be changed
pub fn update<B: Backend>(
    service: &mut DataService<B>,
    table: &str,
    id: RowId,
    assignments: &[String],
    output: &Output,
) -> Result<()> {
    let data = parse_assignments(assignments)?;
    let Some(schema) = schema::table(table) else {
        return Err(DbError::unknown_table(table).into());
    };

    service.update(table, id, data, &[schema.primary_key])?;
    output.success(&format!(
        "The {} with id {} has been updated successfully",
        entity_name(table),
        id
    ));
    Ok(())
}

/// Delete a row (soft delete where the table supports it)
pub fn delete<B: Backend>(
    service: &mut DataService<B>,
    table: &str,
    id: RowId,
    output: &Output,
) -> Result<()> {
    service.delete(table, id)?;
    output.success(&format!(
        "The {} with id {} has been deleted successfully",
        entity_name(table),
        id
    ));
    Ok(())
}
