//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use poledb_core::{status, valid_columns, DbError, Record, RowId};
use serde::Serialize;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a single record
    pub fn print_record(&self, table: &str, record: &Record) {
        match self.format {
            OutputFormat::Human => {
                let columns = ordered_columns(table, record);
                let width = columns.iter().map(|c| c.len()).max().unwrap_or(0);
                for column in columns {
                    println!("{:<width$}  {}", column, record[column], width = width);
                }
            }
            OutputFormat::Json => println!("{}", to_json(record)),
            OutputFormat::Quiet => {
                if let Some(id) = primary_key_value(table, record) {
                    println!("{}", id);
                }
            }
        }
    }

    /// Print a list of records as a table
    pub fn print_records(&self, table: &str, records: &[Record]) {
        match self.format {
            OutputFormat::Human => {
                if records.is_empty() {
                    println!("No {} entries found.", table);
                    return;
                }

                let columns = ordered_columns(table, &records[0]);
                let cells: Vec<Vec<String>> = records
                    .iter()
                    .map(|r| {
                        columns
                            .iter()
                            .map(|c| r.get(*c).map(|v| truncate(&v.to_string(), 32)).unwrap_or_default())
                            .collect()
                    })
                    .collect();

                let widths: Vec<usize> = columns
                    .iter()
                    .enumerate()
                    .map(|(i, c)| {
                        cells
                            .iter()
                            .map(|row| row[i].chars().count())
                            .chain(std::iter::once(c.len()))
                            .max()
                            .unwrap_or(0)
                    })
                    .collect();

                println!("{}", format_row(columns.iter().map(|c| c.to_string()), &widths));
                for row in cells {
                    println!("{}", format_row(row.into_iter(), &widths));
                }
                println!("\n{} {}(s)", records.len(), table);
            }
            OutputFormat::Json => println!("{}", to_json(&records)),
            OutputFormat::Quiet => {
                for record in records {
                    if let Some(id) = primary_key_value(table, record) {
                        println!("{}", id);
                    }
                }
            }
        }
    }

    /// Report a newly created row
    pub fn created(&self, entity: &str, id: RowId) {
        match self.format {
            OutputFormat::Human => println!("✓ The {} has been added successfully (id {})", entity, id),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "status": status::CREATED,
                        "message": format!("The {} has been added successfully", entity),
                        "id": id
                    })
                );
            }
            OutputFormat::Quiet => println!("{}", id),
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": status::OK, "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a failure, with its status code when it came from the data layer
    pub fn error(&self, err: &anyhow::Error) {
        let status = err
            .downcast_ref::<DbError>()
            .map(DbError::status_code)
            .unwrap_or(status::INTERNAL_ERROR);

        match self.format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": status, "message": format!("{:#}", err)})
                );
            }
            OutputFormat::Human | OutputFormat::Quiet => eprintln!("Error: {:#}", err),
        }
    }
}

/// Columns present in `record`, in schema order
fn ordered_columns<'a>(table: &str, record: &'a Record) -> Vec<&'a str> {
    let schema_order = valid_columns(table);
    let mut columns: Vec<&str> = record.keys().map(String::as_str).collect();
    columns.sort_by_key(|c| {
        schema_order
            .iter()
            .position(|s| s == c)
            .unwrap_or(usize::MAX)
    });
    columns
}

fn primary_key_value(table: &str, record: &Record) -> Option<String> {
    record
        .get(&format!("{}_id", table))
        .map(|v| v.to_string())
}

fn format_row(cells: impl Iterator<Item = String>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| serde_json::json!({"message": e.to_string()}).to_string())
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poledb_core::{data, Value};

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
    }

    #[test]
    fn test_ordered_columns_follow_schema() {
        let record = data! {
            "long" => 2.0,
            "pole_id" => 1,
            "lat" => 1.0,
            "pole_number" => "P1",
        };
        assert_eq!(
            ordered_columns("pole", &record),
            vec!["pole_id", "pole_number", "lat", "long"]
        );
    }

    #[test]
    fn test_primary_key_value() {
        let record = data! { "user_account_id" => 4, "email" => Value::Null };
        assert_eq!(primary_key_value("user_account", &record), Some("4".to_string()));
        assert_eq!(primary_key_value("pole", &record), None);
    }

    #[test]
    fn test_format_row() {
        let row = format_row(
            vec!["1".to_string(), "P1".to_string()].into_iter(),
            &[3, 4],
        );
        assert_eq!(row, "1   | P1");
    }
}
