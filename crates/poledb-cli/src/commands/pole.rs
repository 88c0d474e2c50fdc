//! Pole command handlers

use anyhow::Result;

use poledb_core::{data, Backend, DataService};

use super::parse_filters;
use crate::output::Output;

const TABLE: &str = "pole";

/// Create a new pole
pub fn create<B: Backend>(
    service: &mut DataService<B>,
    number: String,
    lat: f64,
    long: f64,
    output: &Output,
) -> Result<()> {
    let id = service.insert(
        TABLE,
        data! {
            "pole_number" => number,
            "lat" => lat,
            "long" => long,
        },
    )?;

    output.created("pole", id);
    Ok(())
}

/// List poles
///
/// `--number` searches pole numbers instead of matching filters exactly.
pub fn list<B: Backend>(
    service: &mut DataService<B>,
    filters: &[String],
    number: Option<String>,
    output: &Output,
) -> Result<()> {
    let poles = match number {
        Some(ref key) => service.search(TABLE, "pole_number", key)?,
        None => service.select(TABLE, parse_filters(filters)?)?,
    };

    output.print_records(TABLE, &poles);
    Ok(())
}

/// Search poles by number
pub fn search<B: Backend>(service: &mut DataService<B>, key: &str, output: &Output) -> Result<()> {
    let poles = service.search(TABLE, "pole_number", key)?;
    output.print_records(TABLE, &poles);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use poledb_core::{SelectQuery, SqliteBackend, Value};

    fn quiet() -> Output {
        Output::new(OutputFormat::Quiet)
    }

    #[test]
    fn test_create_and_list() {
        let mut service = DataService::new(SqliteBackend::open_in_memory().unwrap());

        create(&mut service, "P-100".to_string(), -1.5, 36.8, &quiet()).unwrap();
        create(&mut service, "Q-200".to_string(), 0.0, 0.0, &quiet()).unwrap();

        let poles = service.select(TABLE, SelectQuery::default()).unwrap();
        assert_eq!(poles.len(), 2);
        assert_eq!(poles[0]["lat"], Value::Float(-1.5));

        list(&mut service, &[], Some("p-1".to_string()), &quiet()).unwrap();
        list(&mut service, &["pole_number=Q-200".to_string()], None, &quiet()).unwrap();
    }

    #[test]
    fn test_list_rejects_unknown_filter_column() {
        let mut service = DataService::new(SqliteBackend::open_in_memory().unwrap());
        let err = list(&mut service, &["height=3".to_string()], None, &quiet()).unwrap_err();
        assert!(err.to_string().contains("height"));
    }
}
