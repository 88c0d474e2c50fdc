//! User account command handlers

use anyhow::Result;

use poledb_core::{Backend, DataService, DbError};

use super::{parse_assignments, parse_filters};
use crate::output::Output;

const TABLE: &str = "user_account";

/// Create a user account from `column=value` arguments
pub fn create<B: Backend>(
    service: &mut DataService<B>,
    assignments: &[String],
    output: &Output,
) -> Result<()> {
    let data = parse_assignments(assignments)?;
    if data.is_empty() {
        return Err(DbError::NoData {
            table: TABLE.to_string(),
        }
        .into());
    }

    let id = service.insert(TABLE, data)?;
    output.created("user", id);
    Ok(())
}

/// List active user accounts
pub fn list<B: Backend>(
    service: &mut DataService<B>,
    filters: &[String],
    output: &Output,
) -> Result<()> {
    let users = service.select(TABLE, parse_filters(filters)?)?;
    output.print_records(TABLE, &users);
    Ok(())
}

/// Case-insensitive search on one column
pub fn search<B: Backend>(
    service: &mut DataService<B>,
    key: &str,
    column: &str,
    output: &Output,
) -> Result<()> {
    let users = service.search(TABLE, column, key)?;
    output.print_records(TABLE, &users);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use poledb_core::{status, SelectQuery, SqliteBackend};

    fn quiet() -> Output {
        Output::new(OutputFormat::Quiet)
    }

    #[test]
    fn test_create_without_data_is_no_input() {
        let mut service = DataService::new(SqliteBackend::open_in_memory().unwrap());

        let err = create(&mut service, &[], &quiet()).unwrap_err();
        let db_err = err.downcast_ref::<DbError>().unwrap();
        assert_eq!(db_err.status_code(), status::NO_INPUT);

        let users = service.select(TABLE, SelectQuery::default()).unwrap();
        assert!(users.is_empty());
    }

    #[test]
    fn test_create_then_search() {
        let mut service = DataService::new(SqliteBackend::open_in_memory().unwrap());
        create(
            &mut service,
            &["full_name=Alice Smith".to_string(), "email=alice@example.com".to_string()],
            &quiet(),
        )
        .unwrap();

        let found = service.search(TABLE, "full_name", "alice").unwrap();
        assert_eq!(found.len(), 1);

        search(&mut service, "ALICE", "full_name", &quiet()).unwrap();
        assert!(search(&mut service, "x", "nickname", &quiet()).is_err());
    }

    #[test]
    fn test_list_hides_deleted_users() {
        let mut service = DataService::new(SqliteBackend::open_in_memory().unwrap());
        create(&mut service, &["email=a@b.c".to_string()], &quiet()).unwrap();
        create(&mut service, &["email=d@e.f".to_string()], &quiet()).unwrap();

        let users = service.select(TABLE, SelectQuery::default()).unwrap();
        let first = users[0]["user_account_id"].as_i64().unwrap();
        service.delete(TABLE, first).unwrap();

        let users = service.select(TABLE, SelectQuery::default()).unwrap();
        assert_eq!(users.len(), 1);
        list(&mut service, &[], &quiet()).unwrap();
    }
}
