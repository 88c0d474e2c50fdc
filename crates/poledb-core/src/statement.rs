//! Parameterized statement builder
//!
//! SQL text is assembled from `&'static str` fragments only: keywords written
//! here and identifiers handed out by the schema registry. Every value goes
//! through [`StatementBuilder::push_param`], which appends a dialect
//! placeholder and records the value as a bound parameter.

use crate::backend::{Dialect, IdStrategy};
use crate::schema::{TableSchema, SOFT_DELETE_COLUMN};
use crate::value::{RowId, Value};

/// A column paired with the value bound to it
pub type Assignment = (&'static str, Value);

/// SQL text with its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Incremental builder for a [`Statement`]
#[derive(Debug)]
pub struct StatementBuilder {
    dialect: Dialect,
    sql: String,
    params: Vec<Value>,
}

impl StatementBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Append a keyword or a registry identifier
    pub fn push(&mut self, fragment: &'static str) -> &mut Self {
        self.sql.push_str(fragment);
        self
    }

    /// Append a placeholder bound to `value`
    pub fn push_param(&mut self, value: Value) -> &mut Self {
        self.params.push(value);
        let placeholder = self.dialect.placeholder(self.params.len());
        self.sql.push_str(&placeholder);
        self
    }

    /// Append a primary-key placeholder bound to `id`
    pub fn push_key_param(&mut self, id: RowId) -> &mut Self {
        self.params.push(Value::Int(id));
        let placeholder = self.dialect.key_placeholder(self.params.len());
        self.sql.push_str(&placeholder);
        self
    }

    /// Append identifiers separated by `, `
    pub fn push_list(&mut self, idents: &[&'static str]) -> &mut Self {
        for (i, ident) in idents.iter().copied().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push(ident);
        }
        self
    }

    /// Append `col = ?` pairs separated by `separator`
    pub fn push_assignments(
        &mut self,
        assignments: Vec<Assignment>,
        separator: &'static str,
    ) -> &mut Self {
        for (i, (column, value)) in assignments.into_iter().enumerate() {
            if i > 0 {
                self.push(separator);
            }
            self.push(column).push(" = ").push_param(value);
        }
        self
    }

    pub fn build(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }
}

impl Statement {
    /// `INSERT INTO t (cols) VALUES (params)`
    ///
    /// An empty assignment list inserts a row of defaults. On dialects that
    /// return generated ids from the statement itself, `RETURNING <pk>` is
    /// appended.
    pub fn insert(dialect: Dialect, table: &TableSchema, values: Vec<Assignment>) -> Self {
        let mut b = StatementBuilder::new(dialect);
        b.push("INSERT INTO ").push(table.name);

        if values.is_empty() {
            b.push(" DEFAULT VALUES");
        } else {
            let columns: Vec<&'static str> = values.iter().map(|(c, _)| *c).collect();
            b.push(" (").push_list(&columns).push(") VALUES (");
            for (i, (_, value)) in values.into_iter().enumerate() {
                if i > 0 {
                    b.push(", ");
                }
                b.push_param(value);
            }
            b.push(")");
        }

        if dialect.id_strategy() == IdStrategy::Returning {
            b.push(" RETURNING ").push(table.primary_key);
        }
        b.build()
    }

    /// `UPDATE t SET c1 = ?, ... WHERE t_id = ?`
    pub fn update(dialect: Dialect, table: &TableSchema, set: Vec<Assignment>, id: RowId) -> Self {
        let mut b = StatementBuilder::new(dialect);
        b.push("UPDATE ")
            .push(table.name)
            .push(" SET ")
            .push_assignments(set, ", ")
            .push(" WHERE ")
            .push(table.primary_key)
            .push(" = ")
            .push_key_param(id);
        b.build()
    }

    /// `DELETE FROM t WHERE t_id = ?`
    pub fn delete(dialect: Dialect, table: &TableSchema, id: RowId) -> Self {
        let mut b = StatementBuilder::new(dialect);
        b.push("DELETE FROM ")
            .push(table.name)
            .push(" WHERE ")
            .push(table.primary_key)
            .push(" = ")
            .push_key_param(id);
        b.build()
    }

    /// `UPDATE t SET is_active = FALSE WHERE t_id = ? AND is_active = TRUE`
    ///
    /// Already inactive rows are not matched, so deactivating twice affects
    /// zero rows the second time.
    pub fn deactivate(dialect: Dialect, table: &TableSchema, id: RowId) -> Self {
        let mut b = StatementBuilder::new(dialect);
        b.push("UPDATE ")
            .push(table.name)
            .push(" SET ")
            .push(SOFT_DELETE_COLUMN)
            .push(" = FALSE WHERE ")
            .push(table.primary_key)
            .push(" = ")
            .push_key_param(id)
            .push(" AND ")
            .push(SOFT_DELETE_COLUMN)
            .push(" = TRUE");
        b.build()
    }

    /// `SELECT cols FROM t [WHERE ...]`
    ///
    /// Filters are ANDed. An integer filter on the primary key is bound as a
    /// key parameter. On soft-delete tables only active rows are selected,
    /// with or without filters.
    pub fn select(
        dialect: Dialect,
        table: &TableSchema,
        projection: &[&'static str],
        filters: Vec<Assignment>,
    ) -> Self {
        let mut b = StatementBuilder::new(dialect);
        b.push("SELECT ")
            .push_list(projection)
            .push(" FROM ")
            .push(table.name);

        let has_filters = !filters.is_empty();
        for (i, (column, value)) in filters.into_iter().enumerate() {
            b.push(if i == 0 { " WHERE " } else { " AND " })
                .push(column)
                .push(" = ");
            match value {
                Value::Int(id) if column == table.primary_key => b.push_key_param(id),
                other => b.push_param(other),
            };
        }

        if table.has_soft_delete() {
            b.push(if has_filters { " AND " } else { " WHERE " })
                .push(SOFT_DELETE_COLUMN)
                .push(" = TRUE");
        }
        b.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{POLE, USER_ACCOUNT};

    #[test]
    fn test_insert_sqlite() {
        let stmt = Statement::insert(
            Dialect::Sqlite,
            &POLE,
            vec![("lat", Value::Float(1.0)), ("pole_number", Value::from("P1"))],
        );
        assert_eq!(stmt.sql, "INSERT INTO pole (lat, pole_number) VALUES (?1, ?2)");
        assert_eq!(stmt.params, vec![Value::Float(1.0), Value::from("P1")]);
    }

    #[test]
    fn test_insert_postgres_returns_id() {
        let stmt = Statement::insert(
            Dialect::Postgres,
            &USER_ACCOUNT,
            vec![("email", Value::from("a@b.c"))],
        );
        assert_eq!(
            stmt.sql,
            "INSERT INTO user_account (email) VALUES ($1) RETURNING user_account_id"
        );
    }

    #[test]
    fn test_insert_defaults() {
        let stmt = Statement::insert(Dialect::Sqlite, &POLE, vec![]);
        assert_eq!(stmt.sql, "INSERT INTO pole DEFAULT VALUES");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_update_binds_id_last() {
        let stmt = Statement::update(
            Dialect::Postgres,
            &POLE,
            vec![("lat", Value::Float(3.5)), ("long", Value::Float(4.5))],
            7,
        );
        assert_eq!(
            stmt.sql,
            "UPDATE pole SET lat = $1, long = $2 WHERE pole_id = CAST($3 AS BIGINT)"
        );
        assert_eq!(stmt.params.last(), Some(&Value::Int(7)));
    }

    #[test]
    fn test_postgres_key_binds_are_widened() {
        let big = 1_i64 << 40;

        let stmt = Statement::update(Dialect::Postgres, &POLE, vec![("lat", Value::Float(1.0))], big);
        assert_eq!(stmt.sql, "UPDATE pole SET lat = $1 WHERE pole_id = CAST($2 AS BIGINT)");
        assert_eq!(stmt.params[1], Value::Int(big));

        let stmt = Statement::delete(Dialect::Postgres, &POLE, big);
        assert_eq!(stmt.sql, "DELETE FROM pole WHERE pole_id = CAST($1 AS BIGINT)");

        let stmt = Statement::deactivate(Dialect::Postgres, &USER_ACCOUNT, big);
        assert_eq!(
            stmt.sql,
            "UPDATE user_account SET is_active = FALSE WHERE user_account_id = CAST($1 AS BIGINT) AND is_active = TRUE"
        );

        let stmt = Statement::select(
            Dialect::Postgres,
            &POLE,
            &["pole_id"],
            vec![("pole_id", Value::Int(big)), ("pole_number", Value::from("P1"))],
        );
        assert_eq!(
            stmt.sql,
            "SELECT pole_id FROM pole WHERE pole_id = CAST($1 AS BIGINT) AND pole_number = $2"
        );
    }

    #[test]
    fn test_delete_and_deactivate() {
        let stmt = Statement::delete(Dialect::Sqlite, &POLE, 3);
        assert_eq!(stmt.sql, "DELETE FROM pole WHERE pole_id = ?1");

        let stmt = Statement::deactivate(Dialect::Sqlite, &USER_ACCOUNT, 3);
        assert_eq!(
            stmt.sql,
            "UPDATE user_account SET is_active = FALSE WHERE user_account_id = ?1 AND is_active = TRUE"
        );
        assert_eq!(stmt.params, vec![Value::Int(3)]);
    }

    #[test]
    fn test_select_without_filters() {
        let stmt = Statement::select(Dialect::Sqlite, &POLE, POLE.columns, vec![]);
        assert_eq!(stmt.sql, "SELECT pole_id, pole_number, lat, long FROM pole");

        let stmt = Statement::select(Dialect::Sqlite, &USER_ACCOUNT, &["email"], vec![]);
        assert_eq!(
            stmt.sql,
            "SELECT email FROM user_account WHERE is_active = TRUE"
        );
    }

    #[test]
    fn test_select_with_filters() {
        let stmt = Statement::select(
            Dialect::Postgres,
            &USER_ACCOUNT,
            &["user_account_id", "email"],
            vec![("email", Value::from("x@y.z")), ("uid", Value::from("u1"))],
        );
        assert_eq!(
            stmt.sql,
            "SELECT user_account_id, email FROM user_account WHERE email = $1 AND uid = $2 AND is_active = TRUE"
        );
        assert_eq!(stmt.params.len(), 2);

        let stmt = Statement::select(
            Dialect::Sqlite,
            &POLE,
            &["pole_id"],
            vec![("pole_id", Value::Int(1))],
        );
        assert_eq!(stmt.sql, "SELECT pole_id FROM pole WHERE pole_id = ?1");
    }
}
