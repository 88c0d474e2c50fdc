//! poledb Core Library
//!
//! Generic CRUD access to the `pole` and `user_account` tables over SQLite
//! (development) or PostgreSQL (production).
//!
//! # Architecture
//!
//! - **Schema registry**: static table → column mapping used to validate
//!   every column name before any SQL is built
//! - **Statement builder**: SQL text from registry identifiers, values always
//!   bound as parameters
//! - **Backends**: dialect differences (placeholders, generated ids) and
//!   scoped transactions
//! - **Data service**: insert/select/update/delete/search with soft-delete
//!   handling and typed errors
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let mut service = DataService::new(Database::open(&config)?).with_debug(config.debug);
//!
//! let id = service.insert("pole", data! { "pole_number" => "P1", "lat" => 1.0, "long" => 2.0 })?;
//! let pole = service.select_by_id("pole", id, SelectQuery::default())?;
//! ```
//!
//! # Modules
//!
//! - `service`: CRUD operations (main entry point)
//! - `schema`: registered tables and columns
//! - `statement`: parameterized SQL construction
//! - `backend`: SQLite and PostgreSQL connections
//! - `value`: column values and records
//! - `error`: error taxonomy and status codes
//! - `config`: application configuration

pub mod backend;
pub mod config;
pub mod error;
pub mod schema;
pub mod service;
pub mod statement;
pub mod value;

pub use backend::{Backend, Database, Dialect, PostgresBackend, SqliteBackend};
pub use config::{BackendKind, Config};
pub use error::{status, BackendError, DbError, DbResult};
pub use schema::{invalid_columns, is_valid_table, valid_columns, TableSchema};
pub use service::{DataService, SelectQuery};
pub use value::{Data, Filters, Record, RowId, Value};
