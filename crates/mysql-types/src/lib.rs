//! MySQL type conversions for sync-core types.
//!
//! This crate provides bidirectional value conversions between sync-core's
//! `SqlValue` and MySQL's native values, as well as SQL text generation.
//! Dolt speaks the MySQL wire protocol, so both ends of a sync go through here.
//!
//! # Structure
//!
//! - `forward`: Convert `SqlValue` → `mysql_async::Value` (for statement parameters)
//! - `reverse`: Convert MySQL values and rows → `SqlValue` / `Row` (for reading data)
//! - `ddl`: Generate CREATE TABLE, INSERT, upsert, DELETE and paging SELECT statements
//! - `schema`: MySQL INFORMATION_SCHEMA column type to `ColumnType` conversion
//!
//! # Example
//!
//! ```rust
//! use mysql_types::{mysql_column_to_column_type, MySQLDdl};
//! use sync_core::ColumnType;
//!
//! let ddl = MySQLDdl;
//! assert_eq!(ddl.column_type(&ColumnType::Bool), "TINYINT(1)");
//!
//! let ct = mysql_column_to_column_type("INT", "int(11)", None, None);
//! assert_eq!(ct, ColumnType::Int);
//! ```

pub mod ddl;
pub mod forward;
pub mod reverse;
pub mod schema;

pub use ddl::{quote_identifier, quote_literal, MySQLDdl};
pub use forward::{to_params, MySQLValue};
pub use reverse::{row_to_sql_row, ConversionError, MySQLValueWithSchema};
pub use schema::mysql_column_to_column_type;
