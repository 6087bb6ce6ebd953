//! Core types for the dolt-sync framework.
//!
//! This crate provides the backend-neutral data model shared by the sync
//! engine and the database-specific crates:
//!
//! - [`SqlValue`] - A single scalar cell value
//! - [`Row`] - A row keyed by column name
//! - [`PositionalRows`] - Positional tuples paired with an explicit column order
//! - [`TableMetadata`] / [`Column`] / [`ColumnType`] - Table schema information
//! - [`ColumnMapping`] - Name-based column alignment between two tables
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── mysql-types   (converts SqlValue <-> mysql_async::Value, generates SQL)
//!    │
//!    └─── dolt-sync     (introspection, row writer, sync engine, Dolt server context)
//! ```
//!
//! # Example
//!
//! ```rust
//! use sync_core::{PositionalRows, SqlValue};
//!
//! let mut tuples = PositionalRows::new(vec!["name".to_string(), "id".to_string()]);
//! tuples.push(vec![SqlValue::from("Alice"), SqlValue::Int(1)]).unwrap();
//!
//! let rows = tuples.into_rows().unwrap();
//! assert_eq!(rows[0].get("id"), Some(&SqlValue::Int(1)));
//! ```

pub mod mapping;
pub mod schema;
pub mod values;

pub use mapping::ColumnMapping;
pub use schema::{Column, ColumnType, SchemaError, TableMetadata};
pub use values::{PositionalRows, Row, SqlValue};
