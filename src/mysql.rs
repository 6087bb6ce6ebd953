mod read;
mod schema;
mod write;

pub use read::read_rows;
pub use schema::{get_mysql_columns, get_table_metadata, list_tables};
pub use write::{
    delete_keys, write_positional, write_to_table, WriteOptions, WritePolicy, WriteSummary,
};
