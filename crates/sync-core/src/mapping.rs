//! Column alignment between a source and a target table.

use crate::schema::{SchemaError, TableMetadata};
use crate::values::Row;
use std::collections::BTreeMap;

/// Pairs of (source column, target column) used to reshape source rows
/// before they are written to the target.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    pairs: Vec<(String, String)>,
    /// Source columns with no counterpart in the target
    dropped: Vec<String>,
    /// Target columns nothing maps onto; they keep their defaults
    unmapped: Vec<String>,
}

impl ColumnMapping {
    /// Map every source column onto the target column of the same name.
    pub fn by_name(source: &TableMetadata, target: &TableMetadata) -> Result<Self, SchemaError> {
        Self::with_renames(source, target, &BTreeMap::new())
    }

    /// Map by name, except for the explicit `source -> target` renames.
    ///
    /// A rename whose source or target column does not exist is an error;
    /// an empty resulting mapping is an error too.
    pub fn with_renames(
        source: &TableMetadata,
        target: &TableMetadata,
        renames: &BTreeMap<String, String>,
    ) -> Result<Self, SchemaError> {
        for (from, to) in renames {
            if !source.has_column(from) {
                return Err(SchemaError::ColumnNotFound {
                    table: source.name().to_string(),
                    column: from.clone(),
                });
            }
            if !target.has_column(to) {
                return Err(SchemaError::ColumnNotFound {
                    table: target.name().to_string(),
                    column: to.clone(),
                });
            }
        }

        let mut pairs = Vec::new();
        let mut dropped = Vec::new();
        for column in source.columns() {
            let target_name = renames.get(&column.name).unwrap_or(&column.name);
            if target.has_column(target_name) {
                pairs.push((column.name.clone(), target_name.clone()));
            } else {
                dropped.push(column.name.clone());
            }
        }

        if pairs.is_empty() {
            return Err(SchemaError::NoCommonColumns {
                source_table: source.name().to_string(),
                target_table: target.name().to_string(),
            });
        }

        let unmapped = target
            .columns()
            .iter()
            .filter(|c| !pairs.iter().any(|(_, to)| *to == c.name))
            .map(|c| c.name.clone())
            .collect();

        Ok(Self {
            pairs,
            dropped,
            unmapped,
        })
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn dropped_source_columns(&self) -> &[String] {
        &self.dropped
    }

    pub fn unmapped_target_columns(&self) -> &[String] {
        &self.unmapped
    }

    /// Source column names that are read.
    pub fn source_columns(&self) -> Vec<&str> {
        self.pairs.iter().map(|(from, _)| from.as_str()).collect()
    }

    /// Reshape a source row into a target row. Columns absent from the
    /// source row are left out rather than set to NULL.
    pub fn project(&self, row: &Row) -> Row {
        self.pairs
            .iter()
            .filter_map(|(from, to)| row.get(from).map(|v| (to.clone(), v.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnType};
    use crate::values::SqlValue;

    fn table(name: &str, columns: &[&str]) -> TableMetadata {
        TableMetadata::new(
            name,
            columns
                .iter()
                .map(|c| Column::new(*c, ColumnType::Text))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_by_name_drops_source_only_columns() {
        let source = table("src", &["id", "name", "legacy"]);
        let target = table("dst", &["name", "id", "created_at"]);

        let mapping = ColumnMapping::by_name(&source, &target).unwrap();
        assert_eq!(mapping.source_columns(), vec!["id", "name"]);
        assert_eq!(mapping.dropped_source_columns(), ["legacy"]);
        assert_eq!(mapping.unmapped_target_columns(), ["created_at"]);
    }

    #[test]
    fn test_renames_take_precedence() {
        let source = table("src", &["id", "full_name"]);
        let target = table("dst", &["id", "name"]);
        let renames = BTreeMap::from([("full_name".to_string(), "name".to_string())]);

        let mapping = ColumnMapping::with_renames(&source, &target, &renames).unwrap();
        let row = Row::new().with("id", 1).with("full_name", "Roger Federer");
        let projected = mapping.project(&row);

        assert_eq!(projected.get("name"), Some(&SqlValue::from("Roger Federer")));
        assert!(!projected.contains_column("full_name"));
    }

    #[test]
    fn test_rename_to_missing_column_fails() {
        let source = table("src", &["id"]);
        let target = table("dst", &["id"]);
        let renames = BTreeMap::from([("id".to_string(), "key".to_string())]);

        let err = ColumnMapping::with_renames(&source, &target, &renames).unwrap_err();
        assert_eq!(
            err,
            SchemaError::ColumnNotFound {
                table: "dst".into(),
                column: "key".into()
            }
        );
    }

    #[test]
    fn test_disjoint_tables_fail() {
        let err = ColumnMapping::by_name(&table("a", &["x"]), &table("b", &["y"])).unwrap_err();
        assert!(matches!(err, SchemaError::NoCommonColumns { .. }));
    }

    #[test]
    fn test_project_keeps_only_present_columns() {
        let source = table("src", &["id", "name"]);
        let mapping = ColumnMapping::by_name(&source, &source).unwrap();
        let key = Row::new().with("id", 3);
        assert_eq!(mapping.project(&key), Row::new().with("id", 3));
    }
}
