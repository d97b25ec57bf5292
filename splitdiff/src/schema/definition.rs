use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Definition of one table as reported by a tablet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    /// The `CREATE TABLE` statement of the table.
    pub schema: String,
    pub columns: Vec<String>,
    pub primary_key_columns: Vec<String>,
}

impl TableDefinition {
    pub fn new(
        name: impl Into<String>,
        columns: &[&str],
        primary_key_columns: &[&str],
    ) -> TableDefinition {
        let name = name.into();
        let schema = format!(
            "CREATE TABLE `{}` ({}, PRIMARY KEY ({}))",
            name,
            columns.join(", "),
            primary_key_columns.join(", ")
        );

        TableDefinition {
            name,
            schema,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            primary_key_columns: primary_key_columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Returns the columns in scan order: primary key columns first, then the others in
    /// definition order.
    pub fn ordered_columns(&self) -> Vec<String> {
        let mut ordered = self.primary_key_columns.clone();
        ordered.extend(
            self.columns
                .iter()
                .filter(|column| !self.primary_key_columns.contains(column))
                .cloned(),
        );

        ordered
    }
}

/// Schema of the database served by a tablet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// The `CREATE DATABASE` statement.
    pub database_schema: String,
    pub table_definitions: Vec<TableDefinition>,
}

impl SchemaDefinition {
    pub fn table_names(&self) -> Vec<&str> {
        self.table_definitions
            .iter()
            .map(|table| table.name.as_str())
            .collect()
    }
}

/// Compares two schemas and returns one human readable line per difference.
///
/// Tables are matched by name. Tables present on only one side are reported, as are column,
/// primary key and `CREATE TABLE` differences of tables present on both sides.
pub fn diff_schemas(
    left_name: &str,
    left: &SchemaDefinition,
    right_name: &str,
    right: &SchemaDefinition,
) -> Vec<String> {
    let mut differences = Vec::new();

    if left.database_schema != right.database_schema {
        differences.push(format!(
            "{left_name} and {right_name} don't agree on database creation command:\n{}\n differs from:\n{}",
            left.database_schema, right.database_schema
        ));
    }

    let left_tables: BTreeMap<&str, &TableDefinition> = left
        .table_definitions
        .iter()
        .map(|table| (table.name.as_str(), table))
        .collect();
    let right_tables: BTreeMap<&str, &TableDefinition> = right
        .table_definitions
        .iter()
        .map(|table| (table.name.as_str(), table))
        .collect();

    for (name, left_table) in &left_tables {
        let Some(right_table) = right_tables.get(name) else {
            differences.push(format!(
                "{left_name} has an extra table named {name}"
            ));
            continue;
        };

        if left_table.columns != right_table.columns {
            differences.push(format!(
                "{left_name} and {right_name} disagree on columns of table {name}: {:?} differs from {:?}",
                left_table.columns, right_table.columns
            ));
        }
        if left_table.primary_key_columns != right_table.primary_key_columns {
            differences.push(format!(
                "{left_name} and {right_name} disagree on primary key of table {name}: {:?} differs from {:?}",
                left_table.primary_key_columns, right_table.primary_key_columns
            ));
        }
        if left_table.schema != right_table.schema {
            differences.push(format!(
                "{left_name} and {right_name} disagree on schema for table {name}:\n{}\n differs from:\n{}",
                left_table.schema, right_table.schema
            ));
        }
    }

    for name in right_tables.keys() {
        if !left_tables.contains_key(name) {
            differences.push(format!(
                "{right_name} has an extra table named {name}"
            ));
        }
    }

    differences
}
