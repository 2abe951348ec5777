//! Schema builders shared by unit tests.

use seedbed_core::{
    Column, ColumnType, Constraint, DatabaseSchema, ForeignKey, PrimaryKey, Schema, Table,
    TableKind, UniqueConstraint,
};

pub(crate) fn schema(tables: Vec<Table>) -> DatabaseSchema {
    DatabaseSchema {
        schema_version: seedbed_core::SCHEMA_VERSION.to_string(),
        engine: "postgres".to_string(),
        database: None,
        schemas: vec![Schema {
            name: "public".to_string(),
            tables,
        }],
        enums: Vec::new(),
    }
}

/// Integer columns given as `(name, nullable)`.
pub(crate) fn table(name: &str, columns: &[(&str, bool)], constraints: Vec<Constraint>) -> Table {
    Table {
        name: name.to_string(),
        kind: TableKind::Table,
        columns: columns
            .iter()
            .enumerate()
            .map(|(index, (column, nullable))| Column {
                ordinal_position: index as i16 + 1,
                name: column.to_string(),
                column_type: ColumnType::named("integer"),
                is_nullable: *nullable,
                default: None,
                identity: None,
                generated: None,
            })
            .collect(),
        constraints,
    }
}

/// Give the listed columns a server default.
pub(crate) fn with_defaults(mut table: Table, columns: &[&str]) -> Table {
    for column in &mut table.columns {
        if columns.contains(&column.name.as_str()) {
            column.default = Some("0".to_string());
        }
    }
    table
}

fn names(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|column| column.to_string()).collect()
}

pub(crate) fn pk(columns: &[&str]) -> Constraint {
    Constraint::PrimaryKey(PrimaryKey {
        name: None,
        columns: names(columns),
    })
}

pub(crate) fn unique(columns: &[&str], nulls_distinct: bool) -> Constraint {
    Constraint::Unique(UniqueConstraint {
        name: None,
        columns: names(columns),
        nulls_distinct,
    })
}

pub(crate) fn fk(columns: &[&str], target: &str, referenced: &[&str]) -> Constraint {
    Constraint::ForeignKey(ForeignKey {
        name: None,
        columns: names(columns),
        referenced_schema: "public".to_string(),
        referenced_table: target.to_string(),
        referenced_columns: names(referenced),
    })
}
