use std::collections::{BTreeMap, BTreeSet};

use crate::constraints::Constraint;
use crate::error::{Error, Result};
use crate::schema::DatabaseSchema;

/// Validate internal consistency of a database schema.
///
/// This checks:
/// - duplicate schemas/tables/columns
/// - key and unique columns exist, with at most one primary key per table
/// - foreign key columns and referenced targets exist
/// - foreign key source/target arity matches
/// - foreign keys reference a primary key or unique constraint
pub fn validate_schema(schema: &DatabaseSchema) -> Result<()> {
    let mut catalog: BTreeMap<&str, BTreeMap<&str, BTreeSet<&str>>> = BTreeMap::new();

    for db_schema in &schema.schemas {
        if catalog.contains_key(db_schema.name.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate schema name: {}",
                db_schema.name
            )));
        }

        let mut tables = BTreeMap::new();
        for table in &db_schema.tables {
            if tables.contains_key(table.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate table name: {}.{}",
                    db_schema.name, table.name
                )));
            }

            let mut columns = BTreeSet::new();
            for column in &table.columns {
                if !columns.insert(column.name.as_str()) {
                    return Err(Error::InvalidSchema(format!(
                        "duplicate column name: {}.{}.{}",
                        db_schema.name, table.name, column.name
                    )));
                }
            }

            tables.insert(table.name.as_str(), columns);
        }

        catalog.insert(db_schema.name.as_str(), tables);
    }

    for (schema_name, table) in schema.tables() {
        let columns = catalog
            .get(schema_name)
            .and_then(|tables| tables.get(table.name.as_str()))
            .ok_or_else(|| {
                Error::InvalidSchema(format!(
                    "missing table in catalog: {schema_name}.{}",
                    table.name
                ))
            })?;
        let check_columns = |kind: &str, names: &[String]| -> Result<()> {
            if names.is_empty() {
                return Err(Error::InvalidSchema(format!(
                    "{kind} without columns on {schema_name}.{}",
                    table.name
                )));
            }
            for column in names {
                if !columns.contains(column.as_str()) {
                    return Err(Error::InvalidSchema(format!(
                        "{kind} column not found: {schema_name}.{}.{column}",
                        table.name
                    )));
                }
            }
            Ok(())
        };

        let mut primary_keys = 0;
        for constraint in &table.constraints {
            match constraint {
                Constraint::PrimaryKey(pk) => {
                    primary_keys += 1;
                    check_columns("primary key", &pk.columns)?;
                }
                Constraint::Unique(unique) => check_columns("unique", &unique.columns)?,
                Constraint::ForeignKey(fk) => {
                    check_columns("foreign key", &fk.columns)?;

                    let target = schema
                        .table(&fk.referenced_schema, &fk.referenced_table)
                        .ok_or_else(|| {
                            Error::InvalidSchema(format!(
                                "referenced table not found: {}.{}",
                                fk.referenced_schema, fk.referenced_table
                            ))
                        })?;

                    if fk.columns.len() != fk.referenced_columns.len() {
                        return Err(Error::InvalidSchema(format!(
                            "foreign key arity mismatch on {schema_name}.{}: {} columns reference {} columns",
                            table.name,
                            fk.columns.len(),
                            fk.referenced_columns.len()
                        )));
                    }

                    for column in &fk.referenced_columns {
                        if target.column(column).is_none() {
                            return Err(Error::InvalidSchema(format!(
                                "referenced column not found: {}.{}.{}",
                                fk.referenced_schema, fk.referenced_table, column
                            )));
                        }
                    }

                    let referenced: BTreeSet<&str> =
                        fk.referenced_columns.iter().map(String::as_str).collect();
                    let same_columns = |names: &[String]| {
                        names.len() == referenced.len()
                            && names.iter().all(|name| referenced.contains(name.as_str()))
                    };
                    let is_key = target
                        .primary_key()
                        .map(|pk| same_columns(&pk.columns))
                        .unwrap_or(false)
                        || target
                            .unique_constraints()
                            .any(|unique| same_columns(&unique.columns));
                    if !is_key {
                        return Err(Error::InvalidSchema(format!(
                            "foreign key on {schema_name}.{} must reference a primary key or unique constraint of {}.{}",
                            table.name, fk.referenced_schema, fk.referenced_table
                        )));
                    }
                }
                Constraint::Check(_) => {}
            }
        }

        if primary_keys > 1 {
            return Err(Error::InvalidSchema(format!(
                "multiple primary keys on {schema_name}.{}",
                table.name
            )));
        }
    }

    Ok(())
}
