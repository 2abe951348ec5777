#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde_json::{Value as Json, json};

use seedbed_core::DatabaseSchema;
use seedbed_store::{Catalog, Mutation, RowFilter, Value};

pub fn load_golden(name: &str) -> DatabaseSchema {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/golden")
        .join(name);
    let contents =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing json at {}", path.display()));
    serde_json::from_str(&contents).expect("parse schema")
}

/// Columns given as `(name, data_type, nullable)`.
pub fn table(name: &str, columns: &[(&str, &str, bool)], constraints: Vec<Json>) -> Json {
    let columns: Vec<Json> = columns
        .iter()
        .enumerate()
        .map(|(index, (column, data_type, nullable))| {
            json!({
                "ordinal_position": index + 1,
                "name": column,
                "column_type": {"data_type": data_type},
                "is_nullable": nullable,
            })
        })
        .collect();
    json!({"name": name, "columns": columns, "constraints": constraints})
}

pub fn pk(columns: &[&str]) -> Json {
    json!({"kind": "primary_key", "columns": columns})
}

pub fn unique(columns: &[&str], nulls_distinct: bool) -> Json {
    json!({"kind": "unique", "columns": columns, "nulls_distinct": nulls_distinct})
}

pub fn fk(columns: &[&str], target: &str, referenced: &[&str]) -> Json {
    json!({
        "kind": "foreign_key",
        "columns": columns,
        "referenced_schema": "public",
        "referenced_table": target,
        "referenced_columns": referenced,
    })
}

pub fn schema(tables: Vec<Json>) -> DatabaseSchema {
    serde_json::from_value(json!({
        "schema_version": "0.1",
        "engine": "postgres",
        "schemas": [{"name": "public", "tables": tables}],
    }))
    .expect("schema")
}

type SimRow = BTreeMap<String, Value>;

/// Minimal database model that applies mutations in order and enforces
/// foreign keys and unique constraints at each statement, like an engine
/// with immediate constraint checking.
pub struct Simulator<'a> {
    catalog: &'a Catalog,
    pub tables: BTreeMap<String, Vec<SimRow>>,
}

impl<'a> Simulator<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            tables: BTreeMap::new(),
        }
    }

    pub fn apply_all(&mut self, mutations: &[Mutation]) -> Result<(), String> {
        for (index, mutation) in mutations.iter().enumerate() {
            self.apply(mutation)
                .map_err(|err| format!("statement {index}: {err}"))?;
        }
        Ok(())
    }

    pub fn apply(&mut self, mutation: &Mutation) -> Result<(), String> {
        match mutation {
            Mutation::Insert {
                schema,
                table,
                values,
                ..
            } => {
                let key = format!("{schema}.{table}");
                let row: SimRow = values
                    .iter()
                    .map(|a| (a.column.clone(), a.value.clone()))
                    .collect();
                self.tables.entry(key.clone()).or_default().push(row);
                let index = self.tables[&key].len() - 1;
                self.check(&key, index)
            }
            Mutation::Update {
                schema,
                table,
                set,
                filter,
                ..
            } => {
                let key = format!("{schema}.{table}");
                let rows = self.tables.get(&key).ok_or("update of empty table")?;
                let index = rows
                    .iter()
                    .position(|row| matches(row, filter))
                    .ok_or_else(|| format!("update matched no row in {key}"))?;
                let row = self
                    .tables
                    .get_mut(&key)
                    .and_then(|rows| rows.get_mut(index))
                    .ok_or("row vanished")?;
                for assignment in set {
                    row.insert(assignment.column.clone(), assignment.value.clone());
                }
                self.check(&key, index)
            }
        }
    }

    pub fn rows(&self, table: &str) -> &[SimRow] {
        self.tables
            .get(&format!("public.{table}"))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn check(&self, key: &str, index: usize) -> Result<(), String> {
        let id = self.catalog.resolve(key).map_err(|err| err.to_string())?;
        let definition = self.catalog.table(id);
        let row = &self.tables[key][index];

        for fk in self.catalog.foreign_keys(id) {
            let values: Option<Vec<&Value>> = fk
                .foreign_key
                .columns
                .iter()
                .map(|column| row.get(column).filter(|value| !value.is_null()))
                .collect();
            let Some(values) = values else { continue };
            let target = self.catalog.qualified_name(fk.target);
            let found = self.tables.get(&target).into_iter().flatten().any(|other| {
                fk.foreign_key
                    .referenced_columns
                    .iter()
                    .zip(&values)
                    .all(|(column, value)| other.get(column) == Some(*value))
            });
            if !found {
                return Err(format!(
                    "foreign key {:?} of {key} points at a missing {target} row",
                    fk.foreign_key.columns
                ));
            }
        }

        let mut keys: Vec<(&Vec<String>, bool)> = Vec::new();
        if let Some(pk) = definition.primary_key() {
            keys.push((&pk.columns, true));
        }
        for constraint in definition.unique_constraints() {
            keys.push((&constraint.columns, constraint.nulls_distinct));
        }
        for (columns, nulls_distinct) in keys {
            let tuple: Vec<Value> = columns
                .iter()
                .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
                .collect();
            if nulls_distinct && tuple.iter().any(Value::is_null) {
                continue;
            }
            let duplicates = self.tables[key]
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != index)
                .any(|(_, other)| {
                    columns
                        .iter()
                        .zip(&tuple)
                        .all(|(column, value)| other.get(column).cloned().unwrap_or(Value::Null) == *value)
                });
            if duplicates {
                return Err(format!("unique {columns:?} violated in {key}"));
            }
        }

        Ok(())
    }
}

fn matches(row: &SimRow, filter: &RowFilter) -> bool {
    let equal = |column: &String, value: &Value| {
        row.get(column).cloned().unwrap_or(Value::Null) == *value
    };
    match filter {
        RowFilter::Key(key) => key.iter().all(|a| equal(&a.column, &a.value)),
        RowFilter::Identity {
            matching, pending, ..
        } => {
            matching.iter().all(|a| equal(&a.column, &a.value))
                && pending.iter().all(|column| equal(column, &Value::Null))
        }
    }
}
