//! JSON rows file loading.
//!
//! ```json
//! [
//!   {"table": "customer", "label": "ada", "values": {"id": 1, "name": "Ada"}},
//!   {"table": "order", "values": {
//!     "customer_id": {"$ref": {"row": "ada", "column": "id"}},
//!     "placed_at": {"$unset": true}
//!   }}
//! ]
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value as Json;
use tracing::debug;

use seedbed_core::{DatabaseSchema, TypeTag};
use seedbed_store::{Field, RowHandle, SeedStore, StoreOptions, Value};

use crate::errors::{CliError, CliResult};

/// One row of the rows file.
#[derive(Debug, Clone, Deserialize)]
pub struct RowSpec {
    pub table: String,
    /// Name other rows use in `$ref` to point at this one.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub values: BTreeMap<String, Json>,
}

#[derive(Debug, Deserialize)]
struct RefSpec {
    row: String,
    column: String,
}

pub fn read_schema(path: &Path) -> CliResult<DatabaseSchema> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn read_rows(path: &Path) -> CliResult<Vec<RowSpec>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Add every row to `store` in file order and return the labelled handles.
pub fn load_rows(store: &mut SeedStore, rows: Vec<RowSpec>) -> CliResult<HashMap<String, RowHandle>> {
    let mut labels: HashMap<String, RowHandle> = HashMap::new();

    for (index, spec) in rows.into_iter().enumerate() {
        let table_id = store.catalog().resolve(&spec.table)?;
        let table = store.catalog().table(table_id);

        let mut fields = Vec::with_capacity(spec.values.len());
        for (column, json) in spec.values {
            let tag = table
                .column(&column)
                .map(|definition| definition.type_tag())
                .unwrap_or(TypeTag::Other);
            let field = to_field(&labels, index, &spec.table, &column, json, tag)?;
            fields.push((column, field));
        }

        let handle = store.add(&spec.table, fields)?;
        if let Some(label) = spec.label {
            if labels.insert(label.clone(), handle).is_some() {
                return Err(CliError::Rows(format!("row {index}: duplicate label \"{label}\"")));
            }
        }
    }

    debug!(rows = store.len(), labels = labels.len(), "rows file loaded");
    Ok(labels)
}

/// Build a store from a schema snapshot and a rows file.
pub fn store_from_files(schema: &Path, rows: &Path, options: StoreOptions) -> CliResult<SeedStore> {
    let mut store = SeedStore::new(read_schema(schema)?, options)?;
    load_rows(&mut store, read_rows(rows)?)?;
    Ok(store)
}

fn to_field(
    labels: &HashMap<String, RowHandle>,
    index: usize,
    table: &str,
    column: &str,
    json: Json,
    tag: TypeTag,
) -> CliResult<Field> {
    if let Json::Object(object) = &json {
        if let Some(reference) = object.get("$ref") {
            let reference: RefSpec = serde_json::from_value(reference.clone())?;
            let handle = labels.get(&reference.row).ok_or_else(|| {
                CliError::Rows(format!(
                    "row {index}: \"{table}\".\"{column}\" references unknown label \"{}\"",
                    reference.row
                ))
            })?;
            return Ok(Field::Ref(handle.col(reference.column)));
        }
        if object.get("$unset").and_then(Json::as_bool) == Some(true) {
            return Ok(Field::Unset);
        }
    }

    Value::from_json(json, tag).map(Field::Value).ok_or_else(|| {
        CliError::Rows(format!(
            "row {index}: value for \"{table}\".\"{column}\" does not match its column type"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> SeedStore {
        let schema: DatabaseSchema = serde_json::from_value(json!({
            "schema_version": "0.1",
            "engine": "postgres",
            "schemas": [{"name": "public", "tables": [
                {"name": "team", "columns": [
                    {"ordinal_position": 1, "name": "id", "column_type": {"data_type": "uuid"}, "is_nullable": false},
                    {"ordinal_position": 2, "name": "founded", "column_type": {"data_type": "date"}, "is_nullable": true, "default": "CURRENT_DATE"}
                ], "constraints": [{"kind": "primary_key", "columns": ["id"]}]},
                {"name": "player", "columns": [
                    {"ordinal_position": 1, "name": "team_id", "column_type": {"data_type": "uuid"}, "is_nullable": false}
                ], "constraints": [{"kind": "foreign_key", "columns": ["team_id"],
                    "referenced_schema": "public", "referenced_table": "team", "referenced_columns": ["id"]}]}
            ]}]
        }))
        .expect("schema");
        SeedStore::new(schema, StoreOptions::default()).expect("store")
    }

    fn specs(value: Json) -> Vec<RowSpec> {
        serde_json::from_value(value).expect("rows")
    }

    #[test]
    fn resolves_labels_and_typed_values() {
        let mut store = store();
        let labels = load_rows(
            &mut store,
            specs(json!([
                {"table": "team", "label": "reds", "values": {
                    "id": "6f1c3bd4-5a0e-4a43-9d7e-2a1b7a3c9e10",
                    "founded": {"$unset": true}
                }},
                {"table": "player", "values": {"team_id": {"$ref": {"row": "reds", "column": "id"}}}}
            ])),
        )
        .expect("load");

        let team = store.row(labels["reds"]).expect("team row");
        assert!(matches!(team.get(0), Some(Value::Uuid(_))));
        assert!(team.get(1).is_none());

        let players = store.rows("player").expect("player rows");
        assert_eq!(players[0].get(0), team.get(0));
    }

    #[test]
    fn rejects_unknown_labels_and_mistyped_values() {
        let mut store = store();
        let err = load_rows(
            &mut store,
            specs(json!([{"table": "player", "values": {"team_id": {"$ref": {"row": "nope", "column": "id"}}}}])),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown label \"nope\""));

        let err = load_rows(
            &mut store,
            specs(json!([{"table": "team", "values": {"id": "not-a-uuid"}}])),
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Rows(_)));
    }

    #[test]
    fn store_errors_pass_through() {
        let mut store = store();
        let err = load_rows(&mut store, specs(json!([{"table": "coach", "values": {}}]))).unwrap_err();
        assert_eq!(err.to_string(), "unknown table \"coach\"");
    }
}
