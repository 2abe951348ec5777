use std::collections::HashMap;

use serde::Serialize;

use seedbed_core::{DatabaseSchema, ForeignKey, Table, validate_schema};

use crate::errors::StoreError;

/// Index of a table in schema declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TableId(pub usize);

/// Foreign key with its target resolved to a `TableId`.
#[derive(Debug, Clone)]
pub struct ResolvedForeignKey {
    /// Position among the owner's foreign keys.
    pub index: usize,
    pub target: TableId,
    pub foreign_key: ForeignKey,
    pub nullable: bool,
    pub breakable: bool,
}

#[derive(Debug)]
struct TableEntry {
    schema: String,
    table: Table,
    foreign_keys: Vec<ResolvedForeignKey>,
}

/// Validated, index-addressable view over a `DatabaseSchema`.
#[derive(Debug)]
pub struct Catalog {
    tables: Vec<TableEntry>,
    by_qualified: HashMap<String, TableId>,
    by_name: HashMap<String, Vec<TableId>>,
}

impl Catalog {
    pub fn new(schema: DatabaseSchema) -> Result<Self, StoreError> {
        validate_schema(&schema)?;

        let mut by_qualified = HashMap::new();
        let mut by_name: HashMap<String, Vec<TableId>> = HashMap::new();
        for (index, (schema_name, table)) in schema.tables().enumerate() {
            let id = TableId(index);
            by_qualified.insert(qualified(schema_name, &table.name), id);
            by_name.entry(table.name.clone()).or_default().push(id);
        }

        let mut tables = Vec::with_capacity(by_qualified.len());
        for db_schema in schema.schemas {
            for table in db_schema.tables {
                let mut foreign_keys = Vec::new();
                for (index, fk) in table.foreign_keys().enumerate() {
                    let key = qualified(&fk.referenced_schema, &fk.referenced_table);
                    let target = *by_qualified.get(&key).ok_or_else(|| {
                        seedbed_core::Error::InvalidSchema(format!(
                            "referenced table not found: {key}"
                        ))
                    })?;
                    foreign_keys.push(ResolvedForeignKey {
                        index,
                        target,
                        nullable: fk.is_nullable(&table),
                        breakable: fk.is_breakable(&table),
                        foreign_key: fk.clone(),
                    });
                }

                tables.push(TableEntry {
                    schema: db_schema.name.clone(),
                    table,
                    foreign_keys,
                });
            }
        }

        Ok(Self {
            tables,
            by_qualified,
            by_name,
        })
    }

    /// Resolve `table` or `schema.table` to a table id.
    pub fn resolve(&self, name: &str) -> Result<TableId, StoreError> {
        if let Some(id) = self.by_qualified.get(name) {
            return Ok(*id);
        }

        match self.by_name.get(name).map(Vec::as_slice) {
            Some([id]) => Ok(*id),
            Some(ids) if !ids.is_empty() => Err(StoreError::AmbiguousTable {
                name: name.to_string(),
                candidates: ids
                    .iter()
                    .map(|id| self.qualified_name(*id))
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
            _ => Err(StoreError::UnknownTable(name.to_string())),
        }
    }

    /// Number of tables across every namespace.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn table(&self, id: TableId) -> &Table {
        &self.tables[id.0].table
    }

    pub fn schema_name(&self, id: TableId) -> &str {
        &self.tables[id.0].schema
    }

    /// Bare table name, as used in error messages and cycle paths.
    pub fn name(&self, id: TableId) -> &str {
        &self.tables[id.0].table.name
    }

    pub fn qualified_name(&self, id: TableId) -> String {
        qualified(self.schema_name(id), self.name(id))
    }

    pub fn foreign_keys(&self, id: TableId) -> &[ResolvedForeignKey] {
        &self.tables[id.0].foreign_keys
    }
}

fn qualified(schema: &str, table: &str) -> String {
    format!("{schema}.{table}")
}
