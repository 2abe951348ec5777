use std::time::Instant;

use tracing::{debug, info};

use seedbed_core::DatabaseSchema;

use crate::buffer::{Row, RowBuffer, RowHandle};
use crate::capacity::check_capacity;
use crate::catalog::{Catalog, TableId};
use crate::cycles::resolve_cycles;
use crate::dialect::{Dialect, dialect_for};
use crate::emitter::emit;
use crate::errors::StoreError;
use crate::graph::DependencyGraph;
use crate::mutation::Mutation;
use crate::options::StoreOptions;
use crate::report::ResolutionReport;
use crate::value::{Field, RowRef, Value};

/// Ordered mutations together with the report that explains them.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub mutations: Vec<Mutation>,
    pub report: ResolutionReport,
}

impl Resolution {
    pub fn to_sql(&self, dialect: &dyn Dialect) -> Vec<String> {
        self.mutations
            .iter()
            .map(|mutation| mutation.to_sql(dialect))
            .collect()
    }
}

/// In-memory relational store.
///
/// Rows are buffered by [`SeedStore::add`] in any order. [`SeedStore::resolve`]
/// validates the whole buffer and, only when every check passes, produces
/// inserts and deferred updates that satisfy each foreign key when applied in
/// sequence.
#[derive(Debug)]
pub struct SeedStore {
    catalog: Catalog,
    buffer: RowBuffer,
    options: StoreOptions,
    dialect: Box<dyn Dialect>,
}

impl SeedStore {
    /// Validate `schema` and create an empty store.
    pub fn new(schema: DatabaseSchema, options: StoreOptions) -> Result<Self, StoreError> {
        let catalog = Catalog::new(schema)?;
        let buffer = RowBuffer::new(catalog.table_count());
        let dialect = dialect_for(options.dialect);
        Ok(Self {
            catalog,
            buffer,
            options,
            dialect,
        })
    }

    /// Replace the dialect chosen from the options.
    pub fn with_dialect(mut self, dialect: Box<dyn Dialect>) -> Self {
        self.options.dialect = dialect.kind();
        self.dialect = dialect;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Buffer a row for `table` (`name` or `schema.name`).
    ///
    /// Columns missing from `values` are unset. References are resolved to
    /// the referenced row's value immediately.
    pub fn add<I, K, V>(&mut self, table: &str, values: I) -> Result<RowHandle, StoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Field>,
    {
        let table_id = self.catalog.resolve(table)?;
        let definition = self.catalog.table(table_id);
        let mut row: Vec<Option<Value>> = vec![None; definition.columns.len()];

        for (name, field) in values {
            let name = name.as_ref();
            let position = definition
                .columns
                .iter()
                .position(|column| column.name == name)
                .ok_or_else(|| StoreError::UnknownColumn {
                    table: definition.name.clone(),
                    column: name.to_string(),
                })?;

            row[position] = match field.into() {
                Field::Unset => None,
                Field::Value(value) => Some(value),
                Field::Ref(reference) => Some(self.dereference(&reference)?),
            };

            if row[position].is_some() && definition.columns[position].is_server_only() {
                return Err(StoreError::GeneratedColumn {
                    table: definition.name.clone(),
                    column: name.to_string(),
                });
            }
        }

        let handle = self.buffer.push(table_id, row);
        debug!(table = %self.catalog.qualified_name(table_id), row = handle.id(), "row buffered");
        Ok(handle)
    }

    fn dereference(&self, reference: &RowRef) -> Result<Value, StoreError> {
        let row = self
            .buffer
            .row(reference.row)
            .ok_or(StoreError::UnknownRow(reference.row.id()))?;
        let table = self.catalog.table(row.table());
        let position = table
            .columns
            .iter()
            .position(|column| column.name == reference.column)
            .ok_or_else(|| StoreError::UnknownColumn {
                table: table.name.clone(),
                column: reference.column.clone(),
            })?;

        row.get(position)
            .cloned()
            .ok_or_else(|| StoreError::UnresolvedReference {
                table: table.name.clone(),
                column: reference.column.clone(),
                row: reference.row.id(),
            })
    }

    pub fn row(&self, handle: RowHandle) -> Option<&Row> {
        self.buffer.row(handle)
    }

    /// Buffered rows of `table` in insertion order.
    pub fn rows(&self, table: &str) -> Result<Vec<&Row>, StoreError> {
        let table_id = self.catalog.resolve(table)?;
        Ok(self.buffer.rows_of(table_id).collect())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Validate the whole buffer and plan every statement.
    ///
    /// The buffer is left untouched, so the store can keep growing and be
    /// resolved again.
    pub fn resolve(&self) -> Result<Resolution, StoreError> {
        let started = Instant::now();
        info!(
            rows = self.buffer.len(),
            dialect = %self.dialect.kind(),
            "resolution started"
        );

        let graph = DependencyGraph::build(&self.catalog, &self.buffer);
        let cycles = resolve_cycles(&graph, &self.catalog, &self.buffer, self.options.cycle_break)?;

        let mut report = ResolutionReport::new(self.dialect.kind());
        if self.options.check_capacity {
            report.constraints = check_capacity(&self.catalog, &self.buffer, &cycles)?;
        }

        let order = graph.insertion_order(&cycles.active).map_err(|remaining| {
            StoreError::CircularDependencyUnresolvable {
                cycle: self.names(&remaining),
            }
        })?;
        report.insertion_order = order
            .iter()
            .map(|id| self.catalog.qualified_name(*id))
            .collect();
        report.deferred = cycles.deferred.clone();

        let mutations = emit(
            &self.catalog,
            &self.buffer,
            &order,
            &cycles,
            self.dialect.as_ref(),
            &mut report,
        );

        info!(
            inserts = report.inserts,
            updates = report.updates,
            deferred_edges = report.deferred.len(),
            skipped_updates = report.skipped_updates,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "emission completed"
        );

        Ok(Resolution { mutations, report })
    }

    /// Ordered inserts and deferred updates.
    pub fn mutations(&self) -> Result<Vec<Mutation>, StoreError> {
        Ok(self.resolve()?.mutations)
    }

    /// Ordered statements rendered for the store's dialect.
    pub fn to_sql(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.resolve()?.to_sql(self.dialect.as_ref()))
    }

    fn names(&self, tables: &[TableId]) -> Vec<String> {
        tables
            .iter()
            .map(|id| self.catalog.name(*id).to_string())
            .collect()
    }
}
