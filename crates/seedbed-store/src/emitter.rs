use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use seedbed_core::{Table, TypeTag};

use crate::buffer::{Row, RowBuffer};
use crate::catalog::{Catalog, TableId};
use crate::cycles::{CycleResolution, DeferredEdge};
use crate::dialect::{Dialect, RowTarget};
use crate::mutation::{Assignment, Mutation, RowFilter};
use crate::report::{ResolutionReport, StoreIssue, TableReport};
use crate::value::Value;

/// Produce the inserts for `order`, then the deferred updates.
///
/// Inserts follow table order and row insertion order. Updates follow the
/// order edges were deferred in, one per edge and affected row. Updates whose
/// row cannot be addressed on `dialect` are skipped and recorded in `report`.
pub fn emit(
    catalog: &Catalog,
    buffer: &RowBuffer,
    order: &[TableId],
    cycles: &CycleResolution,
    dialect: &dyn Dialect,
    report: &mut ResolutionReport,
) -> Vec<Mutation> {
    let mut mutations = Vec::with_capacity(buffer.len());
    let mut tables: BTreeMap<TableId, TableReport> = BTreeMap::new();

    for table_id in order.iter().copied() {
        if buffer.row_count(table_id) == 0 {
            continue;
        }
        let table = catalog.table(table_id);
        let deferred = deferred_positions(catalog, cycles, table_id);
        for row in buffer.rows_of(table_id) {
            mutations.push(Mutation::Insert {
                schema: catalog.schema_name(table_id).to_string(),
                table: table.name.clone(),
                row: row.handle(),
                values: insert_values(table, row, &deferred),
            });
        }

        let entry = table_report(&mut tables, catalog, buffer, table_id);
        entry.inserts += buffer.row_count(table_id);
    }

    for edge in &cycles.deferred {
        let table = catalog.table(edge.owner);
        let pending = deferred_positions(catalog, cycles, edge.owner);
        let edge_positions: Vec<usize> = edge
            .columns
            .iter()
            .filter_map(|name| position(table, name))
            .collect();

        for row in buffer.rows_of(edge.owner) {
            let set: Vec<Assignment> = edge_positions
                .iter()
                .filter_map(|position| {
                    row.get(*position)
                        .map(|value| assignment(table, *position, value.clone()))
                })
                .collect();
            if set.iter().all(|assignment| assignment.value.is_null()) {
                continue;
            }

            match row_filter(dialect, buffer, edge.owner, table, row, &pending, &edge_positions) {
                Ok(filter) => {
                    mutations.push(Mutation::Update {
                        schema: catalog.schema_name(edge.owner).to_string(),
                        table: table.name.clone(),
                        row: row.handle(),
                        set,
                        filter,
                    });
                    table_report(&mut tables, catalog, buffer, edge.owner).updates += 1;
                }
                Err(skip) => skip_update(report, dialect, edge, row, skip),
            }
        }
    }

    report.inserts = mutations.iter().filter(|m| m.is_insert()).count();
    report.updates = mutations.len() - report.inserts;
    report.tables = tables.into_values().collect();
    debug!(
        inserts = report.inserts,
        updates = report.updates,
        skipped = report.skipped_updates,
        "mutations planned"
    );

    mutations
}

fn table_report<'a>(
    tables: &'a mut BTreeMap<TableId, TableReport>,
    catalog: &Catalog,
    buffer: &RowBuffer,
    table_id: TableId,
) -> &'a mut TableReport {
    tables.entry(table_id).or_insert_with(|| TableReport {
        schema: catalog.schema_name(table_id).to_string(),
        table: catalog.name(table_id).to_string(),
        rows: buffer.row_count(table_id),
        ..TableReport::default()
    })
}

/// Why a deferred update has no statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    /// No usable key and the dialect exposes no row identity.
    Unavailable,
    /// The identity match could select another buffered row.
    Ambiguous,
}

fn skip_update(
    report: &mut ResolutionReport,
    dialect: &dyn Dialect,
    edge: &DeferredEdge,
    row: &Row,
    skip: Skip,
) {
    warn!(
        table = %edge.owner_table,
        row = row.handle().id(),
        columns = ?edge.columns,
        dialect = %dialect.kind(),
        reason = ?skip,
        "deferred update skipped, row has no addressable target"
    );
    let (code, message) = match skip {
        Skip::Unavailable => (
            "row_target_unavailable",
            format!(
                "row {} of \"{}\" has no key and {} exposes no row identity; deferred columns keep their inserted value",
                row.handle(),
                edge.owner_table,
                dialect.kind()
            ),
        ),
        Skip::Ambiguous => (
            "row_target_ambiguous",
            format!(
                "row {} of \"{}\" has no key and its comparable columns also match another row; deferred columns keep their inserted value",
                row.handle(),
                edge.owner_table
            ),
        ),
    };
    report.skipped_updates += 1;
    report.record_warning(StoreIssue {
        table: Some(edge.owner_table.clone()),
        row: Some(row.handle().id()),
        columns: edge.columns.clone(),
        ..StoreIssue::warning(code, message)
    });
}

/// Column positions of every deferred foreign key owned by `table_id`.
fn deferred_positions(catalog: &Catalog, cycles: &CycleResolution, table_id: TableId) -> BTreeSet<usize> {
    let table = catalog.table(table_id);
    cycles
        .deferred_for(table_id)
        .flat_map(|edge| edge.columns.iter())
        .filter_map(|name| position(table, name))
        .collect()
}

fn insert_values(table: &Table, row: &Row, deferred: &BTreeSet<usize>) -> Vec<Assignment> {
    table
        .columns
        .iter()
        .enumerate()
        .filter_map(|(position, column)| {
            let value = row.get(position)?;
            if !deferred.contains(&position) {
                return Some(assignment(table, position, value.clone()));
            }
            // Deferred non-nullable columns are defaultable; leave them to the server.
            column
                .is_nullable
                .then(|| assignment(table, position, Value::Null))
        })
        .collect()
}

fn row_filter(
    dialect: &dyn Dialect,
    buffer: &RowBuffer,
    owner: TableId,
    table: &Table,
    row: &Row,
    pending: &BTreeSet<usize>,
    edge_positions: &[usize],
) -> Result<RowFilter, Skip> {
    match dialect.row_target_for(table, row, pending) {
        RowTarget::PrimaryKey(positions) | RowTarget::Unique(positions) => Ok(RowFilter::Key(
            positions
                .iter()
                .filter_map(|position| {
                    row.get(*position)
                        .map(|value| assignment(table, *position, value.clone()))
                })
                .collect(),
        )),
        RowTarget::RowIdentity(identity) => {
            let positions: Vec<usize> = table
                .columns
                .iter()
                .enumerate()
                .filter(|(position, _)| !pending.contains(position))
                .filter_map(|(position, column)| {
                    let value = row.get(position)?;
                    comparable(value, column.type_tag()).then_some(position)
                })
                .collect();
            if positions.is_empty() {
                return Err(Skip::Unavailable);
            }
            if has_lookalike(buffer, owner, table, row, &positions) {
                return Err(Skip::Ambiguous);
            }

            let matching = positions
                .iter()
                .filter_map(|position| {
                    row.get(*position)
                        .map(|value| assignment(table, *position, value.clone()))
                })
                .collect();
            let pending = edge_positions
                .iter()
                .filter(|position| {
                    table.columns[**position].is_nullable && row.get(**position).is_some()
                })
                .map(|position| table.columns[*position].name.clone())
                .collect();
            Ok(RowFilter::Identity {
                identity,
                matching,
                pending,
            })
        }
        RowTarget::Unavailable => Err(Skip::Unavailable),
    }
}

/// True when another row of the table could satisfy the identity match on
/// `positions` while holding different values. Unset columns may take any
/// server default, so they match anything. Rows identical in every column
/// are interchangeable and do not count.
fn has_lookalike(buffer: &RowBuffer, owner: TableId, table: &Table, row: &Row, positions: &[usize]) -> bool {
    buffer.rows_of(owner).any(|other| {
        if other.handle() == row.handle() {
            return false;
        }
        let identical = (0..table.columns.len()).all(|position| other.get(position) == row.get(position));
        !identical
            && positions.iter().all(|position| match other.get(*position) {
                Some(value) => row.get(*position) == Some(value),
                None => true,
            })
    })
}

/// Values that compare reliably with `=` once written.
fn comparable(value: &Value, tag: TypeTag) -> bool {
    !matches!(value, Value::Float(_) | Value::Json(_))
        && !matches!(tag, TypeTag::Json | TypeTag::Numeric | TypeTag::Other)
}

fn assignment(table: &Table, position: usize, value: Value) -> Assignment {
    let column = &table.columns[position];
    Assignment {
        column: column.name.clone(),
        value,
        tag: column.type_tag(),
    }
}

fn position(table: &Table, name: &str) -> Option<usize> {
    table.columns.iter().position(|column| column.name == name)
}
