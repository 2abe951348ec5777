use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use tracing::{debug, warn};

use seedbed_core::Table;

use crate::buffer::{Row, RowBuffer};
use crate::catalog::{Catalog, TableId};
use crate::cycles::CycleResolution;
use crate::errors::StoreError;

/// How the buffered rows use one unique constraint.
#[derive(Debug, Clone, Serialize)]
pub struct ConstraintUsage {
    pub table: String,
    pub columns: Vec<String>,
    pub primary_key: bool,
    pub nulls_distinct: bool,
    /// Rows that must hold a distinct key combination.
    pub requested: usize,
    /// Distinct combinations those rows actually supply.
    pub available: usize,
    /// Combinations producible from the observed per-column value domain.
    pub combinations: u64,
}

struct KeyConstraint<'a> {
    columns: &'a [String],
    positions: Vec<usize>,
    primary_key: bool,
    nulls_distinct: bool,
}

/// Key component of a row for one column.
enum Slot {
    Value(String),
    Null,
    /// Unset column filled by the server; the row does not compete.
    Server,
}

/// Verify every unique constraint and primary key touched by buffered rows
/// can hold the requested rows.
///
/// Tuples are checked as finally written and, for "nulls not distinct"
/// constraints that include deferred columns, as first inserted.
pub fn check_capacity(
    catalog: &Catalog,
    buffer: &RowBuffer,
    cycles: &CycleResolution,
) -> Result<Vec<ConstraintUsage>, StoreError> {
    let mut usages = Vec::new();

    for table_id in buffer.tables() {
        let table = catalog.table(table_id);
        let deferred: BTreeSet<usize> = cycles
            .deferred_for(table_id)
            .flat_map(|edge| edge.columns.iter())
            .filter_map(|name| position(table, name))
            .filter(|position| table.columns[*position].is_nullable)
            .collect();

        for constraint in key_constraints(table) {
            let usage = measure(catalog, buffer, table_id, &constraint, &BTreeSet::new());
            debug!(
                table = %usage.table,
                columns = ?usage.columns,
                requested = usage.requested,
                available = usage.available,
                combinations = usage.combinations,
                "unique constraint measured"
            );
            ensure_fits(&usage)?;

            let pending_nulls = !constraint.nulls_distinct
                && constraint.positions.iter().any(|p| deferred.contains(p));
            if pending_nulls {
                ensure_fits(&measure(catalog, buffer, table_id, &constraint, &deferred))?;
            }

            usages.push(usage);
        }
    }

    Ok(usages)
}

fn ensure_fits(usage: &ConstraintUsage) -> Result<(), StoreError> {
    if usage.requested <= usage.available {
        return Ok(());
    }
    warn!(
        table = %usage.table,
        columns = ?usage.columns,
        requested = usage.requested,
        available = usage.available,
        "unique constraint capacity exceeded"
    );
    Err(StoreError::UniqueConstraintCapacityExceeded {
        table: usage.table.clone(),
        columns: usage.columns.clone(),
        requested: usage.requested,
        available: usage.available,
    })
}

fn key_constraints(table: &Table) -> Vec<KeyConstraint<'_>> {
    let mut constraints = Vec::new();
    let positions = |columns: &[String]| -> Vec<usize> {
        columns
            .iter()
            .filter_map(|name| position(table, name))
            .collect()
    };

    if let Some(pk) = table.primary_key() {
        constraints.push(KeyConstraint {
            columns: &pk.columns,
            positions: positions(&pk.columns),
            primary_key: true,
            nulls_distinct: true,
        });
    }
    for unique in table.unique_constraints() {
        constraints.push(KeyConstraint {
            columns: &unique.columns,
            positions: positions(&unique.columns),
            primary_key: false,
            nulls_distinct: unique.nulls_distinct,
        });
    }

    constraints
}

fn measure(
    catalog: &Catalog,
    buffer: &RowBuffer,
    table_id: TableId,
    constraint: &KeyConstraint<'_>,
    nulled: &BTreeSet<usize>,
) -> ConstraintUsage {
    let table = catalog.table(table_id);
    let mut requested = 0;
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut domains: Vec<HashSet<String>> = vec![HashSet::new(); constraint.positions.len()];

    'rows: for row in buffer.rows_of(table_id) {
        let mut tuple = Vec::with_capacity(constraint.positions.len());
        let mut has_null = false;
        for position in &constraint.positions {
            match slot(table, row, *position, nulled) {
                Slot::Server => continue 'rows,
                Slot::Null => {
                    has_null = true;
                    tuple.push(NULL_KEY.to_string());
                }
                Slot::Value(key) => tuple.push(key),
            }
        }

        if has_null && constraint.nulls_distinct && !constraint.primary_key {
            continue;
        }

        requested += 1;
        if has_null && constraint.primary_key {
            continue;
        }
        for (domain, key) in domains.iter_mut().zip(&tuple) {
            domain.insert(key.clone());
        }
        seen.insert(tuple);
    }

    let combinations = domains
        .iter()
        .fold(1_u64, |acc, domain| acc.saturating_mul(domain.len() as u64));

    ConstraintUsage {
        table: catalog.name(table_id).to_string(),
        columns: constraint.columns.to_vec(),
        primary_key: constraint.primary_key,
        nulls_distinct: constraint.nulls_distinct,
        requested,
        available: seen.len(),
        combinations: if requested == 0 { 0 } else { combinations },
    }
}

const NULL_KEY: &str = "\u{0}null";

fn slot(table: &Table, row: &Row, position: usize, nulled: &BTreeSet<usize>) -> Slot {
    if nulled.contains(&position) && row.get(position).is_some() {
        return Slot::Null;
    }
    match row.get(position) {
        Some(value) if value.is_null() => Slot::Null,
        Some(value) => Slot::Value(value.key()),
        None if table.columns[position].has_default() => Slot::Server,
        None => Slot::Null,
    }
}

fn position(table: &Table, name: &str) -> Option<usize> {
    table.columns.iter().position(|column| column.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DependencyGraph;
    use crate::options::CycleBreakPolicy;
    use crate::testing::{pk, schema, table, unique, with_defaults};
    use crate::value::Value;

    fn run(catalog: &Catalog, buffer: &RowBuffer) -> Result<Vec<ConstraintUsage>, StoreError> {
        let graph = DependencyGraph::build(catalog, buffer);
        let cycles =
            crate::cycles::resolve_cycles(&graph, catalog, buffer, CycleBreakPolicy::FewestRows)?;
        check_capacity(catalog, buffer, &cycles)
    }

    fn team_rows(nulls_distinct: bool, teams: &[Option<i64>]) -> Result<Vec<ConstraintUsage>, StoreError> {
        let catalog = Catalog::new(schema(vec![with_defaults(
            table("match", &[("id", false), ("team_id", true), ("game_id", true)], vec![
                pk(&["id"]),
                unique(&["team_id"], nulls_distinct),
            ]),
            &["id"],
        )]))
        .unwrap();
        let mut buffer = RowBuffer::new(catalog.table_count());
        for team in teams {
            buffer.push(TableId(0), vec![None, Some(Value::from(*team)), None]);
        }
        run(&catalog, &buffer)
    }

    #[test]
    fn nulls_not_distinct_holds_one_null() {
        let usages = team_rows(false, &[None, Some(1)]).expect("fits");
        let team = usages.iter().find(|usage| !usage.primary_key).unwrap();
        assert_eq!((team.requested, team.available, team.combinations), (2, 2, 2));

        let err = team_rows(false, &[None, Some(1), None]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unique constraint violated for model \"match\" on fields (team_id)"
        );
    }

    #[test]
    fn ordinary_nulls_never_collide() {
        let usages = team_rows(true, &[None, None, None, Some(1)]).expect("fits");
        let team = usages.iter().find(|usage| !usage.primary_key).unwrap();
        assert_eq!(team.requested, 1);
    }

    #[test]
    fn server_assigned_keys_do_not_compete() {
        let usages = team_rows(true, &[Some(1), Some(2)]).expect("fits");
        let pk = usages.iter().find(|usage| usage.primary_key).unwrap();
        assert_eq!(pk.requested, 0);
    }

    #[test]
    fn duplicate_composite_keys_fail_despite_domain() {
        let catalog = Catalog::new(schema(vec![table(
            "pair",
            &[("a", false), ("b", false)],
            vec![pk(&["a", "b"])],
        )]))
        .unwrap();
        let mut buffer = RowBuffer::new(catalog.table_count());
        for (a, b) in [(1, 1), (2, 2), (1, 1)] {
            buffer.push(TableId(0), vec![Some(Value::Int(a)), Some(Value::Int(b))]);
        }

        match run(&catalog, &buffer).unwrap_err() {
            StoreError::UniqueConstraintCapacityExceeded {
                requested,
                available,
                ..
            } => assert_eq!((requested, available), (3, 2)),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn null_primary_key_cannot_be_held() {
        let catalog = Catalog::new(schema(vec![table("t", &[("id", false)], vec![pk(&["id"])])]))
            .unwrap();
        let mut buffer = RowBuffer::new(catalog.table_count());
        buffer.push(TableId(0), vec![Some(Value::Null)]);
        assert!(run(&catalog, &buffer).is_err());
    }
}
