use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::buffer::RowBuffer;
use crate::catalog::{Catalog, TableId};
use crate::errors::StoreError;
use crate::graph::{DependencyGraph, EdgeId};
use crate::options::CycleBreakPolicy;

/// A foreign key edge removed from the insert graph.
///
/// Rows of `owner` are inserted without `columns`, and an update assigns
/// them once every insert has run.
#[derive(Debug, Clone, Serialize)]
pub struct DeferredEdge {
    #[serde(skip)]
    pub edge: EdgeId,
    #[serde(skip)]
    pub owner: TableId,
    #[serde(skip)]
    pub target: TableId,
    #[serde(skip)]
    pub fk_index: usize,
    pub owner_table: String,
    pub target_table: String,
    pub columns: Vec<String>,
    /// Cycle that caused the edge to be deferred.
    pub cycle: Vec<String>,
}

/// Outcome of cycle resolution over a dependency graph.
#[derive(Debug, Clone)]
pub struct CycleResolution {
    /// Per-edge flag, false for deferred edges.
    pub active: Vec<bool>,
    /// Deferred edges in resolution order.
    pub deferred: Vec<DeferredEdge>,
}

impl CycleResolution {
    /// Deferred edges owned by `table`.
    pub fn deferred_for(&self, table: TableId) -> impl Iterator<Item = &DeferredEdge> {
        self.deferred.iter().filter(move |edge| edge.owner == table)
    }
}

/// Break every cycle of `graph` by deferring one breakable edge per cycle.
///
/// Fails on the first cycle without a breakable edge. The search is
/// iterative and visits tables and foreign keys in declaration order, so the
/// outcome is deterministic.
pub fn resolve_cycles(
    graph: &DependencyGraph,
    catalog: &Catalog,
    buffer: &RowBuffer,
    policy: CycleBreakPolicy,
) -> Result<CycleResolution, StoreError> {
    let mut active = vec![true; graph.edges().len()];
    let mut deferred = Vec::new();

    while let Some(cycle) = find_cycle(graph, &active) {
        let path = cycle_path(graph, catalog, &cycle);

        let chosen = cycle
            .iter()
            .copied()
            .filter(|id| graph.edge(*id).breakable)
            .min_by_key(|id| match policy {
                CycleBreakPolicy::FewestRows => (buffer.row_count(graph.edge(*id).owner), *id),
                CycleBreakPolicy::Declared => (0, *id),
            });

        let Some(edge_id) = chosen else {
            warn!(cycle = %path.join(" -> "), "unresolvable circular dependency");
            return Err(StoreError::CircularDependencyUnresolvable { cycle: path });
        };

        active[edge_id] = false;
        let edge = graph.edge(edge_id);
        let columns = catalog.foreign_keys(edge.owner)[edge.fk_index]
            .foreign_key
            .columns
            .clone();

        info!(
            owner = %catalog.name(edge.owner),
            target = %catalog.name(edge.target),
            columns = ?columns,
            cycle = %path.join(" -> "),
            "cycle broken"
        );

        deferred.push(DeferredEdge {
            edge: edge_id,
            owner: edge.owner,
            target: edge.target,
            fk_index: edge.fk_index,
            owner_table: catalog.name(edge.owner).to_string(),
            target_table: catalog.name(edge.target).to_string(),
            columns,
            cycle: path,
        });
    }

    Ok(CycleResolution { active, deferred })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    New,
    OnStack,
    Done,
}

/// Find one cycle among the active edges, returned as the edges walked.
fn find_cycle(graph: &DependencyGraph, active: &[bool]) -> Option<Vec<EdgeId>> {
    let mut marks: BTreeMap<TableId, Mark> = graph.nodes().map(|node| (node, Mark::New)).collect();

    for root in graph.nodes() {
        if marks.get(&root) != Some(&Mark::New) {
            continue;
        }

        // frames[i] is a table on the recursion stack with its next edge
        // position; path[i] is the edge from frames[i] to frames[i + 1].
        let mut frames: Vec<(TableId, usize)> = vec![(root, 0)];
        let mut path: Vec<EdgeId> = Vec::new();
        marks.insert(root, Mark::OnStack);

        while let Some(&(node, position)) = frames.last() {
            let outgoing = graph.outgoing(node);
            if position >= outgoing.len() {
                marks.insert(node, Mark::Done);
                frames.pop();
                path.pop();
                continue;
            }
            if let Some(frame) = frames.last_mut() {
                frame.1 += 1;
            }

            let edge_id = outgoing[position];
            if !active[edge_id] {
                continue;
            }

            let target = graph.edge(edge_id).target;
            match marks.get(&target).copied().unwrap_or(Mark::Done) {
                Mark::New => {
                    marks.insert(target, Mark::OnStack);
                    frames.push((target, 0));
                    path.push(edge_id);
                }
                Mark::OnStack => {
                    let start = frames
                        .iter()
                        .position(|(table, _)| *table == target)
                        .unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(edge_id);
                    return Some(cycle);
                }
                Mark::Done => {}
            }
        }
    }

    None
}

fn cycle_path(graph: &DependencyGraph, catalog: &Catalog, cycle: &[EdgeId]) -> Vec<String> {
    let mut path = Vec::with_capacity(cycle.len() + 1);
    if let Some(first) = cycle.first() {
        path.push(catalog.name(graph.edge(*first).owner).to_string());
    }
    for id in cycle {
        path.push(catalog.name(graph.edge(*id).target).to_string());
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fk, pk, schema, table, with_defaults};
    use crate::value::Value;

    fn fill(catalog: &Catalog, buffer: &mut RowBuffer, name: &str, rows: usize) {
        let id = catalog.resolve(name).expect("table");
        let width = catalog.table(id).columns.len();
        for _ in 0..rows {
            buffer.push(id, vec![Some(Value::Int(1)); width]);
        }
    }

    fn resolve(
        catalog: &Catalog,
        buffer: &RowBuffer,
        policy: CycleBreakPolicy,
    ) -> Result<CycleResolution, StoreError> {
        let graph = DependencyGraph::build(catalog, buffer);
        resolve_cycles(&graph, catalog, buffer, policy)
    }

    #[test]
    fn acyclic_graph_defers_nothing() {
        let catalog = Catalog::new(schema(vec![
            table("team", &[("id", false)], vec![pk(&["id"])]),
            table("player", &[("id", false), ("team_id", false)], vec![
                pk(&["id"]),
                fk(&["team_id"], "team", &["id"]),
            ]),
        ]))
        .unwrap();
        let mut buffer = RowBuffer::new(catalog.table_count());
        fill(&catalog, &mut buffer, "player", 3);

        let resolution = resolve(&catalog, &buffer, CycleBreakPolicy::FewestRows).unwrap();
        assert!(resolution.deferred.is_empty());
        assert!(resolution.active.iter().all(|flag| *flag));
    }

    #[test]
    fn self_reference_is_a_single_node_cycle() {
        let catalog = Catalog::new(schema(vec![table(
            "customer",
            &[("id", false), ("referrer_id", true)],
            vec![pk(&["id"]), fk(&["referrer_id"], "customer", &["id"])],
        )]))
        .unwrap();
        let mut buffer = RowBuffer::new(catalog.table_count());
        fill(&catalog, &mut buffer, "customer", 2);

        let resolution = resolve(&catalog, &buffer, CycleBreakPolicy::FewestRows).unwrap();
        assert_eq!(resolution.deferred.len(), 1);
        assert_eq!(resolution.deferred[0].cycle, vec!["customer", "customer"]);
        assert_eq!(resolution.deferred[0].columns, vec!["referrer_id"]);
    }

    #[test]
    fn unbreakable_self_reference_fails() {
        let catalog = Catalog::new(schema(vec![table(
            "node",
            &[("id", false), ("parent_id", false)],
            vec![pk(&["id"]), fk(&["parent_id"], "node", &["id"])],
        )]))
        .unwrap();
        let mut buffer = RowBuffer::new(catalog.table_count());
        fill(&catalog, &mut buffer, "node", 1);

        let err = resolve(&catalog, &buffer, CycleBreakPolicy::FewestRows).unwrap_err();
        assert_eq!(err.to_string(), "circular dependency cannot be resolved: node -> node");
    }

    #[test]
    fn defaultable_edge_is_breakable() {
        let catalog = Catalog::new(schema(vec![
            with_defaults(
                table("a", &[("id", false), ("b_id", false)], vec![
                    pk(&["id"]),
                    fk(&["b_id"], "b", &["id"]),
                ]),
                &["b_id"],
            ),
            table("b", &[("id", false), ("a_id", false)], vec![
                pk(&["id"]),
                fk(&["a_id"], "a", &["id"]),
            ]),
        ]))
        .unwrap();
        let mut buffer = RowBuffer::new(catalog.table_count());
        fill(&catalog, &mut buffer, "a", 1);

        let resolution = resolve(&catalog, &buffer, CycleBreakPolicy::FewestRows).unwrap();
        assert_eq!(resolution.deferred.len(), 1);
        assert_eq!(resolution.deferred[0].owner_table, "a");
    }

    #[test]
    fn prefers_owner_with_fewest_rows() {
        let catalog = Catalog::new(schema(vec![
            table("a", &[("id", false), ("b_id", true)], vec![
                pk(&["id"]),
                fk(&["b_id"], "b", &["id"]),
            ]),
            table("b", &[("id", false), ("a_id", true)], vec![
                pk(&["id"]),
                fk(&["a_id"], "a", &["id"]),
            ]),
        ]))
        .unwrap();
        let mut buffer = RowBuffer::new(catalog.table_count());
        fill(&catalog, &mut buffer, "a", 5);
        fill(&catalog, &mut buffer, "b", 2);

        let fewest = resolve(&catalog, &buffer, CycleBreakPolicy::FewestRows).unwrap();
        assert_eq!(fewest.deferred[0].owner_table, "b");

        let declared = resolve(&catalog, &buffer, CycleBreakPolicy::Declared).unwrap();
        assert_eq!(declared.deferred[0].owner_table, "a");
    }

    #[test]
    fn independent_cycles_are_each_broken() {
        // customer <-> order and product <-> order, sharing `order`.
        let catalog = Catalog::new(schema(vec![
            table("customer", &[("id", false), ("last_order_id", true)], vec![
                pk(&["id"]),
                fk(&["last_order_id"], "order", &["id"]),
            ]),
            table(
                "order",
                &[("id", false), ("customer_id", false), ("product_id", false)],
                vec![
                    pk(&["id"]),
                    fk(&["customer_id"], "customer", &["id"]),
                    fk(&["product_id"], "product", &["id"]),
                ],
            ),
            table("product", &[("id", false), ("first_order_id", true)], vec![
                pk(&["id"]),
                fk(&["first_order_id"], "order", &["id"]),
            ]),
        ]))
        .unwrap();
        let mut buffer = RowBuffer::new(catalog.table_count());
        fill(&catalog, &mut buffer, "customer", 1);
        fill(&catalog, &mut buffer, "order", 1);
        fill(&catalog, &mut buffer, "product", 1);

        let resolution = resolve(&catalog, &buffer, CycleBreakPolicy::FewestRows).unwrap();
        let owners: Vec<&str> = resolution
            .deferred
            .iter()
            .map(|edge| edge.owner_table.as_str())
            .collect();
        assert_eq!(owners, vec!["customer", "product"]);
        assert_eq!(resolution.active.iter().filter(|flag| !**flag).count(), 2);
    }
}
