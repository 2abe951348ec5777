use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::buffer::RowBuffer;
use crate::catalog::{Catalog, TableId};

/// Index of an edge inside a `DependencyGraph`.
pub type EdgeId = usize;

/// Owner table depends on target table through one foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub owner: TableId,
    pub target: TableId,
    /// Position of the foreign key among the owner's foreign keys.
    pub fk_index: usize,
    pub breakable: bool,
}

impl DependencyEdge {
    pub fn is_self_loop(&self) -> bool {
        self.owner == self.target
    }
}

/// Table-level dependency graph scoped to the buffered rows.
///
/// Edge ids follow schema declaration order (owner table, then foreign key).
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeSet<TableId>,
    edges: Vec<DependencyEdge>,
    outgoing: BTreeMap<TableId, Vec<EdgeId>>,
}

impl DependencyGraph {
    /// Build the graph for tables with rows plus every table they reach.
    ///
    /// Only tables with rows own edges; reached tables receive no inserts,
    /// so their own foreign keys never constrain the batch.
    pub fn build(catalog: &Catalog, buffer: &RowBuffer) -> Self {
        let mut nodes: BTreeSet<TableId> = buffer.tables().collect();
        let mut queue: VecDeque<TableId> = nodes.iter().copied().collect();

        while let Some(table) = queue.pop_front() {
            for fk in catalog.foreign_keys(table) {
                if nodes.insert(fk.target) {
                    queue.push_back(fk.target);
                }
            }
        }

        let mut graph = Self {
            nodes,
            ..Self::default()
        };
        for owner in buffer.tables() {
            for fk in catalog.foreign_keys(owner) {
                graph.add_edge(DependencyEdge {
                    owner,
                    target: fk.target,
                    fk_index: fk.index,
                    breakable: fk.breakable,
                });
            }
        }

        graph
    }

    fn add_edge(&mut self, edge: DependencyEdge) {
        let duplicate = self
            .outgoing(edge.owner)
            .iter()
            .any(|id| self.edges[*id] == edge);
        if duplicate {
            return;
        }
        let id = self.edges.len();
        self.outgoing.entry(edge.owner).or_default().push(id);
        self.edges.push(edge);
    }

    pub fn nodes(&self) -> impl Iterator<Item = TableId> + '_ {
        self.nodes.iter().copied()
    }

    pub fn edge(&self, id: EdgeId) -> &DependencyEdge {
        &self.edges[id]
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    pub fn outgoing(&self, table: TableId) -> &[EdgeId] {
        self.outgoing.get(&table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Order tables so every target precedes its dependents, skipping the
    /// edges for which `active` is false.
    ///
    /// Ties are broken by declaration order. On failure the tables left
    /// inside a cycle are returned.
    pub fn insertion_order(&self, active: &[bool]) -> Result<Vec<TableId>, Vec<TableId>> {
        let mut pending: BTreeMap<TableId, usize> = self.nodes.iter().map(|id| (*id, 0)).collect();
        let mut dependents: BTreeMap<TableId, Vec<TableId>> = BTreeMap::new();

        for (id, edge) in self.edges.iter().enumerate() {
            if !active.get(id).copied().unwrap_or(true) {
                continue;
            }
            if let Some(count) = pending.get_mut(&edge.owner) {
                *count += 1;
            }
            dependents.entry(edge.target).or_default().push(edge.owner);
        }

        let mut ready: BTreeSet<TableId> = pending
            .iter()
            .filter_map(|(node, count)| (*count == 0).then_some(*node))
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node) = ready.pop_first() {
            order.push(node);
            for dependent in dependents.get(&node).into_iter().flatten() {
                if let Some(count) = pending.get_mut(dependent) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }

        if order.len() == self.nodes.len() {
            Ok(order)
        } else {
            let placed: BTreeSet<TableId> = order.into_iter().collect();
            Err(self
                .nodes
                .iter()
                .copied()
                .filter(|node| !placed.contains(node))
                .collect())
        }
    }
}
