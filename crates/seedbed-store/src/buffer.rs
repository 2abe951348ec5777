use std::fmt;

use serde::Serialize;

use crate::catalog::TableId;
use crate::value::{RowRef, Value};

/// Opaque reference to a buffered row.
///
/// Handles are assigned in insertion order and stay stable for the lifetime
/// of the store that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RowHandle {
    table: TableId,
    id: u64,
}

impl RowHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn table(&self) -> TableId {
        self.table
    }

    /// Reference one of this row's columns from a later `add()` call.
    pub fn col(&self, column: impl Into<String>) -> RowRef {
        RowRef {
            row: *self,
            column: column.into(),
        }
    }
}

impl fmt::Display for RowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.id)
    }
}

/// A buffered row. Values are aligned with the table's column order; `None`
/// means unset.
#[derive(Debug, Clone)]
pub struct Row {
    handle: RowHandle,
    values: Vec<Option<Value>>,
}

impl Row {
    pub fn handle(&self) -> RowHandle {
        self.handle
    }

    pub fn table(&self) -> TableId {
        self.handle.table
    }

    /// Value at a column position, `None` when unset.
    pub fn get(&self, column: usize) -> Option<&Value> {
        self.values.get(column).and_then(Option::as_ref)
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }
}

/// Append-only buffer of rows, keyed by table.
#[derive(Debug, Default)]
pub struct RowBuffer {
    rows: Vec<Row>,
    by_table: Vec<Vec<usize>>,
}

impl RowBuffer {
    pub fn new(tables: usize) -> Self {
        Self {
            rows: Vec::new(),
            by_table: vec![Vec::new(); tables],
        }
    }

    pub fn push(&mut self, table: TableId, values: Vec<Option<Value>>) -> RowHandle {
        let handle = RowHandle {
            table,
            id: self.rows.len() as u64,
        };
        if self.by_table.len() <= table.0 {
            self.by_table.resize(table.0 + 1, Vec::new());
        }
        self.by_table[table.0].push(self.rows.len());
        self.rows.push(Row { handle, values });
        handle
    }

    /// Row behind a handle, `None` for handles minted by another store.
    pub fn row(&self, handle: RowHandle) -> Option<&Row> {
        usize::try_from(handle.id)
            .ok()
            .and_then(|index| self.rows.get(index))
            .filter(|row| row.handle == handle)
    }

    /// Rows of one table in insertion order.
    pub fn rows_of(&self, table: TableId) -> impl Iterator<Item = &Row> {
        self.by_table
            .get(table.0)
            .into_iter()
            .flatten()
            .map(|index| &self.rows[*index])
    }

    pub fn row_count(&self, table: TableId) -> usize {
        self.by_table.get(table.0).map(Vec::len).unwrap_or(0)
    }

    /// Tables holding at least one row, in declaration order.
    pub fn tables(&self) -> impl Iterator<Item = TableId> + '_ {
        self.by_table
            .iter()
            .enumerate()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(index, _)| TableId(index))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
