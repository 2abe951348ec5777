use serde::{Deserialize, Serialize};

use crate::dialect::DialectKind;

/// Tie-break used when a cycle has more than one breakable edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleBreakPolicy {
    /// Defer the edge whose owner has the fewest buffered rows, then the
    /// first declared one.
    #[default]
    FewestRows,
    /// Defer the first declared breakable edge.
    Declared,
}

/// Options for the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Target database dialect for rendered statements.
    pub dialect: DialectKind,
    /// How a cycle picks the edge to defer.
    pub cycle_break: CycleBreakPolicy,
    /// Check unique constraint capacity before emitting.
    pub check_capacity: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            dialect: DialectKind::Postgres,
            cycle_break: CycleBreakPolicy::FewestRows,
            check_capacity: true,
        }
    }
}
