use thiserror::Error;

/// Errors emitted by the store. All of them are raised before any statement
/// is produced.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Schema(#[from] seedbed_core::Error),
    #[error("unknown table \"{0}\"")]
    UnknownTable(String),
    #[error("table name \"{name}\" is ambiguous, qualify it with one of: {candidates}")]
    AmbiguousTable { name: String, candidates: String },
    #[error("unknown column \"{column}\" on model \"{table}\"")]
    UnknownColumn { table: String, column: String },
    #[error("column \"{column}\" on model \"{table}\" is generated by the database")]
    GeneratedColumn { table: String, column: String },
    #[error("row handle {0} does not belong to this store")]
    UnknownRow(u64),
    #[error("reference to \"{table}\".\"{column}\" of row {row} cannot be resolved because the column is unset")]
    UnresolvedReference {
        table: String,
        column: String,
        row: u64,
    },
    #[error("circular dependency cannot be resolved: {}", .cycle.join(" -> "))]
    CircularDependencyUnresolvable { cycle: Vec<String> },
    #[error("Unique constraint violated for model \"{table}\" on fields ({})", .columns.join(", "))]
    UniqueConstraintCapacityExceeded {
        table: String,
        columns: Vec<String>,
        requested: usize,
        available: usize,
    },
}
