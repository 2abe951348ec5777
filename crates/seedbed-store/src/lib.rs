//! In-memory relational store and dependency resolver.
//!
//! Rows are buffered per table through [`SeedStore::add`]. Resolution builds
//! the foreign key graph of the buffered tables, defers one breakable edge per
//! cycle, checks unique constraint capacity and emits inserts followed by the
//! deferred updates, rendered per [`Dialect`].

pub mod buffer;
pub mod capacity;
pub mod catalog;
pub mod cycles;
pub mod dialect;
pub mod emitter;
pub mod errors;
pub mod graph;
pub mod mutation;
pub mod options;
pub mod report;
pub mod store;
pub mod value;

#[cfg(test)]
mod testing;

pub use buffer::{Row, RowHandle};
pub use capacity::ConstraintUsage;
pub use catalog::{Catalog, TableId};
pub use cycles::DeferredEdge;
pub use dialect::{
    Dialect, DialectKind, MysqlDialect, PostgresDialect, RowTarget, SqliteDialect, dialect_for,
};
pub use errors::StoreError;
pub use mutation::{Assignment, Mutation, RowFilter};
pub use options::{CycleBreakPolicy, StoreOptions};
pub use report::{ResolutionReport, StoreIssue, TableReport};
pub use store::{Resolution, SeedStore};
pub use value::{Field, RowRef, Value};
