//! Core contracts for seedbed.
//!
//! This crate defines the canonical schema types consumed by the store,
//! together with schema validation and the shared error type.

pub mod constraints;
pub mod error;
pub mod schema;
pub mod types;
pub mod validation;

pub use constraints::{CheckConstraint, Constraint, ForeignKey, PrimaryKey, UniqueConstraint};
pub use error::{Error, Result};
pub use schema::{Column, DatabaseSchema, Schema, Table, TableKind};
pub use types::{ColumnType, EnumType, GeneratedExpression, GeneratedKind, IdentityGeneration, TypeTag};
pub use validation::validate_schema;

/// Current schema contract version for `schema.json` artifacts.
pub const SCHEMA_VERSION: &str = "0.1";
