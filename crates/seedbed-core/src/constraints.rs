use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::schema::Table;

/// Primary key definition preserving column order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PrimaryKey {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

/// Unique constraint definition.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UniqueConstraint {
    pub name: Option<String>,
    pub columns: Vec<String>,
    /// `false` for `UNIQUE NULLS NOT DISTINCT`, where NULLs collide.
    #[serde(default = "default_nulls_distinct")]
    pub nulls_distinct: bool,
}

fn default_nulls_distinct() -> bool {
    true
}

/// Check constraint definition. Carried for completeness, never evaluated.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CheckConstraint {
    pub name: Option<String>,
    pub expression: String,
}

/// Foreign key definition preserving column ordering.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ForeignKey {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub referenced_schema: String,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
}

impl ForeignKey {
    /// True when every source column accepts NULL.
    pub fn is_nullable(&self, owner: &Table) -> bool {
        self.all_columns(owner, |column| column.is_nullable)
    }

    /// True when every source column is filled by the server when omitted.
    pub fn is_defaultable(&self, owner: &Table) -> bool {
        self.all_columns(owner, |column| column.has_default())
    }

    /// A breakable edge can be inserted before its target exists.
    pub fn is_breakable(&self, owner: &Table) -> bool {
        self.is_nullable(owner) || self.is_defaultable(owner)
    }

    fn all_columns(&self, owner: &Table, check: impl Fn(&crate::schema::Column) -> bool) -> bool {
        !self.columns.is_empty()
            && self
                .columns
                .iter()
                .all(|name| owner.column(name).map(&check).unwrap_or(false))
    }
}

/// Table-level constraint definitions.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    PrimaryKey(PrimaryKey),
    ForeignKey(ForeignKey),
    Unique(UniqueConstraint),
    Check(CheckConstraint),
}
