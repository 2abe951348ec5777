use std::collections::BTreeMap;

use serde::Serialize;

use crate::capacity::ConstraintUsage;
use crate::cycles::DeferredEdge;
use crate::dialect::DialectKind;

/// Rows and statements produced for one table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableReport {
    pub schema: String,
    pub table: String,
    pub rows: usize,
    pub inserts: usize,
    pub updates: usize,
}

/// Structured resolution issue.
#[derive(Debug, Clone, Serialize)]
pub struct StoreIssue {
    pub level: String,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
}

impl StoreIssue {
    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Self {
            level: "warning".to_string(),
            code: code.to_string(),
            message: message.into(),
            table: None,
            row: None,
            columns: Vec::new(),
        }
    }
}

/// Outcome of a successful resolution and emission pass.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionReport {
    pub dialect: DialectKind,
    /// Tables in insertion order, qualified as `schema.table`.
    pub insertion_order: Vec<String>,
    pub tables: Vec<TableReport>,
    pub deferred: Vec<DeferredEdge>,
    pub constraints: Vec<ConstraintUsage>,
    pub inserts: usize,
    pub updates: usize,
    pub skipped_updates: usize,
    pub warnings_by_code: BTreeMap<String, u64>,
    pub warnings: Vec<StoreIssue>,
}

impl ResolutionReport {
    pub fn new(dialect: DialectKind) -> Self {
        Self {
            dialect,
            insertion_order: Vec::new(),
            tables: Vec::new(),
            deferred: Vec::new(),
            constraints: Vec::new(),
            inserts: 0,
            updates: 0,
            skipped_updates: 0,
            warnings_by_code: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn record_warning(&mut self, issue: StoreIssue) {
        *self.warnings_by_code.entry(issue.code.clone()).or_insert(0) += 1;
        self.warnings.push(issue);
    }
}
