use seedbed_core::TypeTag;

use crate::buffer::RowHandle;
use crate::dialect::Dialect;
use crate::value::Value;

/// A column paired with the value written to or matched against it.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Value,
    pub tag: TypeTag,
}

impl Assignment {
    fn render(&self, dialect: &dyn Dialect) -> String {
        format!(
            "{} = {}",
            dialect.quote_identifier(&self.column),
            dialect.quote_value(&self.value, self.tag)
        )
    }

    fn render_match(&self, dialect: &dyn Dialect) -> String {
        if self.value.is_null() {
            format!("{} IS NULL", dialect.quote_identifier(&self.column))
        } else {
            self.render(dialect)
        }
    }
}

/// How an update finds the row it completes.
#[derive(Debug, Clone, PartialEq)]
pub enum RowFilter {
    /// Equality on a primary key or a fully set unique constraint.
    Key(Vec<Assignment>),
    /// First row whose implicit identity matches the row's written columns
    /// and whose `pending` columns are still NULL.
    Identity {
        identity: &'static str,
        matching: Vec<Assignment>,
        pending: Vec<String>,
    },
}

/// One statement produced for a buffered row.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert {
        schema: String,
        table: String,
        row: RowHandle,
        values: Vec<Assignment>,
    },
    /// Assigns the columns of a deferred foreign key.
    Update {
        schema: String,
        table: String,
        row: RowHandle,
        set: Vec<Assignment>,
        filter: RowFilter,
    },
}

impl Mutation {
    pub fn row(&self) -> RowHandle {
        match self {
            Mutation::Insert { row, .. } | Mutation::Update { row, .. } => *row,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Mutation::Insert { table, .. } | Mutation::Update { table, .. } => table,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, Mutation::Insert { .. })
    }

    /// Render the statement for `dialect`, without a trailing semicolon.
    pub fn to_sql(&self, dialect: &dyn Dialect) -> String {
        match self {
            Mutation::Insert {
                schema,
                table,
                values,
                ..
            } => {
                let target = dialect.quote_table(schema, table);
                if values.is_empty() {
                    return dialect.insert_default_values(&target);
                }
                let columns: Vec<String> = values
                    .iter()
                    .map(|assignment| dialect.quote_identifier(&assignment.column))
                    .collect();
                let literals: Vec<String> = values
                    .iter()
                    .map(|assignment| dialect.quote_value(&assignment.value, assignment.tag))
                    .collect();
                format!(
                    "INSERT INTO {target} ({}) VALUES ({})",
                    columns.join(", "),
                    literals.join(", ")
                )
            }
            Mutation::Update {
                schema,
                table,
                set,
                filter,
                ..
            } => {
                let target = dialect.quote_table(schema, table);
                let assignments: Vec<String> =
                    set.iter().map(|assignment| assignment.render(dialect)).collect();
                let predicate = match filter {
                    RowFilter::Key(key) => key
                        .iter()
                        .map(|assignment| assignment.render_match(dialect))
                        .collect::<Vec<_>>()
                        .join(" AND "),
                    RowFilter::Identity {
                        identity,
                        matching,
                        pending,
                    } => {
                        let conditions: Vec<String> = matching
                            .iter()
                            .map(|assignment| assignment.render_match(dialect))
                            .chain(pending.iter().map(|column| {
                                format!("{} IS NULL", dialect.quote_identifier(column))
                            }))
                            .collect();
                        format!(
                            "{identity} = (SELECT {identity} FROM {target} WHERE {} LIMIT 1)",
                            conditions.join(" AND ")
                        )
                    }
                };
                format!(
                    "UPDATE {target} SET {} WHERE {predicate}",
                    assignments.join(", ")
                )
            }
        }
    }
}
