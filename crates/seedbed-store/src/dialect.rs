//! Per-engine quoting and row targeting.
//!
//! The resolver never branches on the target database; everything that
//! differs between engines goes through [`Dialect`].

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use seedbed_core::{Table, TypeTag};

use crate::buffer::Row;
use crate::value::Value;

/// Supported target databases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialectKind {
    #[default]
    Postgres,
    Sqlite,
    Mysql,
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DialectKind::Postgres => "postgres",
            DialectKind::Sqlite => "sqlite",
            DialectKind::Mysql => "mysql",
        };
        f.write_str(name)
    }
}

/// How a deferred update locates the row it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowTarget {
    /// Primary key column positions.
    PrimaryKey(Vec<usize>),
    /// Column positions of a unique constraint the row fills with non-null values.
    Unique(Vec<usize>),
    /// Engine-provided implicit row identity (`ctid`, `rowid`).
    RowIdentity(&'static str),
    /// The row cannot be addressed on this engine.
    Unavailable,
}

/// Quoting and row targeting strategy for one database engine.
pub trait Dialect: fmt::Debug + Send + Sync {
    fn kind(&self) -> DialectKind;

    fn quote_identifier(&self, name: &str) -> String;

    /// Quote a table reference, qualified when the engine has namespaces.
    fn quote_table(&self, schema: &str, table: &str) -> String;

    /// Render a literal for a column of the given type family.
    fn quote_value(&self, value: &Value, tag: TypeTag) -> String;

    /// Implicit row identity column, if the engine exposes one.
    fn row_identity(&self) -> Option<&'static str>;

    /// Insert statement for a row that sets no column.
    fn insert_default_values(&self, table: &str) -> String {
        format!("INSERT INTO {table} DEFAULT VALUES")
    }

    /// Pick how an update addresses `row`, ignoring the `pending` column
    /// positions that are not written yet.
    fn row_target_for(&self, table: &Table, row: &Row, pending: &BTreeSet<usize>) -> RowTarget {
        let covered = |columns: &[String]| -> Option<Vec<usize>> {
            columns
                .iter()
                .map(|name| {
                    let position = table.columns.iter().position(|c| &c.name == name)?;
                    let filled = row.get(position).map(|v| !v.is_null()).unwrap_or(false);
                    (filled && !pending.contains(&position)).then_some(position)
                })
                .collect()
        };

        if let Some(positions) = table.primary_key().and_then(|pk| covered(&pk.columns)) {
            return RowTarget::PrimaryKey(positions);
        }
        if let Some(positions) = table
            .unique_constraints()
            .find_map(|unique| covered(&unique.columns))
        {
            return RowTarget::Unique(positions);
        }
        match self.row_identity() {
            Some(identity) => RowTarget::RowIdentity(identity),
            None => RowTarget::Unavailable,
        }
    }
}

/// Create the dialect strategy for `kind`.
pub fn dialect_for(kind: DialectKind) -> Box<dyn Dialect> {
    match kind {
        DialectKind::Postgres => Box::new(PostgresDialect),
        DialectKind::Sqlite => Box::new(SqliteDialect),
        DialectKind::Mysql => Box::new(MysqlDialect),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl Dialect for PostgresDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn quote_table(&self, schema: &str, table: &str) -> String {
        format!(
            "{}.{}",
            self.quote_identifier(schema),
            self.quote_identifier(table)
        )
    }

    fn quote_value(&self, value: &Value, tag: TypeTag) -> String {
        match (value, tag) {
            (Value::Bool(flag), _) => if *flag { "TRUE" } else { "FALSE" }.to_string(),
            (Value::Int(number), TypeTag::Boolean) => {
                if *number != 0 { "TRUE" } else { "FALSE" }.to_string()
            }
            (Value::Bytes(bytes), _) => format!("'\\x{}'", hex::encode(bytes)),
            (Value::Float(number), _) if !number.is_finite() => {
                let name = if number.is_nan() {
                    "NaN"
                } else if *number > 0.0 {
                    "Infinity"
                } else {
                    "-Infinity"
                };
                format!("'{name}'")
            }
            _ => common_literal(value, tag, quote_ansi),
        }
    }

    fn row_identity(&self) -> Option<&'static str> {
        Some("ctid")
    }
}

impl Dialect for SqliteDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn quote_table(&self, _schema: &str, table: &str) -> String {
        self.quote_identifier(table)
    }

    fn quote_value(&self, value: &Value, tag: TypeTag) -> String {
        match value {
            Value::Bool(flag) => if *flag { "1" } else { "0" }.to_string(),
            Value::Bytes(bytes) => format!("X'{}'", hex::encode(bytes)),
            Value::Float(number) if !number.is_finite() => "NULL".to_string(),
            _ => common_literal(value, tag, quote_ansi),
        }
    }

    fn row_identity(&self) -> Option<&'static str> {
        Some("rowid")
    }
}

impl Dialect for MysqlDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Mysql
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn quote_table(&self, schema: &str, table: &str) -> String {
        format!(
            "{}.{}",
            self.quote_identifier(schema),
            self.quote_identifier(table)
        )
    }

    fn quote_value(&self, value: &Value, tag: TypeTag) -> String {
        match value {
            Value::Bool(flag) => if *flag { "1" } else { "0" }.to_string(),
            Value::Bytes(bytes) => format!("X'{}'", hex::encode(bytes)),
            Value::Float(number) if !number.is_finite() => "NULL".to_string(),
            _ => common_literal(value, tag, quote_mysql),
        }
    }

    fn row_identity(&self) -> Option<&'static str> {
        None
    }

    fn insert_default_values(&self, table: &str) -> String {
        format!("INSERT INTO {table} () VALUES ()")
    }
}

fn common_literal(value: &Value, tag: TypeTag, quote: fn(&str) -> String) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(flag) => flag.to_string().to_uppercase(),
        Value::Int(number) => number.to_string(),
        Value::Float(number) => number.to_string(),
        Value::Text(text) if tag == TypeTag::Json => {
            quote(&serde_json::Value::String(text.clone()).to_string())
        }
        Value::Text(text) => quote(text),
        Value::Uuid(uuid) => quote(&uuid.to_string()),
        Value::Date(date) => quote(&date.format("%Y-%m-%d").to_string()),
        Value::Time(time) => quote(&time.format("%H:%M:%S%.f").to_string()),
        Value::Timestamp(timestamp) => quote(&timestamp.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        Value::Json(json) => quote(&json.to_string()),
        Value::Bytes(bytes) => quote(&hex::encode(bytes)),
    }
}

fn quote_ansi(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn quote_mysql(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn identifiers_escape_embedded_quotes() {
        assert_eq!(PostgresDialect.quote_identifier("user\"name"), "\"user\"\"name\"");
        assert_eq!(MysqlDialect.quote_identifier("user`name"), "`user``name`");
        assert_eq!(PostgresDialect.quote_table("public", "order"), "\"public\".\"order\"");
        assert_eq!(SqliteDialect.quote_table("main", "order"), "\"order\"");
    }

    #[test]
    fn strings_are_escaped_per_dialect() {
        let value = Value::from("it's a \\ path");
        assert_eq!(
            PostgresDialect.quote_value(&value, TypeTag::Text),
            "'it''s a \\ path'"
        );
        assert_eq!(
            MysqlDialect.quote_value(&value, TypeTag::Text),
            "'it''s a \\\\ path'"
        );
    }

    #[test]
    fn booleans_and_bytes_differ_per_dialect() {
        assert_eq!(PostgresDialect.quote_value(&Value::Bool(true), TypeTag::Boolean), "TRUE");
        assert_eq!(PostgresDialect.quote_value(&Value::Int(0), TypeTag::Boolean), "FALSE");
        assert_eq!(SqliteDialect.quote_value(&Value::Bool(true), TypeTag::Boolean), "1");
        assert_eq!(
            PostgresDialect.quote_value(&Value::Bytes(vec![0xde, 0xad]), TypeTag::Bytes),
            "'\\xdead'"
        );
        assert_eq!(
            SqliteDialect.quote_value(&Value::Bytes(vec![0xde, 0xad]), TypeTag::Bytes),
            "X'dead'"
        );
    }

    #[test]
    fn temporal_and_json_literals() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let timestamp = date.and_hms_opt(3, 4, 5).unwrap();
        assert_eq!(PostgresDialect.quote_value(&Value::Date(date), TypeTag::Date), "'2024-01-02'");
        assert_eq!(
            PostgresDialect.quote_value(&Value::Timestamp(timestamp), TypeTag::Timestamp),
            "'2024-01-02 03:04:05'"
        );
        assert_eq!(
            PostgresDialect.quote_value(&Value::from("x"), TypeTag::Json),
            "'\"x\"'"
        );
        assert_eq!(
            PostgresDialect.quote_value(&Value::Float(f64::NAN), TypeTag::Numeric),
            "'NaN'"
        );
    }

    #[test]
    fn dialect_factory_matches_kind() {
        for kind in [DialectKind::Postgres, DialectKind::Sqlite, DialectKind::Mysql] {
            assert_eq!(dialect_for(kind).kind(), kind);
        }
        assert_eq!(
            MysqlDialect.insert_default_values("`t`"),
            "INSERT INTO `t` () VALUES ()"
        );
    }
}
