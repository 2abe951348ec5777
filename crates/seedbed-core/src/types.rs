use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Formatted and raw type metadata for a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnType {
    /// User-friendly formatted type (e.g. `character varying(255)`).
    pub data_type: String,
    /// Name of the underlying type (e.g. `int4`, `jsonb`).
    #[serde(default)]
    pub udt_name: Option<String>,
    #[serde(default)]
    pub character_max_length: Option<i32>,
    #[serde(default)]
    pub numeric_scale: Option<i32>,
}

impl ColumnType {
    /// Build a type from its formatted name only.
    pub fn named(data_type: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            udt_name: None,
            character_max_length: None,
            numeric_scale: None,
        }
    }

    /// Semantic tag used by dialects when rendering literals.
    pub fn tag(&self) -> TypeTag {
        let raw = self
            .udt_name
            .as_deref()
            .unwrap_or(self.data_type.as_str())
            .trim()
            .to_lowercase();
        let base = raw.split('(').next().unwrap_or("").trim();

        match base {
            "smallint" | "integer" | "bigint" | "int" | "int2" | "int4" | "int8" | "tinyint"
            | "mediumint" | "serial" | "bigserial" | "smallserial" => TypeTag::Integer,
            "numeric" | "decimal" | "real" | "double precision" | "double" | "float" | "float4"
            | "float8" => TypeTag::Numeric,
            "boolean" | "bool" => TypeTag::Boolean,
            "uuid" => TypeTag::Uuid,
            "date" => TypeTag::Date,
            "time" | "time with time zone" | "time without time zone" | "timetz" => TypeTag::Time,
            "timestamp"
            | "timestamp with time zone"
            | "timestamp without time zone"
            | "timestamptz"
            | "datetime" => TypeTag::Timestamp,
            "json" | "jsonb" => TypeTag::Json,
            "bytea" | "blob" | "binary" | "varbinary" => TypeTag::Bytes,
            "text" | "character varying" | "varchar" | "character" | "char" | "bpchar"
            | "citext" | "name" => TypeTag::Text,
            _ => TypeTag::Other,
        }
    }
}

/// Coarse type family of a column, used only for quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    Integer,
    Numeric,
    Boolean,
    Text,
    Uuid,
    Date,
    Time,
    Timestamp,
    Json,
    Bytes,
    Other,
}

/// Identity generation strategy for columns using `GENERATED ... AS IDENTITY`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IdentityGeneration {
    Always,
    ByDefault,
}

/// Kind of generated column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GeneratedKind {
    Stored,
    Virtual,
}

/// Information about generated column expressions.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedExpression {
    pub kind: GeneratedKind,
    pub expression: Option<String>,
}

/// Representation of enum types.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EnumType {
    pub schema: String,
    pub name: String,
    pub labels: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_follow_udt_name_first() {
        let ty = ColumnType {
            data_type: "USER-DEFINED".to_string(),
            udt_name: Some("jsonb".to_string()),
            character_max_length: None,
            numeric_scale: None,
        };
        assert_eq!(ty.tag(), TypeTag::Json);
    }

    #[test]
    fn tags_strip_modifiers() {
        assert_eq!(ColumnType::named("varchar(255)").tag(), TypeTag::Text);
        assert_eq!(ColumnType::named("numeric(10, 2)").tag(), TypeTag::Numeric);
        assert_eq!(ColumnType::named("INTEGER").tag(), TypeTag::Integer);
        assert_eq!(ColumnType::named("tsvector").tag(), TypeTag::Other);
    }
}
