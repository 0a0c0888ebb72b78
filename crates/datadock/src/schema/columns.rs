use serde::{Deserialize, Serialize};

/// Canonical form of a column name: ASCII lowercase, every run of
/// non-alphanumeric characters collapsed to a single underscore, no leading
/// or trailing underscore. Names that canonicalize to an empty string are
/// unusable and never match anything.
pub fn canonicalize_column(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        match c {
            'a'..='z' | '0'..='9' => {
                if pending_sep && !out.is_empty() {
                    out.push('_');
                }
                pending_sep = false;
                out.push(c);
            }
            'A'..='Z' => {
                if pending_sep && !out.is_empty() {
                    out.push('_');
                }
                pending_sep = false;
                out.push(c.to_ascii_lowercase());
            }
            _ => pending_sep = true,
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
}

impl ColumnType {
    /// SQLite column affinity used when creating a table.
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Float => "REAL",
            Self::Boolean => "INTEGER",
            Self::Date => "TEXT",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
        };
        write!(f, "{}", s)
    }
}

/// One column of an inferred or stored table schema. `name` is always the
/// canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: ColumnType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            name: canonicalize_column(&name.into()),
            data_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_replaces_non_alphanumeric() {
        assert_eq!(canonicalize_column("Order ID"), "order_id");
        assert_eq!(canonicalize_column("Base Year"), "base_year");
        assert_eq!(canonicalize_column("amount (USD)"), "amount_usd");
    }

    #[test]
    fn test_canonicalize_collapses_and_trims_separators() {
        assert_eq!(canonicalize_column("$Percent%"), "percent");
        assert_eq!(canonicalize_column("__value__"), "value");
        assert_eq!(canonicalize_column("a -- b"), "a_b");
    }

    #[test]
    fn test_canonicalize_lowercases() {
        assert_eq!(canonicalize_column("BASEYEAR"), "baseyear");
        assert_eq!(canonicalize_column("Month"), "month");
    }

    #[test]
    fn test_canonicalize_unusable_names() {
        assert_eq!(canonicalize_column(""), "");
        assert_eq!(canonicalize_column("###"), "");
        assert_eq!(canonicalize_column(" - "), "");
    }

    #[test]
    fn test_column_schema_canonicalizes_name() {
        let col = ColumnSchema::new("Base Year", ColumnType::Integer);
        assert_eq!(col.name, "base_year");
        assert_eq!(col.data_type, ColumnType::Integer);
    }

    #[test]
    fn test_sql_type_mapping() {
        assert_eq!(ColumnType::Text.sql_type(), "TEXT");
        assert_eq!(ColumnType::Integer.sql_type(), "INTEGER");
        assert_eq!(ColumnType::Float.sql_type(), "REAL");
        assert_eq!(ColumnType::Boolean.sql_type(), "INTEGER");
        assert_eq!(ColumnType::Date.sql_type(), "TEXT");
    }
}
