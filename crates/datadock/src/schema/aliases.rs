use std::collections::HashMap;

use crate::config::ColumnAlias;
use crate::schema::columns::canonicalize_column;

/// Maps variant column spellings to the canonical column they stand for.
/// Both sides are stored canonicalized; lookups happen after the incoming
/// name itself failed to match a target column directly.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    map: HashMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in aliases every deployment gets. Config entries are added
    /// on top and may override these.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        for (alias, column) in [
            ("baseyear", "base_year"),
            ("yr", "year"),
            ("qtr", "quarter"),
            ("amount_usd", "amount"),
        ] {
            table.insert(alias, column);
        }
        table
    }

    pub fn from_config(pairs: &[ColumnAlias]) -> Self {
        let mut table = Self::with_defaults();
        for pair in pairs {
            table.insert(&pair.alias, &pair.column);
        }
        table
    }

    pub fn insert(&mut self, alias: &str, column: &str) {
        let alias = canonicalize_column(alias);
        let column = canonicalize_column(column);
        if alias.is_empty() || column.is_empty() || alias == column {
            return;
        }
        self.map.insert(alias, column);
    }

    pub fn resolve(&self, canonical_name: &str) -> Option<&str> {
        self.map.get(canonical_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// All `(alias, column)` pairs, sorted by alias. The table is part of the
    /// decision evidence a reviewer may want to see.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .map
            .iter()
            .map(|(a, c)| (a.clone(), c.clone()))
            .collect();
        entries.sort();
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_contain_baseyear() {
        let table = AliasTable::with_defaults();
        assert_eq!(table.resolve("baseyear"), Some("base_year"));
        assert_eq!(table.resolve("yr"), Some("year"));
    }

    #[test]
    fn test_insert_canonicalizes_both_sides() {
        let mut table = AliasTable::new();
        table.insert("Base Year ", "BASE_YEAR");
        // canonical forms collide, self-mapping is dropped
        assert_eq!(table.resolve("base_year"), None);

        table.insert("BaseYr", "Base Year");
        assert_eq!(table.resolve("baseyr"), Some("base_year"));
    }

    #[test]
    fn test_config_overrides_default() {
        let pairs = vec![ColumnAlias {
            alias: "yr".to_string(),
            column: "fiscal_year".to_string(),
        }];
        let table = AliasTable::from_config(&pairs);
        assert_eq!(table.resolve("yr"), Some("fiscal_year"));
        // defaults not touched by the override survive
        assert_eq!(table.resolve("qtr"), Some("quarter"));
    }

    #[test]
    fn test_unusable_entries_ignored() {
        let mut table = AliasTable::new();
        table.insert("###", "year");
        table.insert("yr", "   ");
        assert!(table.is_empty());
    }

    #[test]
    fn test_entries_sorted() {
        let table = AliasTable::with_defaults();
        let entries = table.entries();
        let mut sorted = entries.clone();
        sorted.sort();
        assert_eq!(entries, sorted);
        assert_eq!(entries.len(), table.len());
    }
}
