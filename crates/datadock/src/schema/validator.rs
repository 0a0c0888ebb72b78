//! Column-level compatibility check between an incoming table and an
//! existing target dataset.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::schema::aliases::AliasTable;
use crate::schema::columns::canonicalize_column;

/// One reconciled column pair: `source` is the original incoming header,
/// `target` the target column it will be written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub source: String,
    pub target: String,
}

/// Outcome of comparing an incoming column list against a target schema.
/// Part of the decision packet shown to the approver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Target columns matched by the incoming table, in target order.
    pub matching_columns: Vec<String>,
    /// Target columns the incoming table lacks, in target order.
    pub missing_columns: Vec<String>,
    /// Incoming columns (canonical form) with no target counterpart, in
    /// incoming order. Never blocks compatibility.
    pub extra_columns: Vec<String>,
    /// Matched share of the target schema, 0..=100.
    pub match_percentage: f64,
    /// True iff the target has at least one usable column and none of them
    /// are missing.
    pub is_compatible: bool,
    /// Rename/reorder plan applied when rows are appended, in target order.
    pub column_mapping: Vec<ColumnMapping>,
}

/// Compares column lists after canonicalization. An incoming name matches a
/// target column directly, or through the alias table when no direct match
/// exists. Duplicate canonical names on either side collapse to one; names
/// that canonicalize to nothing are skipped. Malformed input therefore
/// degrades to zero matches instead of failing.
pub fn validate(incoming: &[String], target: &[String], aliases: &AliasTable) -> ValidationResult {
    let mut target_order: Vec<String> = Vec::new();
    let mut target_set: HashSet<String> = HashSet::new();
    for name in target {
        let canon = canonicalize_column(name);
        if canon.is_empty() {
            continue;
        }
        if target_set.insert(canon.clone()) {
            target_order.push(canon);
        }
    }

    // resolved canonical name -> original incoming spelling, first wins
    let mut resolved: HashMap<String, String> = HashMap::new();
    let mut resolved_order: Vec<String> = Vec::new();
    for name in incoming {
        let canon = canonicalize_column(name);
        if canon.is_empty() {
            continue;
        }
        let effective = if target_set.contains(&canon) {
            canon
        } else {
            match aliases.resolve(&canon) {
                Some(mapped) if target_set.contains(mapped) => mapped.to_string(),
                _ => canon,
            }
        };
        if !resolved.contains_key(&effective) {
            resolved.insert(effective.clone(), name.clone());
            resolved_order.push(effective);
        }
    }

    let mut matching_columns = Vec::new();
    let mut missing_columns = Vec::new();
    let mut column_mapping = Vec::new();
    for column in &target_order {
        match resolved.get(column) {
            Some(source) => {
                matching_columns.push(column.clone());
                column_mapping.push(ColumnMapping {
                    source: source.clone(),
                    target: column.clone(),
                });
            }
            None => missing_columns.push(column.clone()),
        }
    }

    let extra_columns: Vec<String> = resolved_order
        .into_iter()
        .filter(|name| !target_set.contains(name))
        .collect();

    let match_percentage = if target_order.is_empty() {
        0.0
    } else {
        matching_columns.len() as f64 / target_order.len() as f64 * 100.0
    };
    let is_compatible = !target_order.is_empty() && missing_columns.is_empty();

    ValidationResult {
        matching_columns,
        missing_columns,
        extra_columns,
        match_percentage,
        is_compatible,
        column_mapping,
    }
}
