use std::collections::HashSet;

use crate::catalog::types::{Table, Value};
use crate::error::DictumError;

/// Checks whether `candidate` is a primary key for `table`: true iff no two
/// rows share identical values across all candidate columns. Ties are
/// detected, not resolved. Read-only and idempotent.
pub fn is_primary_key(table: &Table, candidate: &[&str]) -> Result<bool, DictumError> {
    let idxs = resolve_columns(table, candidate)?;
    let mut seen: HashSet<Vec<&Value>> = HashSet::with_capacity(table.len());
    for row in table.rows() {
        let key: Vec<&Value> = idxs.iter().map(|&i| &row.values[i]).collect();
        if !seen.insert(key) {
            tracing::debug!(candidate = ?candidate, "duplicate candidate key values found");
            return Ok(false);
        }
    }
    Ok(true)
}

/// Checks whether every column in `dependent` is functionally dependent on
/// `determinant`: for each dependent column, the deduplicated projection onto
/// (determinant ∪ {dependent}) must have exactly as many rows as the
/// deduplicated projection onto determinant alone. All dependents must pass
/// individually for the overall result to be true.
pub fn is_functionally_dependent(
    table: &Table,
    determinant: &[&str],
    dependent: &[&str],
) -> Result<bool, DictumError> {
    for column in dependent {
        if determinant.contains(column) {
            return Err(DictumError::OverlappingKeySet {
                column: column.to_string(),
            });
        }
    }
    let det_idxs = resolve_columns(table, determinant)?;

    let mut result = true;
    for column in dependent {
        let dep_idx = resolve_columns(table, &[*column])?[0];
        let mut det_only: HashSet<Vec<&Value>> = HashSet::new();
        let mut combined: HashSet<Vec<&Value>> = HashSet::new();
        for row in table.rows() {
            let det_key: Vec<&Value> = det_idxs.iter().map(|&i| &row.values[i]).collect();
            let mut full_key = det_key.clone();
            full_key.push(&row.values[dep_idx]);
            det_only.insert(det_key);
            combined.insert(full_key);
        }
        let holds = combined.len() == det_only.len();
        tracing::debug!(
            column,
            determinant_cardinality = det_only.len(),
            combined_cardinality = combined.len(),
            holds,
            "functional dependency check"
        );
        result = result && holds;
    }
    Ok(result)
}

fn resolve_columns(table: &Table, names: &[&str]) -> Result<Vec<usize>, DictumError> {
    names
        .iter()
        .map(|name| {
            table
                .column_index(name)
                .ok_or_else(|| DictumError::UnknownColumn {
                    table: "(tabular result)".into(),
                    column: name.to_string(),
                })
        })
        .collect()
}
