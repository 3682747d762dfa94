use std::collections::BTreeSet;

use crate::catalog::Catalog;
use crate::catalog::schema::{ColumnRole, ColumnSpec, CountKind, TableEntry};
use crate::catalog::types::SemanticType;
use crate::error::DictumError;
use crate::query::plan::{CompiledQuery, Derivation, FetchedColumn, PlanStep};

/// Compiles a logical request into a backend-native aggregate query plus a
/// post-processing plan.
///
/// Group-by columns emit in catalog order, never request order, so the same
/// logical request always produces byte-identical SQL. Calculated columns
/// never reach the native query; their fetch dependencies are injected into
/// the aggregate lists as an idempotent set union.
///
/// The filter rewrite is a whitespace-token substitution of logical names to
/// physical ones. Tokens absent from the catalog pass through verbatim, so
/// operators and literals survive untouched, and so does a logical name that
/// happens to collide with a native keyword. That ambiguity is a documented
/// limitation of the token-level rewrite, not something this layer corrects.
pub fn compile(
    catalog: &Catalog,
    table: &str,
    requested: &[String],
    filter: &str,
) -> Result<CompiledQuery, DictumError> {
    let entry = catalog.table(table)?;

    if requested.is_empty() {
        return Err(DictumError::EmptyColumnSet {
            table: table.to_string(),
        });
    }

    // Logical names of columns that must be fetched from the backend, as a
    // set: injecting the same dependency twice is a no-op.
    let mut fetch_set: BTreeSet<&str> = BTreeSet::new();
    let mut plan: Vec<PlanStep> = Vec::new();

    for name in requested {
        let spec = entry
            .column(name)
            .ok_or_else(|| DictumError::UnknownColumn {
                table: table.to_string(),
                column: name.clone(),
            })?;
        match &spec.role {
            ColumnRole::Additive | ColumnRole::Count(_) | ColumnRole::GroupBy(_) => {
                fetch_set.insert(spec.logical.as_str());
            }
            ColumnRole::Ratio {
                numerator,
                denominator,
            } => {
                fetch_set.insert(numerator.as_str());
                fetch_set.insert(denominator.as_str());
                push_step(
                    &mut plan,
                    spec,
                    Derivation::Ratio {
                        numerator: numerator.clone(),
                        denominator: denominator.clone(),
                    },
                );
            }
            ColumnRole::Bucket {
                source,
                granularity,
            } => {
                fetch_set.insert(source.as_str());
                push_step(
                    &mut plan,
                    spec,
                    Derivation::Bucket {
                        source: source.clone(),
                        granularity: *granularity,
                    },
                );
            }
        }
    }

    // Partition the fetch set in catalog order. Catalog iteration, not the
    // request sequence, fixes the order of every emitted list.
    let mut group_bys: Vec<&ColumnSpec> = Vec::new();
    let mut sums: Vec<&ColumnSpec> = Vec::new();
    let mut counts: Vec<&ColumnSpec> = Vec::new();
    for spec in &entry.columns {
        if !fetch_set.contains(spec.logical.as_str()) {
            continue;
        }
        match &spec.role {
            ColumnRole::GroupBy(_) => group_bys.push(spec),
            ColumnRole::Additive => sums.push(spec),
            ColumnRole::Count(_) => counts.push(spec),
            // Calculated columns never enter the fetch set.
            ColumnRole::Ratio { .. } | ColumnRole::Bucket { .. } => {}
        }
    }

    let mut select_parts: Vec<String> = Vec::new();
    let mut fetched: Vec<FetchedColumn> = Vec::new();
    for spec in &group_bys {
        select_parts.push(aliased(physical(spec), &spec.logical));
        fetched.push(FetchedColumn {
            logical: spec.logical.clone(),
            semantic: spec.role.semantic(),
        });
    }
    for spec in &sums {
        select_parts.push(format!("SUM({}) {}", physical(spec), spec.logical));
        fetched.push(FetchedColumn {
            logical: spec.logical.clone(),
            semantic: SemanticType::Numeric,
        });
    }
    for spec in &counts {
        let ColumnRole::Count(kind) = &spec.role else {
            continue;
        };
        let part = match kind {
            CountKind::Preaggregated => aliased(physical(spec), &spec.logical),
            CountKind::Rows => format!("COUNT({}) {}", physical(spec), spec.logical),
            CountKind::Distinct => {
                format!("COUNT(DISTINCT {}) {}", physical(spec), spec.logical)
            }
        };
        select_parts.push(part);
        fetched.push(FetchedColumn {
            logical: spec.logical.clone(),
            semantic: SemanticType::Integer,
        });
    }

    let mut sql = format!(
        "SELECT {} FROM {}",
        select_parts.join(", "),
        entry.physical_name
    );
    let rewritten = rewrite_filter(entry, filter);
    if !rewritten.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&rewritten);
    }
    if !group_bys.is_empty() {
        sql.push_str(" GROUP BY ");
        let keys: Vec<&str> = group_bys.iter().map(|s| physical(s)).collect();
        sql.push_str(&keys.join(", "));
    }

    Ok(CompiledQuery { sql, fetched, plan })
}

fn push_step(plan: &mut Vec<PlanStep>, spec: &ColumnSpec, derivation: Derivation) {
    // Requesting the same calculated column twice yields one plan step.
    if plan.iter().any(|s| s.output == spec.logical) {
        return;
    }
    plan.push(PlanStep {
        output: spec.logical.clone(),
        derivation,
    });
}

// Load-time validation guarantees non-calculated columns carry a physical
// name; fall back to the logical name rather than panic if that ever breaks.
fn physical(spec: &ColumnSpec) -> &str {
    spec.physical.as_deref().unwrap_or(spec.logical.as_str())
}

fn aliased(physical: &str, logical: &str) -> String {
    if physical == logical {
        logical.to_string()
    } else {
        format!("{physical} {logical}")
    }
}

fn rewrite_filter(entry: &TableEntry, filter: &str) -> String {
    filter
        .split_whitespace()
        .map(|token| match entry.column(token).and_then(|c| c.physical.as_deref()) {
            Some(physical) => physical,
            None => token,
        })
        .collect::<Vec<&str>>()
        .join(" ")
}
