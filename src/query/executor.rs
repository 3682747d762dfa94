use crate::catalog::types::{ColumnMeta, Period, Row, SemanticType, Table, Value};
use crate::connect::Backend;
use crate::error::DictumError;
use crate::query::plan::{CompiledQuery, Derivation};

/// Invoked once per fetched page with the cumulative row count. Observational
/// only; it cannot influence control flow.
pub type ProgressFn<'a> = &'a mut dyn FnMut(usize);

/// Runs a compiled query against a backend, drives its pagination protocol to
/// completion, and returns one normalized, type-coerced table with the
/// post-processing plan already applied.
///
/// Pages are appended in arrival order. Any failure while paging aborts the
/// whole call; no partial table is ever returned.
pub fn execute(
    backend: &mut dyn Backend,
    compiled: &CompiledQuery,
    mut progress: Option<ProgressFn<'_>>,
) -> Result<Table, DictumError> {
    let columns: Vec<ColumnMeta> = compiled
        .fetched
        .iter()
        .map(|c| ColumnMeta {
            name: c.logical.clone(),
            semantic: c.semantic,
        })
        .collect();
    let mut table = Table::new(columns)?;

    let mut page = backend.submit(&compiled.sql)?;
    let mut pages = 0usize;
    loop {
        pages += 1;
        if let Some(names) = &page.columns
            && names.len() != compiled.fetched.len()
        {
            return Err(DictumError::QueryExecution {
                message: format!(
                    "backend returned {} columns, compiled query expects {}",
                    names.len(),
                    compiled.fetched.len()
                ),
            });
        }
        for raw_row in &page.rows {
            if raw_row.len() != compiled.fetched.len() {
                return Err(DictumError::QueryExecution {
                    message: format!(
                        "backend row has {} cells, compiled query expects {}",
                        raw_row.len(),
                        compiled.fetched.len()
                    ),
                });
            }
            let mut values = Vec::with_capacity(raw_row.len());
            for (raw, col) in raw_row.iter().zip(&compiled.fetched) {
                values.push(backend.coerce(&col.logical, raw, col.semantic)?);
            }
            table.push_row(Row::from_values(values));
        }
        tracing::debug!(page = pages, rows = table.len(), "page appended");
        if let Some(cb) = progress.as_mut() {
            cb(table.len());
        }

        match page.cursor.take() {
            Some(token) => page = backend.next_page(&token)?,
            // An absent continuation token is normal termination.
            None => break,
        }
    }

    apply_plan(&mut table, compiled)?;
    Ok(table)
}

fn result_column(table: &Table, name: &str) -> Result<usize, DictumError> {
    table
        .column_index(name)
        .ok_or_else(|| DictumError::UnknownColumn {
            table: "(tabular result)".into(),
            column: name.to_string(),
        })
}

/// Applies every post-processing step, appending one derived column per step
/// in plan order.
fn apply_plan(table: &mut Table, compiled: &CompiledQuery) -> Result<(), DictumError> {
    for step in &compiled.plan {
        match &step.derivation {
            Derivation::Ratio {
                numerator,
                denominator,
            } => {
                let num_idx = result_column(table, numerator)?;
                let den_idx = result_column(table, denominator)?;
                let values: Vec<Value> = table
                    .rows()
                    .iter()
                    .map(|row| ratio(&row.values[num_idx], &row.values[den_idx]))
                    .collect();
                table.push_column(
                    ColumnMeta {
                        name: step.output.clone(),
                        semantic: SemanticType::Numeric,
                    },
                    values,
                )?;
            }
            Derivation::Bucket {
                source,
                granularity,
            } => {
                let src_idx = result_column(table, source)?;
                let mut values = Vec::with_capacity(table.len());
                for row in table.rows() {
                    values.push(match &row.values[src_idx] {
                        Value::Timestamp(ts) => {
                            Value::Period(Period::from_timestamp(*ts, *granularity))
                        }
                        Value::Null => Value::Null,
                        other => {
                            return Err(DictumError::TypeCoercion {
                                column: source.clone(),
                                expected: "timestamp",
                                value: other.to_string(),
                            });
                        }
                    });
                }
                table.push_column(
                    ColumnMeta {
                        name: step.output.clone(),
                        semantic: SemanticType::Period,
                    },
                    values,
                )?;
            }
        }
    }
    Ok(())
}

// Zero-denominator rows are expected in sparse data; they produce a missing
// value, never a division error and never infinity.
fn ratio(numerator: &Value, denominator: &Value) -> Value {
    match (numerator.as_f64(), denominator.as_f64()) {
        (Some(n), Some(d)) if d != 0.0 => Value::Float(n / d),
        _ => Value::Null,
    }
}
