use chrono::{DateTime, Datelike, NaiveDate, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::DictumError;

/// The closed set of column types a tabular result can carry. Every fetched
/// column is coerced to exactly one of these before it leaves the executor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Numeric,
    Integer,
    Text,
    Timestamp,
    Period,
}

impl SemanticType {
    pub fn as_str(self) -> &'static str {
        match self {
            SemanticType::Numeric => "numeric",
            SemanticType::Integer => "integer",
            SemanticType::Text => "text",
            SemanticType::Timestamp => "timestamp",
            SemanticType::Period => "period",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Day,
    Month,
    Year,
}

/// A calendar bucket: a timestamp truncated to `granularity`, keyed by the
/// bucket's first day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Period {
    pub start: NaiveDate,
    pub granularity: Granularity,
}

impl Period {
    pub fn from_timestamp(ts: DateTime<Utc>, granularity: Granularity) -> Self {
        let date = ts.date_naive();
        let start = match granularity {
            Granularity::Day => date,
            // Truncation cannot fail: day 1 and month 1 always exist.
            Granularity::Month => date.with_day(1).unwrap_or(date),
            Granularity::Year => {
                let jan = date.with_month(1).unwrap_or(date);
                jan.with_day(1).unwrap_or(jan)
            }
        };
        Period { start, granularity }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.granularity {
            Granularity::Day => write!(f, "{}", self.start.format("%Y-%m-%d")),
            Granularity::Month => write!(f, "{}", self.start.format("%Y-%m")),
            Granularity::Year => write!(f, "{}", self.start.format("%Y")),
        }
    }
}

/// A single cell. `Null` is the distinguishable missing value: absent backend
/// cells and zero-denominator ratios produce it, and it never collapses into
/// a zero of the column's type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Text(CompactString),
    Integer(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    Period(Period),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view used by ratio post-processing. Integers widen to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}

// Floats compare and hash by bit pattern so rows can be deduplicated; the
// validator needs Eq + Hash over whole rows, not numeric tolerance.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Period(a), Value::Period(b)) => a == b,
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Text(v) => v.hash(state),
            Value::Integer(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Timestamp(v) => v.hash(state),
            Value::Period(v) => v.hash(state),
            Value::Null => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Period(v) => write!(f, "{v}"),
            Value::Null => write!(f, "null"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn from_values(values: Vec<Value>) -> Self {
        Self { values }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub semantic: SemanticType,
}

/// The normalized tabular result common to both backends. Column names are
/// unique; each column holds one semantic type; zero rows is valid.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<ColumnMeta>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<ColumnMeta>) -> Result<Self, DictumError> {
        for (i, col) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == col.name) {
                return Err(DictumError::SchemaIntegrity {
                    table: "(tabular result)".into(),
                    message: format!("duplicate column name '{}'", col.name),
                });
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Appends a row. The caller is responsible for arity; the executor only
    /// feeds rows it has already coerced against `columns`.
    pub fn push_row(&mut self, row: Row) {
        debug_assert_eq!(row.values.len(), self.columns.len());
        self.rows.push(row);
    }

    /// Appends a derived column with one value per existing row.
    pub fn push_column(
        &mut self,
        meta: ColumnMeta,
        values: Vec<Value>,
    ) -> Result<(), DictumError> {
        if self.column_index(&meta.name).is_some() {
            return Err(DictumError::SchemaIntegrity {
                table: "(tabular result)".into(),
                message: format!("duplicate column name '{}'", meta.name),
            });
        }
        debug_assert_eq!(values.len(), self.rows.len());
        self.columns.push(meta);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.values.push(value);
        }
        Ok(())
    }

    /// Values of one column, in row order.
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().map(move |r| &r.values[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 13, 45, 0).unwrap()
    }

    #[test]
    fn period_truncates_to_granularity() {
        let month = Period::from_timestamp(ts(2023, 7, 19), Granularity::Month);
        assert_eq!(month.to_string(), "2023-07");
        let year = Period::from_timestamp(ts(2023, 7, 19), Granularity::Year);
        assert_eq!(year.to_string(), "2023");
        let day = Period::from_timestamp(ts(2023, 7, 19), Granularity::Day);
        assert_eq!(day.to_string(), "2023-07-19");
    }

    #[test]
    fn float_values_compare_by_bits() {
        assert_eq!(Value::Float(1.5), Value::Float(1.5));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Null, Value::Integer(0));
    }

    #[test]
    fn table_rejects_duplicate_column_names() {
        let err = Table::new(vec![
            ColumnMeta {
                name: "region".into(),
                semantic: SemanticType::Text,
            },
            ColumnMeta {
                name: "region".into(),
                semantic: SemanticType::Text,
            },
        ])
        .unwrap_err();
        assert_eq!(err.code_str(), "schema_integrity");
    }

    #[test]
    fn push_column_extends_every_row() {
        let mut table = Table::new(vec![ColumnMeta {
            name: "usage_sum".into(),
            semantic: SemanticType::Numeric,
        }])
        .unwrap();
        table.push_row(Row::from_values(vec![Value::Float(4.0)]));
        table.push_row(Row::from_values(vec![Value::Float(6.0)]));
        table
            .push_column(
                ColumnMeta {
                    name: "acpu".into(),
                    semantic: SemanticType::Numeric,
                },
                vec![Value::Float(2.0), Value::Null],
            )
            .unwrap();
        assert_eq!(table.columns().len(), 2);
        assert_eq!(table.rows()[1].values[1], Value::Null);
    }
}
