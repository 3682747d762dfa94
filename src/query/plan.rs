use crate::catalog::types::{Granularity, SemanticType};

/// One column of the native query's output, in emission order. The executor
/// coerces every fetched cell against this schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedColumn {
    pub logical: String,
    pub semantic: SemanticType,
}

/// How a post-query column is derived from already-fetched columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Derivation {
    /// Elementwise division of two fetched numeric columns. A zero or missing
    /// denominator yields a missing value.
    Ratio {
        numerator: String,
        denominator: String,
    },
    /// Truncation of a fetched timestamp column to a calendar granularity.
    Bucket {
        source: String,
        granularity: Granularity,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    /// Output logical name; becomes a new column appended to the result.
    pub output: String,
    pub derivation: Derivation,
}

/// A compiled logical request: the backend-native query string plus the
/// post-processing plan for every calculated column. Compiling the same
/// request against the same catalog twice yields an identical value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    pub sql: String,
    pub fetched: Vec<FetchedColumn>,
    pub plan: Vec<PlanStep>,
}
