use serde::{Deserialize, Serialize};

use crate::catalog::types::{Granularity, SemanticType};

/// How a count-role column reaches the native query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CountKind {
    /// The physical column already holds a count; pass it through unaggregated.
    Preaggregated,
    /// Wrap in COUNT(..).
    Rows,
    /// Wrap in COUNT(DISTINCT ..).
    Distinct,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupByKind {
    Date,
    Int,
    Str,
}

impl GroupByKind {
    pub fn semantic(self) -> SemanticType {
        match self {
            GroupByKind::Date => SemanticType::Timestamp,
            GroupByKind::Int => SemanticType::Integer,
            GroupByKind::Str => SemanticType::Text,
        }
    }
}

/// Role tag driving how the compiler treats a column. A closed enum: an
/// unrecognized tag in the data dictionary fails at load, not at compile time.
/// `Ratio` and `Bucket` are the calculated-post-query roles; they never reach
/// the native query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Additive,
    Count(CountKind),
    GroupBy(GroupByKind),
    Ratio {
        numerator: String,
        denominator: String,
    },
    Bucket {
        source: String,
        granularity: Granularity,
    },
}

impl ColumnRole {
    pub fn is_calculated(&self) -> bool {
        matches!(self, ColumnRole::Ratio { .. } | ColumnRole::Bucket { .. })
    }

    /// Semantic type of the column as it appears in a tabular result.
    pub fn semantic(&self) -> SemanticType {
        match self {
            ColumnRole::Additive => SemanticType::Numeric,
            ColumnRole::Count(_) => SemanticType::Integer,
            ColumnRole::GroupBy(kind) => kind.semantic(),
            ColumnRole::Ratio { .. } => SemanticType::Numeric,
            ColumnRole::Bucket { .. } => SemanticType::Period,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Stable, analyst-facing name.
    pub logical: String,
    /// Backend-native name. None exactly when the role is calculated.
    #[serde(default)]
    pub physical: Option<String>,
    pub role: ColumnRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableEntry {
    /// Logical table name, as analysts request it.
    pub name: String,
    /// Backend-native table name.
    pub physical_name: String,
    pub columns: Vec<ColumnSpec>,
}

impl TableEntry {
    pub fn column(&self, logical: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.logical == logical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_role_tag_fails_to_parse() {
        let yaml = "logical: usage_sum\nphysical: kwh_del\nrole: exotic_rollup\n";
        let parsed: Result<ColumnSpec, _> = serde_yaml::from_str(yaml);
        assert!(parsed.is_err());
    }

    #[test]
    fn role_tags_parse_from_snake_case() {
        let spec: ColumnSpec = serde_yaml::from_str(
            "logical: meter_count\nphysical: meter_cnt\nrole:\n  count: preaggregated\n",
        )
        .unwrap();
        assert_eq!(spec.role, ColumnRole::Count(CountKind::Preaggregated));
        assert_eq!(spec.role.semantic(), SemanticType::Integer);

        let spec: ColumnSpec = serde_yaml::from_str(
            "logical: acpu\nrole:\n  ratio:\n    numerator: usage_sum\n    denominator: meter_count\n",
        )
        .unwrap();
        assert!(spec.role.is_calculated());
        assert!(spec.physical.is_none());
    }
}
