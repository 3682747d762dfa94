use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    CatalogLoad,
    SchemaIntegrity,
    UnknownTable,
    UnknownColumn,
    EmptyColumnSet,
    UnsupportedConnectionKind,
    Connection,
    QueryExecution,
    TypeCoercion,
    OverlappingKeySet,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::CatalogLoad => "catalog_load",
            ErrorCode::SchemaIntegrity => "schema_integrity",
            ErrorCode::UnknownTable => "unknown_table",
            ErrorCode::UnknownColumn => "unknown_column",
            ErrorCode::EmptyColumnSet => "empty_column_set",
            ErrorCode::UnsupportedConnectionKind => "unsupported_connection_kind",
            ErrorCode::Connection => "connection",
            ErrorCode::QueryExecution => "query_execution",
            ErrorCode::TypeCoercion => "type_coercion",
            ErrorCode::OverlappingKeySet => "overlapping_key_set",
        }
    }
}

#[derive(Debug, Error)]
pub enum DictumError {
    #[error("catalog load failed for '{source_path}': {message}")]
    CatalogLoad { source_path: String, message: String },
    #[error("schema integrity violation in table '{table}': {message}")]
    SchemaIntegrity { table: String, message: String },
    #[error("table '{table}' not found in catalog")]
    UnknownTable { table: String },
    #[error("column '{column}' not found in table '{table}'")]
    UnknownColumn { table: String, column: String },
    #[error("no columns requested for table '{table}'")]
    EmptyColumnSet { table: String },
    #[error("connection kind '{kind}' is not supported")]
    UnsupportedConnectionKind { kind: String },
    #[error("connection to '{endpoint}' failed: {message}")]
    Connection { endpoint: String, message: String },
    #[error("query execution failed: {message}")]
    QueryExecution { message: String },
    #[error("cannot coerce value {value} in column '{column}' to {expected}")]
    TypeCoercion {
        column: String,
        expected: &'static str,
        value: String,
    },
    #[error("column '{column}' appears in both the determinant and dependent sets")]
    OverlappingKeySet { column: String },
}

impl DictumError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DictumError::CatalogLoad { .. } => ErrorCode::CatalogLoad,
            DictumError::SchemaIntegrity { .. } => ErrorCode::SchemaIntegrity,
            DictumError::UnknownTable { .. } => ErrorCode::UnknownTable,
            DictumError::UnknownColumn { .. } => ErrorCode::UnknownColumn,
            DictumError::EmptyColumnSet { .. } => ErrorCode::EmptyColumnSet,
            DictumError::UnsupportedConnectionKind { .. } => ErrorCode::UnsupportedConnectionKind,
            DictumError::Connection { .. } => ErrorCode::Connection,
            DictumError::QueryExecution { .. } => ErrorCode::QueryExecution,
            DictumError::TypeCoercion { .. } => ErrorCode::TypeCoercion,
            DictumError::OverlappingKeySet { .. } => ErrorCode::OverlappingKeySet,
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().as_str()
    }
}
