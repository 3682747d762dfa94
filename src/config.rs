use std::path::PathBuf;

/// Locations of the two catalog source documents: the data dictionary
/// (tables, columns, connection descriptors) and the secrets file
/// (credentials, kept out of version control).
#[derive(Debug, Clone)]
pub struct CatalogSources {
    pub data_dict_path: PathBuf,
    pub secrets_path: PathBuf,
}

impl CatalogSources {
    pub fn new(data_dict_path: impl Into<PathBuf>, secrets_path: impl Into<PathBuf>) -> Self {
        Self {
            data_dict_path: data_dict_path.into(),
            secrets_path: secrets_path.into(),
        }
    }
}

impl Default for CatalogSources {
    fn default() -> Self {
        Self {
            data_dict_path: PathBuf::from("data_dict.yml"),
            secrets_path: PathBuf::from("secrets.yml"),
        }
    }
}

/// Tuning for the paginated backend's first request. The server owns the
/// actual page size; `fetch_size` is a hint.
#[derive(Debug, Clone)]
pub struct QuerySettings {
    pub fetch_size: Option<u32>,
    /// Ask the backend to return the first element of multi-valued fields
    /// instead of rejecting the row.
    pub multi_value_leniency: bool,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            fetch_size: None,
            multi_value_leniency: true,
        }
    }
}
