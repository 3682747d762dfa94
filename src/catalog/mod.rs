pub mod schema;
pub mod types;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::schema::{ColumnRole, ColumnSpec, GroupByKind, TableEntry};
use crate::config::CatalogSources;
use crate::connect::{ConnectionKind, ConnectionProfile, Credentials};
use crate::error::DictumError;

/// On-disk shape of the data dictionary document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataDict {
    pub tables: Vec<TableEntry>,
    pub connections: Vec<ConnectionDoc>,
}

/// A connection descriptor as written in the data dictionary. The kind is a
/// free string in the document and is checked against the supported kinds at
/// load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDoc {
    pub kind: String,
    pub endpoint: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// On-disk shape of the secrets document. One set of warehouse credentials,
/// shared by both connection kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Secrets {
    pub username: String,
    pub password: String,
}

/// The merged, validated logical-to-physical mapping. Immutable once loaded;
/// share it by reference (or `Arc`) across concurrent compiles and executes.
/// Refreshing means loading a new catalog and swapping it as a unit.
#[derive(Debug, Clone)]
pub struct Catalog {
    tables: BTreeMap<String, TableEntry>,
    connections: Vec<ConnectionProfile>,
}

impl Catalog {
    /// Reads and merges the data dictionary and secrets documents.
    pub fn load(sources: &CatalogSources) -> Result<Catalog, DictumError> {
        let dict: DataDict = read_yaml(&sources.data_dict_path)?;
        let secrets: Secrets = read_yaml(&sources.secrets_path)?;
        let catalog = Catalog::from_documents(dict, secrets)?;
        tracing::info!(
            tables = catalog.tables.len(),
            connections = catalog.connections.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// Merges already-parsed documents. Used directly by callers that own
    /// their own config plumbing, and by tests.
    pub fn from_documents(dict: DataDict, secrets: Secrets) -> Result<Catalog, DictumError> {
        let mut tables = BTreeMap::new();
        for table in dict.tables {
            validate_table(&table)?;
            if tables.contains_key(&table.name) {
                return Err(DictumError::SchemaIntegrity {
                    table: table.name,
                    message: "table is declared twice".into(),
                });
            }
            tables.insert(table.name.clone(), table);
        }

        let credentials = Credentials {
            username: secrets.username,
            password: secrets.password,
        };
        let mut connections = Vec::with_capacity(dict.connections.len());
        for doc in dict.connections {
            let kind = ConnectionKind::parse(&doc.kind)?;
            connections.push(ConnectionProfile {
                kind,
                endpoint: doc.endpoint,
                params: doc.params,
                credentials: credentials.clone(),
            });
        }

        Ok(Catalog {
            tables,
            connections,
        })
    }

    pub fn table(&self, name: &str) -> Result<&TableEntry, DictumError> {
        self.tables.get(name).ok_or_else(|| DictumError::UnknownTable {
            table: name.to_string(),
        })
    }

    /// Ordered column descriptors for a logical table.
    pub fn columns_for(&self, name: &str) -> Result<&[ColumnSpec], DictumError> {
        Ok(&self.table(name)?.columns)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// The first connection descriptor of the requested kind.
    pub fn connection(&self, kind: ConnectionKind) -> Result<&ConnectionProfile, DictumError> {
        self.connections
            .iter()
            .find(|c| c.kind == kind)
            .ok_or_else(|| DictumError::Connection {
                endpoint: "(catalog)".into(),
                message: format!("no '{}' connection declared in the catalog", kind.as_str()),
            })
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, DictumError> {
    let text = fs::read_to_string(path).map_err(|e| DictumError::CatalogLoad {
        source_path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_yaml::from_str(&text).map_err(|e| DictumError::CatalogLoad {
        source_path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn integrity(table: &TableEntry, message: String) -> DictumError {
    DictumError::SchemaIntegrity {
        table: table.name.clone(),
        message,
    }
}

/// Structural checks run once per table at load, so a bad dictionary fails
/// here instead of miscompiling a query later.
fn validate_table(table: &TableEntry) -> Result<(), DictumError> {
    for (i, col) in table.columns.iter().enumerate() {
        if table.columns[..i].iter().any(|c| c.logical == col.logical) {
            return Err(integrity(
                table,
                format!("duplicate logical column name '{}'", col.logical),
            ));
        }
        match (&col.role, &col.physical) {
            (role, Some(_)) if role.is_calculated() => {
                return Err(integrity(
                    table,
                    format!(
                        "calculated column '{}' must not declare a physical name",
                        col.logical
                    ),
                ));
            }
            (role, None) if !role.is_calculated() => {
                return Err(integrity(
                    table,
                    format!("column '{}' is missing a physical name", col.logical),
                ));
            }
            _ => {}
        }
    }

    for col in &table.columns {
        match &col.role {
            ColumnRole::Ratio {
                numerator,
                denominator,
            } => {
                for dep in [numerator, denominator] {
                    let spec = table.column(dep).ok_or_else(|| {
                        integrity(
                            table,
                            format!(
                                "ratio column '{}' references unknown column '{dep}'",
                                col.logical
                            ),
                        )
                    })?;
                    if !matches!(spec.role, ColumnRole::Additive | ColumnRole::Count(_)) {
                        return Err(integrity(
                            table,
                            format!(
                                "ratio column '{}' depends on '{dep}', which is neither additive nor a count",
                                col.logical
                            ),
                        ));
                    }
                }
            }
            ColumnRole::Bucket { source, .. } => {
                let spec = table.column(source).ok_or_else(|| {
                    integrity(
                        table,
                        format!(
                            "bucket column '{}' references unknown column '{source}'",
                            col.logical
                        ),
                    )
                })?;
                if spec.role != ColumnRole::GroupBy(GroupByKind::Date) {
                    return Err(integrity(
                        table,
                        format!(
                            "bucket column '{}' must be derived from a date group-by column, but '{source}' is not one",
                            col.logical
                        ),
                    ));
                }
            }
            _ => {}
        }
    }

    Ok(())
}
