//! Metadata-driven metric queries over heterogeneous warehouse backends.
//!
//! Everything this crate knows about the warehouse lives in a single data
//! dictionary document: logical, analyst-facing column names mapped to the
//! backend's physical schema, with a role tag per column describing how it
//! aggregates. Analysts request logical columns; the compiler translates the
//! request into a backend-native aggregate query, the executor drives the
//! backend's pagination protocol and coerces every cell to its declared
//! semantic type, and post-query derivations (ratios, calendar buckets) are
//! applied to the fetched table. The warehouse schema can evolve underneath
//! without touching any analysis code; only the dictionary changes.
//!
//! ```no_run
//! use dictum::{Catalog, CatalogSources, connect};
//!
//! # struct MyTransport;
//! # impl dictum::Transport for MyTransport {
//! #     fn handshake(&mut self, _: &dictum::ConnectionProfile) -> Result<(), dictum::TransportError> { Ok(()) }
//! #     fn send(&mut self, _: &serde_json::Value) -> Result<serde_json::Value, dictum::TransportError> { unimplemented!() }
//! # }
//! # fn main() -> Result<(), dictum::DictumError> {
//! let catalog = Catalog::load(&CatalogSources::default())?;
//! let profile = catalog.connection(dictum::ConnectionKind::Paginated)?;
//! let mut conn = connect("paginated", profile, Box::new(MyTransport))?;
//! let table = dictum::fetch_metrics(
//!     &catalog,
//!     &mut conn,
//!     "meter_readings_daily",
//!     &["region".into(), "usage_sum".into(), "acpu".into()],
//!     "timestamp >= '2023-01-01'",
//!     None,
//! )?;
//! # let _ = table; Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod connect;
pub mod error;
pub mod query;
pub mod validate;

pub use crate::catalog::schema::{ColumnRole, ColumnSpec, CountKind, GroupByKind, TableEntry};
pub use crate::catalog::types::{
    ColumnMeta, Granularity, Period, Row, SemanticType, Table, Value,
};
pub use crate::catalog::{Catalog, DataDict, Secrets};
pub use crate::config::{CatalogSources, QuerySettings};
pub use crate::connect::{
    Backend, Connection, ConnectionKind, ConnectionProfile, Credentials, Page, Transport,
    TransportError, connect, connect_with_settings,
};
pub use crate::error::{DictumError, ErrorCode};
pub use crate::query::executor::ProgressFn;
pub use crate::query::{CompiledQuery, compile, execute};
pub use crate::validate::{is_functionally_dependent, is_primary_key};

/// Compiles a logical request and executes it in one call: the common path
/// for analysis code that does not need to inspect the native query.
pub fn fetch_metrics(
    catalog: &Catalog,
    connection: &mut Connection,
    table: &str,
    columns: &[String],
    filter: &str,
    progress: Option<ProgressFn<'_>>,
) -> Result<Table, DictumError> {
    let compiled = compile(catalog, table, columns, filter)?;
    tracing::debug!(sql = %compiled.sql, "compiled logical request");
    execute(connection, &compiled, progress)
}
