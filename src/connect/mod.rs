use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde_json::json;

use crate::catalog::types::{SemanticType, Value};
use crate::config::QuerySettings;
use crate::error::DictumError;
use chrono::{DateTime, TimeZone, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    /// Single authenticated handle; one call returns the full result set.
    Cursor,
    /// Search-engine style: first page plus an optional continuation token.
    Paginated,
}

impl ConnectionKind {
    pub fn parse(kind: &str) -> Result<Self, DictumError> {
        match kind {
            "cursor" => Ok(ConnectionKind::Cursor),
            "paginated" => Ok(ConnectionKind::Paginated),
            other => Err(DictumError::UnsupportedConnectionKind {
                kind: other.to_string(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionKind::Cursor => "cursor",
            ConnectionKind::Paginated => "paginated",
        }
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

// Keep the password out of logs and error chains.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionProfile {
    pub kind: ConnectionKind,
    pub endpoint: String,
    pub params: BTreeMap<String, String>,
    pub credentials: Credentials,
}

/// Transport failures as reported by the caller-supplied implementation.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// The external seam. Production transports (an ODBC bridge, an HTTP client)
/// live outside this crate; tests supply scripted fakes. Request and response
/// bodies are JSON documents in the backend's SQL wire shape.
pub trait Transport {
    fn handshake(&mut self, profile: &ConnectionProfile) -> Result<(), TransportError>;
    fn send(&mut self, body: &serde_json::Value) -> Result<serde_json::Value, TransportError>;
}

/// One page of raw results. The first response declares column names; later
/// pages may omit them. `cursor` being absent is normal termination.
#[derive(Debug, Clone)]
pub struct Page {
    pub columns: Option<Vec<String>>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub cursor: Option<String>,
}

/// Capability interface over the two backend kinds. The executor drives this
/// and nothing else; it never inspects which kind it holds.
pub trait Backend {
    /// Submits the native query and returns the first (possibly only) page.
    fn submit(&mut self, sql: &str) -> Result<Page, DictumError>;
    /// Fetches the page behind a continuation token.
    fn next_page(&mut self, cursor: &str) -> Result<Page, DictumError>;
    /// Coerces one raw cell to its catalog-declared semantic type.
    fn coerce(
        &self,
        column: &str,
        raw: &serde_json::Value,
        semantic: SemanticType,
    ) -> Result<Value, DictumError>;
}

pub struct CursorConnection {
    transport: Box<dyn Transport>,
    endpoint: String,
}

pub struct PaginatedConnection {
    transport: Box<dyn Transport>,
    endpoint: String,
    settings: QuerySettings,
}

pub enum Connection {
    Cursor(CursorConnection),
    Paginated(PaginatedConnection),
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connection::Cursor(_) => f.write_str("Connection::Cursor"),
            Connection::Paginated(_) => f.write_str("Connection::Paginated"),
        }
    }
}

/// Establishes a handle of the requested kind. The handshake runs through the
/// supplied transport; a failure surfaces as a `Connection` error wrapping the
/// transport's message. No retries happen at this layer.
pub fn connect(
    kind: &str,
    profile: &ConnectionProfile,
    transport: Box<dyn Transport>,
) -> Result<Connection, DictumError> {
    connect_with_settings(kind, profile, transport, QuerySettings::default())
}

pub fn connect_with_settings(
    kind: &str,
    profile: &ConnectionProfile,
    mut transport: Box<dyn Transport>,
    settings: QuerySettings,
) -> Result<Connection, DictumError> {
    let kind = ConnectionKind::parse(kind)?;
    transport
        .handshake(profile)
        .map_err(|e| DictumError::Connection {
            endpoint: profile.endpoint.clone(),
            message: e.to_string(),
        })?;
    tracing::debug!(endpoint = %profile.endpoint, kind = kind.as_str(), "connection established");
    Ok(match kind {
        ConnectionKind::Cursor => Connection::Cursor(CursorConnection {
            transport,
            endpoint: profile.endpoint.clone(),
        }),
        ConnectionKind::Paginated => Connection::Paginated(PaginatedConnection {
            transport,
            endpoint: profile.endpoint.clone(),
            settings,
        }),
    })
}

#[derive(Deserialize)]
struct WireColumn {
    name: String,
}

#[derive(Deserialize)]
struct WirePage {
    #[serde(default)]
    columns: Option<Vec<WireColumn>>,
    #[serde(default)]
    rows: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

fn parse_page(endpoint: &str, response: serde_json::Value) -> Result<Page, DictumError> {
    let wire: WirePage =
        serde_json::from_value(response).map_err(|e| DictumError::QueryExecution {
            message: format!("malformed page from '{endpoint}': {e}"),
        })?;
    if let Some(native) = wire.error {
        // Surface the backend's own message; never swallow it.
        return Err(DictumError::QueryExecution {
            message: format!("backend '{endpoint}' rejected the query: {native}"),
        });
    }
    Ok(Page {
        columns: wire
            .columns
            .map(|cols| cols.into_iter().map(|c| c.name).collect()),
        rows: wire.rows,
        cursor: wire.cursor,
    })
}

fn send_query(
    transport: &mut dyn Transport,
    endpoint: &str,
    body: serde_json::Value,
) -> Result<Page, DictumError> {
    let response = transport
        .send(&body)
        .map_err(|e| DictumError::QueryExecution {
            message: format!("transport to '{endpoint}' failed: {e}"),
        })?;
    parse_page(endpoint, response)
}

impl Backend for CursorConnection {
    fn submit(&mut self, sql: &str) -> Result<Page, DictumError> {
        let mut page = send_query(
            self.transport.as_mut(),
            &self.endpoint,
            json!({ "statement": sql }),
        )?;
        // A cursor-style handle returns everything synchronously; whatever the
        // bridge reports as a token is meaningless here.
        page.cursor = None;
        Ok(page)
    }

    fn next_page(&mut self, _cursor: &str) -> Result<Page, DictumError> {
        Err(DictumError::QueryExecution {
            message: "cursor-style connection has no pagination protocol".into(),
        })
    }

    fn coerce(
        &self,
        column: &str,
        raw: &serde_json::Value,
        semantic: SemanticType,
    ) -> Result<Value, DictumError> {
        coerce_cell(column, raw, semantic)
    }
}

impl Backend for PaginatedConnection {
    fn submit(&mut self, sql: &str) -> Result<Page, DictumError> {
        let mut body = json!({
            "query": sql,
            "field_multi_value_leniency": self.settings.multi_value_leniency,
        });
        if let Some(fetch_size) = self.settings.fetch_size {
            body["fetch_size"] = json!(fetch_size);
        }
        send_query(self.transport.as_mut(), &self.endpoint, body)
    }

    fn next_page(&mut self, cursor: &str) -> Result<Page, DictumError> {
        send_query(
            self.transport.as_mut(),
            &self.endpoint,
            json!({ "cursor": cursor }),
        )
    }

    fn coerce(
        &self,
        column: &str,
        raw: &serde_json::Value,
        semantic: SemanticType,
    ) -> Result<Value, DictumError> {
        coerce_cell(column, raw, semantic)
    }
}

impl Backend for Connection {
    fn submit(&mut self, sql: &str) -> Result<Page, DictumError> {
        match self {
            Connection::Cursor(c) => c.submit(sql),
            Connection::Paginated(c) => c.submit(sql),
        }
    }

    fn next_page(&mut self, cursor: &str) -> Result<Page, DictumError> {
        match self {
            Connection::Cursor(c) => c.next_page(cursor),
            Connection::Paginated(c) => c.next_page(cursor),
        }
    }

    fn coerce(
        &self,
        column: &str,
        raw: &serde_json::Value,
        semantic: SemanticType,
    ) -> Result<Value, DictumError> {
        match self {
            Connection::Cursor(c) => c.coerce(column, raw, semantic),
            Connection::Paginated(c) => c.coerce(column, raw, semantic),
        }
    }
}

fn coercion_error(
    column: &str,
    expected: &'static str,
    raw: &serde_json::Value,
) -> DictumError {
    DictumError::TypeCoercion {
        column: column.to_string(),
        expected,
        value: raw.to_string(),
    }
}

/// Shared cell coercion. Backend nulls become `Value::Null`, never a zero.
/// Timestamps accept RFC 3339 strings or epoch milliseconds and always end up
/// with an explicit UTC offset.
pub(crate) fn coerce_cell(
    column: &str,
    raw: &serde_json::Value,
    semantic: SemanticType,
) -> Result<Value, DictumError> {
    if raw.is_null() {
        return Ok(Value::Null);
    }
    match semantic {
        SemanticType::Numeric => raw
            .as_f64()
            .map(Value::Float)
            .ok_or_else(|| coercion_error(column, "numeric", raw)),
        SemanticType::Integer => match raw.as_i64() {
            Some(v) => Ok(Value::Integer(v)),
            None => match raw.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < (i64::MAX as f64) => {
                    Ok(Value::Integer(f as i64))
                }
                _ => Err(coercion_error(column, "integer", raw)),
            },
        },
        SemanticType::Text => raw
            .as_str()
            .map(|s| Value::Text(s.into()))
            .ok_or_else(|| coercion_error(column, "text", raw)),
        SemanticType::Timestamp => coerce_timestamp(raw)
            .map(Value::Timestamp)
            .ok_or_else(|| coercion_error(column, "timestamp", raw)),
        // Period columns exist only post-query; a backend can never emit one.
        SemanticType::Period => Err(coercion_error(column, "period", raw)),
    }
}

fn coerce_timestamp(raw: &serde_json::Value) -> Option<DateTime<Utc>> {
    if let Some(s) = raw.as_str() {
        return DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
    }
    if let Some(millis) = raw.as_i64() {
        return Utc.timestamp_millis_opt(millis).single();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::rc::Rc;

    struct ScriptedTransport {
        handshake_ok: bool,
        responses: Vec<serde_json::Value>,
        requests: Rc<RefCell<Vec<serde_json::Value>>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<serde_json::Value>) -> Self {
            Self {
                handshake_ok: true,
                responses,
                requests: Rc::new(RefCell::new(Vec::new())),
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn handshake(&mut self, _profile: &ConnectionProfile) -> Result<(), TransportError> {
            if self.handshake_ok {
                Ok(())
            } else {
                Err(TransportError("connection refused".into()))
            }
        }

        fn send(
            &mut self,
            body: &serde_json::Value,
        ) -> Result<serde_json::Value, TransportError> {
            self.requests.borrow_mut().push(body.clone());
            if self.responses.is_empty() {
                Err(TransportError("no more scripted responses".into()))
            } else {
                Ok(self.responses.remove(0))
            }
        }
    }

    fn profile(kind: ConnectionKind) -> ConnectionProfile {
        ConnectionProfile {
            kind,
            endpoint: "https://warehouse.example.net:9200".into(),
            params: BTreeMap::new(),
            credentials: Credentials {
                username: "analyst".into(),
                password: "hunter2".into(),
            },
        }
    }

    #[test]
    fn unknown_kind_string_is_rejected() {
        let transport = Box::new(ScriptedTransport::new(vec![]));
        let err = connect("websocket", &profile(ConnectionKind::Cursor), transport).unwrap_err();
        assert_eq!(err.code_str(), "unsupported_connection_kind");
        assert!(err.to_string().contains("websocket"));
    }

    #[test]
    fn handshake_failure_wraps_transport_message() {
        let mut transport = Box::new(ScriptedTransport::new(vec![]));
        transport.handshake_ok = false;
        let err = connect("paginated", &profile(ConnectionKind::Paginated), transport)
            .unwrap_err();
        assert_eq!(err.code_str(), "connection");
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn backend_error_payload_surfaces_native_message() {
        let transport = Box::new(ScriptedTransport::new(vec![json!({
            "error": { "reason": "unknown index [ody_amr_daily_v9]" }
        })]));
        let mut conn =
            connect("paginated", &profile(ConnectionKind::Paginated), transport).unwrap();
        let err = conn.submit("SELECT 1").unwrap_err();
        assert_eq!(err.code_str(), "query_execution");
        assert!(err.to_string().contains("ody_amr_daily_v9"));
    }

    #[test]
    fn cursor_connection_never_reports_a_continuation_token() {
        let transport = Box::new(ScriptedTransport::new(vec![json!({
            "columns": [{ "name": "region" }],
            "rows": [["NAIROBI"]],
            "cursor": "bogus-token"
        })]));
        let mut conn = connect("cursor", &profile(ConnectionKind::Cursor), transport).unwrap();
        let page = conn.submit("SELECT region FROM t").unwrap();
        assert!(page.cursor.is_none());
        assert!(conn.next_page("bogus-token").is_err());
    }

    #[test]
    fn paginated_follow_up_carries_only_the_cursor() {
        let transport = ScriptedTransport::new(vec![
            json!({ "columns": [{ "name": "n" }], "rows": [[1]], "cursor": "tok-1" }),
            json!({ "rows": [[2]] }),
        ]);
        let requests = Rc::clone(&transport.requests);
        let mut conn = connect(
            "paginated",
            &profile(ConnectionKind::Paginated),
            Box::new(transport),
        )
        .unwrap();
        let first = conn.submit("SELECT n FROM t").unwrap();
        assert_eq!(first.cursor.as_deref(), Some("tok-1"));
        let second = conn.next_page("tok-1").unwrap();
        assert!(second.cursor.is_none());

        let bodies = requests.borrow();
        assert_eq!(bodies[0]["query"], json!("SELECT n FROM t"));
        assert_eq!(bodies[0]["field_multi_value_leniency"], json!(true));
        assert_eq!(bodies[1], json!({ "cursor": "tok-1" }));
    }

    #[test]
    fn cells_coerce_to_declared_semantic_types() {
        let col = "c";
        assert_eq!(
            coerce_cell(col, &json!(41.5), SemanticType::Numeric).unwrap(),
            Value::Float(41.5)
        );
        assert_eq!(
            coerce_cell(col, &json!(7), SemanticType::Integer).unwrap(),
            Value::Integer(7)
        );
        assert_eq!(
            coerce_cell(col, &json!(7.0), SemanticType::Integer).unwrap(),
            Value::Integer(7)
        );
        assert_eq!(
            coerce_cell(col, &json!(null), SemanticType::Integer).unwrap(),
            Value::Null
        );
        assert_eq!(
            coerce_cell(col, &json!("NAIROBI"), SemanticType::Text).unwrap(),
            Value::Text("NAIROBI".into())
        );
        let ts = coerce_cell(col, &json!("2023-07-19T00:00:00Z"), SemanticType::Timestamp)
            .unwrap();
        assert!(matches!(ts, Value::Timestamp(_)));
        let epoch = coerce_cell(col, &json!(1_689_724_800_000_i64), SemanticType::Timestamp)
            .unwrap();
        assert!(matches!(epoch, Value::Timestamp(_)));
    }

    #[test]
    fn uncoercible_cell_reports_column_and_value() {
        let err = coerce_cell("timestamp", &json!("not-a-date"), SemanticType::Timestamp)
            .unwrap_err();
        assert_eq!(err.code_str(), "type_coercion");
        assert!(err.to_string().contains("timestamp"));
        assert!(err.to_string().contains("not-a-date"));

        let err = coerce_cell("usage_sum", &json!("abc"), SemanticType::Numeric).unwrap_err();
        assert_eq!(err.code_str(), "type_coercion");
    }
}
