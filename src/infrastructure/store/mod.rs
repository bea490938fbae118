// Backend client adapter - Scoped access to a time-series store
pub mod flux_client;
pub mod influxql_client;

use crate::infrastructure::query::QueryBuildError;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use flux_client::FluxConnector;
pub use influxql_client::InfluxQlConnector;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("too many requests: {0}")]
    TooManyRequests(String),

    #[error("store internal error: {0}")]
    InternalServerError(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("store returned an error: {0}")]
    Backend(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("failed to decode store response: {0}")]
    Decode(String),

    #[error("could not build query: {0}")]
    Query(#[from] QueryBuildError),
}

impl StoreError {
    /// Map a non-success HTTP status and its body text.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        let detail = format!("{status}: {body}");
        match status {
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => StoreError::Timeout(detail),
            StatusCode::TOO_MANY_REQUESTS => StoreError::TooManyRequests(detail),
            StatusCode::INTERNAL_SERVER_ERROR => StoreError::InternalServerError(detail),
            StatusCode::BAD_REQUEST => StoreError::BadRequest(detail),
            _ => StoreError::Backend(detail),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            StoreError::from_status(status, err.to_string())
        } else if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else {
            StoreError::Transport(err.to_string())
        }
    }
}

/// Column-ordered rows as returned by either backend. Cells are raw text;
/// `None` is a missing/null cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Append rows that use their own column order. New columns are added on
    /// the right and earlier rows are padded with nulls.
    pub fn merge(&mut self, columns: &[String], rows: Vec<Vec<Option<String>>>) {
        let mapping: Vec<usize> = columns
            .iter()
            .map(|name| match self.column_index(name) {
                Some(index) => index,
                None => {
                    self.columns.push(name.clone());
                    self.columns.len() - 1
                }
            })
            .collect();

        let width = self.columns.len();
        for row in &mut self.rows {
            row.resize(width, None);
        }
        for row in rows {
            let mut aligned = vec![None; width];
            for (cell, &target) in row.into_iter().zip(&mapping) {
                aligned[target] = cell;
            }
            self.rows.push(aligned);
        }
    }
}

/// Per-execution deadline handed down to the transport.
#[derive(Debug, Clone, Copy)]
pub struct QueryContext {
    pub timeout: Duration,
}

/// A short-lived client handle. Dropping it releases the client.
#[async_trait]
pub trait StoreSession: Send {
    async fn execute(&mut self, query: &str, ctx: &QueryContext) -> Result<RawTable, StoreError>;
}

/// Hands out sessions for one configured store.
pub trait StoreConnector: Send + Sync {
    fn backend(&self) -> &'static str;

    fn connect(&self) -> Result<Box<dyn StoreSession>, StoreError>;
}

#[derive(Clone)]
pub struct ClientAdapter {
    connector: Arc<dyn StoreConnector>,
    timeout: Duration,
}

impl ClientAdapter {
    pub fn new(connector: Arc<dyn StoreConnector>, timeout: Duration) -> Self {
        Self { connector, timeout }
    }

    /// Acquire a client for the duration of one facade call.
    pub fn acquire(&self) -> Result<Lease, StoreError> {
        let session = self.connector.connect()?;
        tracing::trace!(backend = self.connector.backend(), "acquired store client");
        Ok(Lease {
            session,
            backend: self.connector.backend(),
            ctx: QueryContext {
                timeout: self.timeout,
            },
        })
    }
}

/// Scoped ownership of a session; the client is released when this drops,
/// whichever way the owning call exits.
pub struct Lease {
    session: Box<dyn StoreSession>,
    backend: &'static str,
    ctx: QueryContext,
}

impl Lease {
    pub async fn execute(&mut self, query: &str) -> Result<RawTable, StoreError> {
        tracing::debug!(backend = self.backend, query, "executing store query");
        let timeout = self.ctx.timeout;
        match tokio::time::timeout(timeout, self.session.execute(query, &self.ctx)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(format!(
                "no response within {}ms",
                timeout.as_millis()
            ))),
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        tracing::trace!(backend = self.backend, "released store client");
    }
}
