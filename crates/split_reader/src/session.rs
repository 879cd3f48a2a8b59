//! Interfaces to the cluster driver, plus a per-endpoint session pool.
//!
//! Sessions are shared by every reader in the process. Readers borrow them
//! from a [`ConnectionProvider`] and never close them.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::column::TableMetadata;
use crate::config::JobConfig;
use crate::error::{ExecuteError, ReaderError, Result};
use crate::query::Statement;
use crate::record::ColumnMap;

/// One result row as delivered by the driver: column name to raw value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: ColumnMap,
}

impl Row {
    pub fn new(columns: ColumnMap) -> Self {
        Self { columns }
    }

    /// Raw encoded value of `name`; `None` for a null or absent column.
    pub fn get_bytes_unsafe(&self, name: &str) -> Option<Bytes> {
        self.columns.get(name).flatten().cloned()
    }

    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }
}

/// One page of results and the driver's continuation, if more rows remain.
#[derive(Debug, Clone, Default)]
pub struct ResultPage {
    /// Rows of this page, at most the statement's fetch size.
    pub rows: Vec<Row>,
    /// Opaque continuation; `None` on the last page.
    pub paging_state: Option<Bytes>,
}

/// A connected driver session.
#[async_trait]
pub trait Session: Send + Sync {
    /// Executes `statement`, resuming from `paging_state` when given. At most
    /// `statement.fetch_size` rows are returned per page.
    async fn execute(
        &self,
        statement: &Statement,
        paging_state: Option<&Bytes>,
    ) -> std::result::Result<ResultPage, ExecuteError>;
}

/// Opens a session against one endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &str, config: &JobConfig) -> anyhow::Result<Arc<dyn Session>>;
}

/// Hands out a session for the first reachable candidate.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn get_session(
        &self,
        candidates: &[String],
        config: &JobConfig,
    ) -> Result<Arc<dyn Session>>;
}

/// Source of table layouts.
#[async_trait]
pub trait TableMetadataProvider: Send + Sync {
    async fn fetch_table_metadata(&self, config: &JobConfig) -> anyhow::Result<TableMetadata>;
}

/// Caches one session per `(endpoint, keyspace)`.
///
/// The cache lock is never held across `connect`, so a slow endpoint does
/// not block checkouts of other endpoints.
pub struct SessionPool<C> {
    connector: C,
    sessions: Mutex<HashMap<(String, String), Arc<dyn Session>>>,
}

impl<C: Connector> SessionPool<C> {
    /// Creates an empty pool over `connector`.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached session for `endpoint` or connects and caches a
    /// new one. When two checkouts race to connect the same endpoint, the
    /// first session cached wins and the other is dropped.
    pub async fn checkout(
        &self,
        endpoint: &str,
        config: &JobConfig,
    ) -> anyhow::Result<Arc<dyn Session>> {
        let key = (endpoint.to_string(), config.keyspace.clone());
        if let Some(session) = self.sessions.lock().await.get(&key) {
            return Ok(Arc::clone(session));
        }

        debug!(endpoint, keyspace = %config.keyspace, "opening session");
        let session = self.connector.connect(endpoint, config).await?;

        match self.sessions.lock().await.entry(key) {
            Entry::Occupied(cached) => {
                debug!(endpoint, "session raced with a concurrent checkout; keeping cached");
                Ok(Arc::clone(cached.get()))
            }
            Entry::Vacant(slot) => Ok(Arc::clone(slot.insert(session))),
        }
    }

    /// Number of cached sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

#[async_trait]
impl<C: Connector> ConnectionProvider for SessionPool<C> {
    async fn get_session(
        &self,
        candidates: &[String],
        config: &JobConfig,
    ) -> Result<Arc<dyn Session>> {
        let mut last_error = None;
        for endpoint in candidates {
            match self.checkout(endpoint, config).await {
                Ok(session) => return Ok(session),
                Err(err) => {
                    error!(endpoint = %endpoint, replicas = ?candidates, error = %err, "could not get connection");
                    last_error = Some(err);
                }
            }
        }
        Err(ReaderError::Connection {
            candidates: candidates.to_vec(),
            source: last_error.unwrap_or_else(|| anyhow!("split has no replica endpoints")),
        })
    }
}
