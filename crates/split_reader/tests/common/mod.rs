#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use split_reader::partitioner::Murmur3Partitioner;
use split_reader::{
    ColumnMap, ColumnMetadata, ConnectionProvider, Connector, CqlType, CqlValue, ExecuteError,
    JobConfig, KeyColumns, Partitioner, ReaderServices, ResultPage, Row, Session, SessionPool,
    Statement, TableMetadata, TableMetadataProvider, Token, TokenRange,
};

pub fn int(value: i32) -> Bytes {
    Bytes::copy_from_slice(&value.to_be_bytes())
}

pub fn text(value: &str) -> Bytes {
    Bytes::copy_from_slice(value.as_bytes())
}

pub fn long_split(start: i64, end: i64, replicas: &[&str]) -> TokenRange {
    TokenRange::new(
        Token::Long(start),
        Token::Long(end),
        replicas.iter().map(|replica| replica.to_string()).collect(),
    )
}

/// `events(id int, ts int, val text, PRIMARY KEY ((id), ts))`
pub fn events_metadata() -> TableMetadata {
    TableMetadata {
        partition_key: vec![ColumnMetadata::new("id", CqlType::Int)],
        clustering_columns: vec![ColumnMetadata::new("ts", CqlType::Int)],
        columns: vec![
            ColumnMetadata::new("id", CqlType::Int),
            ColumnMetadata::new("ts", CqlType::Int),
            ColumnMetadata::new("val", CqlType::Text),
        ],
    }
}

pub fn event_row(id: i32, ts: i32, val: &str) -> ColumnMap {
    [
        ("id", Some(int(id))),
        ("ts", Some(int(ts))),
        ("val", Some(text(val))),
    ]
    .into_iter()
    .collect()
}

/// `tenants(tenant int, bucket int, ts int, val text, PRIMARY KEY ((tenant, bucket), ts))`
pub fn tenants_metadata() -> TableMetadata {
    TableMetadata {
        partition_key: vec![
            ColumnMetadata::new("tenant", CqlType::Int),
            ColumnMetadata::new("bucket", CqlType::Int),
        ],
        clustering_columns: vec![ColumnMetadata::new("ts", CqlType::Int)],
        columns: vec![
            ColumnMetadata::new("tenant", CqlType::Int),
            ColumnMetadata::new("bucket", CqlType::Int),
            ColumnMetadata::new("ts", CqlType::Int),
            ColumnMetadata::new("val", CqlType::Text),
        ],
    }
}

pub fn tenant_row(tenant: i32, bucket: i32, ts: i32, val: &str) -> ColumnMap {
    [
        ("tenant", Some(int(tenant))),
        ("bucket", Some(int(bucket))),
        ("ts", Some(int(ts))),
        ("val", Some(text(val))),
    ]
    .into_iter()
    .collect()
}

/// Failure injected ahead of the next execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    NoHost,
    Fatal,
}

#[derive(Default)]
struct ExecutionLog {
    faults: VecDeque<Fault>,
    queries: Vec<String>,
    paging_states: Vec<Option<Bytes>>,
}

/// Records every execution and replays scripted faults in order.
#[derive(Default)]
pub struct FaultScript {
    log: Mutex<ExecutionLog>,
}

impl FaultScript {
    pub fn inject(&self, fault: Fault, times: usize) {
        let mut log = self.log.lock().expect("log lock");
        log.faults.extend(std::iter::repeat(fault).take(times));
    }

    pub fn executions(&self) -> usize {
        self.log.lock().expect("log lock").queries.len()
    }

    pub fn queries(&self) -> Vec<String> {
        self.log.lock().expect("log lock").queries.clone()
    }

    pub fn paging_states(&self) -> Vec<Option<Bytes>> {
        self.log.lock().expect("log lock").paging_states.clone()
    }

    fn begin(
        &self,
        statement: &Statement,
        paging_state: Option<&Bytes>,
    ) -> std::result::Result<(), ExecuteError> {
        let mut log = self.log.lock().expect("log lock");
        log.queries.push(statement.query.clone());
        log.paging_states.push(paging_state.cloned());
        match log.faults.pop_front() {
            None => Ok(()),
            Some(Fault::NoHost) => Err(ExecuteError::no_host_available(
                "all host(s) tried for query failed",
            )),
            Some(Fault::Fatal) => Err(ExecuteError::Other(anyhow!("unconfigured table"))),
        }
    }
}

fn encode_offset(offset: usize) -> Bytes {
    Bytes::copy_from_slice(&(offset as u64).to_be_bytes())
}

fn decode_offset(state: Option<&Bytes>) -> std::result::Result<usize, ExecuteError> {
    let Some(state) = state else {
        return Ok(0);
    };
    let raw: [u8; 8] = state
        .as_ref()
        .try_into()
        .map_err(|_| ExecuteError::Other(anyhow!("malformed paging state")))?;
    Ok(u64::from_be_bytes(raw) as usize)
}

fn bound_token(value: Option<&CqlValue>) -> std::result::Result<Token, ExecuteError> {
    match value {
        Some(CqlValue::BigInt(value)) => Ok(Token::Long(*value)),
        Some(CqlValue::Blob(bytes)) => Ok(Token::Bytes(bytes.clone())),
        other => Err(ExecuteError::Other(anyhow!("unexpected token bind value {other:?}"))),
    }
}

/// One table of an in-memory node: rows are kept in token order and range
/// or equals/IN statements are evaluated against them.
pub struct MemorySession {
    keys: KeyColumns,
    partitioner: Arc<dyn Partitioner>,
    rows: Vec<(Token, Vec<u8>, ColumnMap)>,
    pub script: FaultScript,
}

impl MemorySession {
    pub fn new(metadata: &TableMetadata, rows: Vec<ColumnMap>) -> Result<Arc<Self>> {
        Self::with_partitioner(metadata, rows, Arc::new(Murmur3Partitioner))
    }

    pub fn with_partitioner(
        metadata: &TableMetadata,
        rows: Vec<ColumnMap>,
        partitioner: Arc<dyn Partitioner>,
    ) -> Result<Arc<Self>> {
        let keys = KeyColumns::resolve(metadata).context("resolve test keys")?;
        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let key = keys.partition_key_bytes(&row).context("encode test key")?;
            stored.push((partitioner.token_of(&key), key, row));
        }
        stored.sort_by(|left, right| left.0.cmp(&right.0));
        Ok(Arc::new(Self {
            keys,
            partitioner,
            rows: stored,
            script: FaultScript::default(),
        }))
    }

    /// Token of a stored row, as the cluster computes it.
    pub fn token_of(&self, row: &ColumnMap) -> Result<Token> {
        Ok(self.keys.token_of_row(row, self.partitioner.as_ref())?)
    }

    fn matching(&self, statement: &Statement) -> std::result::Result<Vec<&ColumnMap>, ExecuteError> {
        if statement.query.contains(" IN ?") {
            let (Some(equals), Some(CqlValue::List(candidates))) =
                (statement.values.first(), statement.values.get(1))
            else {
                return Err(ExecuteError::Other(anyhow!("IN statement needs a list bind value")));
            };
            let mut wanted = HashSet::new();
            for candidate in candidates {
                let key = self
                    .keys
                    .validator()
                    .decompose(&[equals.clone(), candidate.clone()])
                    .map_err(|err| ExecuteError::Other(err.into()))?;
                wanted.insert(key);
            }
            return Ok(self
                .rows
                .iter()
                .filter(|(_, key, _)| wanted.contains(key))
                .map(|(_, _, row)| row)
                .collect());
        }

        let range = TokenRange::new(
            bound_token(statement.values.first())?,
            bound_token(statement.values.get(1))?,
            Vec::new(),
        );
        Ok(self
            .rows
            .iter()
            .filter(|(token, _, _)| range.contains(token))
            .map(|(_, _, row)| row)
            .collect())
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn execute(
        &self,
        statement: &Statement,
        paging_state: Option<&Bytes>,
    ) -> std::result::Result<ResultPage, ExecuteError> {
        self.script.begin(statement, paging_state)?;
        let matching = self.matching(statement)?;
        let offset = decode_offset(paging_state)?.min(matching.len());
        let end = (offset + statement.fetch_size.max(1)).min(matching.len());
        Ok(ResultPage {
            rows: matching[offset..end]
                .iter()
                .map(|row| Row::new((*row).clone()))
                .collect(),
            paging_state: (end < matching.len()).then(|| encode_offset(end)),
        })
    }
}

/// Returns fixed pages regardless of the statement.
pub struct ScriptedSession {
    pages: Vec<Vec<ColumnMap>>,
    pub script: FaultScript,
}

impl ScriptedSession {
    pub fn new(pages: Vec<Vec<ColumnMap>>) -> Arc<Self> {
        Arc::new(Self {
            pages,
            script: FaultScript::default(),
        })
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn execute(
        &self,
        statement: &Statement,
        paging_state: Option<&Bytes>,
    ) -> std::result::Result<ResultPage, ExecuteError> {
        self.script.begin(statement, paging_state)?;
        let index = decode_offset(paging_state)?;
        let rows = self
            .pages
            .get(index)
            .map(|page| page.iter().cloned().map(Row::new).collect())
            .unwrap_or_default();
        Ok(ResultPage {
            rows,
            paging_state: (index + 1 < self.pages.len()).then(|| encode_offset(index + 1)),
        })
    }
}

/// Hands out one session for every reachable endpoint.
pub struct MemoryConnector {
    session: Arc<dyn Session>,
    down: HashSet<String>,
    latency: HashMap<String, Duration>,
    attempts: Arc<Mutex<Vec<String>>>,
}

impl MemoryConnector {
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self {
            session,
            down: HashSet::new(),
            latency: HashMap::new(),
            attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_down(mut self, endpoints: &[&str]) -> Self {
        self.down = endpoints.iter().map(|endpoint| endpoint.to_string()).collect();
        self
    }

    /// Delays every `connect` to `endpoint` by `delay`.
    pub fn with_latency(mut self, endpoint: &str, delay: Duration) -> Self {
        self.latency.insert(endpoint.to_string(), delay);
        self
    }

    /// Endpoints passed to `connect`, in call order.
    pub fn attempts(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.attempts)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, endpoint: &str, _config: &JobConfig) -> Result<Arc<dyn Session>> {
        self.attempts
            .lock()
            .expect("attempts lock")
            .push(endpoint.to_string());
        if let Some(delay) = self.latency.get(endpoint) {
            tokio::time::sleep(*delay).await;
        }
        if self.down.contains(endpoint) {
            bail!("connection refused: {endpoint}");
        }
        Ok(Arc::clone(&self.session))
    }
}

/// Serves a fixed table layout, or fails when none is set.
pub struct StaticMetadata(pub Option<TableMetadata>);

#[async_trait]
impl TableMetadataProvider for StaticMetadata {
    async fn fetch_table_metadata(&self, config: &JobConfig) -> Result<TableMetadata> {
        self.0
            .clone()
            .ok_or_else(|| anyhow!("table {}.{} not found", config.keyspace, config.table))
    }
}

/// Reader services over a session pool backed by `connector`.
pub fn services(connector: MemoryConnector, metadata: TableMetadata) -> ReaderServices {
    let pool: Arc<dyn ConnectionProvider> = Arc::new(SessionPool::new(connector));
    ReaderServices::new(pool, Arc::new(StaticMetadata(Some(metadata))))
}
