//! Pull-based row scanner over statement result pages.
//!
//! The scanner owns the rows fetched but not yet consumed. When the last
//! buffered row is taken and the driver reported a continuation, the next
//! page is fetched before returning, so [`RowScanner::has_next`] never
//! performs I/O. Each execution, initial or continuation, goes through the
//! same bounded retry loop and resumes from the same paging state, so a
//! retried fetch never skips or repeats rows.
//!
//! A fatal failure while prefetching is held back until the row already
//! taken has been returned. The following call surfaces it and the scanner
//! moves to [`ScanState::Failed`].

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use crate::column::{KeyColumns, TableMetadata};
use crate::config::{JobConfig, RetryPolicy};
use crate::error::{ReaderError, Result};
use crate::metrics::{ScanMetrics, ScanStats};
use crate::query::Statement;
use crate::record::{ColumnMap, RowRecord};
use crate::session::{ResultPage, Row, Session};

/// Lifecycle of a [`RowScanner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Constructed; nothing executed yet.
    Uninitialized,
    /// An execution is in flight or being retried.
    Fetching,
    /// At least one row is buffered.
    HasRows,
    /// Terminal; no rows remain.
    Exhausted,
    /// Terminal; an execution failed and the scan was abandoned.
    Failed,
}

/// Assignment of result columns to key and value maps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLayout {
    key_columns: Vec<String>,
    value_columns: Vec<String>,
}

impl RowLayout {
    /// Key columns are every partition then clustering column; value
    /// columns are the remaining metadata columns the projection asks for.
    pub fn new(keys: &KeyColumns, metadata: &TableMetadata, config: &JobConfig) -> Self {
        let key_columns = keys
            .all()
            .map(|column| column.name.clone())
            .collect::<Vec<_>>();
        let value_columns = metadata
            .columns
            .iter()
            .map(|column| column.name.as_str())
            .filter(|name| !key_columns.iter().any(|key| key == *name))
            .filter(|name| config.is_column_wanted(name))
            .map(str::to_string)
            .collect();
        Self {
            key_columns,
            value_columns,
        }
    }

    /// Partition then clustering column names.
    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    /// Requested non-key column names in metadata order.
    pub fn value_columns(&self) -> &[String] {
        &self.value_columns
    }

    /// Copies the cells of `row` into key and value maps. Absent columns
    /// become nulls.
    pub fn split_row(&self, row: &Row) -> RowRecord {
        let mut key_columns = ColumnMap::with_capacity(self.key_columns.len());
        for name in &self.key_columns {
            key_columns.insert(name.as_str(), row.get_bytes_unsafe(name));
        }
        let mut value_columns = ColumnMap::with_capacity(self.value_columns.len());
        for name in &self.value_columns {
            value_columns.insert(name.as_str(), row.get_bytes_unsafe(name));
        }
        RowRecord {
            key_columns,
            value_columns,
        }
    }
}

/// Streams the rows of one statement.
pub struct RowScanner {
    session: Arc<dyn Session>,
    statement: Option<Statement>,
    layout: RowLayout,
    rows: VecDeque<Row>,
    paging_state: Option<Bytes>,
    state: ScanState,
    /// Prefetch failure owed to the caller on the next call.
    pending_error: Option<ReaderError>,
    retry: RetryPolicy,
    metrics: Arc<ScanMetrics>,
    stats: ScanStats,
}

impl RowScanner {
    /// Creates an unstarted scanner. `statement == None` means there is
    /// nothing to query and the scanner will yield no rows.
    pub fn new(
        session: Arc<dyn Session>,
        statement: Option<Statement>,
        layout: RowLayout,
        retry: RetryPolicy,
        metrics: Arc<ScanMetrics>,
    ) -> Self {
        Self {
            session,
            statement,
            layout,
            rows: VecDeque::new(),
            paging_state: None,
            state: ScanState::Uninitialized,
            pending_error: None,
            retry,
            metrics,
            stats: ScanStats::default(),
        }
    }

    /// Creates a scanner and executes its first page.
    pub async fn open(
        session: Arc<dyn Session>,
        statement: Option<Statement>,
        layout: RowLayout,
        retry: RetryPolicy,
        metrics: Arc<ScanMetrics>,
    ) -> Result<Self> {
        let mut scanner = Self::new(session, statement, layout, retry, metrics);
        scanner.start().await?;
        Ok(scanner)
    }

    /// Executes the initial page. Calling this more than once is a no-op.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != ScanState::Uninitialized {
            return Ok(());
        }
        if self.statement.is_none() {
            self.metrics.record_empty_in_filter();
            self.finish();
            return Ok(());
        }
        let page = self.execute_with_retry(None).await?;
        self.accept_page(page);
        self.fill().await
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Counters for this scan so far.
    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// Key/value column assignment used for every row.
    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    /// Returns `true` when the next call yields a row or a held-back
    /// failure. Never performs I/O.
    pub fn has_next(&self) -> bool {
        !self.rows.is_empty() || self.pending_error.is_some()
    }

    /// Takes the next row, or `None` once the scan is exhausted. After a
    /// fatal failure has been returned, every call fails with
    /// [`ReaderError::Aborted`].
    pub async fn compute_next(&mut self) -> Result<Option<RowRecord>> {
        if let Some(err) = self.pending_error.take() {
            return Err(err);
        }
        if self.state == ScanState::Failed {
            return Err(ReaderError::Aborted);
        }
        let Some(row) = self.rows.pop_front() else {
            self.finish();
            return Ok(None);
        };

        let record = self.layout.split_row(&row);
        self.stats.rows_returned += 1;
        self.metrics.record_row(record.byte_len());

        if self.rows.is_empty() {
            if let Err(err) = self.fill().await {
                self.pending_error = Some(err);
            }
        }
        Ok(Some(record))
    }

    /// Follows continuations until a row is buffered or none remain.
    async fn fill(&mut self) -> Result<()> {
        while self.rows.is_empty() {
            let Some(paging_state) = self.paging_state.take() else {
                self.finish();
                return Ok(());
            };
            let page = self.execute_with_retry(Some(paging_state)).await?;
            self.accept_page(page);
        }
        self.state = ScanState::HasRows;
        Ok(())
    }

    fn accept_page(&mut self, page: ResultPage) {
        self.stats.pages += 1;
        self.metrics.record_page();
        debug!(
            rows = page.rows.len(),
            has_more = page.paging_state.is_some(),
            "fetched page"
        );
        self.rows.extend(page.rows);
        self.paging_state = page.paging_state;
        if !self.rows.is_empty() {
            self.state = ScanState::HasRows;
        }
    }

    fn finish(&mut self) {
        if matches!(self.state, ScanState::Exhausted | ScanState::Failed) {
            return;
        }
        self.state = ScanState::Exhausted;
        self.paging_state = None;
        info!(
            rows = self.stats.rows_returned,
            pages = self.stats.pages,
            executions = self.stats.executions,
            retries = self.stats.retries,
            "split scan completed"
        );
    }

    /// Executes the statement, retrying transient failures with a fixed
    /// pause. Any other failure is surfaced immediately.
    async fn execute_with_retry(&mut self, paging_state: Option<Bytes>) -> Result<ResultPage> {
        let Some(statement) = self.statement.as_ref() else {
            return Ok(ResultPage::default());
        };
        let max_attempts = self.retry.max_attempts.max(1);
        self.state = ScanState::Fetching;

        let mut attempt = 0usize;
        loop {
            attempt += 1;
            self.stats.executions += 1;
            self.metrics.record_execution();

            match self.session.execute(statement, paging_state.as_ref()).await {
                Ok(page) => return Ok(page),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    warn!(
                        attempt,
                        max_attempts,
                        delay = ?self.retry.delay,
                        error = %err,
                        "transient execution failure; retrying"
                    );
                    self.stats.retries += 1;
                    self.metrics.record_retry();
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(err) => {
                    error!(attempt, query = %statement.query, error = %err, "statement execution failed");
                    self.metrics.record_failure();
                    self.state = ScanState::Failed;
                    self.paging_state = None;
                    return Err(ReaderError::Io {
                        attempts: attempt,
                        source: err,
                    });
                }
            }
        }
    }
}
