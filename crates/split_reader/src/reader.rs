//! Record reader for one token range.
//!
//! Opening a reader resolves the projection and partitioner, borrows a
//! session from a replica of the split, resolves key metadata, and executes
//! the first page. Callers then pull rows with [`RecordReader::has_next`] and
//! [`RecordReader::next`].

use std::sync::Arc;

use futures_util::stream::{self, Stream};
use tracing::{debug, info_span, Instrument};

use crate::column::KeyColumns;
use crate::config::{JobConfig, RetryPolicy};
use crate::error::{ReaderError, Result};
use crate::filter::{AdditionalFilterGenerator, StandardFilterGenerator};
use crate::metrics::{ScanMetrics, ScanStats};
use crate::partitioner::{partitioner_from_class, Partitioner};
use crate::query::QueryComposer;
use crate::record::RowRecord;
use crate::scanner::{RowLayout, RowScanner, ScanState};
use crate::session::{ConnectionProvider, TableMetadataProvider};
use crate::token::TokenRange;
use crate::topology::ordered_replicas;

/// Collaborators shared by every reader of a job.
#[derive(Clone)]
pub struct ReaderServices {
    /// Source of sessions for a split's replicas.
    pub connections: Arc<dyn ConnectionProvider>,
    /// Source of the scanned table's layout.
    pub metadata: Arc<dyn TableMetadataProvider>,
    /// Renders extra predicates appended to range queries.
    pub filters: Arc<dyn AdditionalFilterGenerator>,
    /// Retry behavior for every statement execution.
    pub retry: RetryPolicy,
    /// Counters shared by every reader built from these services.
    pub metrics: Arc<ScanMetrics>,
}

impl ReaderServices {
    /// Builds services with the standard filter generator, the default
    /// retry policy, and fresh metrics.
    pub fn new(
        connections: Arc<dyn ConnectionProvider>,
        metadata: Arc<dyn TableMetadataProvider>,
    ) -> Self {
        Self {
            connections,
            metadata,
            filters: Arc::new(StandardFilterGenerator),
            retry: RetryPolicy::default(),
            metrics: Arc::new(ScanMetrics::default()),
        }
    }

    /// Replaces the filter generator.
    pub fn with_filters(mut self, filters: Arc<dyn AdditionalFilterGenerator>) -> Self {
        self.filters = filters;
        self
    }

    /// Replaces the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Shares `metrics` instead of the default counters.
    pub fn with_metrics(mut self, metrics: Arc<ScanMetrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

/// Reads the rows of one split.
pub struct RecordReader {
    config: JobConfig,
    split: TokenRange,
    partitioner: Arc<dyn Partitioner>,
    keys: KeyColumns,
    scanner: RowScanner,
}

impl RecordReader {
    /// Initializes the reader and executes its first query. Any failure
    /// here is fatal for the split.
    pub async fn open(
        config: JobConfig,
        split: TokenRange,
        services: &ReaderServices,
    ) -> Result<Self> {
        let span = info_span!("split_reader_open", table = %config.table, split = %split);
        let opened = Self::open_inner(config, split, services)
            .instrument(span)
            .await;
        // Execution failures are already counted by the scanner.
        if let Err(err) = &opened {
            if !matches!(err, ReaderError::Io { .. }) {
                services.metrics.record_failure();
            }
        }
        opened
    }

    async fn open_inner(
        mut config: JobConfig,
        split: TokenRange,
        services: &ReaderServices,
    ) -> Result<Self> {
        config.validate()?;
        config.input_columns = config
            .input_columns
            .iter()
            .map(|column| column.trim().to_string())
            .filter(|column| !column.is_empty())
            .collect();

        let partitioner = partitioner_from_class(&config.partitioner)?;

        let candidates = ordered_replicas(&split.replicas, &config.local_addresses);
        debug!(candidates = ?candidates, "create connection");
        let session = services
            .connections
            .get_session(&candidates, &config)
            .await?;

        let metadata = services
            .metadata
            .fetch_table_metadata(&config)
            .await
            .map_err(ReaderError::Metadata)?;
        let keys = KeyColumns::resolve(&metadata)?;

        let composer = QueryComposer::new(&config, &keys, &metadata, services.filters.as_ref());
        let statement =
            composer.prepare_statement(&config, &keys, &split, partitioner.as_ref())?;
        let layout = RowLayout::new(&keys, &metadata, &config);

        services.metrics.record_scan();
        let scanner = RowScanner::open(
            session,
            statement,
            layout,
            services.retry,
            Arc::clone(&services.metrics),
        )
        .await?;

        Ok(Self {
            config,
            split,
            partitioner,
            keys,
            scanner,
        })
    }

    /// Returns `true` when [`RecordReader::next`] will yield a row or a
    /// failure held back from the last prefetch. Does not advance the
    /// reader.
    pub fn has_next(&self) -> bool {
        self.scanner.has_next()
    }

    /// Returns the next row, or [`ReaderError::Exhausted`] when none is
    /// left. A scan that failed returns its error once and
    /// [`ReaderError::Aborted`] afterwards.
    pub async fn next(&mut self) -> Result<RowRecord> {
        self.scanner
            .compute_next()
            .await?
            .ok_or(ReaderError::Exhausted)
    }

    /// Releases the reader. The session stays with its provider.
    pub fn close(self) {
        debug!(table = %self.config.table, split = %self.split, "split reader closed");
    }

    /// Returns `true` when `record` is the row at the split's end token.
    pub fn reached_end_of_range(&self, record: &RowRecord) -> Result<bool> {
        self.keys.reached_end_of_range(
            &record.key_columns,
            self.partitioner.as_ref(),
            &self.split,
        )
    }

    /// The token range this reader scans.
    pub fn split(&self) -> &TokenRange {
        &self.split
    }

    /// Job configuration with the projection normalized.
    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Partition and clustering key layout of the table.
    pub fn keys(&self) -> &KeyColumns {
        &self.keys
    }

    /// Partitioner resolved from the job configuration.
    pub fn partitioner(&self) -> &dyn Partitioner {
        self.partitioner.as_ref()
    }

    /// Lifecycle state of the underlying scanner.
    pub fn state(&self) -> ScanState {
        self.scanner.state()
    }

    /// Counters for this scan so far.
    pub fn stats(&self) -> ScanStats {
        self.scanner.stats()
    }

    /// Converts the reader into a stream of its remaining rows.
    pub fn into_stream(self) -> impl Stream<Item = Result<RowRecord>> {
        stream::try_unfold(self, |mut reader| async move {
            Ok(reader
                .scanner
                .compute_next()
                .await?
                .map(|record| (record, reader)))
        })
    }
}
