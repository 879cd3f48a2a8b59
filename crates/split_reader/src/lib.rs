//! Token-range bounded, paginated row reader for wide-column stores.
//!
//! A distributed job hands each worker a [`TokenRange`] (a "split") of the
//! partitioner ring. [`RecordReader`] opens a session to a replica of the
//! split, composes the range (or equals/IN) statement, and streams the
//! resulting rows page by page as [`RowRecord`]s with key and value columns
//! kept apart.

pub mod column;
pub mod config;
pub mod error;
pub mod filter;
pub mod marshal;
pub mod metrics;
pub mod partitioner;
pub mod query;
pub mod reader;
pub mod record;
pub mod scanner;
pub mod session;
pub mod token;
pub mod token_filter;
pub mod topology;

pub use column::{BoundColumn, ColumnMetadata, KeyColumns, TableMetadata};
pub use config::{EqualsInValue, FilterOperator, FilterSpec, JobConfig, RetryPolicy};
pub use error::{ExecuteError, ReaderError, Result};
pub use filter::{AdditionalFilterGenerator, StandardFilterGenerator};
pub use marshal::{CqlType, CqlValue, KeyValidator};
pub use metrics::{ScanMetrics, ScanMetricsSnapshot, ScanStats};
pub use partitioner::{partitioner_from_class, Partitioner};
pub use query::{QueryComposer, Statement};
pub use reader::{ReaderServices, RecordReader};
pub use record::{ColumnMap, RowRecord};
pub use scanner::{RowLayout, RowScanner, ScanState};
pub use session::{
    ConnectionProvider, Connector, ResultPage, Row, Session, SessionPool, TableMetadataProvider,
};
pub use token::{Token, TokenRange};
