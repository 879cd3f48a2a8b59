//! Job configuration consumed by split readers.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{ReaderError, Result};
use crate::marshal::CqlValue;
use crate::partitioner::MURMUR3_PARTITIONER;

/// Environment override for [`JobConfig::page_size`].
pub const PAGE_SIZE_ENV: &str = "SPLIT_READER_PAGE_SIZE";

const DEFAULT_PAGE_SIZE: usize = 1000;
const DEFAULT_EXECUTE_ATTEMPTS: usize = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Default rows per fetched page.
fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_partitioner() -> String {
    MURMUR3_PARTITIONER.to_string()
}

/// Settings for scanning one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub keyspace: String,
    pub table: String,
    /// Projection; empty selects every column.
    #[serde(default)]
    pub input_columns: Vec<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Partitioner class identifier.
    #[serde(default = "default_partitioner")]
    pub partitioner: String,
    /// Replaces the token-range query with an `= ? AND IN ?` query.
    #[serde(default)]
    pub equals_in: Option<EqualsInValue>,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    /// Custom-index expressions keyed by name.
    #[serde(default)]
    pub additional_filters: BTreeMap<String, String>,
    /// Addresses considered local when ordering replicas.
    #[serde(default)]
    pub local_addresses: Vec<String>,
}

impl JobConfig {
    pub fn new(keyspace: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            table: table.into(),
            input_columns: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            partitioner: default_partitioner(),
            equals_in: None,
            filters: Vec::new(),
            additional_filters: BTreeMap::new(),
            local_addresses: Vec::new(),
        }
    }

    /// Parses a JSON job document and validates it.
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let config: JobConfig = serde_json::from_str(raw).context("parse job config json")?;
        config.validate().context("validate job config")?;
        Ok(config)
    }

    pub fn with_input_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_partitioner(mut self, partitioner: impl Into<String>) -> Self {
        self.partitioner = partitioner.into();
        self
    }

    pub fn with_equals_in(mut self, equals_in: EqualsInValue) -> Self {
        self.equals_in = Some(equals_in);
        self
    }

    pub fn with_filter(mut self, filter: FilterSpec) -> Self {
        self.filters.push(filter);
        self
    }

    /// Applies [`PAGE_SIZE_ENV`] when it holds a positive integer.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Some(page_size) = std::env::var(PAGE_SIZE_ENV)
            .ok()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|value| *value > 0)
        {
            self.page_size = page_size;
        }
        self
    }

    /// Returns `true` when `column` should be emitted as a value column.
    pub fn is_column_wanted(&self, column: &str) -> bool {
        self.input_columns.is_empty() || self.input_columns.iter().any(|c| c == column)
    }

    pub fn validate(&self) -> Result<()> {
        if self.table.trim().is_empty() {
            return Err(ReaderError::configuration("job config has empty table"));
        }
        if self.page_size == 0 {
            return Err(ReaderError::configuration("job config has invalid page_size=0"));
        }
        if let Some(equals_in) = &self.equals_in {
            if equals_in.equals_field.trim().is_empty() || equals_in.in_field.trim().is_empty() {
                return Err(ReaderError::configuration(
                    "equals/in predicate requires both field names",
                ));
            }
        }
        Ok(())
    }
}

/// `<equals_field> = ? AND <in_field> IN ?` predicate over a two-column
/// partition key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqualsInValue {
    pub equals_field: String,
    pub equals_value: CqlValue,
    pub in_field: String,
    pub in_values: Vec<CqlValue>,
}

impl EqualsInValue {
    pub fn new(
        equals_field: impl Into<String>,
        equals_value: CqlValue,
        in_field: impl Into<String>,
        in_values: Vec<CqlValue>,
    ) -> Self {
        Self {
            equals_field: equals_field.into(),
            equals_value,
            in_field: in_field.into(),
            in_values,
        }
    }
}

/// Comparison operators accepted in standard filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    Gt,
    GtEq,
    Lt,
    LtEq,
}

impl FilterOperator {
    pub fn as_cql(self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Gt => ">",
            FilterOperator::GtEq => ">=",
            FilterOperator::Lt => "<",
            FilterOperator::LtEq => "<=",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_cql())
    }
}

/// One `<field> <op> <value>` restriction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub field: String,
    pub operator: FilterOperator,
    pub value: CqlValue,
}

impl FilterSpec {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: CqlValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}

/// Retry behavior for statement execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: usize,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_EXECUTE_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}
