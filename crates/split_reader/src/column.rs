//! Table metadata shapes and the partition/clustering key layout derived
//! from them.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ReaderError, Result};
use crate::marshal::{CqlType, KeyValidator};
use crate::partitioner::Partitioner;
use crate::record::ColumnMap;
use crate::token::{Token, TokenRange};

/// One column as described by table metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub cql_type: CqlType,
    /// Set when a custom secondary index (e.g. full-text) covers the column.
    #[serde(default)]
    pub has_custom_index: bool,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, cql_type: CqlType) -> Self {
        Self {
            name: name.into(),
            cql_type,
            has_custom_index: false,
        }
    }

    pub fn with_custom_index(mut self) -> Self {
        self.has_custom_index = true;
        self
    }
}

/// Column layout of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Partition-key columns in key order.
    pub partition_key: Vec<ColumnMetadata>,
    /// Clustering columns in clustering order.
    #[serde(default)]
    pub clustering_columns: Vec<ColumnMetadata>,
    /// Every column of the table in metadata order.
    pub columns: Vec<ColumnMetadata>,
}

impl TableMetadata {
    /// Name of the last custom-indexed column, if any.
    pub fn custom_index_column(&self) -> Option<&str> {
        self.columns
            .iter()
            .rev()
            .find(|column| column.has_custom_index)
            .map(|column| column.name.as_str())
    }
}

/// Name and type of a partition-key or clustering-key column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundColumn {
    pub name: String,
    pub validator: CqlType,
}

impl BoundColumn {
    fn from_metadata(column: &ColumnMetadata) -> Self {
        Self {
            name: column.name.clone(),
            validator: column.cql_type,
        }
    }
}

/// Key layout resolved once per reader.
#[derive(Debug, Clone)]
pub struct KeyColumns {
    partition: Vec<BoundColumn>,
    clustering: Vec<BoundColumn>,
    validator: KeyValidator,
}

impl KeyColumns {
    /// Resolves key columns and builds the key validator. A table without
    /// partition-key columns cannot be scanned.
    pub fn resolve(metadata: &TableMetadata) -> Result<Self> {
        let partition = metadata
            .partition_key
            .iter()
            .map(BoundColumn::from_metadata)
            .collect::<Vec<_>>();
        let clustering = metadata
            .clustering_columns
            .iter()
            .map(BoundColumn::from_metadata)
            .collect::<Vec<_>>();

        let types = partition.iter().map(|column| column.validator).collect();
        let validator = KeyValidator::from_types(types).map_err(|_| {
            ReaderError::configuration(format!(
                "cannot determine key validator, partition keys: {:?}",
                metadata.partition_key
            ))
        })?;

        debug!(
            partition = ?partition.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            clustering = ?clustering.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            composite = validator.is_composite(),
            "resolved key columns"
        );

        Ok(Self {
            partition,
            clustering,
            validator,
        })
    }

    pub fn partition(&self) -> &[BoundColumn] {
        &self.partition
    }

    pub fn clustering(&self) -> &[BoundColumn] {
        &self.clustering
    }

    pub fn validator(&self) -> &KeyValidator {
        &self.validator
    }

    /// Partition-key columns followed by clustering columns.
    pub fn all(&self) -> impl Iterator<Item = &BoundColumn> {
        self.partition.iter().chain(self.clustering.iter())
    }

    pub fn is_key_column(&self, name: &str) -> bool {
        self.all().any(|column| column.name == name)
    }

    /// Serializes the partition key found in `key_columns`.
    pub fn partition_key_bytes(&self, key_columns: &ColumnMap) -> Result<Vec<u8>> {
        let mut components = Vec::with_capacity(self.partition.len());
        for column in &self.partition {
            let value = key_columns.get(&column.name).flatten().ok_or_else(|| {
                ReaderError::encoding(format!(
                    "partition key column `{}` has no value",
                    column.name
                ))
            })?;
            components.push(value.as_ref());
        }
        self.validator.build(&components)
    }

    /// Token of the row whose key values are in `key_columns`.
    pub fn token_of_row(
        &self,
        key_columns: &ColumnMap,
        partitioner: &dyn Partitioner,
    ) -> Result<Token> {
        let key = self.partition_key_bytes(key_columns)?;
        Ok(partitioner.token_of(&key))
    }

    /// Returns `true` when the row's token renders identically to the
    /// range's end token.
    // TODO: compare tokens directly instead of their string forms once
    // callers stop relying on the rendered comparison.
    pub fn reached_end_of_range(
        &self,
        key_columns: &ColumnMap,
        partitioner: &dyn Partitioner,
        range: &TokenRange,
    ) -> Result<bool> {
        let current = self.token_of_row(key_columns, partitioner)?;
        Ok(current.to_string() == range.end_token.to_string())
    }
}
