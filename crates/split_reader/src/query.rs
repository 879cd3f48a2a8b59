//! Statement text and bind values for one split.

use std::collections::HashSet;

use tracing::debug;

use crate::column::{BoundColumn, KeyColumns, TableMetadata};
use crate::config::JobConfig;
use crate::error::Result;
use crate::filter::AdditionalFilterGenerator;
use crate::marshal::CqlValue;
use crate::partitioner::Partitioner;
use crate::token::TokenRange;
use crate::token_filter::filter_in_values;

/// Query text plus positional bind values and the page-size hint.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// CQL text with `?` markers.
    pub query: String,
    /// One value per marker, in order.
    pub values: Vec<CqlValue>,
    /// Rows requested per page.
    pub fetch_size: usize,
}

/// Wraps an identifier in double quotes, doubling embedded quotes.
pub fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Inverse of [`quote`]. Returns `None` for text that is not a quoted
/// identifier.
pub fn unquote(quoted: &str) -> Option<String> {
    let inner = quoted.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '"' {
            // A lone quote cannot appear inside a quoted identifier.
            if chars.next() != Some('"') {
                return None;
            }
        }
        out.push(ch);
    }
    Some(out)
}

/// Comma-joined quoted names, e.g. `"a","b"`.
fn key_string(columns: &[BoundColumn]) -> String {
    columns
        .iter()
        .map(|column| quote(&column.name))
        .collect::<Vec<_>>()
        .join(",")
}

/// Builds the statements a reader executes. Everything that does not
/// depend on the split is computed once.
#[derive(Debug, Clone)]
pub struct QueryComposer {
    select_columns: String,
    table: String,
    partition_key_string: String,
    extra_filters: String,
    page_size: usize,
}

impl QueryComposer {
    /// Precomputes the select list, quoted table name, partition-key list,
    /// and extra filters for `config`.
    pub fn new(
        config: &JobConfig,
        keys: &KeyColumns,
        metadata: &TableMetadata,
        filters: &dyn AdditionalFilterGenerator,
    ) -> Self {
        let extra_filters = filters.generate(
            &config.additional_filters,
            &config.filters,
            metadata.custom_index_column(),
        );
        Self {
            select_columns: select_columns(&config.input_columns, keys),
            table: quote(&config.table),
            partition_key_string: key_string(keys.partition()),
            extra_filters,
            page_size: config.page_size,
        }
    }

    /// Column list of the `SELECT`.
    pub fn select_columns(&self) -> &str {
        &self.select_columns
    }

    /// ` WHERE token(<pk>) > ? AND token(<pk>) <= ?`
    pub fn where_clause(&self) -> String {
        format!(
            " WHERE token({0}) > ? AND token({0}) <= ?",
            self.partition_key_string
        )
    }

    /// `SELECT <columns> FROM <table> WHERE token(...) > ? AND token(...) <= ?<filters> ALLOW FILTERING`
    pub fn range_query(&self) -> String {
        format!(
            "SELECT {} FROM {}{}{} ALLOW FILTERING",
            self.select_columns,
            self.table,
            self.where_clause(),
            self.extra_filters
        )
    }

    /// `SELECT <columns> FROM <table> WHERE <equals_field> = ? AND <in_field> IN ?`.
    /// Field names are used verbatim.
    pub fn equals_in_query(&self, equals_field: &str, in_field: &str) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = ? AND {} IN ?",
            self.select_columns, self.table, equals_field, in_field
        )
    }

    /// Builds the statement for `split`. `Ok(None)` means the equals/IN
    /// candidates all fall outside the split and nothing should run.
    pub fn prepare_statement(
        &self,
        config: &JobConfig,
        keys: &KeyColumns,
        split: &TokenRange,
        partitioner: &dyn Partitioner,
    ) -> Result<Option<Statement>> {
        let (query, values) = match &config.equals_in {
            None => (self.range_query(), split.bind_values()),
            Some(equals_in) => {
                let retained =
                    filter_in_values(equals_in, keys.validator(), split, partitioner)?;
                if retained.is_empty() {
                    debug!(split = %split, "no in-values inside split; nothing to query");
                    return Ok(None);
                }
                (
                    self.equals_in_query(&equals_in.equals_field, &equals_in.in_field),
                    vec![equals_in.equals_value.clone(), CqlValue::List(retained)],
                )
            }
        };

        debug!(query = %query, values = ?values, "prepared statement");
        Ok(Some(Statement {
            query,
            values,
            fetch_size: self.page_size,
        }))
    }
}

/// `*` without a projection; otherwise partition keys, clustering keys,
/// then the remaining requested columns, all quoted.
fn select_columns(input_columns: &[String], keys: &KeyColumns) -> String {
    if input_columns.is_empty() {
        return "*".to_string();
    }

    let mut parts = vec![key_string(keys.partition())];
    let clustering = key_string(keys.clustering());
    if !clustering.is_empty() {
        parts.push(clustering);
    }
    if let Some(rest) = without_key_columns(input_columns, keys) {
        parts.push(rest);
    }
    parts.join(",")
}

/// Quoted, comma-joined projection minus key columns; `None` when only
/// key columns were requested.
fn without_key_columns(input_columns: &[String], keys: &KeyColumns) -> Option<String> {
    let key_names = keys
        .all()
        .map(|column| column.name.as_str())
        .collect::<HashSet<_>>();
    let rest = input_columns
        .iter()
        .map(|column| column.trim())
        .filter(|column| !key_names.contains(column))
        .map(quote)
        .collect::<Vec<_>>();
    if rest.is_empty() {
        None
    } else {
        Some(rest.join(","))
    }
}
