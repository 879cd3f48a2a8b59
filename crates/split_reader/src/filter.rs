//! Extra predicates appended after the token-range clause.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use tracing::warn;

use crate::config::FilterSpec;
use crate::query::quote;

/// Produces the CQL fragment (each clause prefixed with ` AND `) appended
/// to a range query. An empty string adds nothing.
pub trait AdditionalFilterGenerator: Send + Sync {
    fn generate(
        &self,
        additional_filters: &BTreeMap<String, String>,
        filters: &[FilterSpec],
        custom_index_column: Option<&str>,
    ) -> String;
}

/// Renders standard filters as literal comparisons and additional filters
/// as equality predicates on the custom-indexed column.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardFilterGenerator;

impl AdditionalFilterGenerator for StandardFilterGenerator {
    fn generate(
        &self,
        additional_filters: &BTreeMap<String, String>,
        filters: &[FilterSpec],
        custom_index_column: Option<&str>,
    ) -> String {
        let mut clause = String::new();
        for filter in filters {
            let _ = write!(
                clause,
                " AND {} {} {}",
                quote(&filter.field),
                filter.operator,
                filter.value
            );
        }

        if additional_filters.is_empty() {
            return clause;
        }
        match custom_index_column {
            Some(column) => {
                for expression in additional_filters.values() {
                    let _ = write!(
                        clause,
                        " AND {} = '{}'",
                        quote(column),
                        expression.replace('\'', "''")
                    );
                }
            }
            None => warn!(
                filters = additional_filters.len(),
                "additional filters ignored: table has no custom index"
            ),
        }
        clause
    }
}
