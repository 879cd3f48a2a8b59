//! Narrows `IN` candidates to those whose partition key lands in the split.
//!
//! `IN` values are global to the job while each reader owns one token range,
//! so without this pass every reader would fetch every candidate.

use tracing::debug;

use crate::config::EqualsInValue;
use crate::error::{ReaderError, Result};
use crate::marshal::{CqlValue, KeyValidator};
use crate::partitioner::Partitioner;
use crate::token::TokenRange;

/// Returns the candidates, in their original order, whose key
/// `(equals_value, candidate)` hashes into `split`. An empty result means
/// nothing in this split can match.
pub fn filter_in_values(
    equals_in: &EqualsInValue,
    validator: &KeyValidator,
    split: &TokenRange,
    partitioner: &dyn Partitioner,
) -> Result<Vec<CqlValue>> {
    if !validator.is_composite() {
        return Err(ReaderError::configuration(format!(
            "equals/in predicate on `{}`/`{}` requires a composite partition key",
            equals_in.equals_field, equals_in.in_field
        )));
    }

    let mut retained = Vec::with_capacity(equals_in.in_values.len());
    for candidate in &equals_in.in_values {
        let key = validator.decompose(&[equals_in.equals_value.clone(), candidate.clone()])?;
        let token = partitioner.token_of(&key);
        if split.contains(&token) {
            retained.push(candidate.clone());
        }
    }

    debug!(
        split = %split,
        candidates = equals_in.in_values.len(),
        retained = retained.len(),
        "filtered in-values by token range"
    );
    Ok(retained)
}
