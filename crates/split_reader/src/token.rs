//! Partitioner tokens and the token ranges ("splits") assigned to readers.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::marshal::CqlValue;

/// Position of a partition key on the ring.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Token {
    /// Signed 64-bit token (Murmur3).
    Long(i64),
    /// Raw key bytes (byte-ordered partitioner).
    Bytes(Vec<u8>),
}

impl Token {
    /// Bind value for `token(...) > ?` style predicates.
    pub fn to_bind_value(&self) -> CqlValue {
        match self {
            Token::Long(value) => CqlValue::BigInt(*value),
            Token::Bytes(bytes) => CqlValue::Blob(bytes.clone()),
        }
    }
}

/// Long tokens order before byte tokens; mixing kinds only happens on
/// misconfiguration.
impl Ord for Token {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Token::Long(left), Token::Long(right)) => left.cmp(right),
            (Token::Bytes(left), Token::Bytes(right)) => left.cmp(right),
            (Token::Long(_), Token::Bytes(_)) => Ordering::Less,
            (Token::Bytes(_), Token::Long(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Token {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Long(value) => write!(f, "{value}"),
            Token::Bytes(bytes) => f.write_str(&hex::encode(bytes)),
        }
    }
}

/// Contiguous slice of the ring, open at `start_token` and closed at
/// `end_token`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRange {
    /// Exclusive lower bound.
    pub start_token: Token,
    /// Inclusive upper bound.
    pub end_token: Token,
    /// Endpoints holding a replica of the range.
    #[serde(default)]
    pub replicas: Vec<String>,
}

impl TokenRange {
    /// Builds the range `(start_token, end_token]` held by `replicas`.
    pub fn new(start_token: Token, end_token: Token, replicas: Vec<String>) -> Self {
        Self {
            start_token,
            end_token,
            replicas,
        }
    }

    /// Returns `true` when the range crosses the ring's minimum token.
    pub fn is_wrapping(&self) -> bool {
        self.start_token >= self.end_token
    }

    /// Tests `start < token <= end`, honoring wrap-around. A range whose
    /// bounds are equal covers the whole ring.
    pub fn contains(&self, token: &Token) -> bool {
        match self.start_token.cmp(&self.end_token) {
            Ordering::Less => *token > self.start_token && *token <= self.end_token,
            Ordering::Equal => true,
            Ordering::Greater => *token > self.start_token || *token <= self.end_token,
        }
    }

    /// Bind values for the range predicate, in `(start, end)` order.
    pub fn bind_values(&self) -> Vec<CqlValue> {
        vec![
            self.start_token.to_bind_value(),
            self.end_token.to_bind_value(),
        ]
    }
}

impl fmt::Display for TokenRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}]", self.start_token, self.end_token)
    }
}
