//! Partitioner implementations resolved from a class identifier.

use std::fmt;
use std::sync::Arc;

use crate::error::{ReaderError, Result};
use crate::token::Token;

pub const MURMUR3_PARTITIONER: &str = "org.apache.cassandra.dht.Murmur3Partitioner";
pub const BYTE_ORDERED_PARTITIONER: &str = "org.apache.cassandra.dht.ByteOrderedPartitioner";

const C1: u64 = 0x87c3_7b91_1142_53d5;
const C2: u64 = 0x4cf5_ad43_2745_937f;

/// Maps serialized partition keys onto the ring.
pub trait Partitioner: Send + Sync + fmt::Debug {
    /// Fully-qualified class identifier.
    fn name(&self) -> &'static str;

    fn token_of(&self, key: &[u8]) -> Token;

    /// Smallest token of the ring.
    fn min_token(&self) -> Token;

    /// Parses the string form produced by `Token`'s `Display`.
    fn parse_token(&self, raw: &str) -> Result<Token>;
}

/// Resolves a partitioner from its class name. Both the fully-qualified
/// name and the simple class name are accepted.
pub fn partitioner_from_class(identifier: &str) -> Result<Arc<dyn Partitioner>> {
    let simple = identifier.rsplit('.').next().unwrap_or(identifier).trim();
    match simple {
        "Murmur3Partitioner" => Ok(Arc::new(Murmur3Partitioner)),
        "ByteOrderedPartitioner" => Ok(Arc::new(ByteOrderedPartitioner)),
        _ => Err(ReaderError::configuration(format!(
            "unsupported partitioner `{identifier}`"
        ))),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Murmur3Partitioner;

impl Partitioner for Murmur3Partitioner {
    fn name(&self) -> &'static str {
        MURMUR3_PARTITIONER
    }

    fn token_of(&self, key: &[u8]) -> Token {
        let hash = murmur3_x64_128(key)[0] as i64;
        // i64::MIN is reserved as the ring minimum.
        Token::Long(if hash == i64::MIN { i64::MAX } else { hash })
    }

    fn min_token(&self) -> Token {
        Token::Long(i64::MIN)
    }

    fn parse_token(&self, raw: &str) -> Result<Token> {
        raw.trim()
            .parse::<i64>()
            .map(Token::Long)
            .map_err(|err| ReaderError::configuration(format!("invalid murmur3 token `{raw}`: {err}")))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ByteOrderedPartitioner;

impl Partitioner for ByteOrderedPartitioner {
    fn name(&self) -> &'static str {
        BYTE_ORDERED_PARTITIONER
    }

    fn token_of(&self, key: &[u8]) -> Token {
        Token::Bytes(key.to_vec())
    }

    fn min_token(&self) -> Token {
        Token::Bytes(Vec::new())
    }

    fn parse_token(&self, raw: &str) -> Result<Token> {
        hex::decode(raw.trim())
            .map(Token::Bytes)
            .map_err(|err| ReaderError::configuration(format!("invalid byte token `{raw}`: {err}")))
    }
}

/// MurmurHash3 x64/128 with seed 0, matching the storage engine's variant:
/// tail bytes are sign-extended before mixing.
fn murmur3_x64_128(key: &[u8]) -> [u64; 2] {
    let len = key.len();
    let mut h1: u64 = 0;
    let mut h2: u64 = 0;

    let mut blocks = key.chunks_exact(16);
    for block in &mut blocks {
        let mut k1 = u64::from_le_bytes(block[0..8].try_into().unwrap_or([0; 8]));
        let mut k2 = u64::from_le_bytes(block[8..16].try_into().unwrap_or([0; 8]));

        k1 = k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2);
        h1 ^= k1;
        h1 = h1.rotate_left(27).wrapping_add(h2);
        h1 = h1.wrapping_mul(5).wrapping_add(0x52dc_e729);

        k2 = k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1);
        h2 ^= k2;
        h2 = h2.rotate_left(31).wrapping_add(h1);
        h2 = h2.wrapping_mul(5).wrapping_add(0x3849_5ab5);
    }

    let tail = blocks.remainder();
    let signed = |idx: usize| tail[idx] as i8 as i64 as u64;
    let mut k1: u64 = 0;
    let mut k2: u64 = 0;
    if tail.len() > 8 {
        for idx in (8..tail.len()).rev() {
            k2 ^= signed(idx) << ((idx - 8) * 8);
        }
        k2 = k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1);
        h2 ^= k2;
    }
    if !tail.is_empty() {
        for idx in (0..tail.len().min(8)).rev() {
            k1 ^= signed(idx) << (idx * 8);
        }
        k1 = k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2);
        h1 ^= k1;
    }

    h1 ^= len as u64;
    h2 ^= len as u64;
    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);
    h1 = fmix64(h1);
    h2 = fmix64(h2);
    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);
    [h1, h2]
}

fn fmix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}
