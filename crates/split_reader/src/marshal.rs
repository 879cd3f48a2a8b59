//! Column types, bind values, and partition-key serialization.
//!
//! Encodings follow the native protocol's value formats: fixed-width
//! big-endian integers, IEEE-754 floats, raw UTF-8 text. Multi-column
//! partition keys use the composite layout (`u16` length, bytes, one
//! end-of-component byte per field).

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::{ReaderError, Result};

const END_OF_COMPONENT: u8 = 0x00;

/// Storage type of a column, as reported by table metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CqlType {
    Ascii,
    BigInt,
    Blob,
    Boolean,
    Counter,
    Double,
    Float,
    Inet,
    Int,
    SmallInt,
    Text,
    Timestamp,
    TimeUuid,
    TinyInt,
    Uuid,
}

impl CqlType {
    /// Parses a CQL type name (`int`, `varchar`, ...). Case-insensitive.
    pub fn parse(name: &str) -> Result<Self> {
        let ty = match name.trim().to_ascii_lowercase().as_str() {
            "ascii" => CqlType::Ascii,
            "bigint" => CqlType::BigInt,
            "blob" => CqlType::Blob,
            "boolean" => CqlType::Boolean,
            "counter" => CqlType::Counter,
            "double" => CqlType::Double,
            "float" => CqlType::Float,
            "inet" => CqlType::Inet,
            "int" => CqlType::Int,
            "smallint" => CqlType::SmallInt,
            "text" | "varchar" => CqlType::Text,
            "timestamp" => CqlType::Timestamp,
            "timeuuid" => CqlType::TimeUuid,
            "tinyint" => CqlType::TinyInt,
            "uuid" => CqlType::Uuid,
            other => {
                return Err(ReaderError::configuration(format!(
                    "unsupported column type `{other}`"
                )))
            }
        };
        Ok(ty)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CqlType::Ascii => "ascii",
            CqlType::BigInt => "bigint",
            CqlType::Blob => "blob",
            CqlType::Boolean => "boolean",
            CqlType::Counter => "counter",
            CqlType::Double => "double",
            CqlType::Float => "float",
            CqlType::Inet => "inet",
            CqlType::Int => "int",
            CqlType::SmallInt => "smallint",
            CqlType::Text => "text",
            CqlType::Timestamp => "timestamp",
            CqlType::TimeUuid => "timeuuid",
            CqlType::TinyInt => "tinyint",
            CqlType::Uuid => "uuid",
        }
    }

    /// Serializes one value with this type's encoding.
    ///
    /// Integer values are accepted for any integer column as long as they fit.
    pub fn decompose(self, value: &CqlValue) -> Result<Vec<u8>> {
        let mismatch = || {
            ReaderError::encoding(format!(
                "cannot encode {} as {}",
                value.kind(),
                self.as_str()
            ))
        };
        match self {
            CqlType::Ascii => match value {
                CqlValue::Text(text) if text.is_ascii() => Ok(text.as_bytes().to_vec()),
                _ => Err(mismatch()),
            },
            CqlType::Text => match value {
                CqlValue::Text(text) => Ok(text.as_bytes().to_vec()),
                _ => Err(mismatch()),
            },
            CqlType::BigInt | CqlType::Counter | CqlType::Timestamp => {
                let raw = value.as_i64().ok_or_else(mismatch)?;
                Ok(raw.to_be_bytes().to_vec())
            }
            CqlType::Int => {
                let raw = value.as_i64().ok_or_else(mismatch)?;
                let narrowed = i32::try_from(raw).map_err(|_| mismatch())?;
                Ok(narrowed.to_be_bytes().to_vec())
            }
            CqlType::SmallInt => {
                let raw = value.as_i64().ok_or_else(mismatch)?;
                let narrowed = i16::try_from(raw).map_err(|_| mismatch())?;
                Ok(narrowed.to_be_bytes().to_vec())
            }
            CqlType::TinyInt => {
                let raw = value.as_i64().ok_or_else(mismatch)?;
                let narrowed = i8::try_from(raw).map_err(|_| mismatch())?;
                Ok(narrowed.to_be_bytes().to_vec())
            }
            CqlType::Boolean => match value {
                CqlValue::Boolean(flag) => Ok(vec![u8::from(*flag)]),
                _ => Err(mismatch()),
            },
            CqlType::Double => match value {
                CqlValue::Double(v) => Ok(v.to_be_bytes().to_vec()),
                CqlValue::Float(v) => Ok(f64::from(*v).to_be_bytes().to_vec()),
                _ => Err(mismatch()),
            },
            CqlType::Float => match value {
                CqlValue::Float(v) => Ok(v.to_be_bytes().to_vec()),
                _ => Err(mismatch()),
            },
            CqlType::Blob => match value {
                CqlValue::Blob(bytes) => Ok(bytes.clone()),
                _ => Err(mismatch()),
            },
            CqlType::Uuid | CqlType::TimeUuid => match value {
                CqlValue::Uuid(text) => parse_uuid(text).map(|raw| raw.to_vec()),
                _ => Err(mismatch()),
            },
            CqlType::Inet => match value {
                CqlValue::Inet(IpAddr::V4(addr)) => Ok(addr.octets().to_vec()),
                CqlValue::Inet(IpAddr::V6(addr)) => Ok(addr.octets().to_vec()),
                _ => Err(mismatch()),
            },
        }
    }

    /// Decodes a raw column value produced with this type's encoding.
    pub fn compose(self, raw: &[u8]) -> Result<CqlValue> {
        let width = |expected: usize| {
            if raw.len() == expected {
                Ok(())
            } else {
                Err(ReaderError::encoding(format!(
                    "{} value must be {expected} bytes, got {}",
                    self.as_str(),
                    raw.len()
                )))
            }
        };
        let value = match self {
            CqlType::Ascii | CqlType::Text => CqlValue::Text(
                String::from_utf8(raw.to_vec())
                    .map_err(|err| ReaderError::encoding(format!("invalid utf-8 text: {err}")))?,
            ),
            CqlType::BigInt | CqlType::Counter => {
                width(8)?;
                CqlValue::BigInt(i64::from_be_bytes(fixed(raw)))
            }
            CqlType::Timestamp => {
                width(8)?;
                CqlValue::Timestamp(i64::from_be_bytes(fixed(raw)))
            }
            CqlType::Int => {
                width(4)?;
                CqlValue::Int(i32::from_be_bytes(fixed(raw)))
            }
            CqlType::SmallInt => {
                width(2)?;
                CqlValue::SmallInt(i16::from_be_bytes(fixed(raw)))
            }
            CqlType::TinyInt => {
                width(1)?;
                CqlValue::TinyInt(i8::from_be_bytes(fixed(raw)))
            }
            CqlType::Boolean => {
                width(1)?;
                CqlValue::Boolean(raw[0] != 0)
            }
            CqlType::Double => {
                width(8)?;
                CqlValue::Double(f64::from_be_bytes(fixed(raw)))
            }
            CqlType::Float => {
                width(4)?;
                CqlValue::Float(f32::from_be_bytes(fixed(raw)))
            }
            CqlType::Blob => CqlValue::Blob(raw.to_vec()),
            CqlType::Uuid | CqlType::TimeUuid => {
                width(16)?;
                CqlValue::Uuid(format_uuid(fixed(raw)))
            }
            CqlType::Inet => match raw.len() {
                4 => CqlValue::Inet(IpAddr::from(fixed::<4>(raw))),
                16 => CqlValue::Inet(IpAddr::from(fixed::<16>(raw))),
                other => {
                    return Err(ReaderError::encoding(format!(
                        "inet value must be 4 or 16 bytes, got {other}"
                    )))
                }
            },
        };
        Ok(value)
    }
}

impl TryFrom<String> for CqlType {
    type Error = ReaderError;

    fn try_from(value: String) -> Result<Self> {
        CqlType::parse(&value)
    }
}

impl From<CqlType> for String {
    fn from(value: CqlType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for CqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed value used for bind parameters and predicate literals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CqlValue {
    Text(String),
    BigInt(i64),
    Int(i32),
    SmallInt(i16),
    TinyInt(i8),
    Boolean(bool),
    Double(f64),
    Float(f32),
    Blob(Vec<u8>),
    /// Hyphenated or plain 32-digit hex form.
    Uuid(String),
    /// Milliseconds since the unix epoch.
    Timestamp(i64),
    Inet(IpAddr),
    /// Bound as a single parameter, e.g. for `IN ?`.
    List(Vec<CqlValue>),
}

impl CqlValue {
    fn kind(&self) -> &'static str {
        match self {
            CqlValue::Text(_) => "text",
            CqlValue::BigInt(_) => "bigint",
            CqlValue::Int(_) => "int",
            CqlValue::SmallInt(_) => "smallint",
            CqlValue::TinyInt(_) => "tinyint",
            CqlValue::Boolean(_) => "boolean",
            CqlValue::Double(_) => "double",
            CqlValue::Float(_) => "float",
            CqlValue::Blob(_) => "blob",
            CqlValue::Uuid(_) => "uuid",
            CqlValue::Timestamp(_) => "timestamp",
            CqlValue::Inet(_) => "inet",
            CqlValue::List(_) => "list",
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            CqlValue::BigInt(v) | CqlValue::Timestamp(v) => Some(*v),
            CqlValue::Int(v) => Some(i64::from(*v)),
            CqlValue::SmallInt(v) => Some(i64::from(*v)),
            CqlValue::TinyInt(v) => Some(i64::from(*v)),
            _ => None,
        }
    }
}

/// Renders the value as a CQL literal.
impl fmt::Display for CqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CqlValue::Text(text) => write!(f, "'{}'", text.replace('\'', "''")),
            CqlValue::BigInt(v) | CqlValue::Timestamp(v) => write!(f, "{v}"),
            CqlValue::Int(v) => write!(f, "{v}"),
            CqlValue::SmallInt(v) => write!(f, "{v}"),
            CqlValue::TinyInt(v) => write!(f, "{v}"),
            CqlValue::Boolean(v) => write!(f, "{v}"),
            CqlValue::Double(v) => write!(f, "{v}"),
            CqlValue::Float(v) => write!(f, "{v}"),
            CqlValue::Blob(bytes) => write!(f, "0x{}", hex::encode(bytes)),
            CqlValue::Uuid(text) => match parse_uuid(text) {
                Ok(raw) => f.write_str(&format_uuid(raw)),
                Err(_) => write!(f, "'{}'", text.replace('\'', "''")),
            },
            CqlValue::Inet(addr) => write!(f, "'{addr}'"),
            CqlValue::List(items) => {
                f.write_str("(")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Serializer for a full partition key.
///
/// A table with a single partition-key column uses that column's type
/// directly; several columns are combined with the composite layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyValidator {
    Scalar(CqlType),
    Composite(Vec<CqlType>),
}

impl KeyValidator {
    /// Builds the validator from partition-key column types in key order.
    pub fn from_types(mut types: Vec<CqlType>) -> Result<Self> {
        match types.len() {
            0 => Err(ReaderError::configuration(
                "cannot build a key validator without partition key columns",
            )),
            1 => Ok(KeyValidator::Scalar(types.remove(0))),
            _ => Ok(KeyValidator::Composite(types)),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, KeyValidator::Composite(_))
    }

    /// Number of partition-key components this validator expects.
    pub fn components(&self) -> usize {
        match self {
            KeyValidator::Scalar(_) => 1,
            KeyValidator::Composite(types) => types.len(),
        }
    }

    /// Serializes typed component values into a partition key.
    pub fn decompose(&self, values: &[CqlValue]) -> Result<Vec<u8>> {
        if values.len() != self.components() {
            return Err(ReaderError::encoding(format!(
                "partition key expects {} component(s), got {}",
                self.components(),
                values.len()
            )));
        }
        match self {
            KeyValidator::Scalar(ty) => ty.decompose(&values[0]),
            KeyValidator::Composite(types) => {
                let components = types
                    .iter()
                    .zip(values)
                    .map(|(ty, value)| ty.decompose(value))
                    .collect::<Result<Vec<_>>>()?;
                let refs = components.iter().map(Vec::as_slice).collect::<Vec<_>>();
                build_composite(&refs)
            }
        }
    }

    /// Combines already-encoded component values into a partition key.
    pub fn build(&self, components: &[&[u8]]) -> Result<Vec<u8>> {
        if components.len() != self.components() {
            return Err(ReaderError::encoding(format!(
                "partition key expects {} component(s), got {}",
                self.components(),
                components.len()
            )));
        }
        match self {
            KeyValidator::Scalar(_) => Ok(components[0].to_vec()),
            KeyValidator::Composite(_) => build_composite(components),
        }
    }
}

fn build_composite(components: &[&[u8]]) -> Result<Vec<u8>> {
    let capacity = components.iter().map(|c| c.len() + 3).sum();
    let mut out = Vec::with_capacity(capacity);
    for component in components {
        let len = u16::try_from(component.len()).map_err(|_| {
            ReaderError::encoding(format!(
                "composite component of {} bytes exceeds {} bytes",
                component.len(),
                u16::MAX
            ))
        })?;
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(component);
        out.push(END_OF_COMPONENT);
    }
    Ok(out)
}

fn fixed<const N: usize>(raw: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&raw[..N]);
    out
}

fn parse_uuid(text: &str) -> Result<[u8; 16]> {
    let digits = text.trim().replace('-', "");
    let raw = hex::decode(&digits)
        .map_err(|err| ReaderError::encoding(format!("invalid uuid `{text}`: {err}")))?;
    <[u8; 16]>::try_from(raw.as_slice())
        .map_err(|_| ReaderError::encoding(format!("invalid uuid `{text}`: expected 16 bytes")))
}

fn format_uuid(raw: [u8; 16]) -> String {
    let digits = hex::encode(raw);
    format!(
        "{}-{}-{}-{}-{}",
        &digits[0..8],
        &digits[8..12],
        &digits[12..16],
        &digits[16..20],
        &digits[20..32]
    )
}
