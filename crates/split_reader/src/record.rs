//! Rows handed to callers: key columns and value columns, both in table
//! metadata order.

use bytes::Bytes;

/// Insertion-ordered mapping of column name to raw encoded value.
/// A `None` value is a null cell.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnMap {
    entries: Vec<(String, Option<Bytes>)>,
}

impl ColumnMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty map with room for `capacity` columns.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Inserts or replaces a column. Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, value: Option<Bytes>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Returns `true` when `name` is present, null or not.
    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.iter().any(|(existing, _)| existing == name)
    }

    /// Returns the cell for `name`; `Some(None)` is a present null.
    pub fn get(&self, name: &str) -> Option<Option<&Bytes>> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_ref())
    }

    /// Column names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Cells in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Bytes>)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_ref()))
    }

    /// Number of columns, nulls included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no column is present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total bytes of non-null values.
    pub fn byte_len(&self) -> usize {
        self.entries
            .iter()
            .filter_map(|(_, value)| value.as_ref().map(Bytes::len))
            .sum()
    }
}

impl<N: Into<String>> FromIterator<(N, Option<Bytes>)> for ColumnMap {
    fn from_iter<I: IntoIterator<Item = (N, Option<Bytes>)>>(iter: I) -> Self {
        let mut map = ColumnMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

/// One scanned row split into key columns and value columns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RowRecord {
    /// Every partition-key then clustering-key column.
    pub key_columns: ColumnMap,
    /// Requested non-key columns.
    pub value_columns: ColumnMap,
}

impl RowRecord {
    /// Total bytes of non-null key and value cells.
    pub fn byte_len(&self) -> usize {
        self.key_columns.byte_len() + self.value_columns.byte_len()
    }
}
