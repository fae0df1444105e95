//! Entity contract shared by every repository.
//!
//! # Responsibility
//! - Describe identity, persisted shape and sortable columns of a record type.
//! - Replace runtime property lookup with a registered column table.
//!
//! # Invariants
//! - `key()` is stable for the lifetime of a persisted entity.
//! - Column names are unique within `columns()`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};

/// Stable identity of an entity inside its collection.
pub type EntityKey = String;

/// Store-assigned metadata for one persisted row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowMeta {
    /// Monotonic row id; defines store-native order.
    pub row_id: i64,
}

/// Comparable value produced by a column accessor.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    /// Unix epoch milliseconds.
    Timestamp(i64),
}

impl ColumnValue {
    /// Natural ordering: numbers numerically, text lexicographically,
    /// timestamps chronologically. `Null` sorts first.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Null, _) => Ordering::Less,
            (_, Self::Null) => Ordering::Greater,
            (Self::Bool(left), Self::Bool(right)) => left.cmp(right),
            (Self::Integer(left), Self::Integer(right)) => left.cmp(right),
            (Self::Real(left), Self::Real(right)) => left.total_cmp(right),
            (Self::Integer(left), Self::Real(right)) => (*left as f64).total_cmp(right),
            (Self::Real(left), Self::Integer(right)) => left.total_cmp(&(*right as f64)),
            (Self::Text(left), Self::Text(right)) => left.cmp(right),
            (Self::Timestamp(left), Self::Timestamp(right)) => left.cmp(right),
            (left, right) => left.kind_rank().cmp(&right.kind_rank()),
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Integer(_) | Self::Real(_) => 2,
            Self::Text(_) => 3,
            Self::Timestamp(_) => 4,
        }
    }
}

impl From<i64> for ColumnValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ColumnValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for ColumnValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ColumnValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl<V: Into<ColumnValue>> From<Option<V>> for ColumnValue {
    fn from(value: Option<V>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Named, typed accessor for one sortable property of `T`.
pub struct Column<T> {
    name: &'static str,
    read: fn(&T) -> ColumnValue,
}

impl<T> Column<T> {
    pub fn new(name: &'static str, read: fn(&T) -> ColumnValue) -> Self {
        Self { name, read }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value(&self, entity: &T) -> ColumnValue {
        (self.read)(entity)
    }
}

impl<T> Clone for Column<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Column<T> {}

impl<T> Debug for Column<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column").field("name", &self.name).finish()
    }
}

/// Record type managed by `Repository<T>`.
///
/// The serialized form is what the store persists and what change tracking
/// compares. Fields filled from `RowMeta` should be `#[serde(skip)]`.
pub trait Entity: Clone + Serialize + DeserializeOwned + 'static {
    /// Collection discriminator in the store and type name in errors.
    const ENTITY_NAME: &'static str;

    fn key(&self) -> EntityKey;

    /// Sortable columns available to `OrderSpec`.
    fn columns() -> Vec<Column<Self>>;

    /// Resolves one column by exact name.
    fn column(name: &str) -> Option<Column<Self>> {
        Self::columns()
            .into_iter()
            .find(|column| column.name() == name)
    }

    /// Reflects store-assigned fields into the entity after add and on read.
    fn apply_row_meta(&mut self, _meta: &RowMeta) {}
}
