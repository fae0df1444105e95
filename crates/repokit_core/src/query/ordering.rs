//! Multi-column ordering.
//!
//! # Responsibility
//! - Keep caller intent as an insertion-ordered `column -> ascending` list.
//! - Resolve that list against `Entity::columns()` into a comparator chain.
//!
//! # Invariants
//! - The first entry is the primary key; later entries only break ties.
//! - Sorting is stable: rows equal on every key keep their input order.
//! - Unknown columns fail at resolve time, before the store is touched.

use crate::model::entity::{Column, ColumnValue, Entity};
use crate::repo::error::{RepoError, RepoResult};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn from_ascending(ascending: bool) -> Self {
        if ascending {
            Self::Ascending
        } else {
            Self::Descending
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// Insertion-ordered mapping of column name to direction.
///
/// Setting a column that is already present replaces its direction and keeps
/// its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderSpec {
    entries: Vec<(String, SortDirection)>,
}

impl OrderSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.set(column, SortDirection::from_ascending(ascending));
        self
    }

    pub fn asc(self, column: impl Into<String>) -> Self {
        self.then(column, true)
    }

    pub fn desc(self, column: impl Into<String>) -> Self {
        self.then(column, false)
    }

    pub fn set(&mut self, column: impl Into<String>, direction: SortDirection) {
        let column = column.into();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = direction,
            None => self.entries.push((column, direction)),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, SortDirection)> {
        self.entries
            .iter()
            .map(|(name, direction)| (name.as_str(), *direction))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, bool)> for OrderSpec {
    fn from_iter<I: IntoIterator<Item = (S, bool)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |spec, (column, ascending)| {
                spec.then(column, ascending)
            })
    }
}

/// `OrderSpec` resolved against the columns of `T`.
#[derive(Debug, Clone)]
pub struct OrderBy<T> {
    keys: Vec<(Column<T>, SortDirection)>,
}

impl<T: Entity> OrderBy<T> {
    /// Resolves every column name, failing with `InvalidOrderKey` on the
    /// first one `T` does not register.
    pub fn resolve(spec: &OrderSpec) -> RepoResult<Self> {
        let columns = T::columns();
        let keys = spec
            .entries()
            .map(|(name, direction)| {
                columns
                    .iter()
                    .find(|column| column.name() == name)
                    .map(|column| (*column, direction))
                    .ok_or_else(|| RepoError::InvalidOrderKey {
                        column: name.to_string(),
                        entity: T::ENTITY_NAME,
                    })
            })
            .collect::<RepoResult<Vec<_>>>()?;
        Ok(Self { keys })
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn compare(&self, left: &T, right: &T) -> Ordering {
        self.keys
            .iter()
            .map(|(column, direction)| {
                direction.apply(column.value(left).compare(&column.value(right)))
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Stable multi-key sort. Key values are read once per item.
    pub fn sort(&self, items: Vec<T>) -> Vec<T> {
        if self.is_empty() {
            return items;
        }

        let mut keyed: Vec<(Vec<ColumnValue>, T)> = items
            .into_iter()
            .map(|item| {
                let values = self
                    .keys
                    .iter()
                    .map(|(column, _)| column.value(&item))
                    .collect();
                (values, item)
            })
            .collect();

        keyed.sort_by(|(left, _), (right, _)| self.compare_values(left, right));
        keyed.into_iter().map(|(_, item)| item).collect()
    }

    fn compare_values(&self, left: &[ColumnValue], right: &[ColumnValue]) -> Ordering {
        self.keys
            .iter()
            .zip(left.iter().zip(right))
            .map(|((_, direction), (left, right))| direction.apply(left.compare(right)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}
