//! Repository error taxonomy.

use crate::db::StoreError;
use crate::model::entity::EntityKey;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Error surfaced by repository operations.
///
/// Callers match on the variant; no variant is retried internally.
#[derive(Debug)]
pub enum RepoError {
    /// A write operation received no entity.
    NullArgument {
        operation: &'static str,
        entity: &'static str,
    },
    /// Update/delete targeted an identity the store no longer holds.
    ConcurrencyConflict {
        entity: &'static str,
        key: EntityKey,
    },
    /// An order column is not registered for the entity type.
    InvalidOrderKey {
        column: String,
        entity: &'static str,
    },
    /// Any other store failure, unchanged.
    Store(StoreError),
    /// A persisted row could not be decoded into its entity type.
    InvalidData(String),
}

impl RepoError {
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NullArgument { operation, entity } => {
                write!(f, "{operation} requires a `{entity}` entity but none was given")
            }
            Self::ConcurrencyConflict { entity, key } => write!(
                f,
                "`{entity}` with key `{key}` was not found in the store; it may have been removed concurrently"
            ),
            Self::InvalidOrderKey { column, entity } => {
                write!(f, "invalid ordering column `{column}` for `{entity}`")
            }
            Self::Store(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted entity data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::RowNotFound { entity, key } => Self::ConcurrencyConflict { entity, key },
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RepoError;
    use crate::db::StoreError;

    #[test]
    fn row_not_found_becomes_concurrency_conflict() {
        let err = RepoError::from(StoreError::RowNotFound {
            entity: "item",
            key: "7".to_string(),
        });
        assert!(err.is_concurrency_conflict());
        assert!(err.to_string().contains("`7`"));
    }

    #[test]
    fn other_store_errors_are_wrapped_unchanged() {
        let err = RepoError::from(StoreError::MissingRequiredTable("entity_rows"));
        assert!(matches!(
            err,
            RepoError::Store(StoreError::MissingRequiredTable("entity_rows"))
        ));
    }
}
