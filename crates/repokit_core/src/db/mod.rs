//! SQLite storage bootstrap, schema migrations and store-level errors.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the repository session.
//! - Apply schema migrations in deterministic order.
//! - Define the error type every store binding reports.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Sessions must not read/write entity rows before migrations succeed.

use crate::model::entity::EntityKey;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure raised by the persistence session or its SQLite binding.
#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    /// Entity body could not be serialized for persistence.
    Serialization(serde_json::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Update or delete matched no row for the given identity.
    RowNotFound {
        entity: &'static str,
        key: EntityKey,
    },
    /// A tracked entity had its identity mutated after it was loaded.
    IdentityChanged {
        entity: &'static str,
        tracked_key: EntityKey,
        current_key: EntityKey,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "failed to serialize entity: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}; open it with open_db"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
            Self::RowNotFound { entity, key } => {
                write!(f, "no `{entity}` row with key `{key}` was affected")
            }
            Self::IdentityChanged {
                entity,
                tracked_key,
                current_key,
            } => write!(
                f,
                "tracked `{entity}` changed identity from `{tracked_key}` to `{current_key}`"
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}
