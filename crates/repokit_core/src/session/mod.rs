//! Persistence session capability.
//!
//! # Responsibility
//! - Define the minimal store interface a repository needs: typed row access,
//!   staged mutations, change tracking and commit.
//! - Keep the repository independent from the concrete store binding.
//!
//! # Invariants
//! - Staged changes become visible only through `commit`.
//! - A commit applies all of its changes or none of them.
//! - Tracking mode is not session state; the session only exposes the default.

use crate::db::StoreResult;
use crate::model::entity::{EntityKey, RowMeta};
use crate::query::tracking::TrackingMode;
use std::any::Any;
use std::rc::Rc;
use uuid::Uuid;

pub mod sqlite;

pub use sqlite::SqliteSession;

/// One persisted entity row as read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub row_id: i64,
    pub key: EntityKey,
    /// Serialized entity.
    pub body: String,
}

impl StoredRow {
    pub fn meta(&self) -> RowMeta {
        RowMeta {
            row_id: self.row_id,
        }
    }
}

/// Mutation staged for the next commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowChange {
    Insert {
        entity: &'static str,
        key: EntityKey,
        body: String,
    },
    Update {
        entity: &'static str,
        key: EntityKey,
        body: String,
    },
    Delete {
        entity: &'static str,
        key: EntityKey,
    },
}

impl RowChange {
    pub fn entity(&self) -> &'static str {
        match self {
            Self::Insert { entity, .. } | Self::Update { entity, .. } | Self::Delete { entity, .. } => {
                *entity
            }
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Insert { key, .. } | Self::Update { key, .. } | Self::Delete { key, .. } => key,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Row counts written by one successful commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl CommitSummary {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }

    pub(crate) fn record(&mut self, change: &RowChange) {
        match change {
            RowChange::Insert { .. } => self.inserted += 1,
            RowChange::Update { .. } => self.updated += 1,
            RowChange::Delete { .. } => self.deleted += 1,
        }
    }
}

/// Type-erased entry of the session identity map.
///
/// Implemented by the repository for each entity type it tracks.
pub trait TrackedEntry {
    fn entity(&self) -> &'static str;
    fn key(&self) -> &str;
    /// `false` once every handle to the entity has been dropped.
    fn is_alive(&self) -> bool;
    /// Returns the update needed to persist in-memory edits, if any.
    fn detect_change(&self) -> StoreResult<Option<RowChange>>;
    /// Makes the last detected state the new baseline after a commit.
    fn accept_changes(&self);
    /// Remembers the current baseline so a rollback can return to it.
    fn checkpoint(&self);
    /// Returns to the remembered baseline; `false` if none was taken.
    fn restore_checkpoint(&self) -> bool;
    fn release_checkpoint(&self);
    fn as_any(&self) -> &dyn Any;
}

/// Store collaborator consumed by `Repository<T>`.
pub trait Session {
    /// Correlation id used in log events.
    fn session_id(&self) -> Uuid;

    /// Tracking mode applied when a read does not choose one.
    fn default_tracking(&self) -> TrackingMode;

    /// All rows of one entity collection in store-native order.
    fn load_rows(&self, entity: &'static str) -> StoreResult<Vec<StoredRow>>;

    fn find_row(&self, entity: &'static str, key: &str) -> StoreResult<Option<StoredRow>>;

    fn stage(&self, change: RowChange);

    fn staged_count(&self) -> usize;

    /// Registers an entry in the identity map.
    fn track(&self, entry: Rc<dyn TrackedEntry>);

    /// Returns the live tracked entry for an identity, if any.
    fn tracked_entry(&self, entity: &'static str, key: &str) -> Option<Rc<dyn TrackedEntry>>;

    /// Applies staged changes and detected tracked edits as one unit.
    ///
    /// On failure nothing is applied and the staged changes are discarded.
    fn commit(&self) -> StoreResult<CommitSummary>;

    /// Drops staged changes without applying them.
    fn discard_changes(&self);

    /// Checkpoints every tracked baseline at the start of a transaction.
    fn checkpoint_tracking(&self);

    /// Returns tracked baselines to the last checkpoint after a rollback.
    ///
    /// Entries tracked after the checkpoint are detached, since the rows
    /// they were read from may no longer exist.
    fn restore_tracking(&self);

    /// Forgets checkpoints once a transaction commits.
    fn release_tracking(&self);
}
