//! SQLite binding of the persistence session.
//!
//! # Responsibility
//! - Persist every entity collection as JSON bodies in `entity_rows`.
//! - Stage mutations and apply them atomically on commit.
//! - Hold the identity map used by tracked reads.
//!
//! # Invariants
//! - Store-native order is ascending `row_id` (insertion order).
//! - Commit runs inside a savepoint, so it nests in an outer transaction.
//! - Update/delete affecting zero rows fails the whole commit.
//! - The session is single-caller: it is neither `Send` nor `Sync`.

use super::{CommitSummary, RowChange, Session, StoredRow, TrackedEntry};
use crate::config::StoreConfig;
use crate::db::migrations::{current_user_version, latest_version};
use crate::db::{open_db, open_db_in_memory, StoreError, StoreResult};
use crate::query::tracking::TrackingMode;
use log::{debug, error, info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::RefCell;
use std::collections::HashSet;
use std::path::Path;
use std::rc::Rc;
use std::time::Instant;
use uuid::Uuid;

const ENTITY_ROWS_TABLE: &str = "entity_rows";
const ENTITY_ROWS_COLUMNS: &[&str] = &[
    "row_id",
    "entity",
    "entity_key",
    "body",
    "created_at",
    "updated_at",
];
const COMMIT_SAVEPOINT: &str = "repokit_commit";

/// Session over one migrated SQLite connection.
pub struct SqliteSession {
    id: Uuid,
    conn: Connection,
    config: StoreConfig,
    staged: RefCell<Vec<RowChange>>,
    tracked: RefCell<Vec<Rc<dyn TrackedEntry>>>,
}

impl SqliteSession {
    /// Wraps a connection that already carries the latest schema.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations have not been applied.
    /// - `UnsupportedSchemaVersion` when the schema is newer than this binary.
    /// - `MissingRequiredTable`/`MissingRequiredColumn` for a damaged schema.
    pub fn try_new(conn: Connection, config: StoreConfig) -> StoreResult<Self> {
        ensure_connection_ready(&conn)?;

        let session = Self {
            id: Uuid::new_v4(),
            conn,
            config,
            staged: RefCell::new(Vec::new()),
            tracked: RefCell::new(Vec::new()),
        };
        info!(
            "event=session_open module=session status=ok session_id={} default_tracking={}",
            session.id, session.config.default_tracking
        );
        Ok(session)
    }

    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> StoreResult<Self> {
        Self::try_new(open_db(path, &config)?, config)
    }

    /// Opens a fresh private in-memory database.
    pub fn open_in_memory(config: StoreConfig) -> StoreResult<Self> {
        Self::try_new(open_db_in_memory(&config)?, config)
    }

    /// Underlying connection, for transaction control and diagnostics.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of live entries in the identity map.
    pub fn tracked_count(&self) -> usize {
        self.tracked
            .borrow()
            .iter()
            .filter(|entry| entry.is_alive())
            .count()
    }

    fn live_tracked(&self) -> Vec<Rc<dyn TrackedEntry>> {
        let mut tracked = self.tracked.borrow_mut();
        tracked.retain(|entry| entry.is_alive());
        tracked.clone()
    }

    fn apply_in_savepoint(&self, changes: &[RowChange]) -> StoreResult<CommitSummary> {
        self.conn
            .execute_batch(&format!("SAVEPOINT {COMMIT_SAVEPOINT};"))?;

        let mut summary = CommitSummary::default();
        let applied = changes.iter().try_for_each(|change| {
            apply_change(&self.conn, change)?;
            summary.record(change);
            Ok::<(), StoreError>(())
        });
        let released = applied.and_then(|()| {
            self.conn
                .execute_batch(&format!("RELEASE {COMMIT_SAVEPOINT};"))
                .map_err(StoreError::from)
        });

        if let Err(err) = released {
            if let Err(rollback_err) = self.conn.execute_batch(&format!(
                "ROLLBACK TO {COMMIT_SAVEPOINT}; RELEASE {COMMIT_SAVEPOINT};"
            )) {
                warn!(
                    "event=session_commit module=session status=rollback_failed session_id={} error={rollback_err}",
                    self.id
                );
            }
            return Err(err);
        }

        Ok(summary)
    }

    /// Stops tracking an identity whose row is gone from the store.
    fn detach(&self, entity: &str, key: &str) {
        let mut tracked = self.tracked.borrow_mut();
        let before = tracked.len();
        tracked.retain(|entry| !(entry.entity() == entity && entry.key() == key));
        if tracked.len() != before {
            warn!(
                "event=session_detach module=session status=ok session_id={} entity={entity} key={key}",
                self.id
            );
        }
    }

    fn finish_tracking(&self, deleted: &HashSet<(&'static str, String)>) {
        let mut tracked = self.tracked.borrow_mut();
        tracked.retain(|entry| !deleted.contains(&(entry.entity(), entry.key().to_string())));
        for entry in tracked.iter() {
            entry.accept_changes();
        }
    }
}

impl Session for SqliteSession {
    fn session_id(&self) -> Uuid {
        self.id
    }

    fn default_tracking(&self) -> TrackingMode {
        self.config.default_tracking
    }

    fn load_rows(&self, entity: &'static str) -> StoreResult<Vec<StoredRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT row_id, entity_key, body
             FROM entity_rows
             WHERE entity = ?1
             ORDER BY row_id ASC;",
        )?;
        let rows = stmt
            .query_map([entity], |row| {
                Ok(StoredRow {
                    row_id: row.get("row_id")?,
                    key: row.get("entity_key")?,
                    body: row.get("body")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!(
            "event=session_load module=session status=ok session_id={} entity={entity} rows={}",
            self.id,
            rows.len()
        );
        Ok(rows)
    }

    fn find_row(&self, entity: &'static str, key: &str) -> StoreResult<Option<StoredRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT row_id, entity_key, body
                 FROM entity_rows
                 WHERE entity = ?1 AND entity_key = ?2;",
                params![entity, key],
                |row| {
                    Ok(StoredRow {
                        row_id: row.get("row_id")?,
                        key: row.get("entity_key")?,
                        body: row.get("body")?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    fn stage(&self, change: RowChange) {
        debug!(
            "event=session_stage module=session status=ok session_id={} change={} entity={} key={}",
            self.id,
            change.kind(),
            change.entity(),
            change.key()
        );
        self.staged.borrow_mut().push(change);
    }

    fn staged_count(&self) -> usize {
        self.staged.borrow().len()
    }

    fn track(&self, entry: Rc<dyn TrackedEntry>) {
        self.tracked.borrow_mut().push(entry);
    }

    fn tracked_entry(&self, entity: &'static str, key: &str) -> Option<Rc<dyn TrackedEntry>> {
        self.tracked
            .borrow()
            .iter()
            .find(|entry| entry.is_alive() && entry.entity() == entity && entry.key() == key)
            .cloned()
    }

    fn commit(&self) -> StoreResult<CommitSummary> {
        let started_at = Instant::now();
        let staged = self.staged.take();
        let tracked = self.live_tracked();

        let deleted: HashSet<(&'static str, String)> = staged
            .iter()
            .filter(|change| matches!(change, RowChange::Delete { .. }))
            .map(|change| (change.entity(), change.key().to_string()))
            .collect();

        let mut changes = staged;
        for entry in &tracked {
            if deleted.contains(&(entry.entity(), entry.key().to_string())) {
                continue;
            }
            match entry.detect_change() {
                Ok(Some(change)) => changes.push(change),
                Ok(None) => {}
                Err(err) => {
                    error!(
                        "event=session_commit module=session status=error session_id={} error_code=detect_changes_failed error={err}",
                        self.id
                    );
                    return Err(err);
                }
            }
        }

        if changes.is_empty() {
            debug!(
                "event=session_commit module=session status=noop session_id={}",
                self.id
            );
            return Ok(CommitSummary::default());
        }

        match self.apply_in_savepoint(&changes) {
            Ok(summary) => {
                self.finish_tracking(&deleted);
                info!(
                    "event=session_commit module=session status=ok session_id={} inserted={} updated={} deleted={} duration_ms={}",
                    self.id,
                    summary.inserted,
                    summary.updated,
                    summary.deleted,
                    started_at.elapsed().as_millis()
                );
                Ok(summary)
            }
            Err(err) => {
                if let StoreError::RowNotFound { entity, key } = &err {
                    self.detach(entity, key);
                }
                error!(
                    "event=session_commit module=session status=error session_id={} changes={} duration_ms={} error={err}",
                    self.id,
                    changes.len(),
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }

    fn discard_changes(&self) {
        let discarded = self.staged.take().len();
        if discarded > 0 {
            info!(
                "event=session_discard module=session status=ok session_id={} discarded={discarded}",
                self.id
            );
        }
    }

    fn checkpoint_tracking(&self) {
        for entry in self.live_tracked() {
            entry.checkpoint();
        }
    }

    fn restore_tracking(&self) {
        let mut tracked = self.tracked.borrow_mut();
        let before = tracked.len();
        tracked.retain(|entry| entry.is_alive() && entry.restore_checkpoint());
        debug!(
            "event=session_restore_tracking module=session status=ok session_id={} kept={} detached={}",
            self.id,
            tracked.len(),
            before - tracked.len()
        );
    }

    fn release_tracking(&self) {
        for entry in self.tracked.borrow().iter() {
            entry.release_checkpoint();
        }
    }
}

fn apply_change(conn: &Connection, change: &RowChange) -> StoreResult<()> {
    let changed = match change {
        RowChange::Insert { entity, key, body } => conn.execute(
            "INSERT INTO entity_rows (entity, entity_key, body) VALUES (?1, ?2, ?3);",
            params![entity, key, body],
        )?,
        RowChange::Update { entity, key, body } => conn.execute(
            "UPDATE entity_rows
             SET
                body = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE entity = ?1 AND entity_key = ?2;",
            params![entity, key, body],
        )?,
        RowChange::Delete { entity, key } => conn.execute(
            "DELETE FROM entity_rows WHERE entity = ?1 AND entity_key = ?2;",
            params![entity, key],
        )?,
    };

    if changed == 0 {
        return Err(StoreError::RowNotFound {
            entity: change.entity(),
            key: change.key().to_string(),
        });
    }
    Ok(())
}

fn ensure_connection_ready(conn: &Connection) -> StoreResult<()> {
    let actual_version = current_user_version(conn)?;
    let expected_version = latest_version();
    if actual_version > expected_version {
        return Err(StoreError::UnsupportedSchemaVersion {
            db_version: actual_version,
            latest_supported: expected_version,
        });
    }
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let table_exists: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1
        );",
        [ENTITY_ROWS_TABLE],
        |row| row.get(0),
    )?;
    if !table_exists {
        return Err(StoreError::MissingRequiredTable(ENTITY_ROWS_TABLE));
    }

    let mut stmt = conn.prepare(&format!("PRAGMA table_info({ENTITY_ROWS_TABLE});"))?;
    let present = stmt
        .query_map([], |row| row.get::<_, String>("name"))?
        .collect::<rusqlite::Result<HashSet<_>>>()?;
    if let Some(column) = ENTITY_ROWS_COLUMNS
        .iter()
        .copied()
        .find(|column| !present.contains(*column))
    {
        return Err(StoreError::MissingRequiredColumn {
            table: ENTITY_ROWS_TABLE,
            column,
        });
    }

    Ok(())
}
