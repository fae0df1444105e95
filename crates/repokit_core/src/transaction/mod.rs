//! Explicit transaction boundaries around repository calls.
//!
//! # Responsibility
//! - Group several repository writes into one all-or-nothing unit.
//!
//! # Invariants
//! - `begin` never nests: it is a no-op while a transaction is active.
//! - `commit`/`rollback` are no-ops when no transaction is active.
//! - Repository commits inside a transaction only release their savepoint;
//!   durability is decided by the outer `commit`.
//! - After `rollback`, tracked entities compare against the state they had
//!   at `begin`, so edits saved inside the transaction are written again by
//!   the next save.

use crate::config::TransactionSettings;
use crate::db::StoreResult;
use crate::repo::error::RepoResult;
use crate::session::{Session, SqliteSession};
use log::{debug, info, warn};

/// Begin/commit/rollback collaborator wrapped around repository calls.
pub trait TransactionManager {
    fn begin(&self) -> StoreResult<()>;
    fn commit(&self) -> StoreResult<()>;
    fn rollback(&self) -> StoreResult<()>;
}

/// Transaction manager bound to one `SqliteSession`.
pub struct SqliteTransactionManager<'s> {
    session: &'s SqliteSession,
    settings: TransactionSettings,
}

impl<'s> SqliteTransactionManager<'s> {
    pub fn new(session: &'s SqliteSession, settings: TransactionSettings) -> Self {
        Self { session, settings }
    }

    /// Whether an explicit transaction is currently open.
    pub fn is_active(&self) -> bool {
        !self.session.connection().is_autocommit()
    }

    fn skipped(&self, operation: &str) -> bool {
        if self.settings.use_in_memory_database {
            debug!(
                "event=tx_{operation} module=transaction status=skipped session_id={} reason=in_memory",
                self.session.session_id()
            );
        }
        self.settings.use_in_memory_database
    }
}

impl TransactionManager for SqliteTransactionManager<'_> {
    fn begin(&self) -> StoreResult<()> {
        if self.skipped("begin") || self.is_active() {
            return Ok(());
        }
        self.session
            .connection()
            .execute_batch("BEGIN IMMEDIATE;")?;
        self.session.checkpoint_tracking();
        info!(
            "event=tx_begin module=transaction status=ok session_id={}",
            self.session.session_id()
        );
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        if self.skipped("commit") || !self.is_active() {
            return Ok(());
        }
        self.session.connection().execute_batch("COMMIT;")?;
        self.session.release_tracking();
        info!(
            "event=tx_commit module=transaction status=ok session_id={}",
            self.session.session_id()
        );
        Ok(())
    }

    fn rollback(&self) -> StoreResult<()> {
        if self.skipped("rollback") || !self.is_active() {
            return Ok(());
        }
        self.session.connection().execute_batch("ROLLBACK;")?;
        self.session.discard_changes();
        self.session.restore_tracking();
        warn!(
            "event=tx_rollback module=transaction status=ok session_id={}",
            self.session.session_id()
        );
        Ok(())
    }
}

/// Runs `work` inside a transaction: commit on `Ok`, rollback on `Err`.
///
/// The error from `work` is returned even when the rollback itself fails;
/// the rollback failure is logged.
pub fn run_in_transaction<M, R>(
    manager: &M,
    work: impl FnOnce() -> RepoResult<R>,
) -> RepoResult<R>
where
    M: TransactionManager + ?Sized,
{
    manager.begin()?;
    match work() {
        Ok(value) => {
            manager.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = manager.rollback() {
                warn!(
                    "event=tx_rollback module=transaction status=error error={rollback_err} cause={err}"
                );
            }
            Err(err)
        }
    }
}
