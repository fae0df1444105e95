//! Generic repository facade.
//!
//! # Responsibility
//! - Expose add/update/delete/save and filtered, ordered, paged reads for
//!   any `Entity` over any `Session`.
//!
//! # Invariants
//! - Write operations reject a missing entity before touching the session.
//! - Write operations commit immediately; `save` commits whatever is staged.
//! - Update/delete of an identity the store does not hold fails with
//!   `ConcurrencyConflict` and leaves the store unchanged.
//! - Tracking mode is chosen per call and never stored on the session.

use crate::model::entity::Entity;
use crate::query::ordering::OrderSpec;
use crate::query::pagination::Pagination;
use crate::query::tracking::TrackingMode;
use crate::repo::entity_ref::{EntityRef, TrackedSlot};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::query::{encode, Query};
use crate::session::{RowChange, Session};
use log::{error, info};
use std::marker::PhantomData;
use std::time::Instant;

/// Borrowed predicate accepted by read operations.
pub type Predicate<'a, T> = &'a dyn Fn(&T) -> bool;

/// Data access for entity type `T` through a borrowed session.
pub struct Repository<'s, T: Entity> {
    session: &'s dyn Session,
    _entity: PhantomData<fn() -> T>,
}

impl<'s, T: Entity> Repository<'s, T> {
    pub fn new(session: &'s dyn Session) -> Self {
        Self {
            session,
            _entity: PhantomData,
        }
    }

    pub fn session(&self) -> &'s dyn Session {
        self.session
    }

    /// Inserts `entity` and commits.
    ///
    /// Returns the entity with store-assigned fields applied.
    pub fn add(&self, entity: Option<T>) -> RepoResult<T> {
        let mut entity = require_entity(entity, "add")?;
        let key = entity.key();
        let body = encode(&entity)?;

        self.session.stage(RowChange::Insert {
            entity: T::ENTITY_NAME,
            key: key.clone(),
            body,
        });
        self.commit_logged("add", &key)?;

        if let Some(row) = self.session.find_row(T::ENTITY_NAME, &key)? {
            entity.apply_row_meta(&row.meta());
        }
        Ok(entity)
    }

    /// Writes the full state of `entity` and commits.
    ///
    /// An identity tracked by this session is written through its tracked
    /// handle, which then holds `entity`. Otherwise the entity is re-attached
    /// by key. If the commit fails the tracked handle keeps its prior value.
    pub fn update(&self, entity: Option<T>) -> RepoResult<T> {
        let entity = require_entity(entity, "update")?;
        let key = entity.key();

        let tracked = self.session.tracked_entry(T::ENTITY_NAME, &key);
        let slot = tracked
            .as_deref()
            .and_then(|entry| entry.as_any().downcast_ref::<TrackedSlot<T>>());
        let replaced = slot.and_then(|slot| slot.overwrite(entity.clone()));

        if replaced.is_none() {
            self.session.stage(RowChange::Update {
                entity: T::ENTITY_NAME,
                key: key.clone(),
                body: encode(&entity)?,
            });
        }

        if let Err(err) = self.commit_logged("update", &key) {
            if let (Some(slot), Some(previous)) = (slot, replaced) {
                slot.restore(previous);
            }
            return Err(err);
        }
        Ok(entity)
    }

    /// Removes `entity` by identity and commits.
    pub fn delete(&self, entity: Option<T>) -> RepoResult<T> {
        let entity = require_entity(entity, "delete")?;
        let key = entity.key();

        self.session.stage(RowChange::Delete {
            entity: T::ENTITY_NAME,
            key: key.clone(),
        });
        self.commit_logged("delete", &key)?;
        Ok(entity)
    }

    /// Commits staged changes and edits made through tracked handles.
    pub fn save(&self) -> RepoResult<()> {
        self.session.commit()?;
        Ok(())
    }

    /// First entity matching `predicate` in store-native order.
    pub fn get(
        &self,
        predicate: impl Fn(&T) -> bool,
        tracking: TrackingMode,
    ) -> RepoResult<Option<EntityRef<T>>> {
        Query::new(self.session, tracking)
            .filter(predicate)
            .first()
    }

    /// Builds a lazy query: filter, then order, then paginate.
    ///
    /// `None` means all rows, store-native order and no windowing
    /// respectively. An unknown order column fails here, before any read.
    pub fn get_all<'q>(
        &self,
        predicate: Option<Predicate<'q, T>>,
        tracking: TrackingMode,
        order: Option<&OrderSpec>,
        pagination: Option<Pagination>,
    ) -> RepoResult<Query<'q, T>>
    where
        's: 'q,
    {
        let mut query = Query::new(self.session, tracking);
        if let Some(predicate) = predicate {
            query = query.filter(predicate);
        }
        if let Some(order) = order {
            query = query.order_by(order)?;
        }
        if let Some(pagination) = pagination {
            query = query.paginate(pagination);
        }
        Ok(query)
    }

    /// `get_all` followed by `fetch`.
    pub fn get_all_materialized(
        &self,
        predicate: Option<Predicate<'_, T>>,
        tracking: TrackingMode,
        order: Option<&OrderSpec>,
        pagination: Option<Pagination>,
    ) -> RepoResult<Vec<EntityRef<T>>> {
        self.get_all(predicate, tracking, order, pagination)?
            .fetch()
    }

    /// Empty query using the session's default tracking mode.
    pub fn query(&self) -> Query<'s, T> {
        Query::new(self.session, self.session.default_tracking())
    }

    fn commit_logged(&self, operation: &'static str, key: &str) -> RepoResult<()> {
        let started_at = Instant::now();
        match self.session.commit() {
            Ok(_) => {
                info!(
                    "event=repo_{operation} module=repo status=ok entity={} key={key} duration_ms={}",
                    T::ENTITY_NAME,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                let err = RepoError::from(err);
                error!(
                    "event=repo_{operation} module=repo status=error entity={} key={key} duration_ms={} error={err}",
                    T::ENTITY_NAME,
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }
}

fn require_entity<T: Entity>(entity: Option<T>, operation: &'static str) -> RepoResult<T> {
    entity.ok_or_else(|| {
        error!(
            "event=repo_{operation} module=repo status=error entity={} error_code=null_argument",
            T::ENTITY_NAME
        );
        RepoError::NullArgument {
            operation,
            entity: T::ENTITY_NAME,
        }
    })
}
