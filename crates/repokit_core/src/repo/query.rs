//! Lazily evaluated read pipeline.
//!
//! # Invariants
//! - Nothing touches the store until `fetch`, `first` or `count`.
//! - Evaluation order is filter, order, paginate regardless of builder order.
//! - Tracking applies only to entities that survive the whole pipeline.

use crate::db::StoreError;
use crate::model::entity::Entity;
use crate::query::ordering::{OrderBy, OrderSpec};
use crate::query::pagination::Pagination;
use crate::query::tracking::TrackingMode;
use crate::repo::entity_ref::{EntityRef, TrackedSlot};
use crate::repo::error::{RepoError, RepoResult};
use crate::session::{Session, StoredRow};
use log::debug;

/// Composable, re-runnable query over one entity collection.
pub struct Query<'q, T: Entity> {
    session: &'q dyn Session,
    filters: Vec<Box<dyn Fn(&T) -> bool + 'q>>,
    order: Option<OrderBy<T>>,
    pagination: Option<Pagination>,
    tracking: TrackingMode,
}

impl<'q, T: Entity> Query<'q, T> {
    pub(crate) fn new(session: &'q dyn Session, tracking: TrackingMode) -> Self {
        Self {
            session,
            filters: Vec::new(),
            order: None,
            pagination: None,
            tracking,
        }
    }

    /// Adds a predicate; all predicates must hold.
    pub fn filter(mut self, predicate: impl Fn(&T) -> bool + 'q) -> Self {
        self.filters.push(Box::new(predicate));
        self
    }

    /// Replaces the ordering. Fails with `InvalidOrderKey` without reading.
    pub fn order_by(mut self, spec: &OrderSpec) -> RepoResult<Self> {
        let order = OrderBy::resolve(spec)?;
        self.order = (!order.is_empty()).then_some(order);
        Ok(self)
    }

    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn with_tracking(mut self, tracking: TrackingMode) -> Self {
        self.tracking = tracking;
        self
    }

    pub fn tracking(&self) -> TrackingMode {
        self.tracking
    }

    /// Materializes the query.
    pub fn fetch(&self) -> RepoResult<Vec<EntityRef<T>>> {
        self.evaluate()?
            .into_iter()
            .map(|entity| self.attach(entity))
            .collect()
    }

    /// First entity of the materialized sequence.
    ///
    /// Without ordering or pagination this stops at the first matching row.
    pub fn first(&self) -> RepoResult<Option<EntityRef<T>>> {
        if self.order.is_some() || self.pagination.is_some() {
            return self
                .evaluate()?
                .into_iter()
                .next()
                .map(|entity| self.attach(entity))
                .transpose();
        }

        for row in self.session.load_rows(T::ENTITY_NAME)? {
            let entity = decode_row::<T>(&row)?;
            if self.matches(&entity) {
                return self.attach(entity).map(Some);
            }
        }
        Ok(None)
    }

    /// Number of entities the query yields. Registers nothing for tracking.
    pub fn count(&self) -> RepoResult<usize> {
        Ok(self.evaluate()?.len())
    }

    fn matches(&self, entity: &T) -> bool {
        self.filters.iter().all(|predicate| predicate(entity))
    }

    fn evaluate(&self) -> RepoResult<Vec<T>> {
        let rows = self.session.load_rows(T::ENTITY_NAME)?;
        let scanned = rows.len();

        let mut entities = Vec::new();
        for row in &rows {
            let entity = decode_row::<T>(row)?;
            if self.matches(&entity) {
                entities.push(entity);
            }
        }
        let matched = entities.len();

        if let Some(order) = &self.order {
            entities = order.sort(entities);
        }
        if let Some(pagination) = &self.pagination {
            entities = pagination.apply(entities);
        }

        debug!(
            "event=repo_query module=repo status=ok entity={} scanned={scanned} matched={matched} returned={} tracking={}",
            T::ENTITY_NAME,
            entities.len(),
            self.tracking
        );
        Ok(entities)
    }

    fn attach(&self, entity: T) -> RepoResult<EntityRef<T>> {
        if !self.tracking.is_tracked() {
            return Ok(EntityRef::detached(entity));
        }

        let key = entity.key();
        if let Some(handle) = self
            .session
            .tracked_entry(T::ENTITY_NAME, &key)
            .and_then(|entry| {
                entry
                    .as_any()
                    .downcast_ref::<TrackedSlot<T>>()
                    .and_then(TrackedSlot::handle)
            })
        {
            return Ok(handle);
        }

        let baseline = encode(&entity)?;
        let (slot, handle) = TrackedSlot::attach(entity, baseline);
        self.session.track(slot);
        Ok(handle)
    }
}

pub(crate) fn decode_row<T: Entity>(row: &StoredRow) -> RepoResult<T> {
    let mut entity: T = serde_json::from_str(&row.body).map_err(|err| {
        RepoError::InvalidData(format!(
            "`{}` row `{}` cannot be decoded: {err}",
            T::ENTITY_NAME,
            row.key
        ))
    })?;

    let decoded_key = entity.key();
    if decoded_key != row.key {
        return Err(RepoError::InvalidData(format!(
            "`{}` row `{}` decodes to key `{decoded_key}`",
            T::ENTITY_NAME,
            row.key
        )));
    }

    entity.apply_row_meta(&row.meta());
    Ok(entity)
}

pub(crate) fn encode<T: Entity>(entity: &T) -> RepoResult<String> {
    serde_json::to_string(entity).map_err(|err| StoreError::from(err).into())
}
