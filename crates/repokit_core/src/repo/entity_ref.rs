//! Entity handles returned by reads and their identity-map entries.
//!
//! # Invariants
//! - A tracked handle shares its value with the session identity map; a
//!   detached handle shares it with nobody.
//! - A tracked entry stops participating once every handle is dropped.

use crate::db::{StoreError, StoreResult};
use crate::model::entity::{Entity, EntityKey};
use crate::query::tracking::TrackingMode;
use crate::session::{RowChange, TrackedEntry};
use std::any::Any;
use std::cell::{Cell, Ref, RefCell};
use std::fmt::{Debug, Formatter};
use std::rc::{Rc, Weak};

/// Shared handle to an entity returned by a read.
///
/// Edits made through a `Tracked` handle are written by the next `save`.
/// Edits made through an `Untracked` handle need an explicit `update`.
pub struct EntityRef<T> {
    value: Rc<RefCell<T>>,
    tracking: TrackingMode,
}

impl<T: Entity> EntityRef<T> {
    /// Wraps a value that no session observes.
    pub fn detached(entity: T) -> Self {
        Self {
            value: Rc::new(RefCell::new(entity)),
            tracking: TrackingMode::Untracked,
        }
    }

    fn tracked(value: Rc<RefCell<T>>) -> Self {
        Self {
            value,
            tracking: TrackingMode::Tracked,
        }
    }

    pub fn tracking(&self) -> TrackingMode {
        self.tracking
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.value.borrow()
    }

    /// Edits the entity in place.
    pub fn modify<R>(&self, edit: impl FnOnce(&mut T) -> R) -> R {
        edit(&mut self.value.borrow_mut())
    }

    /// Clones the current value.
    pub fn snapshot(&self) -> T {
        self.value.borrow().clone()
    }

    pub fn key(&self) -> EntityKey {
        self.value.borrow().key()
    }

    /// Whether both handles point at the same in-memory entity.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.value, &other.value)
    }

    /// Unwraps the value, cloning it when other handles still exist.
    pub fn into_inner(self) -> T {
        match Rc::try_unwrap(self.value) {
            Ok(cell) => cell.into_inner(),
            Err(shared) => {
                let value = shared.borrow().clone();
                value
            }
        }
    }
}

impl<T> Clone for EntityRef<T> {
    fn clone(&self) -> Self {
        Self {
            value: Rc::clone(&self.value),
            tracking: self.tracking,
        }
    }
}

impl<T: Debug> Debug for EntityRef<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRef")
            .field("tracking", &self.tracking)
            .field("value", &self.value.borrow())
            .finish()
    }
}

/// Identity-map entry for one tracked entity of type `T`.
pub(crate) struct TrackedSlot<T> {
    key: EntityKey,
    value: Weak<RefCell<T>>,
    baseline: RefCell<String>,
    pending: RefCell<Option<String>>,
    checkpoint: RefCell<Option<String>>,
    force_update: Cell<bool>,
}

impl<T: Entity> TrackedSlot<T> {
    /// Registers `entity` as loaded with serialized state `baseline`.
    pub(crate) fn attach(entity: T, baseline: String) -> (Rc<Self>, EntityRef<T>) {
        let key = entity.key();
        let value = Rc::new(RefCell::new(entity));
        let slot = Rc::new(Self {
            key,
            value: Rc::downgrade(&value),
            baseline: RefCell::new(baseline),
            pending: RefCell::new(None),
            checkpoint: RefCell::new(None),
            force_update: Cell::new(false),
        });
        (slot, EntityRef::tracked(value))
    }

    pub(crate) fn handle(&self) -> Option<EntityRef<T>> {
        self.value.upgrade().map(EntityRef::tracked)
    }

    /// Replaces the tracked value and forces a write on the next commit.
    ///
    /// Returns the replaced value, or `None` when no handle is alive.
    pub(crate) fn overwrite(&self, entity: T) -> Option<T> {
        let value = self.value.upgrade()?;
        let previous = std::mem::replace(&mut *value.borrow_mut(), entity);
        self.force_update.set(true);
        Some(previous)
    }

    /// Undoes `overwrite` after its commit failed.
    pub(crate) fn restore(&self, previous: T) {
        if let Some(value) = self.value.upgrade() {
            *value.borrow_mut() = previous;
        }
        self.force_update.set(false);
        self.pending.borrow_mut().take();
    }
}

impl<T: Entity> TrackedEntry for TrackedSlot<T> {
    fn entity(&self) -> &'static str {
        T::ENTITY_NAME
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn is_alive(&self) -> bool {
        self.value.strong_count() > 0
    }

    fn detect_change(&self) -> StoreResult<Option<RowChange>> {
        let Some(value) = self.value.upgrade() else {
            return Ok(None);
        };
        let current = value.borrow();

        let current_key = current.key();
        if current_key != self.key {
            return Err(StoreError::IdentityChanged {
                entity: T::ENTITY_NAME,
                tracked_key: self.key.clone(),
                current_key,
            });
        }

        let body = serde_json::to_string(&*current)?;
        if !self.force_update.get() && *self.baseline.borrow() == body {
            return Ok(None);
        }

        *self.pending.borrow_mut() = Some(body.clone());
        Ok(Some(RowChange::Update {
            entity: T::ENTITY_NAME,
            key: self.key.clone(),
            body,
        }))
    }

    fn accept_changes(&self) {
        if let Some(body) = self.pending.borrow_mut().take() {
            *self.baseline.borrow_mut() = body;
        }
        self.force_update.set(false);
    }

    fn checkpoint(&self) {
        *self.checkpoint.borrow_mut() = Some(self.baseline.borrow().clone());
    }

    fn restore_checkpoint(&self) -> bool {
        match self.checkpoint.borrow_mut().take() {
            Some(baseline) => {
                *self.baseline.borrow_mut() = baseline;
                self.pending.borrow_mut().take();
                true
            }
            None => false,
        }
    }

    fn release_checkpoint(&self) {
        self.checkpoint.borrow_mut().take();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
