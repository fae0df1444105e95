//! Repository variant that stamps modification time on update.

use crate::model::entity::Entity;
use crate::model::timestamps::TimeStamped;
use crate::repo::error::RepoResult;
use crate::repo::repository::Repository;
use crate::session::Session;
use std::ops::Deref;

/// `Repository<T>` that calls `TimeStamped::mark_modified` before updates.
///
/// Reads and other writes behave exactly like the wrapped repository.
pub struct TimeStampedRepository<'s, T: Entity + TimeStamped> {
    inner: Repository<'s, T>,
}

impl<'s, T: Entity + TimeStamped> TimeStampedRepository<'s, T> {
    pub fn new(session: &'s dyn Session) -> Self {
        Self {
            inner: Repository::new(session),
        }
    }

    pub fn update(&self, entity: Option<T>) -> RepoResult<T> {
        let entity = entity.map(|mut entity| {
            entity.mark_modified();
            entity
        });
        self.inner.update(entity)
    }
}

impl<'s, T: Entity + TimeStamped> Deref for TimeStampedRepository<'s, T> {
    type Target = Repository<'s, T>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
