//! Creation/modification timestamps for audited entities.

use crate::model::entity::ColumnValue;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Creation and last-modification instants in epoch milliseconds.
///
/// `modified_at` stays `None` until the first update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeStamps {
    created_at: i64,
    modified_at: Option<i64>,
}

impl TimeStamps {
    /// Stamps creation with the current time.
    pub fn now() -> Self {
        Self::created_at(now_epoch_ms())
    }

    pub fn created_at(created_at: i64) -> Self {
        Self {
            created_at,
            modified_at: None,
        }
    }

    pub fn created(&self) -> i64 {
        self.created_at
    }

    pub fn modified(&self) -> Option<i64> {
        self.modified_at
    }

    /// Records a modification at the current time.
    ///
    /// Never moves `modified_at` backwards or before `created_at`.
    pub fn mark_modified(&mut self) {
        let floor = self.modified_at.unwrap_or(self.created_at);
        self.modified_at = Some(now_epoch_ms().max(floor));
    }

    pub fn created_column(&self) -> ColumnValue {
        ColumnValue::Timestamp(self.created_at)
    }

    pub fn modified_column(&self) -> ColumnValue {
        self.modified_at.map_or(ColumnValue::Null, ColumnValue::Timestamp)
    }
}

impl Default for TimeStamps {
    fn default() -> Self {
        Self::now()
    }
}

/// Entity carrying `TimeStamps`; used by `TimeStampedRepository`.
pub trait TimeStamped {
    fn timestamps(&self) -> &TimeStamps;
    fn timestamps_mut(&mut self) -> &mut TimeStamps;

    fn mark_modified(&mut self) {
        self.timestamps_mut().mark_modified();
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}
