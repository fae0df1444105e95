//! Per-call change-tracking mode.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Whether entities returned by a read participate in change tracking.
///
/// Passed to every read call; never stored as mutable session state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// Returned handles are registered; in-place edits are written by `save`.
    #[default]
    Tracked,
    /// Returned handles are snapshots; edits need an explicit `update`.
    Untracked,
}

impl TrackingMode {
    /// Maps the `as_no_tracking` flag style used by ORM call sites.
    pub fn from_no_tracking(as_no_tracking: bool) -> Self {
        if as_no_tracking {
            Self::Untracked
        } else {
            Self::Tracked
        }
    }

    pub fn is_tracked(self) -> bool {
        self == Self::Tracked
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tracked => "tracked",
            Self::Untracked => "untracked",
        }
    }
}

impl Display for TrackingMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
