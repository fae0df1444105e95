//! Generic repository over a relational store.
//! One facade gives every entity type CRUD plus a filter/order/paginate read
//! pipeline with per-call change tracking.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod session;
pub mod transaction;

pub use config::{LoggingConfig, StoreConfig, TransactionSettings};
pub use db::{StoreError, StoreResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::entity::{Column, ColumnValue, Entity, EntityKey, RowMeta};
pub use model::timestamps::{TimeStamped, TimeStamps};
pub use query::ordering::{OrderBy, OrderSpec, SortDirection};
pub use query::pagination::{Pagination, DEFAULT_PAGE_INDEX, DEFAULT_PAGE_SIZE};
pub use query::tracking::TrackingMode;
pub use repo::entity_ref::EntityRef;
pub use repo::error::{RepoError, RepoResult};
pub use repo::query::Query;
pub use repo::repository::{Predicate, Repository};
pub use repo::timestamped::TimeStampedRepository;
pub use session::{CommitSummary, RowChange, Session, SqliteSession, StoredRow, TrackedEntry};
pub use transaction::{run_in_transaction, SqliteTransactionManager, TransactionManager};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
