//! Entity model contracts.
//!
//! # Responsibility
//! - Define what a record type must provide to be stored by a repository.
//! - Provide reusable timestamp bookkeeping for audited entities.
//!
//! # Invariants
//! - Every entity is identified by a stable `EntityKey` within its collection.
//! - Sortable columns are registered up front; nothing is looked up at runtime
//!   by reflection.

pub mod entity;
pub mod timestamps;
