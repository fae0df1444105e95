//! Generic repository layer.
//!
//! # Responsibility
//! - Provide one data-access facade for every entity type.
//! - Compose filter, order and pagination into a lazy read pipeline.
//! - Map store failures onto the caller-facing error taxonomy.
//!
//! # Invariants
//! - Write paths commit through the session; nothing is written implicitly
//!   except edits on tracked handles, which `save` picks up.
//! - Repository APIs return semantic errors (`NullArgument`,
//!   `ConcurrencyConflict`, `InvalidOrderKey`) in addition to store errors.

pub mod entity_ref;
pub mod error;
pub mod query;
pub mod repository;
pub mod timestamped;
