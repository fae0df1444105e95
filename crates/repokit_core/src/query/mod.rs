//! Read-pipeline building blocks: pagination, ordering and tracking mode.
//!
//! # Invariants
//! - Reads apply filter, then order, then pagination, in that fixed order.
//! - Every value here is constructed per call and never shared as mutable
//!   session state.

pub mod ordering;
pub mod pagination;
pub mod tracking;
