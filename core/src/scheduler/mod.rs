//! Admission control and scope-fair task selection.
//!
//! Both halves are pure: no I/O, no locking. The execution cycle owns the
//! `CapacityScheduler` behind its own mutex.

mod capacity;
mod selector;

pub use capacity::CapacityScheduler;
pub use selector::{select_parallel, sort_by_priority};
