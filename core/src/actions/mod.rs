//! Operator-issued immediate actions (force-stop).

mod handler;

pub use handler::{ActionReport, ImmediateActionHandler};
