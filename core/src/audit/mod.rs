//! Append-only per-task audit trail.
//!
//! One file per task under the audit directory, one line per event:
//! `<rfc3339 timestamp> [<status>] <message> <json payload?>`.

mod logger;

pub use logger::{AuditLogger, AuditStatus, TaskAudit};
