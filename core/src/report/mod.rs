mod reporter;

pub use reporter::{idempotency_key, StatusReporter};
