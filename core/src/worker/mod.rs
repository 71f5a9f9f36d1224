//! Subprocess worker: render, spawn, classify.

mod classify;
mod worker;

pub use classify::{classify_output, detect_denial, DENIAL_PATTERNS, EMPTY_OUTPUT_PLACEHOLDER};
pub use worker::{SubprocessWorker, WorkerContext, WorkerTemplates};
