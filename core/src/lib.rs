//! Core of the taskpilot automation daemon: capacity scheduling, scope-fair
//! selection, templated subprocess execution and exactly-once status reporting.

pub mod actions;
pub mod api;
pub mod audit;
pub mod config;
pub mod context;
pub mod daemon;
pub mod engine;
pub mod error;
pub mod queue;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod task;
pub mod template;
pub mod util;
pub mod worker;
