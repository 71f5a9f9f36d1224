mod scope;
pub mod serde_utils;
mod types;

pub use scope::scope_key;
pub use types::{
    ImmediateAction, ImmediateActionKind, Task, TaskExecutionResult, TaskOutcome, TaskStatus,
};
