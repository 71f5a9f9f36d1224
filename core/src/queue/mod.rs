//! Contracts for the external task queue and settings collaborators.

mod traits;
mod types;

pub use traits::{SettingsProvider, TaskQueue};
pub use types::{SettingsPatch, StatusReport};
