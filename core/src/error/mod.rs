#[allow(clippy::module_inception)]
pub mod error;
pub mod render;

pub use error::{CliError, DaemonError};
pub use render::RenderError;
