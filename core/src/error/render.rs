use thiserror::Error;

/// Validation failures raised before any process is spawned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("task is missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("template '{variant}' is missing required placeholder '{token}'")]
    MissingPlaceholder {
        variant: &'static str,
        token: &'static str,
    },
}
