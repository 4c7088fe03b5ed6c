//! Transformation errors.

use thiserror::Error;

pub type TransformResult<T> = Result<T, TransformError>;

/// Failures raised while transforming a single body.
///
/// Both variants are per-request: they fail the current exchange only.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("mapping execution failed: {0}")]
    MappingExecution(String),

    #[error("template render failed: {0}")]
    TemplateRender(String),
}
