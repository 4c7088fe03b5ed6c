//! Gateway error types.
//!
//! `RouteError` is returned synchronously from registration. `PipelineError`
//! is per-request and is turned into an HTTP response at the ingress.

use axum::http::StatusCode;
use thiserror::Error;

use brokergate_state::StateError;
use brokergate_transform::TransformError;

/// Registration failures. A failed registration leaves the route table
/// unchanged.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("route '{0}' is already registered")]
    DuplicateRoute(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(#[from] StateError),
}

/// Failures of a single pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("downstream {url} unavailable: {reason}")]
    DownstreamUnavailable {
        url: String,
        reason: String,
        timed_out: bool,
    },
}

impl PipelineError {
    /// HTTP status returned to the caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::Transform(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::DownstreamUnavailable { timed_out: true, .. } => {
                StatusCode::GATEWAY_TIMEOUT
            }
            PipelineError::DownstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Transform(TransformError::MappingExecution(_)) => "mapping_execution",
            PipelineError::Transform(TransformError::TemplateRender(_)) => "template_render",
            PipelineError::DownstreamUnavailable { .. } => "downstream_unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_errors_are_server_side() {
        let mapping = PipelineError::from(TransformError::MappingExecution("x".into()));
        let refused = PipelineError::DownstreamUnavailable {
            url: "http://localhost:1/".into(),
            reason: "connection refused".into(),
            timed_out: false,
        };
        let timeout = PipelineError::DownstreamUnavailable {
            url: "http://localhost:1/".into(),
            reason: "timed out".into(),
            timed_out: true,
        };

        assert_eq!(mapping.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(mapping.kind(), "mapping_execution");
        assert_eq!(refused.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert!(timeout.status_code().is_server_error());
    }
}
