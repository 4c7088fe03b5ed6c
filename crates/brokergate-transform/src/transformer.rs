//! Applies a [`DirectionPlan`] to a body.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{TransformError, TransformResult};
use crate::json_mapping::JsonMappingExecutor;
use crate::mapping::{MappingExecutor, apply_structured_mapping};
use crate::selector::{DirectionPlan, ProcessingMode};
use crate::template;

/// Result of applying a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    /// The body is passed on byte-for-byte.
    Unchanged,
    /// The body is replaced by this text.
    Replaced(String),
}

/// Runs request and response plans. Cheap to clone; the mapping executor
/// is shared.
#[derive(Clone)]
pub struct Transformer {
    executor: Arc<dyn MappingExecutor>,
}

impl Transformer {
    pub fn new(executor: Arc<dyn MappingExecutor>) -> Self {
        Self { executor }
    }

    /// Transform `body` according to `plan`.
    ///
    /// `properties` are the exchange properties visible to templates.
    pub fn apply(
        &self,
        plan: &DirectionPlan,
        body: &[u8],
        properties: &HashMap<String, String>,
    ) -> TransformResult<TransformOutcome> {
        match plan.mode {
            ProcessingMode::PassThrough => Ok(TransformOutcome::Unchanged),
            ProcessingMode::StructuredMapping => {
                let text = std::str::from_utf8(body).map_err(|e| {
                    TransformError::MappingExecution(format!("body is not UTF-8: {e}"))
                })?;
                let out = apply_structured_mapping(self.executor.as_ref(), &plan.blob, text)?;
                debug!(direction = ?plan.direction, "structured mapping applied");
                Ok(TransformOutcome::Replaced(out))
            }
            ProcessingMode::TemplatedText => {
                let text = std::str::from_utf8(body).map_err(|e| {
                    TransformError::TemplateRender(format!("body is not UTF-8: {e}"))
                })?;
                let tpl = std::str::from_utf8(&plan.blob).map_err(|e| {
                    TransformError::TemplateRender(format!("template is not UTF-8: {e}"))
                })?;
                let out = template::render(tpl, text, properties)?;
                debug!(direction = ?plan.direction, "template rendered");
                Ok(TransformOutcome::Replaced(out))
            }
        }
    }
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new(Arc::new(JsonMappingExecutor::new()))
    }
}
