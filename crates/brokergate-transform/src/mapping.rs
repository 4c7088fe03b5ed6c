//! Mapping executor contract and the structured-mapping processor.
//!
//! A mapping executor turns a binary mapping specification plus a JSON
//! source document into one or more JSON target documents. The gateway
//! only relies on this contract; the executor itself is pluggable.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::{TransformError, TransformResult};

/// Logical name the inbound document is bound under.
pub const SOURCE_DOCUMENT: &str = "source";

/// A parsed mapping specification.
///
/// Carries the key of the document the mapping produces, plus an
/// executor-specific compiled form.
#[derive(Clone)]
pub struct MappingHandle {
    target_document: String,
    compiled: Arc<dyn Any + Send + Sync>,
}

impl MappingHandle {
    pub fn new<T: Any + Send + Sync>(target_document: impl Into<String>, compiled: T) -> Self {
        Self {
            target_document: target_document.into(),
            compiled: Arc::new(compiled),
        }
    }

    /// Key of the target document this mapping produces.
    pub fn target_document(&self) -> &str {
        &self.target_document
    }

    /// Borrow the executor-specific compiled form.
    pub fn compiled<T: Any>(&self) -> Option<&T> {
        self.compiled.downcast_ref::<T>()
    }
}

impl fmt::Debug for MappingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingHandle")
            .field("target_document", &self.target_document)
            .finish_non_exhaustive()
    }
}

/// A declarative document-mapping engine.
///
/// Implementations must be safe for concurrent use; one instance is shared
/// by every route.
pub trait MappingExecutor: Send + Sync {
    /// Parse a mapping specification.
    fn load_spec(&self, spec: &[u8]) -> TransformResult<MappingHandle>;

    /// Run a mapping against a source document, returning every produced
    /// document keyed by document key.
    fn execute(
        &self,
        handle: &MappingHandle,
        source_name: &str,
        source_json: &str,
    ) -> TransformResult<HashMap<String, String>>;
}

/// Run a structured mapping over a JSON body and return the target
/// document's JSON text.
pub fn apply_structured_mapping(
    executor: &dyn MappingExecutor,
    spec: &[u8],
    body: &str,
) -> TransformResult<String> {
    let document: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| TransformError::MappingExecution(format!("source is not JSON: {e}")))?;
    let source = document.to_string();

    let handle = executor.load_spec(spec)?;
    let mut outputs = executor.execute(&handle, SOURCE_DOCUMENT, &source)?;

    trace!(
        target_document = handle.target_document(),
        produced = outputs.len(),
        "mapping executed"
    );

    outputs.remove(handle.target_document()).ok_or_else(|| {
        TransformError::MappingExecution(format!(
            "target document '{}' missing from mapping output",
            handle.target_document()
        ))
    })
}
