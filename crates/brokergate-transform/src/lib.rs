//! brokergate-transform — request/response body transformations.
//!
//! A route carries one [`DirectionPlan`] per direction, chosen once when
//! the route is built from its [`Transformation`] record:
//!
//! - **`selector`** — picks StructuredMapping, TemplatedText or PassThrough
//!   from the enabled flag and template-type tag
//! - **`mapping`** — the mapping executor contract and the structured-mapping
//!   processor built on it
//! - **`json_mapping`** — built-in JSON-pointer mapping executor
//! - **`template`** — `${...}` template rendering against the exchange
//! - **`transformer`** — applies a plan to a body
//!
//! [`Transformation`]: brokergate_state::Transformation

pub mod error;
pub mod json_mapping;
pub mod mapping;
pub mod selector;
pub mod template;
pub mod transformer;

pub use error::{TransformError, TransformResult};
pub use json_mapping::JsonMappingExecutor;
pub use mapping::{MappingExecutor, MappingHandle, SOURCE_DOCUMENT};
pub use selector::{Direction, DirectionPlan, ProcessingMode, ResponseSelection, select};
pub use transformer::{TransformOutcome, Transformer};
