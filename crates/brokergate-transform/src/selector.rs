//! Processing-mode selection.
//!
//! The mode for each direction is decided once, at route build time, from
//! that direction's enabled flag and template-type tag. First match wins:
//!
//! 1. enabled and tag is `atlas` (any case) → [`ProcessingMode::StructuredMapping`]
//! 2. enabled and tag is `velocity` (any case) → [`ProcessingMode::TemplatedText`]
//! 3. otherwise → [`ProcessingMode::PassThrough`]

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use brokergate_state::{TEMPLATE_TYPE_ATLAS, TEMPLATE_TYPE_VELOCITY, Transformation};

/// Which body a plan applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Request,
    Response,
}

/// How a body is processed in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    StructuredMapping,
    TemplatedText,
    PassThrough,
}

/// How the response direction reads its settings.
///
/// `Corrected` uses the response flag and response blob. `Legacy` mirrors
/// older deployments where the response direction was gated on the
/// request flag and executed the request blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSelection {
    #[default]
    Corrected,
    Legacy,
}

/// Select the processing mode for one direction.
pub fn select(
    direction: Direction,
    transformation: &Transformation,
    selection: ResponseSelection,
) -> ProcessingMode {
    let (enabled, tag) = match (direction, selection) {
        (Direction::Request, _) => (
            transformation.request_enabled,
            transformation.request_template_type.as_deref(),
        ),
        (Direction::Response, ResponseSelection::Corrected) => (
            transformation.response_enabled,
            transformation.response_template_type.as_deref(),
        ),
        (Direction::Response, ResponseSelection::Legacy) => (
            transformation.request_enabled,
            transformation.response_template_type.as_deref(),
        ),
    };

    match tag {
        Some(tag) if enabled && tag.eq_ignore_ascii_case(TEMPLATE_TYPE_ATLAS) => {
            ProcessingMode::StructuredMapping
        }
        Some(tag) if enabled && tag.eq_ignore_ascii_case(TEMPLATE_TYPE_VELOCITY) => {
            ProcessingMode::TemplatedText
        }
        _ => ProcessingMode::PassThrough,
    }
}

/// A selected mode together with the blob it runs (mapping spec or
/// template body). Immutable once built; shared by every request on the
/// route.
#[derive(Debug, Clone)]
pub struct DirectionPlan {
    pub direction: Direction,
    pub mode: ProcessingMode,
    pub blob: Arc<[u8]>,
}

impl DirectionPlan {
    /// Build the plan for one direction of a transformation record.
    pub fn build(
        direction: Direction,
        transformation: &Transformation,
        selection: ResponseSelection,
    ) -> Self {
        let mode = select(direction, transformation, selection);
        let blob: Arc<[u8]> = match (mode, direction, selection) {
            (ProcessingMode::PassThrough, _, _) => Arc::from(Vec::new()),
            (_, Direction::Request, _) | (_, Direction::Response, ResponseSelection::Legacy) => {
                Arc::from(transformation.request_transformation.as_slice())
            }
            (_, Direction::Response, ResponseSelection::Corrected) => {
                Arc::from(transformation.response_transformation.as_slice())
            }
        };
        Self {
            direction,
            mode,
            blob,
        }
    }

    pub fn pass_through(direction: Direction) -> Self {
        Self {
            direction,
            mode: ProcessingMode::PassThrough,
            blob: Arc::from(Vec::new()),
        }
    }

    pub fn is_pass_through(&self) -> bool {
        self.mode == ProcessingMode::PassThrough
    }
}
