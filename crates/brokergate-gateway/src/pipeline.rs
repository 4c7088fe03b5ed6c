//! Per-request processing chain.
//!
//! ```text
//! Received → RequestTransform → Forwarding → ResponseTransform → Completed
//!     └──────────────┴───────────────┴────────────────┴──────→ Failed
//! ```
//!
//! Stages run strictly in order; each request gets its own run and shares
//! nothing mutable with other requests. Dropping the future returned by
//! [`Pipeline::run`] aborts any in-flight downstream call.

use std::collections::HashMap;

use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, warn};

use brokergate_transform::{DirectionPlan, TransformOutcome, Transformer};

use crate::error::PipelineError;
use crate::forward::Forwarder;
use crate::route::RouteDescriptor;

/// Body substituted for an empty downstream reply.
pub const EMPTY_BODY_FALLBACK: &str = "{}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    RequestTransform,
    Forwarding,
    ResponseTransform,
    Completed,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed)
    }
}

/// What the ingress hands to a pipeline run.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// What a run hands back to the caller.
#[derive(Debug, Clone)]
pub struct PipelineResponse {
    /// The downstream's status code.
    pub status: StatusCode,
    pub body: Bytes,
    /// The downstream's `Content-Encoding`, set only when `body` holds the
    /// downstream bytes verbatim.
    pub content_encoding: Option<HeaderValue>,
    /// Final stage: `Completed`, or `Failed` when the response transform
    /// failed and `body` is the raw downstream body.
    pub stage: Stage,
}

impl PipelineResponse {
    pub fn is_degraded(&self) -> bool {
        self.stage == Stage::Failed
    }
}

/// Shared by every route; holds no per-request state.
#[derive(Clone)]
pub struct Pipeline {
    transformer: Transformer,
    forwarder: Forwarder,
}

impl Pipeline {
    pub fn new(transformer: Transformer, forwarder: Forwarder) -> Self {
        Self {
            transformer,
            forwarder,
        }
    }

    pub fn forwarder(&self) -> &Forwarder {
        &self.forwarder
    }

    /// Run one request through `route`.
    ///
    /// Request-transform and transport failures are returned as errors and
    /// nothing is sent downstream after them. A response-transform failure
    /// is not an error: the raw downstream body comes back with
    /// `stage == Failed`.
    pub async fn run(
        &self,
        route: &RouteDescriptor,
        request: InboundRequest,
    ) -> Result<PipelineResponse, PipelineError> {
        let mut run = Run::start(&route.id);
        let mut properties = exchange_properties(route, &request);

        run.advance(Stage::RequestTransform);
        let (outbound, rewritten) = match self.transform(&route.request, request.body, &properties)
        {
            Ok(result) => result,
            Err(e) => return Err(run.fail(e.into())),
        };
        let mut headers = request.headers;
        if rewritten {
            // The new body is plain text whatever the caller sent.
            headers.remove(header::CONTENT_ENCODING);
        }

        run.advance(Stage::Forwarding);
        let downstream = match self
            .forwarder
            .forward(&route.downstream, &headers, outbound)
            .await
        {
            Ok(response) => response,
            Err(e) => return Err(run.fail(e)),
        };
        properties.insert(
            "response.status".to_string(),
            downstream.status.as_u16().to_string(),
        );

        run.advance(Stage::ResponseTransform);
        let (body, encoding) = if downstream.body.is_empty() {
            (Bytes::from_static(EMPTY_BODY_FALLBACK.as_bytes()), None)
        } else {
            let encoding = downstream.headers.get(header::CONTENT_ENCODING).cloned();
            (downstream.body, encoding)
        };
        match self.transform(&route.response, body.clone(), &properties) {
            Ok((body, rewritten)) => {
                run.advance(Stage::Completed);
                Ok(PipelineResponse {
                    status: downstream.status,
                    body,
                    content_encoding: if rewritten { None } else { encoding },
                    stage: Stage::Completed,
                })
            }
            Err(e) => {
                run.fail(e.into());
                Ok(PipelineResponse {
                    status: downstream.status,
                    body,
                    content_encoding: encoding,
                    stage: Stage::Failed,
                })
            }
        }
    }

    fn transform(
        &self,
        plan: &DirectionPlan,
        body: Bytes,
        properties: &HashMap<String, String>,
    ) -> Result<(Bytes, bool), brokergate_transform::TransformError> {
        match self.transformer.apply(plan, &body, properties)? {
            TransformOutcome::Unchanged => Ok((body, false)),
            TransformOutcome::Replaced(text) => Ok((Bytes::from(text), true)),
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Transformer::default(), Forwarder::default())
    }
}

/// Properties visible to templates for one exchange.
fn exchange_properties(route: &RouteDescriptor, request: &InboundRequest) -> HashMap<String, String> {
    let mut props = HashMap::from([
        ("route.id".to_string(), route.id.clone()),
        ("route.path".to_string(), route.path.clone()),
        ("request.method".to_string(), request.method.to_string()),
        ("downstream.url".to_string(), route.downstream.url.to_string()),
        (
            "downstream.method".to_string(),
            route.downstream.method.to_string(),
        ),
    ]);
    for (name, value) in &request.headers {
        if let Ok(value) = value.to_str() {
            props
                .entry(format!("header.{}", name.as_str()))
                .or_insert_with(|| value.to_string());
        }
    }
    props
}

/// Stage tracker for one run.
struct Run<'a> {
    route: &'a str,
    stage: Stage,
}

impl<'a> Run<'a> {
    fn start(route: &'a str) -> Self {
        debug!(route, stage = ?Stage::Received, "request received");
        Self {
            route,
            stage: Stage::Received,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(!self.stage.is_terminal());
        debug!(route = self.route, from = ?self.stage, to = ?next, "pipeline stage");
        self.stage = next;
    }

    fn fail(&mut self, error: PipelineError) -> PipelineError {
        warn!(
            route = self.route,
            stage = ?self.stage,
            kind = error.kind(),
            error = %error,
            "pipeline failed"
        );
        self.stage = Stage::Failed;
        error
    }
}
