//! brokergate-gateway — dynamic routes and the per-request pipeline.
//!
//! Turns stored endpoint configuration into live HTTP routes at runtime.
//!
//! # Components
//!
//! - **`route`** — validates an [`EndpointConfig`] and builds an immutable
//!   [`RouteDescriptor`]
//! - **`registry`** — concurrent route table; registration is serialized,
//!   dispatch reads a lock-free snapshot
//! - **`pipeline`** — request transform → forward → response transform
//! - **`forward`** — outbound HTTP client with a bounded timeout
//! - **`ingress`** — axum handler serving `/api/{name}`
//! - **`manager`** — loads configuration from the store and registers it
//!
//! ```text
//! POST /api/{name}
//!   │
//!   ▼
//! RouteRegistry::resolve ──► Pipeline::run
//!                              ├── RequestTransform  (Transformer)
//!                              ├── Forwarding        (Forwarder)
//!                              └── ResponseTransform (Transformer)
//! ```
//!
//! [`EndpointConfig`]: brokergate_state::EndpointConfig

pub mod error;
pub mod forward;
pub mod ingress;
pub mod manager;
pub mod pipeline;
pub mod registry;
pub mod route;

pub use error::{PipelineError, RouteError};
pub use forward::{DownstreamResponse, Forwarder};
pub use ingress::{GatewayState, ingress_router};
pub use manager::{RestoreStats, RouteManager};
pub use pipeline::{InboundRequest, Pipeline, PipelineResponse, Stage};
pub use registry::{Lookup, RouteRegistry};
pub use route::{DownstreamTarget, RouteDescriptor, RouteHandle, config_to_route, route_path};
