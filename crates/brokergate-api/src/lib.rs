//! brokergate-api — admin REST API and router assembly.
//!
//! Serves the dynamic `/api/{name}` routes next to the operator API that
//! stores configuration and activates routes.
//!
//! # Admin routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/admin/v1/brokers` | Store a broker |
//! | GET | `/admin/v1/brokers/{id}` | Get a broker |
//! | POST | `/admin/v1/endpoint-configs` | Store a broker endpoint tree |
//! | GET | `/admin/v1/broker-endpoints` | List broker endpoints |
//! | GET | `/admin/v1/broker-endpoints/{id}` | Get a broker endpoint tree |
//! | POST | `/admin/v1/broker-endpoints/{id}/register` | Activate its route (`?replace=true` swaps an active one) |
//! | POST | `/admin/v1/records` | Store any record |
//! | GET | `/admin/v1/records/{kind}/{id}` | Get any record |
//! | GET | `/admin/v1/routes` | List active routes |
//! | GET | `/admin/v1/routes/{id}` | Get an active route |
//! | DELETE | `/admin/v1/routes/{id}` | Deactivate a route |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use brokergate_gateway::{GatewayState, Pipeline, RouteManager, ingress_router};

/// Shared state for admin handlers.
#[derive(Clone)]
pub struct ApiState {
    pub manager: RouteManager,
}

/// Build the complete router: admin API plus dynamic routes.
pub fn build_router(manager: RouteManager, pipeline: Arc<Pipeline>) -> Router {
    let gateway_state = GatewayState {
        registry: Arc::clone(manager.registry()),
        pipeline,
    };
    let api_state = ApiState { manager };

    let admin_routes = Router::new()
        .route("/brokers", post(handlers::create_broker))
        .route("/brokers/{id}", get(handlers::get_broker))
        .route("/endpoint-configs", post(handlers::create_endpoint_config))
        .route("/broker-endpoints", get(handlers::list_broker_endpoints))
        .route("/broker-endpoints/{id}", get(handlers::get_endpoint_config))
        .route("/broker-endpoints/{id}/register", post(handlers::register_route))
        .route("/records", post(handlers::save_record))
        .route("/records/{kind}/{id}", get(handlers::get_record))
        .route("/routes", get(handlers::list_routes))
        .route("/routes/{id}", get(handlers::get_route).delete(handlers::remove_route))
        .with_state(api_state);

    Router::new()
        .nest("/admin/v1", admin_routes)
        .merge(ingress_router(gateway_state))
}
