//! Admin API handlers.
//!
//! Each handler reads/writes via `StateStore` or the route registry and
//! returns the `{success, data, error}` envelope.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{info, warn};

use brokergate_gateway::RouteError;
use brokergate_state::{Broker, EndpointConfig, Record, RecordId, RecordKind, StateError};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

fn state_error(e: &StateError) -> Response {
    let status = match e {
        StateError::NotFound(_) => StatusCode::NOT_FOUND,
        StateError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(&e.to_string(), status)
}

fn route_error(e: &RouteError) -> Response {
    let status = match e {
        RouteError::InvalidConfiguration(_) => StatusCode::BAD_REQUEST,
        RouteError::NotFound(_) => StatusCode::NOT_FOUND,
        RouteError::DuplicateRoute(_) => StatusCode::CONFLICT,
        RouteError::Store(inner) => return state_error(inner),
    };
    error_response(&e.to_string(), status)
}

fn not_found(what: String) -> Response {
    error_response(&format!("{what} not found"), StatusCode::NOT_FOUND)
}

// ── Brokers ────────────────────────────────────────────────────

/// POST /admin/v1/brokers
pub async fn create_broker(
    State(state): State<ApiState>,
    Json(broker): Json<Broker>,
) -> Response {
    match state.manager.store().put_broker(broker) {
        Ok(saved) => (StatusCode::CREATED, ApiResponse::ok(saved)).into_response(),
        Err(e) => state_error(&e),
    }
}

/// GET /admin/v1/brokers/{id}
pub async fn get_broker(State(state): State<ApiState>, Path(id): Path<RecordId>) -> Response {
    match state.manager.store().get_broker(id) {
        Ok(Some(broker)) => ApiResponse::ok(broker).into_response(),
        Ok(None) => not_found(format!("broker {id}")),
        Err(e) => state_error(&e),
    }
}

// ── Endpoint configuration trees ───────────────────────────────

/// POST /admin/v1/endpoint-configs
pub async fn create_endpoint_config(
    State(state): State<ApiState>,
    Json(config): Json<EndpointConfig>,
) -> Response {
    let store = state.manager.store();
    match store.get_broker(config.broker_endpoint.broker_id) {
        Ok(Some(_)) => {}
        Ok(None) => return not_found(format!("broker {}", config.broker_endpoint.broker_id)),
        Err(e) => return state_error(&e),
    }
    match store.save_endpoint_config(config) {
        Ok(saved) => (StatusCode::CREATED, ApiResponse::ok(saved)).into_response(),
        Err(e) => state_error(&e),
    }
}

/// GET /admin/v1/broker-endpoints
pub async fn list_broker_endpoints(State(state): State<ApiState>) -> Response {
    match state.manager.store().list_broker_endpoints() {
        Ok(endpoints) => ApiResponse::ok(endpoints).into_response(),
        Err(e) => state_error(&e),
    }
}

/// GET /admin/v1/broker-endpoints/{id}
pub async fn get_endpoint_config(
    State(state): State<ApiState>,
    Path(id): Path<RecordId>,
) -> Response {
    match state.manager.store().load_endpoint_config(id) {
        Ok(Some(config)) => ApiResponse::ok(config).into_response(),
        Ok(None) => not_found(format!("broker endpoint {id}")),
        Err(e) => state_error(&e),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterParams {
    #[serde(default)]
    pub replace: bool,
}

/// POST /admin/v1/broker-endpoints/{id}/register
pub async fn register_route(
    State(state): State<ApiState>,
    Path(id): Path<RecordId>,
    Query(params): Query<RegisterParams>,
) -> Response {
    let result = if params.replace {
        state.manager.reregister_route(id)
    } else {
        state.manager.register_route(id)
    };
    match result {
        Ok(handle) => (StatusCode::CREATED, ApiResponse::ok(handle)).into_response(),
        Err(e) => {
            warn!(broker_endpoint = id, error = %e, "route registration rejected");
            route_error(&e)
        }
    }
}

// ── Raw records ────────────────────────────────────────────────

/// POST /admin/v1/records
pub async fn save_record(State(state): State<ApiState>, Json(record): Json<Record>) -> Response {
    match state.manager.store().save(record) {
        Ok(saved) => (StatusCode::CREATED, ApiResponse::ok(saved)).into_response(),
        Err(e) => state_error(&e),
    }
}

/// GET /admin/v1/records/{kind}/{id}
pub async fn get_record(
    State(state): State<ApiState>,
    Path((kind, id)): Path<(RecordKind, RecordId)>,
) -> Response {
    match state.manager.store().get(kind, id) {
        Ok(Some(record)) => ApiResponse::ok(record).into_response(),
        Ok(None) => not_found(format!("{kind} record {id}")),
        Err(e) => state_error(&e),
    }
}

// ── Active routes ──────────────────────────────────────────────

/// GET /admin/v1/routes
pub async fn list_routes(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(state.manager.registry().list()).into_response()
}

/// GET /admin/v1/routes/{id}
pub async fn get_route(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.manager.registry().get(&id) {
        Some(handle) => ApiResponse::ok(handle).into_response(),
        None => not_found(format!("route '{id}'")),
    }
}

/// DELETE /admin/v1/routes/{id}
pub async fn remove_route(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.manager.registry().remove_route(&id) {
        Some(handle) => {
            info!(route = %id, "route deactivated via admin API");
            ApiResponse::ok(handle).into_response()
        }
        None => not_found(format!("route '{id}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn route_errors_map_to_statuses() {
        let cases = [
            (RouteError::InvalidConfiguration("x".into()), StatusCode::BAD_REQUEST),
            (RouteError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (RouteError::DuplicateRoute("x".into()), StatusCode::CONFLICT),
            (
                RouteError::Store(StateError::Write("disk".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                RouteError::Store(StateError::Conflict("name".into())),
                StatusCode::CONFLICT,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(route_error(&err).status(), expected, "{err}");
        }
    }

    #[tokio::test]
    async fn error_envelope_shape() {
        let body = body_json(error_response("boom", StatusCode::BAD_REQUEST)).await;
        assert_eq!(body, serde_json::json!({"success": false, "error": "boom"}));
    }
}
