//! Inbound HTTP adapter: `/api/{name}` dispatch into the route table.

use std::sync::Arc;

use axum::Router;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use serde_json::json;

use crate::pipeline::{InboundRequest, Pipeline};
use crate::registry::{Lookup, RouteRegistry};
use crate::route::route_path;

/// State shared by ingress handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<RouteRegistry>,
    pub pipeline: Arc<Pipeline>,
}

/// Router serving every dynamic route. The route table is consulted per
/// request, so routes added later are served without touching the router.
pub fn ingress_router(state: GatewayState) -> Router {
    Router::new()
        .route("/api/{name}", any(dispatch))
        .with_state(state)
}

fn error_body(status: StatusCode, kind: &str, message: String) -> Response {
    (status, Json(json!({ "error": message, "kind": kind }))).into_response()
}

/// ANY /api/{name}
async fn dispatch(
    State(state): State<GatewayState>,
    Path(name): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = route_path(&name);
    let route = match state.registry.resolve(&method, &path) {
        Lookup::Found(route) => route,
        Lookup::MethodNotAllowed(allowed) => {
            let mut response = error_body(
                StatusCode::METHOD_NOT_ALLOWED,
                "method_not_allowed",
                format!("{path} only accepts {allowed}"),
            );
            if let Ok(value) = HeaderValue::from_str(allowed.as_str()) {
                response.headers_mut().insert(header::ALLOW, value);
            }
            return response;
        }
        Lookup::NotFound => {
            return error_body(
                StatusCode::NOT_FOUND,
                "route_not_found",
                format!("no route for {path}"),
            );
        }
    };

    let request = InboundRequest {
        method,
        headers,
        body,
    };
    match state.pipeline.run(&route, request).await {
        Ok(result) => {
            let mut response = (
                result.status,
                [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                result.body,
            )
                .into_response();
            if let Some(encoding) = result.content_encoding {
                response.headers_mut().insert(header::CONTENT_ENCODING, encoding);
            }
            response
        }
        Err(e) => error_body(e.status_code(), e.kind(), e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use brokergate_state::{BrokerEndpoint, Endpoint, EndpointConfig};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn state() -> GatewayState {
        GatewayState {
            registry: Arc::new(RouteRegistry::default()),
            pipeline: Arc::new(Pipeline::default()),
        }
    }

    fn closed_port() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port().to_string()
    }

    fn config(name: &str) -> EndpointConfig {
        EndpointConfig {
            broker_endpoint: BrokerEndpoint {
                name: name.to_string(),
                enabled: true,
                ..Default::default()
            },
            endpoint: Endpoint {
                host: "127.0.0.1".to_string(),
                port: closed_port(),
                path: "/".to_string(),
                http_method: "POST".to_string(),
                endpoint_type: "http".to_string(),
                enabled: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    async fn send(router: Router, method: Method, uri: &str) -> (StatusCode, HeaderMap, serde_json::Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (status, _, body) = send(ingress_router(state()), Method::POST, "/api/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "route_not_found");
    }

    #[tokio::test]
    async fn wrong_method_is_405_with_allow() {
        let state = state();
        state.registry.add_route(&config("sayHello")).unwrap();

        let (status, headers, body) =
            send(ingress_router(state), Method::GET, "/api/sayHello").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(headers[header::ALLOW], "POST");
        assert_eq!(body["kind"], "method_not_allowed");
    }

    #[tokio::test]
    async fn route_added_after_router_is_built_is_served() {
        let state = state();
        let router = ingress_router(state.clone());
        state.registry.add_route(&config("late")).unwrap();

        // Nothing listens downstream, so reaching the forwarder proves dispatch.
        let (status, _, body) = send(router, Method::POST, "/api/late").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["kind"], "downstream_unavailable");
    }
}
