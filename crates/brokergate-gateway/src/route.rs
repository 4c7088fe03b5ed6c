//! Route construction — validates endpoint configuration and derives the
//! inbound binding and downstream target.
//!
//! `config_to_route` is pure: it reads an [`EndpointConfig`] snapshot and
//! returns a self-contained [`RouteDescriptor`]. Later edits to the stored
//! configuration are not seen by a built route.

use std::collections::BTreeMap;

use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use serde::Serialize;
use url::Url;

use brokergate_state::{EndpointConfig, RecordId};
use brokergate_transform::{Direction, DirectionPlan, ProcessingMode, ResponseSelection};

use crate::error::RouteError;

/// Prefix under which every route is exposed.
pub const ROUTE_PREFIX: &str = "/api";

/// Method of the single inbound binding each route gets.
pub const INBOUND_METHOD: Method = Method::POST;

/// Inbound path for a route id.
pub fn route_path(route_id: &str) -> String {
    format!("{ROUTE_PREFIX}/{route_id}")
}

/// Where and how a route forwards.
#[derive(Debug, Clone)]
pub struct DownstreamTarget {
    pub url: Uri,
    pub method: Method,
    /// Configured headers, applied over the caller's headers.
    pub headers: HeaderMap,
}

/// Everything needed to serve one route.
#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    pub id: String,
    pub path: String,
    pub method: Method,
    pub broker_endpoint_id: RecordId,
    pub downstream: DownstreamTarget,
    pub request: DirectionPlan,
    pub response: DirectionPlan,
}

impl RouteDescriptor {
    pub fn handle(&self) -> RouteHandle {
        RouteHandle {
            id: self.id.clone(),
            path: self.path.clone(),
            method: self.method.to_string(),
            broker_endpoint_id: self.broker_endpoint_id,
            downstream_url: self.downstream.url.to_string(),
            downstream_method: self.downstream.method.to_string(),
            request_mode: self.request.mode,
            response_mode: self.response.mode,
        }
    }
}

/// Operator-facing summary of an active route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteHandle {
    pub id: String,
    pub path: String,
    pub method: String,
    pub broker_endpoint_id: RecordId,
    pub downstream_url: String,
    pub downstream_method: String,
    pub request_mode: ProcessingMode,
    pub response_mode: ProcessingMode,
}

fn invalid(msg: impl Into<String>) -> RouteError {
    RouteError::InvalidConfiguration(msg.into())
}

/// Whether `name` can be used verbatim as a URL path segment.
fn is_path_token(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~'))
        && name != "."
        && name != ".."
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, RouteError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(invalid(format!("endpoint {field} is empty")));
    }
    Ok(value)
}

/// Parse an optional serialized string map (a JSON object of strings).
fn string_map(field: &str, raw: Option<&str>) -> Result<BTreeMap<String, String>, RouteError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(BTreeMap::new()),
        Some(text) => serde_json::from_str(text)
            .map_err(|e| invalid(format!("endpoint {field} is not a JSON object of strings: {e}"))),
    }
}

/// Build the route for a broker endpoint configuration.
pub fn config_to_route(
    config: &EndpointConfig,
    selection: ResponseSelection,
) -> Result<RouteDescriptor, RouteError> {
    let broker_endpoint = &config.broker_endpoint;
    let endpoint = &config.endpoint;

    if !is_path_token(&broker_endpoint.name) {
        return Err(invalid(format!(
            "broker endpoint name '{}' is not a valid path segment",
            broker_endpoint.name
        )));
    }

    let host = required("host", &endpoint.host)?;
    let port: u16 = required("port", &endpoint.port)?
        .parse()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| invalid(format!("endpoint port '{}' is not a valid port", endpoint.port)))?;
    let path = required("path", &endpoint.path)?;
    if !path.starts_with('/') {
        return Err(invalid(format!("endpoint path '{path}' must start with '/'")));
    }
    let scheme = required("type", &endpoint.endpoint_type)?.to_ascii_lowercase();
    if scheme != "http" {
        return Err(invalid(format!(
            "endpoint type '{scheme}' is not supported (expected 'http')"
        )));
    }
    let method = Method::from_bytes(required("method", &endpoint.http_method)?.to_ascii_uppercase().as_bytes())
        .map_err(|_| invalid(format!("endpoint method '{}' is not an HTTP method", endpoint.http_method)))?;

    let mut target_path = path.to_string();
    for (name, value) in string_map("path parameters", endpoint.path_parameters.as_deref())? {
        target_path = target_path.replace(&format!("{{{name}}}"), &value);
    }

    let mut url = Url::parse(&format!("{scheme}://{host}:{port}{target_path}"))
        .map_err(|e| invalid(format!("downstream url is invalid: {e}")))?;
    let query = string_map("query parameters", endpoint.query_parameters.as_deref())?;
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (k, v) in &query {
            pairs.append_pair(k, v);
        }
    }
    let uri: Uri = url
        .as_str()
        .parse()
        .map_err(|e| invalid(format!("downstream url is invalid: {e}")))?;

    let mut headers = HeaderMap::new();
    for (name, value) in string_map("headers", endpoint.headers.as_deref())? {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| invalid(format!("header name '{name}' is invalid")))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|_| invalid(format!("header '{name}' has an invalid value")))?;
        headers.insert(name, value);
    }

    Ok(RouteDescriptor {
        id: broker_endpoint.name.clone(),
        path: route_path(&broker_endpoint.name),
        method: INBOUND_METHOD,
        broker_endpoint_id: broker_endpoint.id,
        downstream: DownstreamTarget {
            url: uri,
            method,
            headers,
        },
        request: DirectionPlan::build(Direction::Request, &config.transformation, selection),
        response: DirectionPlan::build(Direction::Response, &config.transformation, selection),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use brokergate_state::{BrokerEndpoint, Endpoint, Transformation};

    fn say_hello() -> EndpointConfig {
        EndpointConfig {
            broker_endpoint: BrokerEndpoint {
                id: 3,
                broker_id: 1,
                name: "sayHello".to_string(),
                enabled: true,
                ..Default::default()
            },
            endpoint: Endpoint {
                name: "say hello".to_string(),
                host: "localhost".to_string(),
                port: "8081".to_string(),
                path: "/api/sayhello".to_string(),
                http_method: "POST".to_string(),
                endpoint_type: "http".to_string(),
                enabled: true,
                ..Default::default()
            },
            transformation: Transformation {
                request_enabled: true,
                request_template_type: Some("atlas".to_string()),
                request_transformation: b"{}".to_vec(),
                ..Default::default()
            },
        }
    }

    fn build(config: &EndpointConfig) -> Result<RouteDescriptor, RouteError> {
        config_to_route(config, ResponseSelection::Corrected)
    }

    #[test]
    fn derives_path_and_downstream_url() {
        let route = build(&say_hello()).unwrap();

        assert_eq!(route.id, "sayHello");
        assert_eq!(route.path, "/api/sayHello");
        assert_eq!(route.method, Method::POST);
        assert_eq!(route.broker_endpoint_id, 3);
        assert_eq!(
            route.downstream.url.to_string(),
            "http://localhost:8081/api/sayhello"
        );
        assert_eq!(route.downstream.method, Method::POST);
        assert_eq!(route.request.mode, ProcessingMode::StructuredMapping);
        assert_eq!(route.response.mode, ProcessingMode::PassThrough);
    }

    #[test]
    fn rejects_bad_names() {
        for name in ["", "say hello", "a/b", "..", "café"] {
            let mut config = say_hello();
            config.broker_endpoint.name = name.to_string();
            assert!(
                matches!(build(&config), Err(RouteError::InvalidConfiguration(_))),
                "name {name:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_missing_endpoint_fields() {
        let cases: Vec<fn(&mut Endpoint)> = vec![
            |e| e.host.clear(),
            |e| e.port = "  ".to_string(),
            |e| e.port = "0".to_string(),
            |e| e.port = "http".to_string(),
            |e| e.path.clear(),
            |e| e.path = "no-slash".to_string(),
            |e| e.endpoint_type.clear(),
            |e| e.endpoint_type = "ftp".to_string(),
            |e| e.http_method.clear(),
            |e| e.http_method = "NOT A METHOD".to_string(),
        ];
        for mutate in cases {
            let mut config = say_hello();
            mutate(&mut config.endpoint);
            assert!(matches!(
                build(&config),
                Err(RouteError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn method_and_scheme_are_case_insensitive() {
        let mut config = say_hello();
        config.endpoint.http_method = "put".to_string();
        config.endpoint.endpoint_type = "HTTP".to_string();
        let route = build(&config).unwrap();
        assert_eq!(route.downstream.method, Method::PUT);
    }

    #[test]
    fn applies_path_query_and_header_maps() {
        let mut config = say_hello();
        config.endpoint.path = "/api/{version}/greet".to_string();
        config.endpoint.path_parameters = Some(r#"{"version":"v2"}"#.to_string());
        config.endpoint.query_parameters = Some(r#"{"lang":"en","q":"a b"}"#.to_string());
        config.endpoint.headers = Some(r#"{"x-api-key":"secret"}"#.to_string());

        let route = build(&config).unwrap();
        assert_eq!(
            route.downstream.url.to_string(),
            "http://localhost:8081/api/v2/greet?lang=en&q=a+b"
        );
        assert_eq!(route.downstream.headers["x-api-key"], "secret");
    }

    #[test]
    fn rejects_malformed_maps() {
        let mut config = say_hello();
        config.endpoint.headers = Some("not json".to_string());
        assert!(matches!(
            build(&config),
            Err(RouteError::InvalidConfiguration(_))
        ));

        let mut config = say_hello();
        config.endpoint.headers = Some(r#"{"bad header":"v"}"#.to_string());
        assert!(build(&config).is_err());
    }

    #[test]
    fn handle_summarizes_route() {
        let handle = build(&say_hello()).unwrap().handle();
        assert_eq!(handle.path, "/api/sayHello");
        assert_eq!(handle.method, "POST");
        assert_eq!(handle.downstream_url, "http://localhost:8081/api/sayhello");
        assert_eq!(handle.request_mode, ProcessingMode::StructuredMapping);
    }
}
