//! Outbound HTTP calls to downstream services.

use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Request, Response, StatusCode, header};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

use crate::error::PipelineError;
use crate::route::DownstreamTarget;

/// Default bound on a single downstream exchange.
pub const DEFAULT_DOWNSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Headers that describe the inbound connection or body framing and are
/// never copied to the downstream request.
fn is_hop_by_hop_header(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}

fn is_forwardable(name: &str) -> bool {
    !is_hop_by_hop_header(name)
        && !name.eq_ignore_ascii_case(header::HOST.as_str())
        && !name.eq_ignore_ascii_case(header::CONTENT_LENGTH.as_str())
        && !name.eq_ignore_ascii_case(header::CONTENT_TYPE.as_str())
        && !name.eq_ignore_ascii_case(header::ACCEPT_ENCODING.as_str())
}

/// A downstream reply, whatever its status.
#[derive(Debug, Clone)]
pub struct DownstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Pooled HTTP client with a per-exchange deadline.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .build_http();
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `body` to `target`.
    ///
    /// The caller's headers are carried over except for hop-by-hop headers,
    /// `host`, `content-length`, `content-type` and `accept-encoding`; the
    /// downstream is asked for an identity-encoded body. Configured endpoint
    /// headers win over caller headers, and the content type is always
    /// `application/json`.
    ///
    /// Any status is returned as `Ok`; only transport failures and the
    /// deadline produce `DownstreamUnavailable`. The whole exchange,
    /// including reading the body, counts against the deadline.
    pub async fn forward(
        &self,
        target: &DownstreamTarget,
        inbound_headers: &HeaderMap,
        body: Bytes,
    ) -> Result<DownstreamResponse, PipelineError> {
        let url = target.url.to_string();
        let unavailable = |reason: String, timed_out: bool| PipelineError::DownstreamUnavailable {
            url: url.clone(),
            reason,
            timed_out,
        };

        let mut builder = Request::builder()
            .method(target.method.clone())
            .uri(target.url.clone());
        if let Some(headers) = builder.headers_mut() {
            for (name, value) in inbound_headers {
                if is_forwardable(name.as_str()) {
                    headers.append(name.clone(), value.clone());
                }
            }
            for (name, value) in &target.headers {
                headers.insert(name.clone(), value.clone());
            }
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        let request = builder
            .body(Full::new(body))
            .map_err(|e| unavailable(format!("cannot build request: {e}"), false))?;

        let exchange = async {
            let response: Response<Incoming> = self
                .client
                .request(request)
                .await
                .map_err(|e| unavailable(describe(&e), false))?;
            let (parts, incoming) = response.into_parts();
            let body = incoming
                .collect()
                .await
                .map_err(|e| unavailable(format!("reading body: {e}"), false))?
                .to_bytes();
            Ok::<_, PipelineError>(DownstreamResponse {
                status: parts.status,
                headers: parts.headers,
                body,
            })
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(response)) => {
                debug!(%url, status = %response.status, bytes = response.body.len(), "downstream replied");
                Ok(response)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(unavailable(
                format!("no response within {:?}", self.timeout),
                true,
            )),
        }
    }
}

impl Default for Forwarder {
    fn default() -> Self {
        Self::new(DEFAULT_DOWNSTREAM_TIMEOUT)
    }
}

/// Flatten an error and its sources into one line.
fn describe(e: &(dyn std::error::Error + 'static)) -> String {
    let mut out = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
