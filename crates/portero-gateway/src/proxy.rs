//! Upstream routing and reverse proxy.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};

use crate::GatewayError;
use crate::config::RouteConfig;
use crate::error::ProxyError;

const HOP_BY_HOP: [header::HeaderName; 8] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::HOST,
];

/// Prefix routes, matched longest prefix first.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteConfig>,
}

impl RouteTable {
    /// Build a table from configured routes.
    #[must_use]
    pub fn new(mut routes: Vec<RouteConfig>) -> Self {
        routes.sort_by(|a, b| b.path_prefix.len().cmp(&a.path_prefix.len()));
        Self { routes }
    }

    /// Route for `path`, if any.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&RouteConfig> {
        self.routes
            .iter()
            .find(|r| path.starts_with(r.path_prefix.as_str()))
    }

    /// Number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table has no routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Forwards requests to the upstream chosen by the route table.
#[derive(Debug)]
pub struct Proxy {
    client: reqwest::Client,
    routes: RouteTable,
    max_body_bytes: usize,
}

impl Proxy {
    /// Create a proxy.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(
        routes: RouteTable,
        max_body_bytes: usize,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| GatewayError::Config(format!("HTTP client init failed: {e}")))?;

        Ok(Self {
            client,
            routes,
            max_body_bytes,
        })
    }

    /// Forward `request` upstream and relay the response.
    ///
    /// # Errors
    ///
    /// Returns `NoRoute`, `Body` or `Upstream`.
    pub async fn forward(&self, request: Request) -> Result<Response, ProxyError> {
        let path = request.uri().path().to_string();
        let route = self
            .routes
            .resolve(&path)
            .ok_or_else(|| ProxyError::NoRoute(path.clone()))?;

        let path_and_query = request
            .uri()
            .path_and_query()
            .map_or_else(|| path.clone(), ToString::to_string);
        let url = format!("{}{}", route.upstream.trim_end_matches('/'), path_and_query);

        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|e| ProxyError::Body(e.to_string()))?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);

        tracing::debug!(method = %parts.method, url = %url, "Forwarding upstream");

        let upstream = self
            .client
            .request(parts.method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = upstream.status();
        let mut response_headers = upstream.headers().clone();
        strip_hop_by_hop(&mut response_headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

/// Fallback handler that proxies everything not served locally.
pub async fn proxy_handler(State(proxy): State<Arc<Proxy>>, request: Request) -> Response {
    match proxy.forward(request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}
