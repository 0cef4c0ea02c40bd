//! Gateway HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::Request,
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer};

use crate::GatewayError;
use crate::config::GatewayConfig;
use crate::filter::{self, EdgeFilter, VerifiedSubject};
use crate::proxy::{self, Proxy, RouteTable};

/// Chain position of the access log. Filters with a lower order run
/// before it.
pub const ACCESS_LOG_ORDER: i32 = 0;

/// Edge gateway: edge filter, access log and upstream proxy.
#[derive(Debug)]
pub struct Gateway {
    config: GatewayConfig,
    filter: Arc<EdgeFilter>,
    proxy: Arc<Proxy>,
}

impl Gateway {
    /// Create a new gateway.
    ///
    /// # Errors
    ///
    /// Returns error if the upstream client cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        if config.routes.is_empty() {
            tracing::warn!("No upstream routes configured; every proxied request will get 404");
        }

        let filter = Arc::new(EdgeFilter::new(config.filter.clone()));
        let proxy = Arc::new(Proxy::new(
            RouteTable::new(config.routes.clone()),
            config.max_body_bytes,
            config.timeout(),
        )?);

        Ok(Self {
            config,
            filter,
            proxy,
        })
    }

    /// The edge filter.
    #[must_use]
    pub fn filter(&self) -> Arc<EdgeFilter> {
        self.filter.clone()
    }

    /// Names of the request filters in execution order.
    #[must_use]
    pub fn chain(&self) -> [&'static str; 2] {
        if self.filter.config().order < ACCESS_LOG_ORDER {
            ["edge_filter", "access_log"]
        } else {
            ["access_log", "edge_filter"]
        }
    }

    /// Build the router.
    pub fn router(&self) -> Router {
        let app = Router::new()
            .route("/health", get(health))
            .fallback(proxy::proxy_handler);

        let edge = middleware::from_fn_with_state(self.filter.clone(), filter::edge_filter);
        let log = middleware::from_fn(access_log);

        // The last layer added runs first.
        let mut app = if self.chain()[0] == "edge_filter" {
            app.layer(log).layer(edge)
        } else {
            app.layer(edge).layer(log)
        };

        app = app.layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            self.config.timeout(),
        ));
        if self.config.cors {
            app = app.layer(CorsLayer::permissive());
        }

        app.with_state(self.proxy.clone())
    }

    /// Run the gateway until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns error if the address is invalid or binding fails.
    pub async fn run(&self) -> Result<(), GatewayError> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| GatewayError::Config(format!("Invalid address: {e}")))?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Gateway listening on http://{}", addr);
        tracing::info!(chain = ?self.chain(), "Request filters");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| GatewayError::Server(e.to_string()))
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn access_log(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    // Never the client's X-Usuario: only what the edge filter verified.
    let before = request.extensions().get::<VerifiedSubject>().cloned();
    let started = Instant::now();

    let response = next.run(request).await;

    let user = before
        .or_else(|| response.extensions().get::<VerifiedSubject>().cloned())
        .map(|s| s.0)
        .filter(|s| !s.is_empty());

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        user = user.as_deref().unwrap_or("-"),
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "request"
    );
    response
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    };
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::config::{DEFAULT_JWT_SECRET, RouteConfig};

    async fn spawn_upstream() -> String {
        let app = Router::new().fallback(|headers: HeaderMap| async move {
            let get = |name: &str| {
                headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string()
            };
            Json(json!({
                "user": get("x-usuario"),
                "roles": get("x-roles"),
                "email": get("x-email"),
                "jti": get("x-jwt-id"),
            }))
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        format!("http://{addr}")
    }

    async fn gateway(order: i32) -> Gateway {
        let mut config = GatewayConfig::default();
        config.filter.order = order;
        config.routes = vec![RouteConfig {
            path_prefix: "/".to_string(),
            upstream: spawn_upstream().await,
        }];
        Gateway::new(config).unwrap()
    }

    fn token(roles: &str) -> String {
        let claims = json!({
            "sub": "alice",
            "roles": roles,
            "email": "alice@example.com",
            "exp": chrono::Utc::now().timestamp() + 600,
            "jti": "0123abcd",
        });
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(DEFAULT_JWT_SECRET.as_bytes()),
        )
        .unwrap()
    }

    async fn body_json(res: Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_chain_order() {
        assert_eq!(gateway(100).await.chain(), ["access_log", "edge_filter"]);
        assert_eq!(gateway(-1).await.chain(), ["edge_filter", "access_log"]);
    }

    #[tokio::test]
    async fn test_health() {
        let res = gateway(100)
            .await
            .router()
            .oneshot(axum::http::Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_forward_injects_identity() {
        for order in [-10, 100] {
            let res = gateway(order)
                .await
                .router()
                .oneshot(
                    axum::http::Request::builder()
                        .uri("/api/segura/perfil")
                        .header(AUTHORIZATION, format!("Bearer {}", token("ROLE_USER")))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);

            let body = body_json(res).await;
            assert_eq!(body["user"], "alice");
            assert_eq!(body["roles"], "ROLE_USER");
            assert_eq!(body["email"], "alice@example.com");
            assert_eq!(body["jti"], "0123abcd");
        }
    }

    #[tokio::test]
    async fn test_protected_without_token_never_reaches_upstream() {
        let res = gateway(100)
            .await
            .router()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/segura/perfil")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(res).await["code"], "missing_token");
    }

    #[tokio::test]
    async fn test_spoofed_identity_headers_are_dropped() {
        let res = gateway(100)
            .await
            .router()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/catalogo")
                    .header("x-usuario", "mallory")
                    .header("x-roles", "ROLE_ADMIN")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = body_json(res).await;
        assert_eq!(body["user"], "");
        assert_eq!(body["roles"], "");
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn access_lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .filter(|l| l.contains(" request ") && l.contains("status="))
                .map(String::from)
                .collect()
        }
    }

    async fn logged_request(order: i32, request: axum::http::Request<Body>) -> Vec<String> {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let router = gateway(order).await.router();
        let _ = router.oneshot(request).await.unwrap();
        logs.access_lines()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_access_log_ignores_client_identity_header() {
        for order in [-10, 100] {
            let lines = logged_request(
                order,
                axum::http::Request::builder()
                    .uri("/api/segura/x")
                    .header("x-usuario", "admin")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

            assert_eq!(lines.len(), 1, "{lines:?}");
            assert!(lines[0].contains("status=401"), "{}", lines[0]);
            assert!(lines[0].contains(r#"user="-""#), "{}", lines[0]);
            assert!(!lines[0].contains("admin"), "{}", lines[0]);
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_access_log_records_verified_subject() {
        for order in [-10, 100] {
            let lines = logged_request(
                order,
                axum::http::Request::builder()
                    .uri("/api/segura/perfil")
                    .header(AUTHORIZATION, format!("Bearer {}", token("ROLE_USER")))
                    .header("x-usuario", "mallory")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

            assert_eq!(lines.len(), 1, "{lines:?}");
            assert!(lines[0].contains("status=200"), "{}", lines[0]);
            assert!(lines[0].contains(r#"user="alice""#), "{}", lines[0]);
        }
    }
}
