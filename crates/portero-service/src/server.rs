//! Service HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use portero_token::CredentialStore;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::ServiceError;
use crate::bootstrap::auto_setup_from_env;
use crate::config::ServiceConfig;
use crate::filter;
use crate::handlers;
use crate::state::ServiceState;
use crate::store::UserStore;

/// Build the service router around shared state.
///
/// Every route passes through the validation filter; `/auth/login`,
/// `/auth/refresh` and `/health` do not require an identity.
pub fn router(state: Arc<ServiceState>) -> Router {
    let mut app = Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/check-token", get(handlers::check_token))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::me))
        .route("/auth/users/{username}", get(handlers::user))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            filter::authenticate,
        ))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.timeout(),
        ))
        .layer(TraceLayer::new_for_http());

    if state.config.cors {
        app = app.layer(CorsLayer::permissive());
    }

    app.with_state(state)
}

/// Backend authentication service.
#[derive(Debug)]
pub struct Service {
    config: ServiceConfig,
    state: Arc<ServiceState>,
}

impl Service {
    /// Open the sled user store under the configured data directory, seed
    /// an admin from the environment if it is empty, and build the service.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be opened or the secret is too weak.
    pub fn open(config: ServiceConfig) -> Result<Self, ServiceError> {
        let data_dir = config.data_dir();
        std::fs::create_dir_all(&data_dir)
            .map_err(|e| ServiceError::Config(format!("Failed to create data dir: {e}")))?;

        let store = UserStore::open(&data_dir)
            .map_err(|e| ServiceError::Config(format!("User store init failed: {e}")))?;

        if let Err(e) = auto_setup_from_env(&store) {
            tracing::warn!("Auto-setup from env failed: {}", e);
        }
        if store.is_empty() {
            tracing::warn!("No users configured; run 'portero admin create' to add one");
        }

        Self::with_store(config, Arc::new(store))
    }

    /// Build the service around any credential store.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the secret is too weak.
    pub fn with_store(
        config: ServiceConfig,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, ServiceError> {
        config.validate().map_err(ServiceError::Config)?;
        let state = ServiceState::new(config.clone(), store)
            .map_err(|e| ServiceError::Config(e.to_string()))?;

        Ok(Self {
            config,
            state: Arc::new(state),
        })
    }

    /// Shared state.
    #[must_use]
    pub fn state(&self) -> Arc<ServiceState> {
        self.state.clone()
    }

    /// Router for this service.
    #[must_use]
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Run the service until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns error if the address is invalid or binding fails.
    pub async fn run(&self) -> Result<(), ServiceError> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| ServiceError::Config(format!("Invalid address: {e}")))?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Service listening on http://{}", addr);

        axum::serve(listener, self.router())
            .await
            .map_err(|e| ServiceError::Server(e.to_string()))
    }
}
