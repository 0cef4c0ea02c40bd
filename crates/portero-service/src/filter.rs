//! Backend validation filter.
//!
//! Runs once per request and tries to attach an [`Identity`]. It never
//! rejects: a request that fails any check simply continues without an
//! identity, and endpoint extractors decide whether that is acceptable.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use portero_token::bearer_token;

use crate::identity::Identity;
use crate::state::ServiceState;

/// Why a request continued without an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnonymousReason {
    /// No `Authorization: Bearer` header.
    NoBearer,
    /// Username could not be extracted from the token.
    UnreadableToken,
    /// Principal unknown, inactive or the store failed.
    PrincipalUnavailable,
    /// Token did not validate against the loaded principal.
    TokenRejected,
}

/// Result of running the filter on one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    /// Path is exempt; no identity work was done.
    Exempt,
    /// Identity attached for this username.
    Authenticated(String),
    /// An identity was already present on the request.
    AlreadyAuthenticated,
    /// Continued without identity.
    Anonymous(AnonymousReason),
}

/// Middleware entry point.
pub async fn authenticate(
    State(state): State<Arc<ServiceState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let outcome = establish_identity(&state, &mut request).await;
    tracing::trace!(path = %request.uri().path(), ?outcome, "Validation filter");
    next.run(request).await
}

/// Try to attach an identity to `request`.
pub async fn establish_identity(state: &ServiceState, request: &mut Request) -> FilterOutcome {
    if state.config.is_exempt(request.uri().path()) {
        return FilterOutcome::Exempt;
    }

    let Some(token) = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string)
    else {
        return FilterOutcome::Anonymous(AnonymousReason::NoBearer);
    };

    let Some(username) = state.tokens.extract_username(&token) else {
        return FilterOutcome::Anonymous(AnonymousReason::UnreadableToken);
    };

    if request.extensions().get::<Identity>().is_some() {
        return FilterOutcome::AlreadyAuthenticated;
    }

    let principal = match state.credentials.find_by_username(&username).await {
        Ok(Some(p)) if p.active => p,
        Ok(Some(_)) => {
            tracing::debug!(username = %username, "Token presented for inactive principal");
            return FilterOutcome::Anonymous(AnonymousReason::PrincipalUnavailable);
        }
        Ok(None) => {
            tracing::debug!(username = %username, "Token presented for unknown principal");
            return FilterOutcome::Anonymous(AnonymousReason::PrincipalUnavailable);
        }
        Err(e) => {
            tracing::warn!(username = %username, error = %e, "Credential lookup failed");
            return FilterOutcome::Anonymous(AnonymousReason::PrincipalUnavailable);
        }
    };

    if !state.tokens.is_valid(&token, &principal) {
        return FilterOutcome::Anonymous(AnonymousReason::TokenRejected);
    }

    request.extensions_mut().insert(Identity {
        username: principal.username.clone(),
        authorities: principal.authorities(),
    });

    FilterOutcome::Authenticated(principal.username)
}
