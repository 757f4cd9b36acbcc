//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

/// The identity established by `require_auth`. Handlers take it as an extractor
/// and pass `user_id` on explicitly; it is never read from request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
}

/// Middleware that validates the bearer token and extracts the user id.
///
/// If valid, inserts an `AuthUser` into request extensions for handlers to use.
/// If missing, malformed, forged or expired, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Extract the token from the Authorization header
    let token = bearer_token(req.headers())?;

    // 2. Verify it; the reason for a rejection is only logged
    let user_id = state.tokens.verify(token).map_err(|e| {
        warn!("Rejected bearer token: {}", e);
        ApiError::Unauthenticated
    })?;

    // 3. Insert the identity into request extensions
    req.extensions_mut().insert(AuthUser { user_id });

    // 4. Continue to the handler
    Ok(next.run(req).await)
}

/// Returns the token of an `Authorization: Bearer <token>` header. Anything other
/// than exactly the scheme and one token is rejected.
fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| {
            debug!("Missing authorization header");
            ApiError::Unauthenticated
        })?
        .to_str()
        .map_err(|_| ApiError::Unauthenticated)?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => {
            debug!("Invalid authorization header format");
            Err(ApiError::Unauthenticated)
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or(ApiError::Unauthenticated)
    }
}
