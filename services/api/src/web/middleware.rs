//! services/api/src/web/middleware.rs
//!
//! Authentication and authorization middleware for protecting routes.

use std::sync::Arc;

use achievement_core::Claims;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::error::HttpError;
use crate::web::state::AppState;

/// Middleware that validates the bearer access token.
///
/// If valid, inserts the decoded `Claims` into request extensions for the
/// permission check and the handlers. If invalid or missing, returns 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| HttpError::Unauthorized("Access token required".into()))?
        .strip_prefix("Bearer ")
        .ok_or_else(|| HttpError::Unauthorized("Authorization header must be 'Bearer <token>'".into()))?;

    let claims = state.tokens.validate_access_token(token.trim())?;
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Middleware that admits the request only if the caller's role holds
/// `permission`. Must run after [`require_auth`].
pub async fn require_permission(
    State((state, permission)): State<(Arc<AppState>, &'static str)>,
    req: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or_else(|| HttpError::Unauthorized("Access token required".into()))?;

    if !state.permissions.authorize(&claims.role, permission) {
        debug!(user_id = %claims.sub, role = %claims.role, permission, "permission denied");
        return Err(HttpError::Forbidden(format!(
            "Role '{}' lacks permission '{permission}'",
            claims.role
        )));
    }

    Ok(next.run(req).await)
}
