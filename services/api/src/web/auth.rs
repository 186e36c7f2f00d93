//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: login, access-token refresh and the caller's profile.

use std::sync::Arc;

use achievement_core::{Claims, Identity};
use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{HttpError, HttpResult};
use crate::web::envelope::Success;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Username or email.
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// An account as shown to its owner. Never carries the password hash.
#[derive(Serialize, ToSchema)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role_id: Uuid,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Identity> for UserView {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            username: identity.username,
            email: identity.email,
            full_name: identity.full_name,
            role_id: identity.role_id,
            role: identity.role_name,
            is_active: identity.is_active,
            created_at: identity.created_at,
            updated_at: identity.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub user: UserView,
    pub token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Serialize, ToSchema)]
pub struct RefreshResponse {
    pub token: String,
}

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    pub user_id: Uuid,
    pub username: String,
    pub role: String,
    pub permissions: Vec<String>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/login - Exchange credentials for an access and refresh token
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, data carries LoginResponse"),
        (status = 400, description = "Missing username or password"),
        (status = 401, description = "Invalid username or password"),
        (status = 403, description = "Account is disabled")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> HttpResult<Success<LoginResponse>> {
    let Json(req) = body.map_err(|e| HttpError::Validation(e.body_text()))?;
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(HttpError::Validation(
            "username and password are required".into(),
        ));
    }

    let identity = state
        .credentials
        .authenticate(req.username.trim(), &req.password)
        .await?;
    let pair = state.tokens.issue_pair(&identity)?;
    info!(user_id = %identity.id, role = %identity.role_name, "login succeeded");

    Ok(Success::ok(
        "Login successful",
        LoginResponse {
            user: identity.into(),
            token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
        },
    ))
}

/// POST /auth/refresh - Exchange a refresh token for a new access token
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token, data carries RefreshResponse"),
        (status = 401, description = "Refresh token invalid, expired or of the wrong type")
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> HttpResult<Success<RefreshResponse>> {
    let Json(req) = body.map_err(|e| HttpError::Validation(e.body_text()))?;
    let token = state.tokens.refresh_token(req.refresh_token.trim())?;
    Ok(Success::ok("Token refreshed", RefreshResponse { token }))
}

/// GET /auth/profile - The identity and capabilities carried by the caller's token
#[utoipa::path(
    get,
    path = "/api/v1/auth/profile",
    tag = "auth",
    responses(
        (status = 200, description = "Profile, data carries ProfileResponse"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = []))
)]
pub async fn profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Success<ProfileResponse> {
    let permissions = state
        .permissions
        .capabilities(&claims.role)
        .into_iter()
        .map(str::to_string)
        .collect();

    Success::ok(
        "Profile retrieved",
        ProfileResponse {
            user_id: claims.sub,
            username: claims.username,
            role: claims.role,
            permissions,
        },
    )
}
