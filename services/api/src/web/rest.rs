//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the achievement endpoints and the master
//! definition for the OpenAPI specification.

use std::sync::Arc;

use achievement_core::{Achievement, AchievementContent, AchievementStatus, Claims};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};
use uuid::Uuid;

use crate::error::{HttpError, HttpResult};
use crate::web::auth::{
    self, LoginRequest, LoginResponse, ProfileResponse, RefreshRequest, RefreshResponse, UserView,
};
use crate::web::envelope::Success;
use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        auth::login_handler,
        auth::refresh_handler,
        auth::profile_handler,
        create_achievement_handler,
        list_achievements_handler,
        get_achievement_handler,
        update_achievement_handler,
        delete_achievement_handler,
        submit_achievement_handler,
    ),
    components(
        schemas(
            LoginRequest,
            LoginResponse,
            RefreshRequest,
            RefreshResponse,
            ProfileResponse,
            UserView,
            AchievementRequest,
            CreatedAchievementResponse,
            AchievementView,
            SubmittedAchievementResponse,
            HealthResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Login and token management."),
        (name = "achievements", description = "Student achievement records: drafting and submission.")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The owner-editable fields of an achievement. Keys are accepted in
/// camelCase or snake_case.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AchievementRequest {
    #[serde(default, alias = "achievement_type")]
    pub achievement_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Free-form, type-specific attributes.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub details: Map<String, Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "event_date")]
    pub event_date: Option<DateTime<Utc>>,
}

impl From<AchievementRequest> for AchievementContent {
    fn from(req: AchievementRequest) -> Self {
        Self {
            achievement_type: req.achievement_type,
            title: req.title,
            description: req.description,
            details: req.details,
            tags: req.tags,
            event_date: req.event_date,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CreatedAchievementResponse {
    pub id: Uuid,
    pub detail_id: String,
    #[schema(value_type = String, example = "draft")]
    pub status: AchievementStatus,
    pub created_at: DateTime<Utc>,
}

/// A live achievement: lifecycle fields from the reference record, content
/// from the detail record.
#[derive(Serialize, ToSchema)]
pub struct AchievementView {
    pub id: Uuid,
    pub student_id: Uuid,
    pub detail_id: String,
    #[schema(value_type = String, example = "draft")]
    pub status: AchievementStatus,
    pub achievement_type: String,
    pub title: String,
    pub description: String,
    #[schema(value_type = Object)]
    pub details: Map<String, Value>,
    pub tags: Vec<String>,
    pub points: i32,
    pub event_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<Achievement> for AchievementView {
    fn from(Achievement { reference, detail }: Achievement) -> Self {
        let content = detail.content;
        Self {
            id: reference.id,
            student_id: reference.student_id,
            detail_id: reference.detail_id,
            status: reference.status,
            achievement_type: content.achievement_type,
            title: content.title,
            description: content.description,
            details: content.details,
            tags: content.tags,
            points: detail.points,
            event_date: content.event_date,
            created_at: reference.created_at,
            submitted_at: reference.submitted_at,
            updated_at: detail.updated_at.max(reference.updated_at),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SubmittedAchievementResponse {
    pub id: Uuid,
    #[schema(value_type = String, example = "submitted")]
    pub status: AchievementStatus,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

fn parse_id(raw: &str) -> Result<Uuid, HttpError> {
    Uuid::parse_str(raw).map_err(|_| HttpError::Validation(format!("'{raw}' is not a valid achievement id")))
}

fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, HttpError> {
    body.map(|Json(value)| value)
        .map_err(|e| HttpError::Validation(e.body_text()))
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness check.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health_handler() -> Success<HealthResponse> {
    Success::ok("Service is healthy", HealthResponse { status: "ok".into() })
}

/// Create a new achievement as a draft owned by the caller's student profile.
#[utoipa::path(
    post,
    path = "/api/v1/achievements",
    tag = "achievements",
    request_body = AchievementRequest,
    responses(
        (status = 201, description = "Draft created, data carries CreatedAchievementResponse"),
        (status = 400, description = "Malformed body or missing required field"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Role lacks achievements:create, or caller is not a student"),
        (status = 500, description = "Storage failure")
    ),
    security(("bearer" = []))
)]
pub async fn create_achievement_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<AchievementRequest>, JsonRejection>,
) -> HttpResult<Success<CreatedAchievementResponse>> {
    let content = parse_body(body)?.into();
    let created = state.achievements.create(claims.sub, content).await?;

    Ok(Success::created(
        "Achievement created as draft",
        CreatedAchievementResponse {
            id: created.id,
            detail_id: created.detail_id,
            status: created.status,
            created_at: created.created_at,
        },
    ))
}

/// List the caller's live achievements, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/achievements",
    tag = "achievements",
    responses(
        (status = 200, description = "data carries a list of AchievementView"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Role lacks achievements:read, or caller is not a student")
    ),
    security(("bearer" = []))
)]
pub async fn list_achievements_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> HttpResult<Success<Vec<AchievementView>>> {
    let achievements = state.achievements.list(claims.sub).await?;
    Ok(Success::ok(
        "Achievements retrieved",
        achievements.into_iter().map(AchievementView::from).collect(),
    ))
}

/// Fetch one of the caller's achievements.
#[utoipa::path(
    get,
    path = "/api/v1/achievements/{id}",
    tag = "achievements",
    params(("id" = Uuid, Path, description = "Achievement id")),
    responses(
        (status = 200, description = "data carries an AchievementView"),
        (status = 403, description = "Achievement belongs to another student"),
        (status = 404, description = "No live achievement with this id")
    ),
    security(("bearer" = []))
)]
pub async fn get_achievement_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> HttpResult<Success<AchievementView>> {
    let id = parse_id(&id)?;
    let achievement = state.achievements.get(id, claims.sub).await?;
    Ok(Success::ok("Achievement retrieved", achievement.into()))
}

/// Replace the content of a draft.
#[utoipa::path(
    put,
    path = "/api/v1/achievements/{id}",
    tag = "achievements",
    params(("id" = Uuid, Path, description = "Achievement id")),
    request_body = AchievementRequest,
    responses(
        (status = 200, description = "Draft updated"),
        (status = 400, description = "Invalid input, or the achievement is no longer a draft (data.current_status)"),
        (status = 403, description = "Achievement belongs to another student"),
        (status = 404, description = "No live achievement with this id")
    ),
    security(("bearer" = []))
)]
pub async fn update_achievement_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    body: Result<Json<AchievementRequest>, JsonRejection>,
) -> HttpResult<Success<()>> {
    let id = parse_id(&id)?;
    let content = parse_body(body)?.into();
    state.achievements.update(id, claims.sub, content).await?;
    Ok(Success::message("Achievement updated"))
}

/// Soft-delete a draft.
#[utoipa::path(
    delete,
    path = "/api/v1/achievements/{id}",
    tag = "achievements",
    params(("id" = Uuid, Path, description = "Achievement id")),
    responses(
        (status = 200, description = "Draft deleted"),
        (status = 400, description = "The achievement is no longer a draft (data.current_status)"),
        (status = 403, description = "Achievement belongs to another student"),
        (status = 404, description = "No live achievement with this id")
    ),
    security(("bearer" = []))
)]
pub async fn delete_achievement_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> HttpResult<Success<()>> {
    let id = parse_id(&id)?;
    state.achievements.delete(id, claims.sub).await?;
    Ok(Success::message("Achievement deleted"))
}

/// Submit a draft for verification. Applies at most once.
#[utoipa::path(
    post,
    path = "/api/v1/achievements/{id}/submit",
    tag = "achievements",
    params(("id" = Uuid, Path, description = "Achievement id")),
    responses(
        (status = 200, description = "Submitted, data carries SubmittedAchievementResponse"),
        (status = 400, description = "The achievement is no longer a draft (data.current_status)"),
        (status = 403, description = "Achievement belongs to another student"),
        (status = 404, description = "No live achievement with this id")
    ),
    security(("bearer" = []))
)]
pub async fn submit_achievement_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> HttpResult<Success<SubmittedAchievementResponse>> {
    let id = parse_id(&id)?;
    let submitted_at = state.achievements.submit(id, claims.sub).await?;
    Ok(Success::ok(
        "Achievement submitted for verification",
        SubmittedAchievementResponse {
            id,
            status: AchievementStatus::Submitted,
            submitted_at,
        },
    ))
}
