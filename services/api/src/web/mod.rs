//! services/api/src/web/mod.rs
//!
//! The HTTP surface. Everything is served under `/api/v1`; the Swagger UI
//! sits beside it.

pub mod auth;
pub mod envelope;
pub mod middleware;
pub mod rest;
pub mod state;

use std::sync::Arc;

use achievement_core::auth::permissions::{
    ACHIEVEMENTS_CREATE, ACHIEVEMENTS_DELETE, ACHIEVEMENTS_READ, ACHIEVEMENTS_UPDATE,
};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use middleware::{require_auth, require_permission};
pub use rest::ApiDoc;
pub use state::{AppState, Stores};

/// Builds the complete application router.
pub fn router(state: Arc<AppState>) -> Router {
    // Public routes (no token required)
    let public_routes = Router::new()
        .route("/health", get(rest::health_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/refresh", post(auth::refresh_handler));

    // Protected routes: bearer token, then the route's permission
    let protected_routes = Router::new()
        .route("/auth/profile", get(auth::profile_handler))
        .route(
            "/achievements",
            post(rest::create_achievement_handler).route_layer(
                axum_middleware::from_fn_with_state(
                    (state.clone(), ACHIEVEMENTS_CREATE),
                    require_permission,
                ),
            ),
        )
        .route(
            "/achievements",
            get(rest::list_achievements_handler).route_layer(
                axum_middleware::from_fn_with_state(
                    (state.clone(), ACHIEVEMENTS_READ),
                    require_permission,
                ),
            ),
        )
        .route(
            "/achievements/{id}",
            get(rest::get_achievement_handler).route_layer(
                axum_middleware::from_fn_with_state(
                    (state.clone(), ACHIEVEMENTS_READ),
                    require_permission,
                ),
            ),
        )
        .route(
            "/achievements/{id}",
            put(rest::update_achievement_handler).route_layer(
                axum_middleware::from_fn_with_state(
                    (state.clone(), ACHIEVEMENTS_UPDATE),
                    require_permission,
                ),
            ),
        )
        .route(
            "/achievements/{id}",
            delete(rest::delete_achievement_handler).route_layer(
                axum_middleware::from_fn_with_state(
                    (state.clone(), ACHIEVEMENTS_DELETE),
                    require_permission,
                ),
            ),
        )
        .route(
            "/achievements/{id}/submit",
            post(rest::submit_achievement_handler).route_layer(
                axum_middleware::from_fn_with_state(
                    (state.clone(), ACHIEVEMENTS_UPDATE),
                    require_permission,
                ),
            ),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    let cors = CorsLayer::new()
        .allow_origin(state.config.cors_origin.clone())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
