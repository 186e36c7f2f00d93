//! End-to-end tests: the real router over the in-memory store, driven with
//! `oneshot` requests.

use std::sync::Arc;

use achievement_core::memory::MemoryStore;
use achievement_core::RolePermissions;
use api_lib::config::Config;
use api_lib::web::{self, AppState, Stores};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "integration-secret-key-with-32-plus-bytes";
const PASSWORD: &str = "rahasia123";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
}

async fn spawn_app() -> TestApp {
    let config = Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://unused/prestasi".to_string()),
        "JWT_SECRET" => Some(SECRET.to_string()),
        _ => None,
    })
    .expect("test config");

    let store = Arc::new(MemoryStore::new());
    for (username, role) in [
        ("budi", "Mahasiswa"),
        ("citra", "Mahasiswa"),
        ("pak_dosen", "Dosen Wali"),
    ] {
        let identity = store.add_identity(username, role, PASSWORD).await.unwrap();
        if role == "Mahasiswa" {
            store.add_student(identity.id).await;
        }
    }

    let state = AppState::new(
        Arc::new(config),
        RolePermissions::defaults(),
        Stores {
            identities: store.clone(),
            students: store.clone(),
            references: store.clone(),
            details: store.clone(),
        },
    );

    TestApp {
        router: web::router(Arc::new(state)),
        store,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .expect("request");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse JSON")
        };
        (status, json)
    }

    async fn login(&self, username: &str) -> Value {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "username": username, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login {username}: {body}");
        body["data"].clone()
    }

    async fn token(&self, username: &str) -> String {
        self.login(username).await["token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    async fn create(&self, token: &str, title: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/achievements",
                Some(token),
                Some(json!({
                    "achievementType": "Competition",
                    "title": title,
                    "description": "National level",
                    "details": { "rank": 1, "organizer": "Kemendikbud" },
                    "tags": ["hackathon", "team"]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn health_is_public() {
    let app = spawn_app().await;
    let (status, body) = app.send(Method::GET, "/api/v1/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn draft_lifecycle_over_http() {
    let app = spawn_app().await;
    let token = app.token("budi").await;

    let id = app.create(&token, "Hackathon Winner").await;
    let uri = format!("/api/v1/achievements/{id}");

    let (status, body) = app.send(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "draft");
    assert_eq!(body["data"]["title"], "Hackathon Winner");
    assert_eq!(body["data"]["achievement_type"], "Competition");
    assert_eq!(body["data"]["details"]["organizer"], "Kemendikbud");
    assert_eq!(body["data"]["tags"], json!(["hackathon", "team"]));
    assert_eq!(body["data"]["points"], 0);

    let (status, _) = app
        .send(
            Method::PUT,
            &uri,
            Some(&token),
            Some(json!({ "achievement_type": "Competition", "title": "Hackathon Champion" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(Method::POST, &format!("{uri}/submit"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "submitted");

    let (status, body) = app
        .send(
            Method::PUT,
            &uri,
            Some(&token),
            Some(json!({ "achievementType": "Competition", "title": "Too late" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["data"]["current_status"], "submitted");

    let (status, body) = app.send(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["current_status"], "submitted");

    let (_, body) = app.send(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(body["data"]["status"], "submitted");
    assert_eq!(body["data"]["title"], "Hackathon Champion");
}

#[tokio::test]
async fn deleted_draft_disappears() {
    let app = spawn_app().await;
    let token = app.token("budi").await;
    let id = app.create(&token, "Seminar Speaker").await;
    let uri = format!("/api/v1/achievements/{id}");

    let (status, _) = app.send(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = app
        .send(Method::GET, "/api/v1/achievements", Some(&token), None)
        .await;
    assert_eq!(body["data"], json!([]));
    assert_eq!(app.store.reference_count().await, 1);

    let (status, body) = app.send(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn other_students_draft_is_off_limits() {
    let app = spawn_app().await;
    let budi = app.token("budi").await;
    let citra = app.token("citra").await;
    let id = app.create(&budi, "Hackathon Winner").await;
    let uri = format!("/api/v1/achievements/{id}");

    let (status, _) = app
        .send(
            Method::PUT,
            &uri,
            Some(&citra),
            Some(json!({ "achievementType": "Competition", "title": "Mine now" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .send(Method::POST, &format!("{uri}/submit"), Some(&citra), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = app.send(Method::GET, &uri, Some(&budi), None).await;
    assert_eq!(body["data"]["title"], "Hackathon Winner");
    assert_eq!(body["data"]["status"], "draft");
}

#[tokio::test]
async fn advisor_role_cannot_author_achievements() {
    let app = spawn_app().await;
    let token = app.token("pak_dosen").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/achievements",
            Some(&token),
            Some(json!({ "achievementType": "Competition", "title": "Not mine to write" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    // Holds achievements:read, but has no student profile to read from.
    let (status, _) = app
        .send(Method::GET, "/api/v1/achievements", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(app.store.detail_count().await, 0);
}

#[tokio::test]
async fn protected_routes_need_a_valid_access_token() {
    let app = spawn_app().await;
    let tokens = app.login("budi").await;
    let refresh = tokens["refresh_token"].as_str().unwrap();

    for token in [None, Some("not-a-jwt"), Some(refresh)] {
        let (status, body) = app
            .send(Method::GET, "/api/v1/achievements", token, None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{token:?}");
        assert_eq!(body["success"], false);
    }

    let raw = Request::builder()
        .uri("/api/v1/auth/profile")
        .header(header::AUTHORIZATION, "Token abc")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(raw).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_failures_are_mapped() {
    let app = spawn_app().await;

    let (wrong_status, wrong) = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": "budi", "password": "salah" })),
        )
        .await;
    let (unknown_status, unknown) = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": "nobody", "password": PASSWORD })),
        )
        .await;
    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong["message"], unknown["message"]);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": "", "password": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let disabled = app.store.add_identity("lama", "Mahasiswa", PASSWORD).await.unwrap();
    app.store.set_active(disabled.id, false).await;
    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": "lama@kampus.ac.id", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn login_response_never_leaks_the_hash() {
    let app = spawn_app().await;
    let data = app.login("budi").await;

    assert_eq!(data["user"]["username"], "budi");
    assert_eq!(data["user"]["role"], "Mahasiswa");
    assert!(data["user"].get("password_hash").is_none());
    assert!(data["refresh_token"].is_string());
}

#[tokio::test]
async fn refresh_token_yields_working_access_token() {
    let app = spawn_app().await;
    let tokens = app.login("budi").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": tokens["refresh_token"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let fresh = body["data"]["token"].as_str().unwrap();

    let (status, body) = app
        .send(Method::GET, "/api/v1/auth/profile", Some(fresh), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "budi");
    assert!(body["data"]["permissions"]
        .as_array()
        .unwrap()
        .contains(&json!("achievements:create")));

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": tokens["token"] })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_input_is_a_bad_request() {
    let app = spawn_app().await;
    let token = app.token("budi").await;

    let (status, _) = app
        .send(Method::GET, "/api/v1/achievements/not-a-uuid", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/achievements",
            Some(&token),
            Some(json!({ "achievementType": "Competition", "title": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/achievements",
            Some(&token),
            Some(json!({ "achievementType": "Competition", "title": "Ok", "tags": "not-a-list" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = format!("/api/v1/achievements/{}", Uuid::new_v4());
    let (status, _) = app.send(Method::GET, &missing, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
