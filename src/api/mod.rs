mod admin;
pub mod auth;
mod catalog;
pub mod error;
mod extract;
mod registration;
mod todos;

use axum::{
    body::Body,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method, Request,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::info;

use crate::AppState;
use error::ApiError;

pub const API_PREFIX: &str = "/api";

/// Static asset service with single-page-application fallback
type SpaService = ServeDir<ServeFile>;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Public routes
    let public_routes = Router::new()
        .route("/api/sessions", get(catalog::list_sessions))
        .route("/api/speakers", get(catalog::list_speakers))
        .route("/api/register", post(registration::register))
        .route("/api/attendees/count", get(registration::attendee_count))
        .route("/api/admin/login", post(auth::login))
        .route("/api/todos", get(todos::list_todos).post(todos::create_todo))
        .route(
            "/api/todos/:id",
            put(todos::update_todo).delete(todos::delete_todo),
        );

    // Admin routes, protected by auth
    let admin_routes = Router::new()
        .route("/api/admin/attendees", get(admin::list_attendees))
        .route("/api/admin/stats", get(admin::stats))
        .route("/api/admin/speakers", post(admin::upsert_speaker))
        .route("/api/admin/sessions", post(admin::upsert_session))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    let spa = spa_service(&state.config.server.static_dir);

    Router::new()
        .route("/health", get(health_check))
        .merge(public_routes)
        .merge(admin_routes)
        .fallback(move |request: Request<Body>| fallback(spa.clone(), request))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Permissive cross-origin policy. Preflight `OPTIONS` requests are answered
/// here with an empty 200, before routing or authentication.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
}

fn spa_service(static_dir: &Path) -> Option<SpaService> {
    if !static_dir.is_dir() {
        info!(
            dir = %static_dir.display(),
            "Static directory not found, skipping static file serving"
        );
        return None;
    }

    info!(dir = %static_dir.display(), "Static file serving enabled");
    let index = static_dir.join("index.html");
    Some(ServeDir::new(static_dir).fallback(ServeFile::new(index)))
}

fn is_api_path(path: &str) -> bool {
    path == API_PREFIX
        || path
            .strip_prefix(API_PREFIX)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Anything the routes above did not match. API paths always get a real 404;
/// everything else is a static file or the SPA entry document.
async fn fallback(spa: Option<SpaService>, request: Request<Body>) -> Response {
    if is_api_path(request.uri().path()) {
        return ApiError::not_found("Not found").into_response();
    }

    match spa {
        Some(spa) => match spa.oneshot(request).await {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        },
        None => ApiError::not_found("Not found").into_response(),
    }
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AdminAuth;
    use crate::config::{AdminCredentials, Config};
    use crate::db::{
        Database, Document, DocumentStore, MemoryStore, Session, Speaker, StoreError, Todo,
    };
    use async_trait::async_trait;
    use axum::http::{header, HeaderMap, Method, StatusCode};
    use chrono::{DateTime, Duration, Utc};
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};

    const PASSWORD: &str = "correct horse battery staple";
    const SECRET: &str = "test-secret-that-is-at-least-32-characters-long";

    fn credentials() -> AdminCredentials {
        AdminCredentials {
            password: PASSWORD.to_string(),
            signing_secret: SECRET.to_string(),
            token_ttl: Duration::hours(24),
        }
    }

    fn state_with(db: Database, static_dir: PathBuf) -> Arc<AppState> {
        let mut config = Config::default();
        config.server.static_dir = static_dir;
        Arc::new(AppState::new(config, db, AdminAuth::new(&credentials())))
    }

    fn test_state() -> Arc<AppState> {
        state_with(
            Database::in_memory("test"),
            PathBuf::from("/nonexistent/static"),
        )
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, headers, body)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_request(method: Method, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn authed_get(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    async fn login(app: &Router) -> String {
        let (status, _, body) = send(
            app,
            json_request(Method::POST, "/api/admin/login", json!({"password": PASSWORD}), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    fn registration(name: &str, email: &str, designation: &str) -> Value {
        json!({"fullName": name, "email": email, "designation": designation})
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(test_state());
        let (status, _, body) = send(&app, get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("OK".into()));
    }

    #[tokio::test]
    async fn test_login_token_is_accepted_by_admin_routes() {
        let app = create_router(test_state());
        let token = login(&app).await;

        let (status, _, body) = send(&app, authed_get("/api/admin/stats", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));

        // raw token without the Bearer prefix
        let request = Request::builder()
            .uri("/api/admin/attendees")
            .header(header::AUTHORIZATION, token)
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_login_with_wrong_password() {
        let app = create_router(test_state());
        for password in ["wrong", ""] {
            let (status, _, body) = send(
                &app,
                json_request(Method::POST, "/api/admin/login", json!({"password": password}), None),
            )
            .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert!(body.get("token").is_none());
            assert_eq!(body["error"]["message"], "Unauthorized");
        }
    }

    #[tokio::test]
    async fn test_login_with_malformed_body() {
        let app = create_router(test_state());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/admin/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("invalid json"))
            .unwrap();
        let (status, _, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_body_without_json_content_type_is_bad_request() {
        let app = create_router(test_state());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/register")
            .body(Body::from(registration("Ada", "ada@example.com", "Engineer").to_string()))
            .unwrap();
        let (status, _, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_routes_require_token() {
        let state = test_state();
        let app = create_router(state.clone());

        for uri in ["/api/admin/attendees", "/api/admin/stats"] {
            let (status, _, body) = send(&app, get_request(uri)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
            assert_eq!(body["error"]["message"], "Unauthorized");
        }

        let (status, _, _) = send(
            &app,
            json_request(Method::POST, "/api/admin/speakers", json!({"name": "Ada"}), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _, _) = send(
            &app,
            json_request(Method::POST, "/api/admin/sessions", json!({"title": "Intro"}), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        assert_eq!(state.db.speakers().count().await.unwrap(), 0);
        assert_eq!(state.db.sessions().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejected_request_never_reaches_handler() {
        let state = test_state();
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();

        let app = Router::new()
            .route(
                "/api/admin/guarded",
                get(move || {
                    let flag = flag.clone();
                    async move {
                        flag.store(true, Ordering::SeqCst);
                        "reached"
                    }
                }),
            )
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::require_admin,
            ))
            .with_state(state.clone());

        let (status, _, _) = send(&app, get_request("/api/admin/guarded")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(!called.load(Ordering::SeqCst));

        let (status, _, _) = send(&app, authed_get("/api/admin/guarded", "garbage")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(!called.load(Ordering::SeqCst));

        let token = state.auth.login(PASSWORD).unwrap().token;
        let (status, _, _) = send(&app, authed_get("/api/admin/guarded", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let state = test_state();
        let app = create_router(state.clone());

        let expired = state
            .auth
            .issue_at(Utc::now() - Duration::hours(48))
            .unwrap()
            .token;
        let (status, _, _) = send(&app, authed_get("/api/admin/stats", &expired)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_rejected() {
        let app = create_router(test_state());
        let other = AdminAuth::new(&AdminCredentials {
            signing_secret: "another-secret-that-is-at-least-32-characters".into(),
            ..credentials()
        });
        let token = other.login(PASSWORD).unwrap().token;
        let (status, _, _) = send(&app, authed_get("/api/admin/stats", &token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_then_duplicate_email() {
        let state = test_state();
        state.db.prepare().await.unwrap();
        let app = create_router(state.clone());

        let (status, _, body) = send(
            &app,
            json_request(
                Method::POST,
                "/api/register",
                registration("Ada Lovelace", "ada@example.com", "Engineer"),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Registration successful");
        assert!(!body["id"].as_str().unwrap().is_empty());

        let (status, _, body) = send(
            &app,
            json_request(
                Method::POST,
                "/api/register",
                registration("Someone Else", "ada@example.com", "Manager"),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["message"], "Email already registered");

        assert_eq!(state.db.attendees().count().await.unwrap(), 1);

        let (status, _, body) = send(&app, get_request("/api/attendees/count")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"count": 1}));
    }

    #[tokio::test]
    async fn test_register_missing_fields() {
        let state = test_state();
        let app = create_router(state.clone());

        let cases = [
            json!({"email": "a@example.com", "designation": "Engineer"}),
            json!({"fullName": "Ada", "designation": "Engineer"}),
            json!({"fullName": "Ada", "email": "a@example.com"}),
            json!({"fullName": "  ", "email": "a@example.com", "designation": "Engineer"}),
        ];

        for payload in cases {
            let (status, _, body) = send(
                &app,
                json_request(Method::POST, "/api/register", payload.clone(), None),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", payload);
            assert_eq!(body["error"]["code"], "validation_error");
        }

        assert_eq!(state.db.attendees().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_register_wrong_method() {
        let app = create_router(test_state());
        let (status, _, _) = send(&app, get_request("/api/register")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_stats_histogram_and_attendee_list() {
        let state = test_state();
        let app = create_router(state.clone());

        for (name, email, designation) in [
            ("Ada", "ada@example.com", "Engineer"),
            ("Grace", "grace@example.com", "Engineer"),
            ("Linus", "linus@example.com", "Manager"),
        ] {
            let (status, _, _) = send(
                &app,
                json_request(Method::POST, "/api/register", registration(name, email, designation), None),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let token = login(&app).await;
        let (status, _, body) = send(&app, authed_get("/api/admin/stats", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"Engineer": 2, "Manager": 1}));

        let (status, _, body) = send(&app, authed_get("/api/admin/attendees", &token)).await;
        assert_eq!(status, StatusCode::OK);
        let attendees = body.as_array().unwrap();
        assert_eq!(attendees.len(), 3);
        assert!(attendees.iter().all(|a| !a["id"].as_str().unwrap().is_empty()));
        assert!(attendees.iter().all(|a| a["createdAt"].is_string()));
    }

    #[tokio::test]
    async fn test_speaker_upsert() {
        let state = test_state();
        let app = create_router(state.clone());
        let token = login(&app).await;

        let (status, _, created) = send(
            &app,
            json_request(
                Method::POST,
                "/api/admin/speakers",
                json!({"name": "Ada", "bio": "First programmer", "photoURL": "ada.png"}),
                Some(&token),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();
        assert!(!id.is_empty());
        assert_eq!(created["photoURL"], "ada.png");

        let (status, _, updated) = send(
            &app,
            json_request(
                Method::POST,
                "/api/admin/speakers",
                json!({"id": id, "name": "Ada Lovelace"}),
                Some(&token),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["id"], id.as_str());
        assert_eq!(updated["name"], "Ada Lovelace");

        // full replacement: omitted fields are cleared
        let stored = state.db.speakers().get(&id).await.unwrap().unwrap();
        assert_eq!(stored.bio, "");
        assert_eq!(state.db.speakers().count().await.unwrap(), 1);

        let (status, _, body) = send(
            &app,
            json_request(Method::POST, "/api/admin/speakers", json!({"bio": "x"}), Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Name is required");

        let (status, _, body) = send(&app, get_request("/api/speakers")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_session_upsert_requires_title() {
        let state = test_state();
        let app = create_router(state.clone());
        let token = login(&app).await;

        let (status, _, _) = send(
            &app,
            json_request(
                Method::POST,
                "/api/admin/sessions",
                json!({"description": "no title"}),
                Some(&token),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, created) = send(
            &app,
            json_request(
                Method::POST,
                "/api/admin/sessions",
                json!({"title": "Keynote", "time": "09:00", "speakerId": ""}),
                Some(&token),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["title"], "Keynote");
        assert!(created.get("speakerId").is_none());
        assert_eq!(state.db.sessions().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_session_upsert_replaces_whole_session() {
        let state = test_state();
        let app = create_router(state.clone());
        let token = login(&app).await;

        let (status, _, created) = send(
            &app,
            json_request(
                Method::POST,
                "/api/admin/sessions",
                json!({
                    "title": "Keynote",
                    "description": "Opening talk",
                    "time": "09:00",
                    "speakerId": "speaker-1"
                }),
                Some(&token),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();

        let (status, _, updated) = send(
            &app,
            json_request(
                Method::POST,
                "/api/admin/sessions",
                json!({"id": id, "title": "Closing keynote"}),
                Some(&token),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["id"], id.as_str());
        assert_eq!(updated["title"], "Closing keynote");

        let stored = state.db.sessions().get(&id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Closing keynote");
        assert_eq!(stored.description, "");
        assert_eq!(stored.time, "");
        assert!(stored.speaker_id.is_none());
        assert_eq!(state.db.sessions().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_with_unknown_client_id_creates() {
        let state = test_state();
        let app = create_router(state.clone());
        let token = login(&app).await;

        let (status, _, speaker) = send(
            &app,
            json_request(
                Method::POST,
                "/api/admin/speakers",
                json!({"id": "grace", "name": "Grace"}),
                Some(&token),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(speaker["id"], "grace");

        let (status, _, session) = send(
            &app,
            json_request(
                Method::POST,
                "/api/admin/sessions",
                json!({"id": "opening", "title": "Opening", "speakerId": "grace"}),
                Some(&token),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(session["id"], "opening");

        assert!(state.db.speakers().get("grace").await.unwrap().is_some());
        assert!(state.db.sessions().get("opening").await.unwrap().is_some());

        // the same ids again are replacements
        let (status, _, _) = send(
            &app,
            json_request(
                Method::POST,
                "/api/admin/speakers",
                json!({"id": "grace", "name": "Grace Hopper"}),
                Some(&token),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    fn session(title: &str, speaker_id: Option<&str>) -> Session {
        Session {
            id: String::new(),
            title: title.to_string(),
            description: String::new(),
            time: "10:00".to_string(),
            speaker_id: speaker_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_session_listing_joins_speakers() {
        let state = test_state();
        let speaker = state
            .db
            .speakers()
            .add(&Speaker {
                id: String::new(),
                name: "Grace".into(),
                bio: "Admiral".into(),
                photo_url: String::new(),
            })
            .await
            .unwrap();

        let sessions = state.db.sessions();
        let with = sessions.add(&session("With speaker", Some(&speaker.id))).await.unwrap();
        let without = sessions.add(&session("No speaker", None)).await.unwrap();
        let dangling = sessions.add(&session("Dangling", Some("missing"))).await.unwrap();

        let app = create_router(state);
        let (status, _, body) = send(&app, get_request("/api/sessions")).await;
        assert_eq!(status, StatusCode::OK);

        let listed = body.as_array().unwrap();
        assert_eq!(listed.len(), 3);
        let find = |id: &str| listed.iter().find(|s| s["id"] == id).unwrap().clone();

        let joined = find(&with.id);
        assert_eq!(joined["speaker"]["id"], speaker.id.as_str());
        assert_eq!(joined["speaker"]["name"], "Grace");
        assert_eq!(joined["speakerId"], speaker.id.as_str());

        assert!(find(&without.id).get("speaker").is_none());
        assert!(find(&dangling.id).get("speaker").is_none());
    }

    /// Store whose speaker lookups always fail
    struct BrokenSpeakers(MemoryStore);

    #[async_trait]
    impl DocumentStore for BrokenSpeakers {
        async fn create(&self, c: &str, id: &str, doc: Document) -> Result<(), StoreError> {
            self.0.create(c, id, doc).await
        }
        async fn put(&self, c: &str, id: &str, doc: Document) -> Result<bool, StoreError> {
            self.0.put(c, id, doc).await
        }
        async fn get(&self, c: &str, id: &str) -> Result<Option<Document>, StoreError> {
            if c.ends_with("/speakers") {
                return Err(StoreError::Backend("speaker lookup unavailable".into()));
            }
            self.0.get(c, id).await
        }
        async fn list(&self, c: &str) -> Result<Vec<(String, Document)>, StoreError> {
            self.0.list(c).await
        }
        async fn find_one(
            &self,
            c: &str,
            field: &str,
            value: &Value,
        ) -> Result<Option<(String, Document)>, StoreError> {
            self.0.find_one(c, field, value).await
        }
        async fn count(&self, c: &str) -> Result<u64, StoreError> {
            self.0.count(c).await
        }
        async fn delete(&self, c: &str, id: &str) -> Result<bool, StoreError> {
            self.0.delete(c, id).await
        }
        async fn ensure_unique(&self, c: &str, field: &str) -> Result<(), StoreError> {
            self.0.ensure_unique(c, field).await
        }
    }

    #[tokio::test]
    async fn test_failed_speaker_lookup_does_not_fail_listing() {
        let db = Database::new(Arc::new(BrokenSpeakers(MemoryStore::new())), "test");
        db.sessions()
            .add(&session("Keynote", Some("speaker-1")))
            .await
            .unwrap();

        let app = create_router(state_with(db, PathBuf::from("/nonexistent")));
        let (status, _, body) = send(&app, get_request("/api/sessions")).await;
        assert_eq!(status, StatusCode::OK);
        let listed = body.as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["title"], "Keynote");
        assert!(listed[0].get("speaker").is_none());
    }

    #[tokio::test]
    async fn test_todo_partial_update() {
        let state = test_state();
        let long_ago = Utc::now() - Duration::hours(2);
        let stored = state
            .db
            .todos()
            .add(&Todo::new("Write talk".into(), "slides".into(), long_ago))
            .await
            .unwrap();

        let app = create_router(state.clone());
        let (status, _, body) = send(
            &app,
            json_request(
                Method::PUT,
                &format!("/api/todos/{}", stored.id),
                json!({"completed": true}),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["completed"], true);
        assert_eq!(body["title"], "Write talk");
        assert_eq!(body["description"], "slides");

        let updated_at: DateTime<Utc> = serde_json::from_value(body["updatedAt"].clone()).unwrap();
        assert!(updated_at > long_ago);

        let persisted = state.db.todos().get(&stored.id).await.unwrap().unwrap();
        assert!(persisted.completed);
        assert_eq!(persisted.title, "Write talk");
        assert_eq!(persisted.created_at, stored.created_at);
        assert!(persisted.updated_at > stored.updated_at);
    }

    #[tokio::test]
    async fn test_todo_lifecycle() {
        let state = test_state();
        let app = create_router(state.clone());

        let (status, _, _) = send(
            &app,
            json_request(Method::POST, "/api/todos", json!({"description": "no title"}), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, first) = send(
            &app,
            json_request(Method::POST, "/api/todos", json!({"title": "First"}), None),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(first["completed"], false);
        let first_id = first["id"].as_str().unwrap().to_string();

        let (status, _, _) = send(
            &app,
            json_request(Method::POST, "/api/todos", json!({"title": "Second"}), None),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _, body) = send(&app, get_request("/api/todos")).await;
        assert_eq!(status, StatusCode::OK);
        let titles: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["Second", "First"]);

        let delete = Request::builder()
            .method(Method::DELETE)
            .uri(format!("/api/todos/{}", first_id))
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&app, delete).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);

        let delete_again = Request::builder()
            .method(Method::DELETE)
            .uri(format!("/api/todos/{}", first_id))
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(&app, delete_again).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) = send(
            &app,
            json_request(Method::PUT, "/api/todos/missing", json!({"title": "x"}), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(state.db.todos().count().await.unwrap(), 1);
    }

    /// Comma separated header value as a sorted, lowercased list
    fn header_list(headers: &HeaderMap, name: header::HeaderName) -> Vec<String> {
        let mut items: Vec<String> = headers[name]
            .to_str()
            .unwrap()
            .split(',')
            .map(|item| item.trim().to_ascii_lowercase())
            .collect();
        items.sort();
        items
    }

    #[tokio::test]
    async fn test_options_preflight_on_every_route() {
        let state = test_state();
        let app = create_router(state.clone());

        let routes = [
            "/api/sessions",
            "/api/speakers",
            "/api/register",
            "/api/attendees/count",
            "/api/admin/login",
            "/api/admin/attendees",
            "/api/admin/stats",
            "/api/admin/speakers",
            "/api/admin/sessions",
            "/api/todos",
            "/api/todos/some-id",
        ];

        for uri in routes {
            let request = Request::builder()
                .method(Method::OPTIONS)
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let (status, headers, body) = send(&app, request).await;
            assert_eq!(status, StatusCode::OK, "{}", uri);
            assert_eq!(body, Value::Null, "{}", uri);
            assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
            assert_eq!(
                header_list(&headers, header::ACCESS_CONTROL_ALLOW_METHODS),
                vec!["delete", "get", "options", "post", "put"],
                "{}",
                uri
            );
            assert_eq!(
                header_list(&headers, header::ACCESS_CONTROL_ALLOW_HEADERS),
                vec!["authorization", "content-type"],
                "{}",
                uri
            );
        }

        assert_eq!(state.db.attendees().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cors_headers_on_regular_and_error_responses() {
        let app = create_router(test_state());

        let (_, headers, _) = send(&app, get_request("/api/speakers")).await;
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

        let (status, headers, _) = send(&app, get_request("/api/admin/stats")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[test]
    fn test_is_api_path() {
        assert!(is_api_path("/api"));
        assert!(is_api_path("/api/"));
        assert!(is_api_path("/api/unknown"));
        assert!(!is_api_path("/apiary"));
        assert!(!is_api_path("/"));
        assert!(!is_api_path("/dashboard/api"));
    }

    #[tokio::test]
    async fn test_static_files_with_spa_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>entry</html>").unwrap();
        std::fs::create_dir(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets/app.js"), "console.log(1)").unwrap();

        let app = create_router(state_with(
            Database::in_memory("test"),
            dir.path().to_path_buf(),
        ));

        let (status, _, body) = send(&app, get_request("/assets/app.js")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("console.log(1)".into()));

        let (status, _, body) = send(&app, get_request("/admin/dashboard")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("<html>entry</html>".into()));

        let (status, _, body) = send(&app, get_request("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("<html>entry</html>".into()));

        for uri in ["/api/unknown", "/api", "/api/admin/nothing"] {
            let (status, _, body) = send(&app, get_request(uri)).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
            assert_eq!(body["error"]["code"], "not_found");
        }
    }

    #[tokio::test]
    async fn test_without_static_dir_unknown_paths_are_404() {
        let app = create_router(test_state());
        let (status, _, _) = send(&app, get_request("/some/page")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
