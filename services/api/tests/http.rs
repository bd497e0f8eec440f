//! End-to-end tests of the HTTP surface over the in-memory ports.
//!
//! Each test builds the full router (auth middleware, prefix, error mapping) and drives it
//! with `tower::ServiceExt::oneshot`.

use api_lib::config::Config;
use api_lib::web::{router, state::AppState};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use bookflow_core::memory::{
    InMemoryFileStorage, InMemoryStore, ManualClock, RecordingPublisher, StaticMetadata,
};
use bookflow_core::{BookMetadata, DomainEvent};
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

const BOUNDARY: &str = "XBOOKFLOWBOUNDARY";
const DUNE_ISBN: &str = "9780441013593";

struct TestApp {
    router: Router,
    storage: Arc<InMemoryFileStorage>,
    metadata: Arc<StaticMetadata>,
    events: Arc<RecordingPublisher>,
    clock: Arc<ManualClock>,
}

fn test_config(overrides: &[(&str, &str)]) -> Config {
    Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://unused/bookflow".to_string()),
        _ => overrides
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.to_string()),
    })
    .expect("test config should load")
}

fn setup_app() -> TestApp {
    setup_app_with(test_config(&[]))
}

fn setup_app_with(config: Config) -> TestApp {
    let storage = Arc::new(InMemoryFileStorage::new());
    let metadata = Arc::new(StaticMetadata::new().with_volume(
        DUNE_ISBN,
        BookMetadata {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            pages: Some(612),
            isbn: Some(DUNE_ISBN.to_string()),
            ..Default::default()
        },
    ));
    let events = Arc::new(RecordingPublisher::new());
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap());

    let state = Arc::new(AppState::new(
        Arc::new(InMemoryStore::new()),
        storage.clone(),
        metadata.clone(),
        events.clone(),
        clock.clone(),
        Arc::new(config),
    ));

    TestApp {
        router: router(state).expect("router should build"),
        storage,
        metadata,
        events,
        clock,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value, axum::http::HeaderMap) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body, headers)
    }

    async fn json(&self, method: &str, uri: &str, cookie: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let (status, body, _) = self.send(builder.body(Body::from(body.to_string())).unwrap()).await;
        (status, body)
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let (status, body, _) = self.send(builder.body(Body::empty()).unwrap()).await;
        (status, body)
    }

    async fn delete(&self, uri: &str, cookie: &str) -> StatusCode {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        self.send(request).await.0
    }

    /// Registers a user and returns the `session=...` cookie pair.
    async fn register(&self, email: &str) -> String {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/users/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "email": email, "password": "correct horse" }).to_string()))
            .unwrap();
        let (status, _, headers) = self.send(request).await;
        assert_eq!(status, StatusCode::CREATED);
        session_cookie(&headers)
    }

    async fn upload(
        &self,
        uri: &str,
        cookie: &str,
        pages: &str,
        content_type: &str,
        file: &[u8],
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(book_form(pages, content_type, file)))
            .unwrap();
        let (status, body, _) = self.send(request).await;
        (status, body)
    }
}

fn session_cookie(headers: &axum::http::HeaderMap) -> String {
    headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .expect("response should set a session cookie")
        .to_string()
}

fn book_form(pages: &str, content_type: &str, file: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in [("title", "Dune"), ("author", "Frank Herbert"), ("pages", pages)] {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"dune.pdf\"\r\nContent-Type: {}\r\n\r\n",
            BOUNDARY, content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

// =============================================================================
// Service Endpoints
// =============================================================================

#[tokio::test]
async fn health_and_root_need_no_auth() {
    let app = setup_app();

    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.get("/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "BookFlow API");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn openapi_server_follows_configured_prefix() {
    let app = setup_app();
    let (status, doc) = app.get("/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["servers"][0]["url"], "/api/v1");

    let app = setup_app_with(test_config(&[("API_PREFIX", "/bookflow/")]));
    let (_, doc) = app.get("/api-docs/openapi.json", None).await;
    assert_eq!(doc["servers"][0]["url"], "/bookflow");

    let (status, _) = app.get("/bookflow/users/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .json(
            "POST",
            "/bookflow/users/register",
            None,
            json!({"email": "prefix@example.com", "password": "hunter22"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.get("/api/v1/users/me", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Identity
// =============================================================================

#[tokio::test]
async fn session_cookie_grants_access_until_logout() {
    let app = setup_app();

    let (status, body) = app.get("/api/v1/users/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let cookie = app.register("reader@example.com").await;
    let (status, body) = app.get("/api/v1/users/me", Some(cookie.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "reader@example.com");

    let (status, _) = app.json("POST", "/api/v1/users/logout", Some(cookie.as_str()), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/api/v1/users/me", Some(cookie.as_str())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_email_conflicts_and_bad_password_is_rejected() {
    let app = setup_app();
    app.register("reader@example.com").await;

    let (status, _) = app
        .json(
            "POST",
            "/api/v1/users/register",
            None,
            json!({ "email": "Reader@Example.com", "password": "another" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .json(
            "POST",
            "/api/v1/users/login",
            None,
            json!({ "email": "reader@example.com", "password": "wrong" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/users/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": "reader@example.com", "password": "correct horse" }).to_string(),
        ))
        .unwrap();
    let (status, body, headers) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "reader@example.com");
    assert!(session_cookie(&headers).starts_with("session="));
}

// =============================================================================
// Library
// =============================================================================

#[tokio::test]
async fn adding_same_isbn_twice_conflicts() {
    let app = setup_app();
    let cookie = app.register("reader@example.com").await;

    let (status, body) = app
        .json("POST", "/api/v1/users/me/library/isbn", Some(cookie.as_str()), json!({ "isbn": DUNE_ISBN }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "planned");
    assert_eq!(body["book"]["title"], "Dune");
    assert_eq!(body["book"]["pages"], 612);
    assert_eq!(body["book"]["has_pdf"], false);

    let (status, body) = app
        .json(
            "POST",
            "/api/v1/users/me/library/isbn",
            Some(cookie.as_str()),
            json!({ "isbn": DUNE_ISBN, "status": "reading" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Book already in your library");
    // The second call reused the stored book.
    assert_eq!(app.metadata.lookup_count(), 1);

    let (status, body) = app.get("/api/v1/users/me/library", Some(cookie.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn unknown_isbn_is_not_found() {
    let app = setup_app();
    let cookie = app.register("reader@example.com").await;

    let (status, _) = app
        .json("POST", "/api/v1/users/me/library/isbn", Some(cookie.as_str()), json!({ "isbn": "0000000000" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_update_filter_and_remove() {
    let app = setup_app();
    let cookie = app.register("reader@example.com").await;
    let (_, entry) = app
        .json("POST", "/api/v1/users/me/library/isbn", Some(cookie.as_str()), json!({ "isbn": DUNE_ISBN }))
        .await;
    let book_id = entry["book_id"].as_str().unwrap().to_string();

    let (status, body) = app
        .json(
            "PUT",
            &format!("/api/v1/users/me/library/{}/status", book_id),
            Some(cookie.as_str()),
            json!({ "status": "finished" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "finished");

    let (_, body) = app.get("/api/v1/users/me/library?status=reading", Some(cookie.as_str())).await;
    assert_eq!(body["total"], 0);
    let (_, body) = app.get("/api/v1/users/me/library?status=finished", Some(cookie.as_str())).await;
    assert_eq!(body["total"], 1);

    let uri = format!("/api/v1/users/me/library/{}", book_id);
    assert_eq!(app.delete(&uri, &cookie).await, StatusCode::NO_CONTENT);
    assert_eq!(app.delete(&uri, &cookie).await, StatusCode::NOT_FOUND);
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn public_books_cannot_be_deleted() {
    let app = setup_app();
    let cookie = app.register("reader@example.com").await;

    let (status, book) = app
        .upload("/api/v1/books/public", &cookie, "612", "application/pdf", b"%PDF-1.4 dune")
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(book["is_public"], true);
    assert_eq!(book["has_pdf"], true);

    let (status, body) = app.get("/api/v1/books/public?skip=0&limit=10", Some(cookie.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let uri = format!("/api/v1/books/{}", book["id"].as_str().unwrap());
    assert_eq!(app.delete(&uri, &cookie).await, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn private_upload_rejects_non_pdf_before_storage() {
    let app = setup_app();
    let cookie = app.register("reader@example.com").await;

    let (status, body) = app
        .upload("/api/v1/books/private", &cookie, "100", "text/plain", b"plain text")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Only PDF files are allowed");
    assert_eq!(app.storage.put_attempts(), 0);
}

#[tokio::test]
async fn private_book_is_readable_and_deletable_only_by_owner() {
    let app = setup_app();
    let owner = app.register("owner@example.com").await;
    let other = app.register("other@example.com").await;

    let (status, book) = app
        .upload("/api/v1/books/private", &owner, "100", "application/pdf", b"%PDF-1.4 mine")
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let book_id = book["id"].as_str().unwrap().to_string();
    let file_path = book["file_path"].as_str().unwrap().to_string();
    assert!(app.storage.contains(&file_path));

    // The upload lands in the owner's library as planned.
    let (_, library) = app.get("/api/v1/users/me/library", Some(owner.as_str())).await;
    assert_eq!(library["total"], 1);
    assert_eq!(library["books"][0]["status"], "planned");

    let read_uri = format!("/api/v1/books/{}/read", book_id);
    let request = Request::builder()
        .uri(&read_uri)
        .header(header::COOKIE, &owner)
        .body(Body::empty())
        .unwrap();
    let (status, body, headers) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/pdf");
    assert_eq!(body, Value::String("%PDF-1.4 mine".to_string()));

    let (status, _) = app.get(&read_uri, Some(other.as_str())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let uri = format!("/api/v1/books/{}", book_id);
    assert_eq!(app.delete(&uri, &other).await, StatusCode::FORBIDDEN);
    assert_eq!(app.delete(&uri, &owner).await, StatusCode::NO_CONTENT);
    assert!(!app.storage.contains(&file_path));

    let (status, _) = app.get(&uri, Some(owner.as_str())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, library) = app.get("/api/v1/users/me/library", Some(owner.as_str())).await;
    assert_eq!(library["total"], 0);
}

#[tokio::test]
async fn storage_outage_is_service_unavailable() {
    let app = setup_app();
    let cookie = app.register("reader@example.com").await;
    app.storage.set_offline(true);

    let (status, _) = app
        .upload("/api/v1/books/public", &cookie, "100", "application/pdf", b"%PDF-1.4")
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// =============================================================================
// Reading
// =============================================================================

#[tokio::test]
async fn progress_reports_percentage_and_publishes_events() {
    let app = setup_app();
    let cookie = app.register("reader@example.com").await;
    let (_, book) = app
        .upload("/api/v1/books/public", &cookie, "100", "application/pdf", b"%PDF-1.4")
        .await;
    let uri = format!("/api/v1/reading/progress/{}", book["id"].as_str().unwrap());

    let (status, _) = app.get(&uri, Some(cookie.as_str())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.json("PUT", &uri, Some(cookie.as_str()), json!({ "current_page": 50 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_page"], 50);
    assert_eq!(body["progress_percentage"], 50.0);

    let (status, _) = app.json("PUT", &uri, Some(cookie.as_str()), json!({ "current_page": 101 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.json("PUT", &uri, Some(cookie.as_str()), json!({ "current_page": 100 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["progress_percentage"], 100.0);

    let events = app.events.events();
    assert_eq!(events.len(), 3);
    assert!(matches!(events[2], DomainEvent::BookFinished { .. }));

    let (_, list) = app.get("/api/v1/reading/progress", Some(cookie.as_str())).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn progress_on_unheld_private_book_is_forbidden() {
    let app = setup_app();
    let owner = app.register("owner@example.com").await;
    let other = app.register("other@example.com").await;
    let (_, book) = app
        .upload("/api/v1/books/private", &owner, "100", "application/pdf", b"%PDF-1.4")
        .await;

    let uri = format!("/api/v1/reading/progress/{}", book["id"].as_str().unwrap());
    let (status, _) = app.json("PUT", &uri, Some(other.as_str()), json!({ "current_page": 1 })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn streak_follows_daily_goal_across_days() {
    let app = setup_app();
    let cookie = app.register("reader@example.com").await;
    let (_, book) = app
        .upload("/api/v1/books/public", &cookie, "300", "application/pdf", b"%PDF-1.4")
        .await;
    let uri = format!("/api/v1/reading/progress/{}", book["id"].as_str().unwrap());

    let (status, habit) = app.get("/api/v1/reading/habit", Some(cookie.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(habit["daily_goal_pages"], 10);
    assert_eq!(habit["current_streak"], 0);

    let (status, habit) = app
        .json("PUT", "/api/v1/reading/habit", Some(cookie.as_str()), json!({ "daily_goal_pages": 20 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(habit["daily_goal_pages"], 20);

    app.json("PUT", &uri, Some(cookie.as_str()), json!({ "current_page": 10 })).await;
    let (_, habit) = app.get("/api/v1/reading/habit", Some(cookie.as_str())).await;
    assert_eq!(habit["current_streak"], 0);

    app.json("PUT", &uri, Some(cookie.as_str()), json!({ "current_page": 25 })).await;
    let (_, habit) = app.get("/api/v1/reading/habit", Some(cookie.as_str())).await;
    assert_eq!(habit["current_streak"], 1);

    app.clock.advance(Duration::days(1));
    app.json("PUT", &uri, Some(cookie.as_str()), json!({ "current_page": 40 })).await;
    let (_, stats) = app.get("/api/v1/reading/stats", Some(cookie.as_str())).await;
    assert_eq!(stats["current_streak"], 2);
    assert_eq!(stats["total_books_read"], 1);
    assert_eq!(stats["total_pages_read"], 40);
    assert_eq!(stats["daily_goal_pages"], 20);

    app.clock.advance(Duration::days(2));
    app.json("PUT", &uri, Some(cookie.as_str()), json!({ "current_page": 60 })).await;
    let (_, habit) = app.get("/api/v1/reading/habit", Some(cookie.as_str())).await;
    assert_eq!(habit["current_streak"], 1);
}

// =============================================================================
// Integrations
// =============================================================================

#[tokio::test]
async fn metadata_search_validates_range_and_maps_outage() {
    let app = setup_app();
    let cookie = app.register("reader@example.com").await;

    let (status, body) = app
        .get("/api/v1/integrations/google-books/search?query=dune", Some(cookie.as_str()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["books"][0]["isbn"], DUNE_ISBN);

    let (status, _) = app
        .get("/api/v1/integrations/google-books/search?query=dune&max_results=41", Some(cookie.as_str()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .get(&format!("/api/v1/integrations/google-books/isbn/{}", DUNE_ISBN), Some(cookie.as_str()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pages"], 612);

    let (status, _) = app
        .get("/api/v1/integrations/google-books/isbn/0000000000", Some(cookie.as_str()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.metadata.set_unreachable(true);
    let (status, _) = app
        .get("/api/v1/integrations/google-books/search?query=dune", Some(cookie.as_str()))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}
