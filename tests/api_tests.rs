use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

/// Default admin account seeded by the initial migration.
const ADMIN_EMAIL: &str = "admin@lektra.local";
const ADMIN_PASSWORD: &str = "password";

async fn spawn_app() -> Router {
    let mut config = lektra::Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.server.secure_cookies = false;

    let state = lektra::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");
    lektra::api::router(state).await
}

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let body = match body {
        Some(v) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn login(app: &Router, email: &str, password: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"email": email, "password": password}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("login sets a session cookie")
        .to_str()
        .unwrap();
    cookie.split(';').next().unwrap().to_string()
}

async fn register(app: &Router, name: &str, email: &str, password: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"name": name, "email": email, "password": password}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("register sets a session cookie")
        .to_str()
        .unwrap();
    cookie.split(';').next().unwrap().to_string()
}

async fn create_course(app: &Router, admin: &str, body: Value) -> Value {
    let (status, json) = request(app, "POST", "/api/admin/courses", Some(admin), Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    json["data"].clone()
}

#[tokio::test]
async fn test_protected_routes_require_auth() {
    let app = spawn_app().await;

    let (status, _) = request(&app, "GET", "/api/me/courses", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = request(&app, "GET", "/api/admin/promocodes", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = request(&app, "GET", "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_is_public() {
    let app = spawn_app().await;

    let (status, json) = request(&app, "GET", "/api/system/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["database"], true);
}

#[tokio::test]
async fn test_register_validation() {
    let app = spawn_app().await;

    let (status, _) = request(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({"name": "A", "email": "a@example.com", "password": "secret1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({"name": "Alice", "email": "not-an-email", "password": "secret1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({"name": "Alice", "email": "alice@example.com", "password": "short"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_and_login_flow() {
    let app = spawn_app().await;

    let cookie = register(&app, "Alice", "alice@example.com", "secret1").await;

    let (status, json) = request(&app, "GET", "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["name"], "Alice");
    assert_eq!(json["data"]["email"], "alice@example.com");
    assert_eq!(json["data"]["role"], "user");

    // Duplicate email rejected, case-insensitively.
    let (status, _) = request(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({"name": "Alice Again", "email": "ALICE@example.com", "password": "secret2"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = request(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": "alice@example.com", "password": "wrong-password"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let cookie = login(&app, "alice@example.com", "secret1").await;
    let (status, _) = request(&app, "GET", "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_non_admin_cannot_manage_courses() {
    let app = spawn_app().await;
    let cookie = register(&app, "Bob", "bob@example.com", "secret1").await;

    let (status, _) = request(
        &app,
        "POST",
        "/api/admin/courses",
        Some(&cookie),
        Some(json!({"title": "Sneaky Course"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_course_crud() {
    let app = spawn_app().await;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let course = create_course(
        &app,
        &admin,
        json!({
            "title": "Intro to Rust",
            "description": "Learn the basics",
            "category": "programming",
            "tags": ["rust", "beginner"],
            "level": "beginner",
            "published": true
        }),
    )
    .await;

    assert_eq!(course["slug"], "intro-to-rust");
    assert_eq!(course["tags"], json!(["rust", "beginner"]));
    let id = course["id"].as_i64().unwrap();

    // Same slug is a conflict.
    let (status, _) = request(
        &app,
        "POST",
        "/api/admin/courses",
        Some(&admin),
        Some(json!({"title": "Different", "slug": "intro-to-rust"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Public lookup works by slug and by id.
    let (status, json) = request(&app, "GET", "/api/courses/intro-to-rust", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["id"].as_i64().unwrap(), id);

    let (status, _) = request(&app, "GET", &format!("/api/courses/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = request(
        &app,
        "PUT",
        &format!("/api/admin/courses/{id}"),
        Some(&admin),
        Some(json!({"featured": true, "level": "intermediate"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["featured"], true);
    assert_eq!(json["data"]["level"], "intermediate");

    let (status, _) = request(
        &app,
        "DELETE",
        &format!("/api/admin/courses/{id}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request(&app, "GET", &format!("/api/courses/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_course_list_filters() {
    let app = spawn_app().await;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    create_course(
        &app,
        &admin,
        json!({"title": "Rust Basics", "category": "programming", "level": "beginner", "published": true}),
    )
    .await;
    create_course(
        &app,
        &admin,
        json!({"title": "Advanced Baking", "category": "cooking", "level": "advanced", "published": true, "featured": true}),
    )
    .await;
    create_course(
        &app,
        &admin,
        json!({"title": "Unreleased Draft", "category": "programming", "published": false}),
    )
    .await;

    // Anonymous users only see published courses.
    let (status, json) = request(&app, "GET", "/api/courses", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["courses"].as_array().unwrap().len(), 2);
    assert_eq!(json["data"]["pagination"]["total"], 2);

    // Admins also see drafts.
    let (_, json) = request(&app, "GET", "/api/courses", Some(&admin), None).await;
    assert_eq!(json["data"]["courses"].as_array().unwrap().len(), 3);

    let (_, json) = request(&app, "GET", "/api/courses?category=cooking", None, None).await;
    assert_eq!(json["data"]["courses"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"]["courses"][0]["title"], "Advanced Baking");

    let (_, json) = request(&app, "GET", "/api/courses?featured=true", None, None).await;
    assert_eq!(json["data"]["courses"].as_array().unwrap().len(), 1);

    let (_, json) = request(&app, "GET", "/api/courses?search=rust", None, None).await;
    assert_eq!(json["data"]["courses"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"]["courses"][0]["title"], "Rust Basics");

    let (_, json) = request(&app, "GET", "/api/courses?sort=name-asc", None, None).await;
    assert_eq!(json["data"]["courses"][0]["title"], "Advanced Baking");

    // Draft course 404s for anonymous users.
    let (status, _) = request(&app, "GET", "/api/courses/unreleased-draft", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = request(&app, "GET", "/api/courses/unreleased-draft", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_lesson_video_gating() {
    let app = spawn_app().await;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let course = create_course(
        &app,
        &admin,
        json!({"title": "Video Course", "published": true}),
    )
    .await;
    let course_id = course["id"].as_i64().unwrap();

    let (status, json) = request(
        &app,
        "POST",
        &format!("/api/admin/courses/{course_id}/lessons"),
        Some(&admin),
        Some(json!({"title": "Open Lesson", "youtube_id": "abc123", "published": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let open_id = json["data"]["id"].as_i64().unwrap();
    assert_eq!(json["data"]["slug"], "open-lesson");

    let (status, json) = request(
        &app,
        "POST",
        &format!("/api/admin/courses/{course_id}/lessons"),
        Some(&admin),
        Some(json!({
            "title": "Locked Lesson",
            "youtube_id": "xyz789",
            "published": true,
            "requires_promo_code": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let locked_id = json["data"]["id"].as_i64().unwrap();

    // Open lesson exposes its video to anyone.
    let (status, json) = request(&app, "GET", &format!("/api/lessons/{open_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["access"]["granted"], true);
    assert_eq!(json["data"]["access"]["reason"], "open");
    assert_eq!(json["data"]["lesson"]["youtube_id"], "abc123");

    // Locked lesson withholds the video without access.
    let (status, json) = request(&app, "GET", &format!("/api/lessons/{locked_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["access"]["granted"], false);
    assert!(json["data"]["lesson"]["youtube_id"].is_null());

    // Admins always have access.
    let (_, json) = request(&app, "GET", &format!("/api/lessons/{locked_id}"), Some(&admin), None).await;
    assert_eq!(json["data"]["access"]["reason"], "admin");
    assert_eq!(json["data"]["lesson"]["youtube_id"], "xyz789");

    // Course listing never leaks video ids.
    let (_, json) = request(
        &app,
        "GET",
        &format!("/api/courses/{course_id}/lessons"),
        Some(&admin),
        None,
    )
    .await;
    for lesson in json["data"].as_array().unwrap() {
        assert!(lesson["youtube_id"].is_null());
    }
}

#[tokio::test]
async fn test_unpublished_lesson_is_forbidden() {
    let app = spawn_app().await;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let course = create_course(
        &app,
        &admin,
        json!({"title": "Draft Lessons", "published": true}),
    )
    .await;
    let course_id = course["id"].as_i64().unwrap();

    let (status, json) = request(
        &app,
        "POST",
        &format!("/api/admin/courses/{course_id}/lessons"),
        Some(&admin),
        Some(json!({"title": "Draft Lesson", "youtube_id": "draft01", "published": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let lesson_id = json["data"]["id"].as_i64().unwrap();

    // A draft lesson exists, so non-admins get 403 rather than 404.
    let (status, _) = request(&app, "GET", &format!("/api/lessons/{lesson_id}"), None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let user = register(&app, "Student", "student@example.com", "password123").await;
    let (status, _) = request(
        &app,
        "GET",
        &format!("/api/lessons/{lesson_id}/access"),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Admins still see the draft; a missing lesson is still 404.
    let (status, _) = request(&app, "GET", &format!("/api/lessons/{lesson_id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = request(&app, "GET", "/api/lessons/99999", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lesson_slug_collision_gets_suffix() {
    let app = spawn_app().await;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let course = create_course(&app, &admin, json!({"title": "Slugs", "published": true})).await;
    let course_id = course["id"].as_i64().unwrap();

    let mut slugs = Vec::new();
    for _ in 0..2 {
        let (status, json) = request(
            &app,
            "POST",
            &format!("/api/admin/courses/{course_id}/lessons"),
            Some(&admin),
            Some(json!({"title": "Same Title", "youtube_id": "vid", "published": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        slugs.push(json["data"]["slug"].as_str().unwrap().to_string());
    }

    assert_eq!(slugs[0], "same-title");
    assert_eq!(slugs[1], "same-title-2");
}

#[tokio::test]
async fn test_favorites_flow() {
    let app = spawn_app().await;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let user = register(&app, "Carol", "carol@example.com", "secret1").await;

    let course = create_course(
        &app,
        &admin,
        json!({"title": "Favorite Me", "published": true}),
    )
    .await;
    let id = course["id"].as_i64().unwrap();

    let (status, _) = request(
        &app,
        "POST",
        &format!("/api/courses/{id}/favorite"),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Favoriting twice is a conflict.
    let (status, _) = request(
        &app,
        "POST",
        &format!("/api/courses/{id}/favorite"),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = request(&app, "GET", "/api/me/favorites", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"][0]["title"], "Favorite Me");

    let (status, _) = request(
        &app,
        "DELETE",
        &format!("/api/courses/{id}/favorite"),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request(
        &app,
        "DELETE",
        &format!("/api/courses/{id}/favorite"),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, json) = request(&app, "GET", "/api/me/favorites", Some(&user), None).await;
    assert!(json["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_enroll_and_progress() {
    let app = spawn_app().await;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let user = register(&app, "Dave", "dave@example.com", "secret1").await;

    let course = create_course(
        &app,
        &admin,
        json!({"title": "Progress Course", "published": true}),
    )
    .await;
    let course_id = course["id"].as_i64().unwrap();

    let mut lesson_ids = Vec::new();
    for title in ["First", "Second"] {
        let (_, json) = request(
            &app,
            "POST",
            &format!("/api/admin/courses/{course_id}/lessons"),
            Some(&admin),
            Some(json!({"title": title, "youtube_id": "vid", "published": true})),
        )
        .await;
        lesson_ids.push(json["data"]["id"].as_i64().unwrap());
    }

    let (status, _) = request(
        &app,
        "POST",
        &format!("/api/courses/{course_id}/enroll"),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = request(
        &app,
        "POST",
        &format!("/api/lessons/{}/progress", lesson_ids[0]),
        Some(&user),
        Some(json!({"progress": 100})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["progress"], 100);
    assert_eq!(json["data"]["course_progress"], 50);

    // Progress never moves backwards.
    let (_, json) = request(
        &app,
        "POST",
        &format!("/api/lessons/{}/progress", lesson_ids[0]),
        Some(&user),
        Some(json!({"progress": 10})),
    )
    .await;
    assert_eq!(json["data"]["progress"], 100);

    let (_, json) = request(
        &app,
        "POST",
        &format!("/api/lessons/{}/progress", lesson_ids[1]),
        Some(&user),
        Some(json!({"progress": 50})),
    )
    .await;
    assert_eq!(json["data"]["course_progress"], 75);

    let (status, json) = request(&app, "GET", "/api/me/courses", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"][0]["progress"], 75);

    let (status, _) = request(
        &app,
        "POST",
        &format!("/api/lessons/{}/progress", lesson_ids[0]),
        Some(&user),
        Some(json!({"progress": 150})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
