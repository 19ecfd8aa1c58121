use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

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

async fn register(app: &Router, name: &str, email: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"name": name, "email": email, "password": "secret1"}).to_string(),
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

/// Admin fixture: one published course with one promo-gated lesson.
/// Returns (admin cookie, course id, lesson id).
async fn gated_course(app: &Router) -> (String, i64, i64) {
    let admin = login(app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, json) = request(
        app,
        "POST",
        "/api/admin/courses",
        Some(&admin),
        Some(json!({"title": "Gated Course", "published": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let course_id = json["data"]["id"].as_i64().unwrap();

    let (status, json) = request(
        app,
        "POST",
        &format!("/api/admin/courses/{course_id}/lessons"),
        Some(&admin),
        Some(json!({
            "title": "Secret Lesson",
            "youtube_id": "gated123",
            "published": true,
            "requires_promo_code": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let lesson_id = json["data"]["id"].as_i64().unwrap();

    (admin, course_id, lesson_id)
}

async fn create_code(app: &Router, admin: &str, body: Value) -> Value {
    let (status, json) =
        request(app, "POST", "/api/admin/promocodes", Some(admin), Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    json["data"].clone()
}

#[tokio::test]
async fn test_unknown_code_is_not_found() {
    let app = spawn_app().await;
    let user = register(&app, "Eve", "eve@example.com").await;

    let (status, _) = request(
        &app,
        "POST",
        "/api/promo/verify",
        Some(&user),
        Some(json!({"code": "NO-SUCH-CODE"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_redeem_unlocks_lesson_and_rejects_reuse() {
    let app = spawn_app().await;
    let (admin, course_id, lesson_id) = gated_course(&app).await;
    let user = register(&app, "Frank", "frank@example.com").await;

    create_code(
        &app,
        &admin,
        json!({"code": "course-pass", "course_id": course_id}),
    )
    .await;

    // Before redeeming, the lesson is locked.
    let (_, json) = request(&app, "GET", &format!("/api/lessons/{lesson_id}"), Some(&user), None).await;
    assert_eq!(json["data"]["access"]["granted"], false);

    // Codes are matched case-insensitively.
    let (status, json) = request(
        &app,
        "POST",
        "/api/promo/verify",
        Some(&user),
        Some(json!({"code": "COURSE-PASS", "course_id": course_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["code"], "COURSE-PASS");
    assert_eq!(json["data"]["course_id"].as_i64().unwrap(), course_id);

    // A course-scoped code unlocks the course's lessons.
    let (_, json) = request(&app, "GET", &format!("/api/lessons/{lesson_id}"), Some(&user), None).await;
    assert_eq!(json["data"]["access"]["granted"], true);
    assert_eq!(json["data"]["access"]["reason"], "promo_code");
    assert_eq!(json["data"]["access"]["promo_code"], "COURSE-PASS");
    assert_eq!(json["data"]["lesson"]["youtube_id"], "gated123");

    // The same user cannot redeem the same code twice.
    let (status, json) = request(
        &app,
        "POST",
        "/api/promo/verify",
        Some(&user),
        Some(json!({"code": "course-pass", "course_id": course_id})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("already used"));
}

#[tokio::test]
async fn test_usage_cap_deactivates_code() {
    let app = spawn_app().await;
    let (admin, course_id, _) = gated_course(&app).await;
    let first = register(&app, "Gina", "gina@example.com").await;
    let second = register(&app, "Hank", "hank@example.com").await;

    create_code(
        &app,
        &admin,
        json!({"code": "ONE-SEAT", "course_id": course_id, "max_uses": 1}),
    )
    .await;

    let (status, _) = request(
        &app,
        "POST",
        "/api/promo/verify",
        Some(&first),
        Some(json!({"code": "ONE-SEAT", "course_id": course_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The cap is spent; the next user is rejected.
    let (status, _) = request(
        &app,
        "POST",
        "/api/promo/verify",
        Some(&second),
        Some(json!({"code": "ONE-SEAT", "course_id": course_id})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The final redemption flipped the code inactive.
    let (_, json) = request(&app, "GET", "/api/admin/promocodes", Some(&admin), None).await;
    let code = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["code"] == "ONE-SEAT")
        .unwrap();
    assert_eq!(code["current_uses"], 1);
    assert_eq!(code["active"], false);
}

#[tokio::test]
async fn test_expired_code_is_rejected_and_deactivated() {
    let app = spawn_app().await;
    let (admin, course_id, _) = gated_course(&app).await;
    let user = register(&app, "Ivy", "ivy@example.com").await;

    create_code(
        &app,
        &admin,
        json!({
            "code": "EXPIRED",
            "course_id": course_id,
            "expires_at": "2020-01-01T00:00:00Z"
        }),
    )
    .await;

    let (status, json) = request(
        &app,
        "POST",
        "/api/promo/verify",
        Some(&user),
        Some(json!({"code": "EXPIRED", "course_id": course_id})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("expired"));

    let (_, json) = request(&app, "GET", "/api/admin/promocodes", Some(&admin), None).await;
    let code = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["code"] == "EXPIRED")
        .unwrap();
    assert_eq!(code["active"], false);
}

#[tokio::test]
async fn test_scope_mismatch_is_rejected() {
    let app = spawn_app().await;
    let (admin, course_id, lesson_id) = gated_course(&app).await;
    let user = register(&app, "Jack", "jack@example.com").await;

    let (status, json) = request(
        &app,
        "POST",
        "/api/admin/courses",
        Some(&admin),
        Some(json!({"title": "Other Course", "published": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let other_course_id = json["data"]["id"].as_i64().unwrap();

    create_code(
        &app,
        &admin,
        json!({"code": "SCOPED", "course_id": course_id}),
    )
    .await;

    let (status, _) = request(
        &app,
        "POST",
        "/api/promo/verify",
        Some(&user),
        Some(json!({"code": "SCOPED", "course_id": other_course_id})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Rejection does not consume a redemption.
    let (status, _) = request(
        &app,
        "POST",
        "/api/promo/verify",
        Some(&user),
        Some(json!({"code": "SCOPED", "course_id": course_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // A lesson-scoped code only unlocks its own lesson.
    create_code(
        &app,
        &admin,
        json!({"code": "LESSON-ONLY", "lesson_id": lesson_id}),
    )
    .await;
    let other = register(&app, "Kate", "kate@example.com").await;

    let (status, _) = request(
        &app,
        "POST",
        "/api/promo/verify",
        Some(&other),
        Some(json!({"code": "LESSON-ONLY", "lesson_id": lesson_id + 1000})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(
        &app,
        "POST",
        "/api/promo/verify",
        Some(&other),
        Some(json!({"code": "LESSON-ONLY", "lesson_id": lesson_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_code_cannot_target_course_and_lesson() {
    let app = spawn_app().await;
    let (admin, course_id, lesson_id) = gated_course(&app).await;

    let (status, _) = request(
        &app,
        "POST",
        "/api/admin/promocodes",
        Some(&admin),
        Some(json!({"code": "BOTH", "course_id": course_id, "lesson_id": lesson_id})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_duplicate_code_is_conflict() {
    let app = spawn_app().await;
    let (admin, course_id, _) = gated_course(&app).await;

    create_code(&app, &admin, json!({"code": "DUP", "course_id": course_id})).await;

    let (status, _) = request(
        &app,
        "POST",
        "/api/admin/promocodes",
        Some(&admin),
        Some(json!({"code": "dup", "course_id": course_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_enrolled_user_can_watch_gated_lesson() {
    let app = spawn_app().await;
    let (_, course_id, lesson_id) = gated_course(&app).await;
    let user = register(&app, "Liam", "liam@example.com").await;

    let (status, _) = request(
        &app,
        "POST",
        &format!("/api/courses/{course_id}/enroll"),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = request(
        &app,
        "GET",
        &format!("/api/lessons/{lesson_id}/access"),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(json["data"]["granted"], true);
    assert_eq!(json["data"]["reason"], "enrolled");
}

#[tokio::test]
async fn test_deactivated_code_is_rejected() {
    let app = spawn_app().await;
    let (admin, course_id, _) = gated_course(&app).await;
    let user = register(&app, "Mona", "mona@example.com").await;

    let code = create_code(&app, &admin, json!({"code": "PAUSED", "course_id": course_id})).await;
    let code_id = code["id"].as_i64().unwrap();

    let (status, _) = request(
        &app,
        "PUT",
        &format!("/api/admin/promocodes/{code_id}"),
        Some(&admin),
        Some(json!({"active": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = request(
        &app,
        "POST",
        "/api/promo/verify",
        Some(&user),
        Some(json!({"code": "PAUSED", "course_id": course_id})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("no longer active"));
}
