use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use time;

use crate::config::Config;
use crate::state::SharedState;

pub mod auth;
mod courses;
mod error;
mod lessons;
mod observability;
mod promocodes;
mod system;
mod types;
mod user;
mod validation;

pub use error::ApiError;
pub use types::*;

use tokio::sync::RwLock;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }
}

pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub async fn router(state: Arc<AppState>) -> Router {
    let (cors_origins, secure_cookies, session_minutes) = {
        let config = state.config().read().await;
        (
            config.server.cors_allowed_origins.clone(),
            config.server.secure_cookies,
            config.server.session_minutes,
        )
    };

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            session_minutes,
        )));

    let api_router = Router::new()
        .merge(create_authenticated_router())
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/courses", get(courses::list_courses))
        .route("/courses/{reference}", get(courses::get_course))
        .route(
            "/courses/{reference}/lessons",
            get(lessons::list_course_lessons),
        )
        .route("/lessons/{reference}", get(lessons::get_lesson))
        .route("/system/health", get(system::health))
        .layer(session_layer)
        .with_state(state.clone());

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
        .layer(middleware::from_fn(
            observability::security_headers_middleware,
        ))
}

fn create_authenticated_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/me", get(auth::get_current_user))
        .route("/auth/password", put(auth::change_password))
        .route("/promo/verify", post(promocodes::verify_code))
        .route("/me/courses", get(user::my_courses))
        .route("/me/favorites", get(user::list_favorites))
        .route("/courses/{reference}/enroll", post(user::enroll))
        .route("/courses/{reference}/favorite", post(user::add_favorite))
        .route(
            "/courses/{reference}/favorite",
            delete(user::remove_favorite),
        )
        .route(
            "/lessons/{reference}/access",
            get(lessons::check_lesson_access),
        )
        .route("/lessons/{reference}/progress", post(user::record_progress))
        .merge(create_admin_router())
        .route_layer(middleware::from_fn(auth::auth_middleware))
}

fn create_admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/courses", post(courses::create_course))
        .route("/admin/courses/{id}", put(courses::update_course))
        .route("/admin/courses/{id}", delete(courses::delete_course))
        .route(
            "/admin/courses/{id}/lessons",
            post(lessons::create_lesson),
        )
        .route("/admin/lessons/{id}", put(lessons::update_lesson))
        .route("/admin/lessons/{id}", delete(lessons::delete_lesson))
        .route("/admin/promocodes", get(promocodes::list_codes))
        .route("/admin/promocodes", post(promocodes::create_code))
        .route("/admin/promocodes/{id}", put(promocodes::update_code))
        .route("/admin/promocodes/{id}", delete(promocodes::delete_code))
        .route("/admin/system/status", get(system::get_status))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn(auth::require_admin))
}
