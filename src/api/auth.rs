use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_sessions::Session;

use super::{ApiError, ApiResponse, AppState, MessageResponse, UserDto, validation};

const SESSION_USER_KEY: &str = "user";

/// Identity stored in the session and injected into request extensions
/// by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: i32,
    pub name: String,
    pub role: String,
}

impl CurrentUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// ============================================================================
// Middleware
// ============================================================================

/// Requires a logged-in session and exposes the user to downstream
/// handlers via request extensions.
pub async fn auth_middleware(
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    if let Ok(Some(user)) = session.get::<CurrentUser>(SESSION_USER_KEY).await {
        tracing::Span::current().record("user_id", user.id);
        request.extensions_mut().insert(user);
        return Ok(next.run(request).await);
    }

    Err(ApiError::unauthorized())
}

/// Layered inside the authenticated router for admin-only routes.
pub async fn require_admin(request: Request, next: Next) -> Result<impl IntoResponse, ApiError> {
    let is_admin = request
        .extensions()
        .get::<CurrentUser>()
        .is_some_and(CurrentUser::is_admin);

    if !is_admin {
        return Err(ApiError::forbidden());
    }

    Ok(next.run(request).await)
}

/// Session identity for public routes that behave differently for
/// logged-in users, without requiring a login.
pub async fn optional_user(session: &Session) -> Option<CurrentUser> {
    session
        .get::<CurrentUser>(SESSION_USER_KEY)
        .await
        .ok()
        .flatten()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/register
/// Create an account and log the new user in.
pub async fn register(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let name = validation::validate_name(&payload.name)?;
    let email = validation::validate_email(&payload.email)?;

    let min_password_len = {
        let config = state.config().read().await;
        config.security.min_password_len
    };
    validation::validate_password(&payload.password, min_password_len)?;

    if state
        .store()
        .get_user_by_email(email)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to check email: {e}")))?
        .is_some()
    {
        return Err(ApiError::conflict("An account with this email already exists"));
    }

    let security = {
        let config = state.config().read().await;
        config.security.clone()
    };

    let user = state
        .store()
        .create_user(name, email, &payload.password, "user", Some(&security))
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create user: {e}")))?;

    let current = CurrentUser {
        id: user.id,
        name: user.name.clone(),
        role: user.role.clone(),
    };
    if let Err(e) = session.insert(SESSION_USER_KEY, &current).await {
        return Err(ApiError::internal(format!("Failed to create session: {e}")));
    }

    tracing::info!("New user registered: {}", user.email);

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    if payload.email.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let user = state
        .store()
        .verify_user_password(&payload.email, &payload.password)
        .await
        .map_err(|e| ApiError::internal(format!("Authentication error: {e}")))?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".to_string()))?;

    let current = CurrentUser {
        id: user.id,
        name: user.name.clone(),
        role: user.role.clone(),
    };
    if let Err(e) = session.insert(SESSION_USER_KEY, &current).await {
        return Err(ApiError::internal(format!("Failed to create session: {e}")));
    }

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// POST /auth/logout
pub async fn logout(session: Session) -> impl IntoResponse {
    let _ = session.flush().await;
    (StatusCode::OK, "Logged out")
}

/// GET /auth/me
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let current = optional_user(&session)
        .await
        .ok_or_else(ApiError::unauthorized)?;

    let user = state
        .store()
        .get_user(current.id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to get user: {e}")))?
        .ok_or_else(ApiError::unauthorized)?;

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// PUT /auth/password
/// Change password (requires current password verification)
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let current = optional_user(&session)
        .await
        .ok_or_else(ApiError::unauthorized)?;

    let (min_password_len, security) = {
        let config = state.config().read().await;
        (config.security.min_password_len, config.security.clone())
    };

    validation::validate_password(&payload.new_password, min_password_len)?;

    if payload.current_password == payload.new_password {
        return Err(ApiError::validation(
            "New password must be different from current password",
        ));
    }

    let user = state
        .store()
        .get_user(current.id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to get user: {e}")))?
        .ok_or_else(ApiError::unauthorized)?;

    let verified = state
        .store()
        .verify_user_password(&user.email, &payload.current_password)
        .await
        .map_err(|e| ApiError::internal(format!("Password verification error: {e}")))?;

    if verified.is_none() {
        return Err(ApiError::validation("Current password is incorrect"));
    }

    state
        .store()
        .update_user_password(user.id, &payload.new_password, Some(&security))
        .await
        .map_err(|e| ApiError::internal(format!("Failed to update password: {e}")))?;

    tracing::info!("Password changed for user: {}", user.email);

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Password updated successfully".to_string(),
    })))
}
