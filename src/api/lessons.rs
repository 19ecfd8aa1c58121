use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::optional_user;
use super::{ApiError, ApiResponse, AppState, LessonDto, MessageResponse, validation};
use crate::db::{LessonChanges, NewLesson};
use crate::entities::lessons;
use crate::services::AccessDecision;

#[derive(Deserialize)]
pub struct CreateLessonRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub youtube_id: String,
    #[serde(default)]
    pub duration_seconds: i32,
    pub sort_order: Option<i32>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub requires_promo_code: bool,
}

#[derive(Deserialize)]
pub struct UpdateLessonRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub youtube_id: Option<String>,
    pub duration_seconds: Option<i32>,
    pub sort_order: Option<i32>,
    pub published: Option<bool>,
    pub requires_promo_code: Option<bool>,
}

#[derive(Serialize)]
pub struct LessonViewDto {
    pub lesson: LessonDto,
    pub access: AccessDecision,
}

async fn resolve_lesson(
    state: &AppState,
    reference: &str,
) -> Result<Option<lessons::Model>, ApiError> {
    let lesson = if let Ok(id) = reference.parse::<i32>() {
        state.store().get_lesson(id).await?
    } else {
        state.store().get_lesson_by_slug(reference).await?
    };
    Ok(lesson)
}

/// GET /courses/{ref}/lessons
pub async fn list_course_lessons(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(reference): Path<String>,
) -> Result<Json<ApiResponse<Vec<LessonDto>>>, ApiError> {
    let is_admin = optional_user(&session)
        .await
        .is_some_and(|u| u.is_admin());

    let course = state
        .store()
        .get_course_by_ref(&reference)
        .await?
        .filter(|c| c.published || is_admin)
        .ok_or_else(|| ApiError::course_not_found(&reference))?;

    let lessons = state.store().list_lessons(course.id, is_admin).await?;

    Ok(Json(ApiResponse::success(
        lessons
            .into_iter()
            .map(|l| LessonDto::from_model(l, false))
            .collect(),
    )))
}

/// GET /lessons/{ref}
/// Lesson detail by numeric id or slug. The video id is only included
/// when the caller passes the access check.
pub async fn get_lesson(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(reference): Path<String>,
) -> Result<Json<ApiResponse<LessonViewDto>>, ApiError> {
    let user = optional_user(&session).await;
    let is_admin = user.as_ref().is_some_and(super::auth::CurrentUser::is_admin);

    let lesson = resolve_lesson(&state, &reference)
        .await?
        .ok_or_else(|| ApiError::lesson_not_found(&reference))?;

    if !lesson.published && !is_admin {
        return Err(ApiError::Forbidden("Lesson is not published".to_string()));
    }

    let access = state
        .shared
        .access
        .check_lesson(&lesson, user.map(|u| u.id), is_admin)
        .await?;

    let include_video = access.granted;

    Ok(Json(ApiResponse::success(LessonViewDto {
        lesson: LessonDto::from_model(lesson, include_video),
        access,
    })))
}

/// GET /lessons/{ref}/access
/// Standalone access check, used by players to re-verify before playback.
pub async fn check_lesson_access(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(reference): Path<String>,
) -> Result<Json<ApiResponse<AccessDecision>>, ApiError> {
    let user = optional_user(&session).await;
    let is_admin = user.as_ref().is_some_and(super::auth::CurrentUser::is_admin);

    let lesson = resolve_lesson(&state, &reference)
        .await?
        .ok_or_else(|| ApiError::lesson_not_found(&reference))?;

    if !lesson.published && !is_admin {
        return Err(ApiError::Forbidden("Lesson is not published".to_string()));
    }

    let access = state
        .shared
        .access
        .check_lesson(&lesson, user.map(|u| u.id), is_admin)
        .await?;

    Ok(Json(ApiResponse::success(access)))
}

/// POST /admin/courses/{id}/lessons
pub async fn create_lesson(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<i32>,
    Json(payload): Json<CreateLessonRequest>,
) -> Result<Json<ApiResponse<LessonDto>>, ApiError> {
    validation::validate_id(course_id)?;
    let title = validation::validate_title(&payload.title)?;

    if payload.youtube_id.trim().is_empty() {
        return Err(ApiError::validation("Video ID is required"));
    }

    state
        .store()
        .get_course(course_id)
        .await?
        .ok_or_else(|| ApiError::course_not_found(course_id))?;

    let lesson = state
        .store()
        .create_lesson(&NewLesson {
            course_id,
            title: title.to_string(),
            description: payload.description,
            youtube_id: payload.youtube_id.trim().to_string(),
            duration_seconds: payload.duration_seconds,
            sort_order: payload.sort_order,
            published: payload.published,
            requires_promo_code: payload.requires_promo_code,
        })
        .await?;

    Ok(Json(ApiResponse::success(LessonDto::from_model(
        lesson, true,
    ))))
}

/// PUT /admin/lessons/{id}
pub async fn update_lesson(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateLessonRequest>,
) -> Result<Json<ApiResponse<LessonDto>>, ApiError> {
    validation::validate_id(id)?;

    if let Some(title) = payload.title.as_deref() {
        validation::validate_title(title)?;
    }

    let changes = LessonChanges {
        title: payload.title,
        description: payload.description,
        youtube_id: payload.youtube_id,
        duration_seconds: payload.duration_seconds,
        sort_order: payload.sort_order,
        published: payload.published,
        requires_promo_code: payload.requires_promo_code,
    };

    let lesson = state
        .store()
        .update_lesson(id, changes)
        .await?
        .ok_or_else(|| ApiError::lesson_not_found(id))?;

    Ok(Json(ApiResponse::success(LessonDto::from_model(
        lesson, true,
    ))))
}

/// DELETE /admin/lessons/{id}
pub async fn delete_lesson(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    validation::validate_id(id)?;

    if !state.store().remove_lesson(id).await? {
        return Err(ApiError::lesson_not_found(id));
    }

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Lesson deleted".to_string(),
    })))
}
