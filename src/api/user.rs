use axum::{
    Json,
    extract::{Extension, Path, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{
    ApiError, ApiResponse, AppState, CourseDto, EnrolledCourseDto, MessageResponse, ProgressDto,
    validation,
};

#[derive(Deserialize)]
pub struct ProgressRequest {
    pub progress: i32,
}

/// GET /me/courses
/// Courses the user is enrolled in, with their progress.
pub async fn my_courses(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<EnrolledCourseDto>>>, ApiError> {
    let enrollments = state.store().list_enrollments(user.id).await?;

    Ok(Json(ApiResponse::success(
        enrollments.into_iter().map(EnrolledCourseDto::from).collect(),
    )))
}

/// POST /courses/{ref}/enroll
/// Idempotent; re-enrolling just refreshes the last-accessed timestamp.
pub async fn enroll(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(reference): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let course = state
        .store()
        .get_course_by_ref(&reference)
        .await?
        .filter(|c| c.published)
        .ok_or_else(|| ApiError::course_not_found(&reference))?;

    state.store().enroll(user.id, course.id).await?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: format!("Enrolled in {}", course.title),
    })))
}

/// GET /me/favorites
pub async fn list_favorites(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<CourseDto>>>, ApiError> {
    let courses = state.store().list_favorite_courses(user.id).await?;

    Ok(Json(ApiResponse::success(
        courses.into_iter().map(CourseDto::from).collect(),
    )))
}

/// POST /courses/{ref}/favorite
pub async fn add_favorite(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(reference): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let course = state
        .store()
        .get_course_by_ref(&reference)
        .await?
        .filter(|c| c.published)
        .ok_or_else(|| ApiError::course_not_found(&reference))?;

    if !state.store().add_favorite(user.id, course.id).await? {
        return Err(ApiError::conflict("Course is already in favorites"));
    }

    Ok(Json(ApiResponse::success(MessageResponse {
        message: format!("Added {} to favorites", course.title),
    })))
}

/// DELETE /courses/{ref}/favorite
pub async fn remove_favorite(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(reference): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let course = state
        .store()
        .get_course_by_ref(&reference)
        .await?
        .ok_or_else(|| ApiError::course_not_found(&reference))?;

    if !state.store().remove_favorite(user.id, course.id).await? {
        return Err(ApiError::not_found("Favorite", &reference));
    }

    Ok(Json(ApiResponse::success(MessageResponse {
        message: format!("Removed {} from favorites", course.title),
    })))
}

/// POST /lessons/{id}/progress
/// Record watch progress for a lesson, then refresh the course-level
/// progress on the user's enrollment.
pub async fn record_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<ProgressRequest>,
) -> Result<Json<ApiResponse<ProgressDto>>, ApiError> {
    validation::validate_id(id)?;
    let progress = validation::validate_progress(payload.progress)?;

    let lesson = state
        .store()
        .get_lesson(id)
        .await?
        .filter(|l| l.published)
        .ok_or_else(|| ApiError::lesson_not_found(id))?;

    let recorded = state
        .store()
        .record_lesson_progress(user.id, lesson.id, progress)
        .await?;

    let course_progress = state
        .store()
        .refresh_course_progress(user.id, lesson.course_id)
        .await?;

    Ok(Json(ApiResponse::success(ProgressDto {
        lesson_id: lesson.id,
        progress: recorded.progress,
        course_progress,
    })))
}
