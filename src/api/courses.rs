use axum::{
    Json,
    extract::{Extension, Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::{CurrentUser, optional_user};
use super::{
    ApiError, ApiResponse, AppState, CourseDetailDto, CourseDto, CourseListResponse, LessonDto,
    MessageResponse, PaginationDto, validation,
};
use crate::db::repositories::lesson::slugify;
use crate::db::{CourseChanges, CourseFilter, CourseSort, NewCourse};

#[derive(Deserialize)]
pub struct CourseListQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub level: Option<String>,
    #[serde(default)]
    pub featured: bool,
    pub sort: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Deserialize)]
pub struct CreateCourseRequest {
    pub title: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    pub level: Option<String>,
    #[serde(default)]
    pub duration_minutes: i32,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub featured: bool,
}

#[derive(Deserialize)]
pub struct UpdateCourseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub requirements: Option<Vec<String>>,
    pub level: Option<String>,
    pub duration_minutes: Option<i32>,
    pub published: Option<bool>,
    pub featured: Option<bool>,
}

/// GET /courses
/// Public catalog. Admins also see unpublished courses.
pub async fn list_courses(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<CourseListQuery>,
) -> Result<Json<ApiResponse<CourseListResponse>>, ApiError> {
    let is_admin = optional_user(&session)
        .await
        .is_some_and(|u| u.is_admin());

    let filter = CourseFilter {
        search: query.search,
        category: query.category,
        level: query.level,
        featured_only: query.featured,
        include_unpublished: is_admin,
        sort: query.sort.as_deref().map(CourseSort::parse).unwrap_or_default(),
        page: query.page.unwrap_or(1),
        limit: query.limit.unwrap_or(12),
    };

    let page = state.store().list_courses(&filter).await?;

    Ok(Json(ApiResponse::success(CourseListResponse {
        courses: page.courses.into_iter().map(CourseDto::from).collect(),
        pagination: PaginationDto {
            total: page.total,
            page: page.page,
            limit: page.limit,
            pages: page.pages,
        },
    })))
}

/// GET /courses/{ref}
/// Course detail by numeric id or slug, with its lesson list. Video ids
/// are never included here; the lesson endpoint gates those.
pub async fn get_course(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(reference): Path<String>,
) -> Result<Json<ApiResponse<CourseDetailDto>>, ApiError> {
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

    Ok(Json(ApiResponse::success(CourseDetailDto {
        course: CourseDto::from(course),
        lessons: lessons
            .into_iter()
            .map(|l| LessonDto::from_model(l, false))
            .collect(),
    })))
}

/// POST /admin/courses
pub async fn create_course(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<Json<ApiResponse<CourseDto>>, ApiError> {
    let title = validation::validate_title(&payload.title)?;

    let slug = payload
        .slug
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map_or_else(|| slugify(title), str::to_lowercase);

    if state.store().get_course_by_slug(&slug).await?.is_some() {
        return Err(ApiError::conflict(format!(
            "A course with slug '{slug}' already exists"
        )));
    }

    let course = state
        .store()
        .create_course(&NewCourse {
            title: title.to_string(),
            slug,
            description: payload.description,
            thumbnail: payload.thumbnail,
            category: payload.category,
            tags: payload.tags,
            requirements: payload.requirements,
            level: payload.level.unwrap_or_else(|| "beginner".to_string()),
            duration_minutes: payload.duration_minutes,
            published: payload.published,
            featured: payload.featured,
            created_by: Some(user.id),
        })
        .await?;

    Ok(Json(ApiResponse::success(CourseDto::from(course))))
}

/// PUT /admin/courses/{id}
pub async fn update_course(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<Json<ApiResponse<CourseDto>>, ApiError> {
    validation::validate_id(id)?;

    if let Some(title) = payload.title.as_deref() {
        validation::validate_title(title)?;
    }

    let changes = CourseChanges {
        title: payload.title,
        description: payload.description,
        thumbnail: payload.thumbnail,
        category: payload.category,
        tags: payload.tags,
        requirements: payload.requirements,
        level: payload.level,
        duration_minutes: payload.duration_minutes,
        published: payload.published,
        featured: payload.featured,
    };

    let course = state
        .store()
        .update_course(id, changes)
        .await?
        .ok_or_else(|| ApiError::course_not_found(id))?;

    Ok(Json(ApiResponse::success(CourseDto::from(course))))
}

/// DELETE /admin/courses/{id}
/// Removes the course and all of its lessons.
pub async fn delete_course(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    validation::validate_id(id)?;

    if !state.store().remove_course(id).await? {
        return Err(ApiError::course_not_found(id));
    }

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Course deleted".to_string(),
    })))
}
