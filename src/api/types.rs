use serde::Serialize;

use crate::db::User;
use crate::entities::{courses, enrollments, lessons, promo_codes};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CourseDto {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub thumbnail: String,
    pub category: String,
    pub tags: Vec<String>,
    pub requirements: Vec<String>,
    pub level: String,
    pub duration_minutes: i32,
    pub published: bool,
    pub featured: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<courses::Model> for CourseDto {
    fn from(model: courses::Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            slug: model.slug,
            description: model.description,
            thumbnail: model.thumbnail,
            category: model.category,
            tags: parse_string_list(model.tags.as_deref()),
            requirements: parse_string_list(model.requirements.as_deref()),
            level: model.level,
            duration_minutes: model.duration_minutes,
            published: model.published,
            featured: model.featured,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Lesson as exposed to clients. The video id is withheld unless the
/// caller passed the access check.
#[derive(Debug, Serialize)]
pub struct LessonDto {
    pub id: i32,
    pub course_id: i32,
    pub title: String,
    pub slug: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_id: Option<String>,
    pub duration_seconds: i32,
    pub sort_order: i32,
    pub published: bool,
    pub requires_promo_code: bool,
}

impl LessonDto {
    #[must_use]
    pub fn from_model(model: lessons::Model, include_video: bool) -> Self {
        Self {
            id: model.id,
            course_id: model.course_id,
            title: model.title,
            slug: model.slug,
            description: model.description,
            youtube_id: include_video.then_some(model.youtube_id),
            duration_seconds: model.duration_seconds,
            sort_order: model.sort_order,
            published: model.published,
            requires_promo_code: model.requires_promo_code,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CourseDetailDto {
    #[serde(flatten)]
    pub course: CourseDto,
    pub lessons: Vec<LessonDto>,
}

#[derive(Debug, Serialize)]
pub struct PaginationDto {
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub pages: u64,
}

#[derive(Debug, Serialize)]
pub struct CourseListResponse {
    pub courses: Vec<CourseDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Serialize)]
pub struct EnrolledCourseDto {
    #[serde(flatten)]
    pub course: CourseDto,
    pub progress: i32,
    pub last_accessed_at: String,
}

impl From<(enrollments::Model, courses::Model)> for EnrolledCourseDto {
    fn from((enrollment, course): (enrollments::Model, courses::Model)) -> Self {
        Self {
            course: CourseDto::from(course),
            progress: enrollment.progress,
            last_accessed_at: enrollment.last_accessed_at,
        }
    }
}

/// Admin view of a promo code, including its usage counters.
#[derive(Debug, Serialize)]
pub struct PromoCodeDto {
    pub id: i32,
    pub code: String,
    pub course_id: Option<i32>,
    pub lesson_id: Option<i32>,
    pub description: String,
    pub expires_at: Option<String>,
    pub max_uses: Option<i32>,
    pub current_uses: i32,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<promo_codes::Model> for PromoCodeDto {
    fn from(model: promo_codes::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            course_id: model.course_id,
            lesson_id: model.lesson_id,
            description: model.description,
            expires_at: model.expires_at,
            max_uses: model.max_uses,
            current_uses: model.current_uses,
            active: model.active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RedeemedCodeDto {
    pub code: String,
    pub course_id: Option<i32>,
    pub lesson_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ProgressDto {
    pub lesson_id: i32,
    pub progress: i32,
    pub course_progress: i32,
}

/// Columns storing JSON string arrays come back as raw text.
fn parse_string_list(raw: Option<&str>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::parse_string_list;

    #[test]
    fn test_parse_string_list() {
        assert_eq!(
            parse_string_list(Some(r#"["rust","web"]"#)),
            vec!["rust".to_string(), "web".to_string()]
        );
        assert!(parse_string_list(Some("not json")).is_empty());
        assert!(parse_string_list(None).is_empty());
    }
}
