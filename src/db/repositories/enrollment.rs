use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::info;

use crate::entities::{courses, enrollments, lesson_progress, lessons, prelude::*};

pub struct EnrollmentRepository {
    conn: DatabaseConnection,
}

impl EnrollmentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Enroll a user in a course. Idempotent: an existing enrollment is
    /// returned unchanged apart from its last-accessed timestamp.
    pub async fn enroll(&self, user_id: i32, course_id: i32) -> Result<enrollments::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        if let Some(existing) = self.get(user_id, course_id).await? {
            let mut active: enrollments::ActiveModel = existing.into();
            active.last_accessed_at = Set(now);
            return active
                .update(&self.conn)
                .await
                .context("Failed to touch enrollment");
        }

        let model = enrollments::ActiveModel {
            user_id: Set(user_id),
            course_id: Set(course_id),
            progress: Set(0),
            last_accessed_at: Set(now.clone()),
            created_at: Set(now),
            ..Default::default()
        };

        let inserted = model
            .insert(&self.conn)
            .await
            .context("Failed to insert enrollment")?;

        info!("User {user_id} enrolled in course {course_id}");
        Ok(inserted)
    }

    pub async fn get(&self, user_id: i32, course_id: i32) -> Result<Option<enrollments::Model>> {
        Enrollments::find()
            .filter(enrollments::Column::UserId.eq(user_id))
            .filter(enrollments::Column::CourseId.eq(course_id))
            .one(&self.conn)
            .await
            .context("Failed to query enrollment")
    }

    /// Enrollments with their courses, most recently accessed first.
    pub async fn list_for_user(
        &self,
        user_id: i32,
    ) -> Result<Vec<(enrollments::Model, courses::Model)>> {
        let rows = Enrollments::find()
            .filter(enrollments::Column::UserId.eq(user_id))
            .order_by_desc(enrollments::Column::LastAccessedAt)
            .find_also_related(Courses)
            .all(&self.conn)
            .await
            .context("Failed to list enrollments")?;

        Ok(rows
            .into_iter()
            .filter_map(|(enrollment, course)| course.map(|c| (enrollment, c)))
            .collect())
    }

    pub async fn get_lesson_progress(
        &self,
        user_id: i32,
        lesson_id: i32,
    ) -> Result<Option<lesson_progress::Model>> {
        LessonProgress::find()
            .filter(lesson_progress::Column::UserId.eq(user_id))
            .filter(lesson_progress::Column::LessonId.eq(lesson_id))
            .one(&self.conn)
            .await
            .context("Failed to query lesson progress")
    }

    /// Record watch progress for a lesson (0-100). Progress never moves
    /// backwards; a rewind keeps the high-water mark.
    pub async fn upsert_lesson_progress(
        &self,
        user_id: i32,
        lesson_id: i32,
        progress: i32,
    ) -> Result<lesson_progress::Model> {
        let progress = progress.clamp(0, 100);
        let now = chrono::Utc::now().to_rfc3339();

        if let Some(existing) = self.get_lesson_progress(user_id, lesson_id).await? {
            let new_progress = existing.progress.max(progress);
            let mut active: lesson_progress::ActiveModel = existing.into();
            active.progress = Set(new_progress);
            active.last_watched_at = Set(now);
            return active
                .update(&self.conn)
                .await
                .context("Failed to update lesson progress");
        }

        let model = lesson_progress::ActiveModel {
            user_id: Set(user_id),
            lesson_id: Set(lesson_id),
            progress: Set(progress),
            last_watched_at: Set(now),
            ..Default::default()
        };

        model
            .insert(&self.conn)
            .await
            .context("Failed to insert lesson progress")
    }

    /// Recompute course-level progress as the mean of the user's watch
    /// progress over the course's published lessons, then store it on
    /// the enrollment.
    pub async fn refresh_course_progress(&self, user_id: i32, course_id: i32) -> Result<i32> {
        let lesson_ids: Vec<i32> = Lessons::find()
            .filter(lessons::Column::CourseId.eq(course_id))
            .filter(lessons::Column::Published.eq(true))
            .all(&self.conn)
            .await
            .context("Failed to list lessons for progress refresh")?
            .into_iter()
            .map(|l| l.id)
            .collect();

        if lesson_ids.is_empty() {
            return Ok(0);
        }

        let watched = LessonProgress::find()
            .filter(lesson_progress::Column::UserId.eq(user_id))
            .filter(lesson_progress::Column::LessonId.is_in(lesson_ids.clone()))
            .all(&self.conn)
            .await
            .context("Failed to query watch progress")?;

        let sum: i64 = watched.iter().map(|p| i64::from(p.progress)).sum();
        let course_progress =
            i32::try_from(sum / lesson_ids.len() as i64).unwrap_or(0).clamp(0, 100);

        if let Some(enrollment) = self.get(user_id, course_id).await? {
            let mut active: enrollments::ActiveModel = enrollment.into();
            active.progress = Set(course_progress);
            active.last_accessed_at = Set(chrono::Utc::now().to_rfc3339());
            active
                .update(&self.conn)
                .await
                .context("Failed to store course progress")?;
        }

        Ok(course_progress)
    }
}
