use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use tracing::info;

use crate::entities::{lessons, prelude::*};

/// Input for creating a lesson. The slug is derived from the title.
#[derive(Debug, Clone)]
pub struct NewLesson {
    pub course_id: i32,
    pub title: String,
    pub description: String,
    pub youtube_id: String,
    pub duration_seconds: i32,
    pub sort_order: Option<i32>,
    pub published: bool,
    pub requires_promo_code: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LessonChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub youtube_id: Option<String>,
    pub duration_seconds: Option<i32>,
    pub sort_order: Option<i32>,
    pub published: Option<bool>,
    pub requires_promo_code: Option<bool>,
}

pub struct LessonRepository {
    conn: DatabaseConnection,
}

impl LessonRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, lesson: &NewLesson) -> Result<lessons::Model> {
        let slug = self.unique_slug(&lesson.title, None).await?;

        let sort_order = match lesson.sort_order {
            Some(order) => order,
            None => self.next_sort_order(lesson.course_id).await?,
        };

        let now = chrono::Utc::now().to_rfc3339();

        let model = lessons::ActiveModel {
            course_id: Set(lesson.course_id),
            title: Set(lesson.title.clone()),
            slug: Set(slug),
            description: Set(lesson.description.clone()),
            youtube_id: Set(lesson.youtube_id.clone()),
            duration_seconds: Set(lesson.duration_seconds),
            sort_order: Set(sort_order),
            published: Set(lesson.published),
            requires_promo_code: Set(lesson.requires_promo_code),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let inserted = model
            .insert(&self.conn)
            .await
            .context("Failed to insert lesson")?;

        info!("Lesson created: {} ({})", inserted.title, inserted.slug);
        Ok(inserted)
    }

    pub async fn get(&self, id: i32) -> Result<Option<lessons::Model>> {
        Lessons::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query lesson by ID")
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<lessons::Model>> {
        Lessons::find()
            .filter(lessons::Column::Slug.eq(slug.to_lowercase()))
            .one(&self.conn)
            .await
            .context("Failed to query lesson by slug")
    }

    pub async fn list_for_course(
        &self,
        course_id: i32,
        include_unpublished: bool,
    ) -> Result<Vec<lessons::Model>> {
        let mut query = Lessons::find().filter(lessons::Column::CourseId.eq(course_id));

        if !include_unpublished {
            query = query.filter(lessons::Column::Published.eq(true));
        }

        query
            .order_by_asc(lessons::Column::SortOrder)
            .all(&self.conn)
            .await
            .context("Failed to list course lessons")
    }

    pub async fn count_published(&self, course_id: i32) -> Result<u64> {
        use sea_orm::PaginatorTrait;

        Lessons::find()
            .filter(lessons::Column::CourseId.eq(course_id))
            .filter(lessons::Column::Published.eq(true))
            .count(&self.conn)
            .await
            .context("Failed to count published lessons")
    }

    pub async fn update(&self, id: i32, changes: LessonChanges) -> Result<Option<lessons::Model>> {
        let Some(lesson) = Lessons::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let new_slug = match &changes.title {
            Some(title) if *title != lesson.title => {
                Some(self.unique_slug(title, Some(lesson.id)).await?)
            }
            _ => None,
        };

        let mut active: lessons::ActiveModel = lesson.into();

        if let Some(title) = changes.title {
            active.title = Set(title);
        }
        if let Some(slug) = new_slug {
            active.slug = Set(slug);
        }
        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        if let Some(youtube_id) = changes.youtube_id {
            active.youtube_id = Set(youtube_id);
        }
        if let Some(duration) = changes.duration_seconds {
            active.duration_seconds = Set(duration);
        }
        if let Some(order) = changes.sort_order {
            active.sort_order = Set(order);
        }
        if let Some(published) = changes.published {
            active.published = Set(published);
        }
        if let Some(requires) = changes.requires_promo_code {
            active.requires_promo_code = Set(requires);
        }

        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let updated = active
            .update(&self.conn)
            .await
            .context("Failed to update lesson")?;

        Ok(Some(updated))
    }

    pub async fn remove(&self, id: i32) -> Result<bool> {
        let result = Lessons::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete lesson")?;

        Ok(result.rows_affected > 0)
    }

    /// Derive a slug from the title, appending a numeric suffix on
    /// collision. `exclude` skips the lesson being renamed.
    async fn unique_slug(&self, title: &str, exclude: Option<i32>) -> Result<String> {
        let base = slugify(title);

        for attempt in 0..20 {
            let candidate = if attempt == 0 {
                base.clone()
            } else {
                format!("{}-{}", base, attempt + 1)
            };

            let mut query = Lessons::find().filter(lessons::Column::Slug.eq(&candidate));
            if let Some(id) = exclude {
                query = query.filter(lessons::Column::Id.ne(id));
            }

            if query.one(&self.conn).await?.is_none() {
                return Ok(candidate);
            }
        }

        anyhow::bail!("Could not find a free slug for '{title}'")
    }

    async fn next_sort_order(&self, course_id: i32) -> Result<i32> {
        let max: Option<i32> = Lessons::find()
            .filter(lessons::Column::CourseId.eq(course_id))
            .select_only()
            .column_as(lessons::Column::SortOrder.max(), "max_order")
            .into_tuple()
            .one(&self.conn)
            .await
            .context("Failed to query max sort order")?
            .flatten();

        Ok(max.map_or(1, |m| m + 1))
    }
}

/// Lowercase, alphanumeric-and-hyphens slug from an arbitrary title.
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_was_hyphen = true;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.is_empty() {
        slug.push_str("lesson");
    }

    slug
}
