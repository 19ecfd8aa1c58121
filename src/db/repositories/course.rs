use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::info;

use crate::entities::{courses, lessons, prelude::*};

/// Input for creating a course.
#[derive(Debug, Clone)]
pub struct NewCourse {
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
    pub created_by: Option<i32>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct CourseChanges {
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

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CourseSort {
    #[default]
    Newest,
    Oldest,
    NameAsc,
    NameDesc,
}

impl CourseSort {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "oldest" => Self::Oldest,
            "name-asc" => Self::NameAsc,
            "name-desc" => Self::NameDesc,
            _ => Self::Newest,
        }
    }
}

/// Catalog listing filter; mirrors the public query parameters.
#[derive(Debug, Clone)]
pub struct CourseFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub level: Option<String>,
    pub featured_only: bool,
    pub include_unpublished: bool,
    pub sort: CourseSort,
    pub page: u64,
    pub limit: u64,
}

impl Default for CourseFilter {
    fn default() -> Self {
        Self {
            search: None,
            category: None,
            level: None,
            featured_only: false,
            include_unpublished: false,
            sort: CourseSort::Newest,
            page: 1,
            limit: 100,
        }
    }
}

#[derive(Debug)]
pub struct CoursePage {
    pub courses: Vec<courses::Model>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub pages: u64,
}

pub struct CourseRepository {
    conn: DatabaseConnection,
}

impl CourseRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, course: &NewCourse) -> Result<courses::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        let model = courses::ActiveModel {
            title: Set(course.title.clone()),
            slug: Set(course.slug.to_lowercase()),
            description: Set(course.description.clone()),
            thumbnail: Set(course.thumbnail.clone()),
            category: Set(course.category.clone()),
            tags: Set(serde_json::to_string(&course.tags).ok()),
            requirements: Set(serde_json::to_string(&course.requirements).ok()),
            level: Set(course.level.clone()),
            duration_minutes: Set(course.duration_minutes),
            published: Set(course.published),
            featured: Set(course.featured),
            created_by: Set(course.created_by),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let inserted = model
            .insert(&self.conn)
            .await
            .context("Failed to insert course")?;

        info!("Course created: {} ({})", inserted.title, inserted.slug);
        Ok(inserted)
    }

    pub async fn get(&self, id: i32) -> Result<Option<courses::Model>> {
        Courses::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query course by ID")
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<courses::Model>> {
        Courses::find()
            .filter(courses::Column::Slug.eq(slug.to_lowercase()))
            .one(&self.conn)
            .await
            .context("Failed to query course by slug")
    }

    /// Resolve a course by numeric id or slug, matching how the public
    /// API addresses courses.
    pub async fn get_by_ref(&self, reference: &str) -> Result<Option<courses::Model>> {
        if let Ok(id) = reference.parse::<i32>() {
            self.get(id).await
        } else {
            self.get_by_slug(reference).await
        }
    }

    pub async fn list(&self, filter: &CourseFilter) -> Result<CoursePage> {
        let mut query = Courses::find();

        if let Some(search) = filter.search.as_deref().map(str::trim)
            && !search.is_empty()
        {
            query = query.filter(
                Condition::any()
                    .add(courses::Column::Title.contains(search))
                    .add(courses::Column::Description.contains(search))
                    .add(courses::Column::Tags.contains(search)),
            );
        }

        if let Some(category) = filter.category.as_deref()
            && !category.is_empty()
        {
            query = query.filter(courses::Column::Category.eq(category));
        }

        if let Some(level) = filter.level.as_deref()
            && !level.is_empty()
        {
            query = query.filter(courses::Column::Level.eq(level));
        }

        if filter.featured_only {
            query = query.filter(courses::Column::Featured.eq(true));
        }

        if !filter.include_unpublished {
            query = query.filter(courses::Column::Published.eq(true));
        }

        query = match filter.sort {
            CourseSort::Newest => query.order_by_desc(courses::Column::CreatedAt),
            CourseSort::Oldest => query.order_by_asc(courses::Column::CreatedAt),
            CourseSort::NameAsc => query.order_by_asc(courses::Column::Title),
            CourseSort::NameDesc => query.order_by_desc(courses::Column::Title),
        };

        let limit = filter.limit.clamp(1, 100);
        let page = filter.page.max(1);

        let paginator = query.paginate(&self.conn, limit);
        let total = paginator
            .num_items()
            .await
            .context("Failed to count courses")?;
        let courses = paginator
            .fetch_page(page - 1)
            .await
            .context("Failed to fetch course page")?;

        Ok(CoursePage {
            courses,
            total,
            page,
            limit,
            pages: total.div_ceil(limit),
        })
    }

    pub async fn update(&self, id: i32, changes: CourseChanges) -> Result<Option<courses::Model>> {
        let Some(course) = Courses::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let mut active: courses::ActiveModel = course.into();

        if let Some(title) = changes.title {
            active.title = Set(title);
        }
        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        if let Some(thumbnail) = changes.thumbnail {
            active.thumbnail = Set(thumbnail);
        }
        if let Some(category) = changes.category {
            active.category = Set(category);
        }
        if let Some(tags) = changes.tags {
            active.tags = Set(serde_json::to_string(&tags).ok());
        }
        if let Some(requirements) = changes.requirements {
            active.requirements = Set(serde_json::to_string(&requirements).ok());
        }
        if let Some(level) = changes.level {
            active.level = Set(level);
        }
        if let Some(duration) = changes.duration_minutes {
            active.duration_minutes = Set(duration);
        }
        if let Some(published) = changes.published {
            active.published = Set(published);
        }
        if let Some(featured) = changes.featured {
            active.featured = Set(featured);
        }

        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let updated = active
            .update(&self.conn)
            .await
            .context("Failed to update course")?;

        Ok(Some(updated))
    }

    /// Delete a course and its lessons in one transaction.
    pub async fn remove(&self, id: i32) -> Result<bool> {
        let txn = self.conn.begin().await?;

        Lessons::delete_many()
            .filter(lessons::Column::CourseId.eq(id))
            .exec(&txn)
            .await
            .context("Failed to delete course lessons")?;

        let result = Courses::delete_by_id(id)
            .exec(&txn)
            .await
            .context("Failed to delete course")?;

        txn.commit().await?;

        Ok(result.rows_affected > 0)
    }
}
