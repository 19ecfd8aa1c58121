use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr,
};

use crate::entities::{courses, favorites, prelude::*};

pub struct FavoriteRepository {
    conn: DatabaseConnection,
}

impl FavoriteRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Add a course to the user's favorites. Returns `false` if it was
    /// already favorited, relying on the unique index rather than a
    /// read-then-write check.
    pub async fn add(&self, user_id: i32, course_id: i32) -> Result<bool> {
        let model = favorites::ActiveModel {
            user_id: Set(user_id),
            course_id: Set(course_id),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        match model.insert(&self.conn).await {
            Ok(_) => Ok(true),
            Err(e) => match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => Ok(false),
                _ => Err(e).context("Failed to insert favorite"),
            },
        }
    }

    pub async fn remove(&self, user_id: i32, course_id: i32) -> Result<bool> {
        let result = Favorites::delete_many()
            .filter(favorites::Column::UserId.eq(user_id))
            .filter(favorites::Column::CourseId.eq(course_id))
            .exec(&self.conn)
            .await
            .context("Failed to delete favorite")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn contains(&self, user_id: i32, course_id: i32) -> Result<bool> {
        let found = Favorites::find()
            .filter(favorites::Column::UserId.eq(user_id))
            .filter(favorites::Column::CourseId.eq(course_id))
            .one(&self.conn)
            .await
            .context("Failed to query favorite")?;

        Ok(found.is_some())
    }

    /// Favorited courses, newest favorite first.
    pub async fn list_courses(&self, user_id: i32) -> Result<Vec<courses::Model>> {
        let rows = Favorites::find()
            .filter(favorites::Column::UserId.eq(user_id))
            .order_by_desc(favorites::Column::CreatedAt)
            .find_also_related(Courses)
            .all(&self.conn)
            .await
            .context("Failed to list favorites")?;

        Ok(rows.into_iter().filter_map(|(_, course)| course).collect())
    }
}
