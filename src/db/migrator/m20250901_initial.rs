use crate::entities::prelude::*;
use crate::entities::{enrollments, favorites, lesson_progress, lessons, promo_redemptions, users};
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Seeded admin account; the password should be rotated after first login.
const DEFAULT_ADMIN_EMAIL: &str = "admin@lektra.local";
const DEFAULT_ADMIN_PASSWORD: &str = "password";

fn hash_default_password() -> String {
    use argon2::{
        Argon2,
        password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
    };

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(DEFAULT_ADMIN_PASSWORD.as_bytes(), &salt)
        .expect("Failed to hash default admin password")
        .to_string()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Users)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Courses)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Lessons)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Enrollments)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(LessonProgress)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Favorites)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(PromoCodes)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(PromoRedemptions)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // One enrollment / progress row / favorite per user-target pair.
        // The promo_redemptions index is the database-level guard against
        // double redemption.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx-enrollments-user-course")
                    .table(Enrollments)
                    .col(enrollments::Column::UserId)
                    .col(enrollments::Column::CourseId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx-lesson-progress-user-lesson")
                    .table(LessonProgress)
                    .col(lesson_progress::Column::UserId)
                    .col(lesson_progress::Column::LessonId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx-favorites-user-course")
                    .table(Favorites)
                    .col(favorites::Column::UserId)
                    .col(favorites::Column::CourseId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx-promo-redemptions-code-user")
                    .table(PromoRedemptions)
                    .col(promo_redemptions::Column::PromoCodeId)
                    .col(promo_redemptions::Column::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx-lessons-course-order")
                    .table(Lessons)
                    .col(lessons::Column::CourseId)
                    .col(lessons::Column::SortOrder)
                    .to_owned(),
            )
            .await?;

        let now = chrono::Utc::now().to_rfc3339();
        let password_hash = hash_default_password();

        let insert = sea_orm_migration::sea_query::Query::insert()
            .into_table(Users)
            .columns([
                users::Column::Name,
                users::Column::Email,
                users::Column::PasswordHash,
                users::Column::Role,
                users::Column::CreatedAt,
                users::Column::UpdatedAt,
            ])
            .values_panic([
                "Administrator".into(),
                DEFAULT_ADMIN_EMAIL.into(),
                password_hash.into(),
                "admin".into(),
                now.clone().into(),
                now.into(),
            ])
            .to_owned();

        manager.exec_stmt(insert).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PromoRedemptions).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PromoCodes).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Favorites).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LessonProgress).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Enrollments).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Lessons).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Courses).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).to_owned())
            .await?;

        Ok(())
    }
}
