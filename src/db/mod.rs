use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::SecurityConfig;
use crate::entities::{courses, enrollments, lesson_progress, lessons, promo_codes};

pub mod migrator;
pub mod repositories;

pub use repositories::course::{CourseChanges, CourseFilter, CoursePage, CourseSort, NewCourse};
pub use repositories::lesson::{LessonChanges, NewLesson};
pub use repositories::promo::{NewPromoCode, PromoCodeChanges, RedeemOutcome};
pub use repositories::user::User;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn course_repo(&self) -> repositories::course::CourseRepository {
        repositories::course::CourseRepository::new(self.conn.clone())
    }

    fn lesson_repo(&self) -> repositories::lesson::LessonRepository {
        repositories::lesson::LessonRepository::new(self.conn.clone())
    }

    fn enrollment_repo(&self) -> repositories::enrollment::EnrollmentRepository {
        repositories::enrollment::EnrollmentRepository::new(self.conn.clone())
    }

    fn favorite_repo(&self) -> repositories::favorite::FavoriteRepository {
        repositories::favorite::FavoriteRepository::new(self.conn.clone())
    }

    fn promo_repo(&self) -> repositories::promo::PromoRepository {
        repositories::promo::PromoRepository::new(self.conn.clone())
    }

    // ========== Users ==========

    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: &str,
        config: Option<&SecurityConfig>,
    ) -> Result<User> {
        self.user_repo()
            .create(name, email, password, role, config)
            .await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn verify_user_password(&self, email: &str, password: &str) -> Result<Option<User>> {
        self.user_repo().verify_password(email, password).await
    }

    pub async fn update_user_password(
        &self,
        user_id: i32,
        new_password: &str,
        config: Option<&SecurityConfig>,
    ) -> Result<()> {
        self.user_repo()
            .update_password(user_id, new_password, config)
            .await
    }

    // ========== Courses ==========

    pub async fn create_course(&self, course: &NewCourse) -> Result<courses::Model> {
        self.course_repo().create(course).await
    }

    pub async fn get_course(&self, id: i32) -> Result<Option<courses::Model>> {
        self.course_repo().get(id).await
    }

    pub async fn get_course_by_slug(&self, slug: &str) -> Result<Option<courses::Model>> {
        self.course_repo().get_by_slug(slug).await
    }

    pub async fn get_course_by_ref(&self, reference: &str) -> Result<Option<courses::Model>> {
        self.course_repo().get_by_ref(reference).await
    }

    pub async fn list_courses(&self, filter: &CourseFilter) -> Result<CoursePage> {
        self.course_repo().list(filter).await
    }

    pub async fn update_course(
        &self,
        id: i32,
        changes: CourseChanges,
    ) -> Result<Option<courses::Model>> {
        self.course_repo().update(id, changes).await
    }

    pub async fn remove_course(&self, id: i32) -> Result<bool> {
        self.course_repo().remove(id).await
    }

    // ========== Lessons ==========

    pub async fn create_lesson(&self, lesson: &NewLesson) -> Result<lessons::Model> {
        self.lesson_repo().create(lesson).await
    }

    pub async fn get_lesson(&self, id: i32) -> Result<Option<lessons::Model>> {
        self.lesson_repo().get(id).await
    }

    pub async fn get_lesson_by_slug(&self, slug: &str) -> Result<Option<lessons::Model>> {
        self.lesson_repo().get_by_slug(slug).await
    }

    pub async fn list_lessons(
        &self,
        course_id: i32,
        include_unpublished: bool,
    ) -> Result<Vec<lessons::Model>> {
        self.lesson_repo()
            .list_for_course(course_id, include_unpublished)
            .await
    }

    pub async fn update_lesson(
        &self,
        id: i32,
        changes: LessonChanges,
    ) -> Result<Option<lessons::Model>> {
        self.lesson_repo().update(id, changes).await
    }

    pub async fn remove_lesson(&self, id: i32) -> Result<bool> {
        self.lesson_repo().remove(id).await
    }

    // ========== Enrollments & progress ==========

    pub async fn enroll(&self, user_id: i32, course_id: i32) -> Result<enrollments::Model> {
        self.enrollment_repo().enroll(user_id, course_id).await
    }

    pub async fn get_enrollment(
        &self,
        user_id: i32,
        course_id: i32,
    ) -> Result<Option<enrollments::Model>> {
        self.enrollment_repo().get(user_id, course_id).await
    }

    pub async fn list_enrollments(
        &self,
        user_id: i32,
    ) -> Result<Vec<(enrollments::Model, courses::Model)>> {
        self.enrollment_repo().list_for_user(user_id).await
    }

    pub async fn get_lesson_progress(
        &self,
        user_id: i32,
        lesson_id: i32,
    ) -> Result<Option<lesson_progress::Model>> {
        self.enrollment_repo()
            .get_lesson_progress(user_id, lesson_id)
            .await
    }

    pub async fn record_lesson_progress(
        &self,
        user_id: i32,
        lesson_id: i32,
        progress: i32,
    ) -> Result<lesson_progress::Model> {
        self.enrollment_repo()
            .upsert_lesson_progress(user_id, lesson_id, progress)
            .await
    }

    pub async fn refresh_course_progress(&self, user_id: i32, course_id: i32) -> Result<i32> {
        self.enrollment_repo()
            .refresh_course_progress(user_id, course_id)
            .await
    }

    // ========== Favorites ==========

    pub async fn add_favorite(&self, user_id: i32, course_id: i32) -> Result<bool> {
        self.favorite_repo().add(user_id, course_id).await
    }

    pub async fn remove_favorite(&self, user_id: i32, course_id: i32) -> Result<bool> {
        self.favorite_repo().remove(user_id, course_id).await
    }

    pub async fn is_favorite(&self, user_id: i32, course_id: i32) -> Result<bool> {
        self.favorite_repo().contains(user_id, course_id).await
    }

    pub async fn list_favorite_courses(&self, user_id: i32) -> Result<Vec<courses::Model>> {
        self.favorite_repo().list_courses(user_id).await
    }

    // ========== Promo codes ==========

    pub async fn create_promo_code(&self, promo: &NewPromoCode) -> Result<promo_codes::Model> {
        self.promo_repo().create(promo).await
    }

    pub async fn get_promo_code(&self, id: i32) -> Result<Option<promo_codes::Model>> {
        self.promo_repo().get(id).await
    }

    pub async fn get_promo_code_by_code(&self, code: &str) -> Result<Option<promo_codes::Model>> {
        self.promo_repo().get_by_code(code).await
    }

    pub async fn list_promo_codes(&self) -> Result<Vec<promo_codes::Model>> {
        self.promo_repo().list().await
    }

    pub async fn update_promo_code(
        &self,
        id: i32,
        changes: PromoCodeChanges,
    ) -> Result<Option<promo_codes::Model>> {
        self.promo_repo().update(id, changes).await
    }

    pub async fn remove_promo_code(&self, id: i32) -> Result<bool> {
        self.promo_repo().remove(id).await
    }

    pub async fn deactivate_promo_code(&self, id: i32) -> Result<()> {
        self.promo_repo().deactivate(id).await
    }

    pub async fn has_redeemed(&self, promo_code_id: i32, user_id: i32) -> Result<bool> {
        self.promo_repo().has_redeemed(promo_code_id, user_id).await
    }

    pub async fn find_redeemed_code_for(
        &self,
        user_id: i32,
        lesson_id: i32,
        course_id: i32,
    ) -> Result<Option<promo_codes::Model>> {
        self.promo_repo()
            .find_redeemed_code_for(user_id, lesson_id, course_id)
            .await
    }

    pub async fn redeem_promo_code(
        &self,
        promo_code_id: i32,
        user_id: i32,
    ) -> Result<RedeemOutcome> {
        self.promo_repo().redeem(promo_code_id, user_id).await
    }
}
