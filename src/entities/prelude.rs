pub use super::courses::Entity as Courses;
pub use super::enrollments::Entity as Enrollments;
pub use super::favorites::Entity as Favorites;
pub use super::lesson_progress::Entity as LessonProgress;
pub use super::lessons::Entity as Lessons;
pub use super::promo_codes::Entity as PromoCodes;
pub use super::promo_redemptions::Entity as PromoRedemptions;
pub use super::users::Entity as Users;
