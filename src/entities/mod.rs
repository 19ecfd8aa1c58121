pub mod prelude;

pub mod courses;
pub mod enrollments;
pub mod favorites;
pub mod lesson_progress;
pub mod lessons;
pub mod promo_codes;
pub mod promo_redemptions;
pub mod users;
