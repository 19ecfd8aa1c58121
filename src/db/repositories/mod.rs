pub mod course;
pub mod enrollment;
pub mod favorite;
pub mod lesson;
pub mod promo;
pub mod user;
