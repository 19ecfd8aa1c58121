use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "lessons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub course_id: i32,

    pub title: String,

    #[sea_orm(unique)]
    pub slug: String,

    pub description: String,

    pub youtube_id: String,

    pub duration_seconds: i32,

    /// Position within the course's lesson sequence
    pub sort_order: i32,

    pub published: bool,

    /// Gated lessons require a redeemed promo code (or enrollment)
    pub requires_promo_code: bool,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::courses::Entity",
        from = "Column::CourseId",
        to = "super::courses::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Courses,
    #[sea_orm(has_many = "super::lesson_progress::Entity")]
    LessonProgress,
    #[sea_orm(has_many = "super::promo_codes::Entity")]
    PromoCodes,
}

impl Related<super::courses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Courses.def()
    }
}

impl Related<super::lesson_progress::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LessonProgress.def()
    }
}

impl Related<super::promo_codes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PromoCodes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
