use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "promo_codes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Stored uppercase; lookups normalize first
    #[sea_orm(unique)]
    pub code: String,

    /// Optional course scope; None means any course
    pub course_id: Option<i32>,

    /// Optional lesson scope; None means any lesson
    pub lesson_id: Option<i32>,

    pub description: String,

    /// RFC 3339 timestamp; None means the code never expires
    pub expires_at: Option<String>,

    /// None means unlimited uses
    pub max_uses: Option<i32>,

    pub current_uses: i32,

    /// Invariant: false whenever expired or `current_uses >= max_uses`
    pub active: bool,

    pub created_by: Option<i32>,

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
        on_delete = "NoAction"
    )]
    Courses,
    #[sea_orm(
        belongs_to = "super::lessons::Entity",
        from = "Column::LessonId",
        to = "super::lessons::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Lessons,
    #[sea_orm(has_many = "super::promo_redemptions::Entity")]
    PromoRedemptions,
}

impl Related<super::courses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Courses.def()
    }
}

impl Related<super::lessons::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lessons.def()
    }
}

impl Related<super::promo_redemptions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PromoRedemptions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
