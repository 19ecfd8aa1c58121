use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "courses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,

    #[sea_orm(unique)]
    pub slug: String,

    pub description: String,

    pub thumbnail: String,

    pub category: String,

    /// JSON array of free-form tags
    pub tags: Option<String>,

    /// JSON array of prerequisite descriptions
    pub requirements: Option<String>,

    /// One of "beginner", "intermediate", "advanced"
    pub level: String,

    pub duration_minutes: i32,

    pub published: bool,

    pub featured: bool,

    pub created_by: Option<i32>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::lessons::Entity")]
    Lessons,
    #[sea_orm(has_many = "super::enrollments::Entity")]
    Enrollments,
    #[sea_orm(has_many = "super::favorites::Entity")]
    Favorites,
    #[sea_orm(has_many = "super::promo_codes::Entity")]
    PromoCodes,
}

impl Related<super::lessons::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lessons.def()
    }
}

impl Related<super::enrollments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollments.def()
    }
}

impl Related<super::favorites::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Favorites.def()
    }
}

impl Related<super::promo_codes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PromoCodes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
