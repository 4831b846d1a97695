use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::types::{CategoryIds, split_languages};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "websites")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub url: String,
    #[sea_orm(unique)]
    pub slug: String,
    /// Comma-joined language codes, e.g. `en,fr`.
    pub languages: String,
    pub author: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub thumbnail: Option<String>,
    #[sea_orm(column_type = "Json")]
    pub category_ids: CategoryIds,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

impl Model {
    pub fn language_codes(&self) -> Vec<String> {
        split_languages(&self.languages)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::category::Entity")]
    Categories,
    #[sea_orm(has_many = "super::article::Entity")]
    Articles,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Categories.def()
    }
}

impl Related<super::article::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Articles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
