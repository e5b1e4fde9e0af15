//! Category entity - A service category providers declare and demands budget for.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Category database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    /// Unique identifier for the category
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name (e.g., "Catering")
    #[sea_orm(unique)]
    pub name: String,
    /// Stable slug used by configuration seeding
    #[sea_orm(unique)]
    pub slug: String,
    /// Optional description shown to organizers
    pub description: Option<String>,
    /// Position in category listings
    pub display_order: i32,
    /// Inactive categories stay referenced but are hidden from listings
    pub is_active: bool,
}

/// Defines relationships between Category and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One category is declared by many providers
    #[sea_orm(has_many = "super::provider_category::Entity")]
    ProviderCategories,
    /// One category appears on many demand budget lines
    #[sea_orm(has_many = "super::demand_budget::Entity")]
    DemandBudgets,
}

impl Related<super::provider_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProviderCategories.def()
    }
}

impl Related<super::demand_budget::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DemandBudgets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
