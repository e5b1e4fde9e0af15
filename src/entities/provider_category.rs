//! Provider category entity - A provider's membership in a category.
//!
//! Budget matching works on the `category_id` of these rows; the optional sub-category is
//! informational.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Provider category database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "provider_categories")]
pub struct Model {
    /// Unique identifier for the membership
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Provider declaring the membership
    pub provider_id: i64,
    /// Declared category
    pub category_id: i64,
    /// Optional refinement inside the category
    pub sub_category_id: Option<i64>,
}

/// Defines relationships between `ProviderCategory` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each membership belongs to one provider
    #[sea_orm(
        belongs_to = "super::provider::Entity",
        from = "Column::ProviderId",
        to = "super::provider::Column::Id",
        on_delete = "Cascade"
    )]
    Provider,
    /// Each membership points at one category
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_delete = "Cascade"
    )]
    Category,
}

impl Related<super::provider::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Provider.def()
    }
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
