//! Demand budget entity - A category-scoped allocation line under a demand.
//!
//! The set of category ids across a demand's budget lines decides which providers may be
//! attached to it. `(demand_id, category_id)` is unique, enforced by an index created in
//! `config::database::create_tables`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Demand budget database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "demand_budgets")]
pub struct Model {
    /// Unique identifier for the budget line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Demand this line belongs to
    pub demand_id: i64,
    /// Service category the amount is earmarked for
    pub category_id: i64,
    /// Amount in XOF
    pub amount: f64,
    /// When the line was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `DemandBudget` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each budget line belongs to one demand
    #[sea_orm(
        belongs_to = "super::demand::Entity",
        from = "Column::DemandId",
        to = "super::demand::Column::Id",
        on_delete = "Cascade"
    )]
    Demand,
    /// Each budget line targets one category
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_delete = "Cascade"
    )]
    Category,
}

impl Related<super::demand::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Demand.def()
    }
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
