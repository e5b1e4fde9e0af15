//! Demand provider entity - One provider's engagement on one demand.
//!
//! Each row runs its own instance of the status machine, independent from the parent
//! demand's status. `contact_unlocked_at` stays empty until contact details are revealed.
//! `(demand_id, provider_id)` is unique.

use super::enums::{DemandStatus, NonConversionReason};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Demand provider database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "demand_providers")]
pub struct Model {
    /// Unique identifier for the pairing
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Demand side of the pairing
    pub demand_id: i64,
    /// Provider side of the pairing
    pub provider_id: i64,
    /// Status of this engagement
    pub status: DemandStatus,
    /// Free-text answer from the provider
    pub provider_response: Option<String>,
    /// Whether the engagement became a paid mission
    pub converted_to_mission: bool,
    /// Why the engagement did not convert, if it did not
    pub non_conversion_reason: Option<NonConversionReason>,
    /// Additional explanation for the non-conversion
    pub non_conversion_comment: Option<String>,
    /// When contact details were revealed to both parties
    pub contact_unlocked_at: Option<DateTimeUtc>,
    /// Payment recorded by the payments service, if any
    pub payment_id: Option<i64>,
    /// When the pairing was created
    pub created_at: DateTimeUtc,
    /// When the pairing was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `DemandProvider` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each pairing belongs to one demand
    #[sea_orm(
        belongs_to = "super::demand::Entity",
        from = "Column::DemandId",
        to = "super::demand::Column::Id",
        on_delete = "Cascade"
    )]
    Demand,
    /// Each pairing belongs to one provider
    #[sea_orm(
        belongs_to = "super::provider::Entity",
        from = "Column::ProviderId",
        to = "super::provider::Column::Id",
        on_delete = "Cascade"
    )]
    Provider,
}

impl Related<super::demand::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Demand.def()
    }
}

impl Related<super::provider::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Provider.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
