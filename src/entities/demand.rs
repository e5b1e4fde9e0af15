//! Demand entity - An organizer's event request.
//!
//! A demand carries the event details, an optional overall budget and its own status.
//! Category budget lines and provider pairings hang off it and are removed with it.

use super::enums::DemandStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Demand database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "demands")]
pub struct Model {
    /// Unique identifier for the demand
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Organizer who owns the demand
    pub organizer_id: i64,
    /// Name of the person to contact about the event
    pub contact_name: String,
    /// Kind of event (e.g., "Wedding", "Corporate dinner")
    pub event_nature: String,
    /// Day of the event
    pub event_date: Date,
    /// Approximate number of guests, if known
    pub approximate_guests: Option<i32>,
    /// Venue or address
    pub location: Option<String>,
    /// Broader geographic zone used for provider matching
    pub geographic_zone: Option<String>,
    /// Optional overall budget in XOF
    pub budget: Option<f64>,
    /// Free-text notes from the organizer
    pub additional_info: Option<String>,
    /// Overall status, independent from each pairing's status
    pub status: DemandStatus,
    /// When the demand was created
    pub created_at: DateTimeUtc,
    /// When the demand was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Demand and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each demand belongs to one organizer
    #[sea_orm(
        belongs_to = "super::organizer::Entity",
        from = "Column::OrganizerId",
        to = "super::organizer::Column::Id",
        on_delete = "Cascade"
    )]
    Organizer,
    /// One demand has many category budget lines
    #[sea_orm(has_many = "super::demand_budget::Entity")]
    DemandBudgets,
    /// One demand has many provider pairings
    #[sea_orm(has_many = "super::demand_provider::Entity")]
    DemandProviders,
}

impl Related<super::organizer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organizer.def()
    }
}

impl Related<super::demand_budget::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DemandBudgets.def()
    }
}

impl Related<super::demand_provider::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DemandProviders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
