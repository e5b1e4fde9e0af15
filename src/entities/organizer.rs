//! Organizer entity - The person or company placing demands.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Organizer database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "organizers")]
pub struct Model {
    /// Unique identifier for the organizer
    #[sea_orm(primary_key)]
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    /// Phone number, always collected
    pub phone: String,
    /// Email address, optional
    pub email: Option<String>,
    pub commune: String,
    pub department: String,
    /// When the organizer registered
    pub created_at: DateTimeUtc,
}

impl Model {
    /// "First Last"
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Defines relationships between Organizer and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One organizer places many demands
    #[sea_orm(has_many = "super::demand::Entity")]
    Demands,
}

impl Related<super::demand::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Demands.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
