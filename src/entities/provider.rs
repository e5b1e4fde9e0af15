//! Provider entity - A service provider who can be attached to demands.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Provider database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "providers")]
pub struct Model {
    /// Unique identifier for the provider
    #[sea_orm(primary_key)]
    pub id: i64,
    /// First name of the contact person
    pub first_name: String,
    /// Last name of the contact person
    pub last_name: String,
    /// Trading name
    pub company_name: String,
    /// Email address, if the provider gave one
    pub email: Option<String>,
    /// Phone number used for WhatsApp
    pub phone: Option<String>,
    /// Short description of the main activity
    pub activity: Option<String>,
    /// Deactivated providers keep their history
    pub is_active: bool,
    /// When the provider registered
    pub created_at: DateTimeUtc,
}

impl Model {
    /// "First Last", the name used in eligibility errors and messages.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Defines relationships between Provider and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One provider declares many categories
    #[sea_orm(has_many = "super::provider_category::Entity")]
    ProviderCategories,
    /// One provider is engaged on many demands
    #[sea_orm(has_many = "super::demand_provider::Entity")]
    DemandProviders,
}

impl Related<super::provider_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProviderCategories.def()
    }
}

impl Related<super::demand_provider::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DemandProviders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
