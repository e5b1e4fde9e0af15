//! Admin entity - Platform administrator accounts.
//!
//! Only the fields the notification fan-out needs are modelled here; credentials and roles
//! belong to the authentication service.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Admin database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "admins")]
pub struct Model {
    /// Unique identifier for the admin
    #[sea_orm(primary_key)]
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Login email, unique across admins
    #[sea_orm(unique)]
    pub email: String,
    /// Only active admins receive in-app notifications
    pub is_active: bool,
    pub created_at: DateTimeUtc,
}

/// `Admin` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
