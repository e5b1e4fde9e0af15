//! Notification entity - Persisted in-app notifications.
//!
//! One row per recipient. `content` is free-form JSON (at least a `message` key) rendered
//! by the dashboards.

use super::enums::{NotificationChannel, NotificationStatus, NotificationType};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    /// Unique identifier for the notification
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Id of the recipient in its own table
    pub recipient_id: i64,
    /// Which table `recipient_id` refers to (`"admin"`, `"organizer"` or `"provider"`)
    pub recipient_type: String,
    /// What happened
    pub notification_type: NotificationType,
    /// How the recipient is reached
    pub channel: NotificationChannel,
    /// Payload rendered by the dashboards
    pub content: Json,
    pub sent_at: Option<DateTimeUtc>,
    /// Set once the recipient opened the notification
    pub read_at: Option<DateTimeUtc>,
    pub status: NotificationStatus,
    pub error_message: Option<String>,
    pub created_at: DateTimeUtc,
}

/// `Notification` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
