//! Persisted in-app notifications: creation, listing and read tracking.

use crate::{
    entities::{
        Notification, NotificationChannel, NotificationColumn, NotificationModel,
        NotificationStatus, NotificationType, notification,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{PaginatorTrait, QueryOrder, QuerySelect, Select, Set, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};

/// Page size used when the caller does not pass one.
pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// Who a notification is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientType {
    /// Row in `admins`
    Admin,
    /// Row in `organizers`
    Organizer,
    /// Row in `providers`
    Provider,
}

impl RecipientType {
    /// Value stored in the `recipient_type` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Organizer => "organizer",
            Self::Provider => "provider",
        }
    }
}

/// A notification about to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    /// Id of the recipient in its own table
    pub recipient_id: i64,
    /// Table the recipient lives in
    pub recipient_type: RecipientType,
    /// What happened
    pub notification_type: NotificationType,
    /// How the recipient is reached
    pub channel: NotificationChannel,
    /// Dashboard payload, at least a `message` key
    pub content: Json,
}

/// Persists a notification in the sent state.
pub async fn create_notification(
    db: &DatabaseConnection,
    new: NewNotification,
) -> Result<NotificationModel> {
    let now = Utc::now();
    let model = notification::ActiveModel {
        recipient_id: Set(new.recipient_id),
        recipient_type: Set(new.recipient_type.as_str().to_string()),
        notification_type: Set(new.notification_type),
        channel: Set(new.channel),
        content: Set(new.content),
        sent_at: Set(Some(now)),
        read_at: Set(None),
        status: Set(NotificationStatus::Sent),
        error_message: Set(None),
        created_at: Set(now),
        ..Default::default()
    };
    model.insert(db).await.map_err(Into::into)
}

fn for_recipient(
    recipient_id: i64,
    recipient_type: RecipientType,
) -> Select<Notification> {
    Notification::find()
        .filter(NotificationColumn::RecipientId.eq(recipient_id))
        .filter(NotificationColumn::RecipientType.eq(recipient_type.as_str()))
}

/// Lists a recipient's notifications, newest first.
pub async fn list_notifications(
    db: &DatabaseConnection,
    recipient_id: i64,
    recipient_type: RecipientType,
    limit: Option<u64>,
    offset: Option<u64>,
) -> Result<Vec<NotificationModel>> {
    for_recipient(recipient_id, recipient_type)
        .order_by_desc(NotificationColumn::CreatedAt)
        .order_by_desc(NotificationColumn::Id)
        .limit(limit.unwrap_or(DEFAULT_PAGE_SIZE))
        .offset(offset.unwrap_or(0))
        .all(db)
        .await
        .map_err(Into::into)
}

/// Number of notifications the recipient has not opened.
pub async fn unread_count(
    db: &DatabaseConnection,
    recipient_id: i64,
    recipient_type: RecipientType,
) -> Result<u64> {
    for_recipient(recipient_id, recipient_type)
        .filter(NotificationColumn::ReadAt.is_null())
        .count(db)
        .await
        .map_err(Into::into)
}

/// Marks one of the recipient's notifications as read. Reading twice keeps the first time.
///
/// # Errors
/// Returns [`Error::NotificationNotFound`] if the notification does not belong to the
/// recipient.
pub async fn mark_as_read(
    db: &DatabaseConnection,
    id: i64,
    recipient_id: i64,
    recipient_type: RecipientType,
) -> Result<NotificationModel> {
    let found = for_recipient(recipient_id, recipient_type)
        .filter(NotificationColumn::Id.eq(id))
        .one(db)
        .await?
        .ok_or(Error::NotificationNotFound { id })?;

    if found.read_at.is_some() {
        return Ok(found);
    }

    let mut active: notification::ActiveModel = found.into();
    active.read_at = Set(Some(Utc::now()));
    active.update(db).await.map_err(Into::into)
}

/// Marks every unread notification of the recipient as read, returning how many changed.
pub async fn mark_all_as_read(
    db: &DatabaseConnection,
    recipient_id: i64,
    recipient_type: RecipientType,
) -> Result<u64> {
    let result = Notification::update_many()
        .col_expr(NotificationColumn::ReadAt, Expr::value(Some(Utc::now())))
        .filter(NotificationColumn::RecipientId.eq(recipient_id))
        .filter(NotificationColumn::RecipientType.eq(recipient_type.as_str()))
        .filter(NotificationColumn::ReadAt.is_null())
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use serde_json::json;

    fn admin_notice(recipient_id: i64, message: &str) -> NewNotification {
        NewNotification {
            recipient_id,
            recipient_type: RecipientType::Admin,
            notification_type: NotificationType::NewDemand,
            channel: NotificationChannel::InApp,
            content: json!({ "message": message }),
        }
    }

    #[tokio::test]
    async fn test_create_and_list_notifications() -> Result<()> {
        let db = setup_test_db().await?;

        create_notification(&db, admin_notice(1, "first")).await?;
        create_notification(&db, admin_notice(1, "second")).await?;
        create_notification(&db, admin_notice(2, "other admin")).await?;

        let listed = list_notifications(&db, 1, RecipientType::Admin, None, None).await?;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].content["message"], "second");
        assert_eq!(listed[0].status, NotificationStatus::Sent);
        assert!(listed[0].sent_at.is_some());

        let page = list_notifications(&db, 1, RecipientType::Admin, Some(1), Some(1)).await?;
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].content["message"], "first");

        let as_provider = list_notifications(&db, 1, RecipientType::Provider, None, None).await?;
        assert!(as_provider.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_read_tracking() -> Result<()> {
        let db = setup_test_db().await?;

        let first = create_notification(&db, admin_notice(1, "first")).await?;
        create_notification(&db, admin_notice(1, "second")).await?;
        create_notification(&db, admin_notice(1, "third")).await?;
        assert_eq!(unread_count(&db, 1, RecipientType::Admin).await?, 3);

        let read = mark_as_read(&db, first.id, 1, RecipientType::Admin).await?;
        assert!(read.read_at.is_some());
        let again = mark_as_read(&db, first.id, 1, RecipientType::Admin).await?;
        assert_eq!(again.read_at, read.read_at);
        assert_eq!(unread_count(&db, 1, RecipientType::Admin).await?, 2);

        assert_eq!(mark_all_as_read(&db, 1, RecipientType::Admin).await?, 2);
        assert_eq!(unread_count(&db, 1, RecipientType::Admin).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_mark_as_read_checks_recipient() -> Result<()> {
        let db = setup_test_db().await?;
        let notice = create_notification(&db, admin_notice(1, "mine")).await?;

        let result = mark_as_read(&db, notice.id, 2, RecipientType::Admin).await;
        assert!(matches!(result, Err(Error::NotificationNotFound { .. })));
        Ok(())
    }
}
