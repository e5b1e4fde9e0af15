//! `SeaORM`-backed [`NotificationStore`].

use super::NotificationStore;
use crate::{
    core::notification::{self, NewNotification},
    entities::{Admin, AdminColumn, AdminModel, NotificationModel},
    errors::Result,
};
use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

/// Reads admins and writes notifications through a shared connection.
#[derive(Debug, Clone)]
pub struct SqlNotificationStore {
    db: DatabaseConnection,
}

impl SqlNotificationStore {
    /// Wraps a connection.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationStore for SqlNotificationStore {
    async fn active_admins(&self) -> Result<Vec<AdminModel>> {
        Admin::find()
            .filter(AdminColumn::IsActive.eq(true))
            .order_by_asc(AdminColumn::Id)
            .all(&self.db)
            .await
            .map_err(Into::into)
    }

    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<NotificationModel> {
        notification::create_notification(&self.db, notification).await
    }
}
