//! Notification collaborators and the fan-out that drives them.
//!
//! The traits here are the seams between the engine and the outside world. Each shipped
//! implementation lives in its own module; tests substitute recording or failing doubles.

use crate::{
    core::{demand::BudgetLine, notification::NewNotification},
    entities::{AdminModel, DemandModel, NotificationModel, OrganizerModel, ProviderModel},
    errors::Result,
};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

/// Background execution of notification jobs
pub mod dispatcher;
/// Concurrent, failure-isolated notification units
pub mod fanout;
/// Email composition and the composing mailer
pub mod mail;
/// Live events for connected admin sessions
pub mod realtime;
/// SMTP mail transport
pub mod smtp;
/// Database-backed in-app notification store
pub mod store;
/// WhatsApp Cloud API client
pub mod whatsapp;

/// Outcome of a batch send: recipient addresses that were accepted or rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Addresses the channel accepted
    pub success: Vec<String>,
    /// Addresses the channel rejected
    pub failed: Vec<String>,
}

impl DeliveryReport {
    /// Nothing was rejected.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outgoing email.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Announces a demand to one provider. Providers without an email address are skipped.
    async fn send_demand_notification(
        &self,
        provider: &ProviderModel,
        demand: &DemandModel,
    ) -> Result<()>;

    /// Announces a demand to several providers, one message each.
    ///
    /// `provider_categories` maps provider ids to their declared categories so the message can
    /// show the budget lines relevant to each provider.
    async fn send_demand_notification_batch(
        &self,
        providers: &[ProviderModel],
        demand: &DemandModel,
        budgets: &[BudgetLine],
        provider_categories: &HashMap<i64, Vec<i64>>,
    ) -> DeliveryReport {
        let _ = (budgets, provider_categories);
        let mut report = DeliveryReport::default();
        for provider in providers {
            let Some(email) = provider.email.clone() else {
                continue;
            };
            match self.send_demand_notification(provider, demand).await {
                Ok(()) => report.success.push(email),
                Err(err) => {
                    warn!(provider_id = provider.id, error = %err, "Demand email not sent");
                    report.failed.push(email);
                }
            }
        }
        report
    }

    /// Confirms to the organizer that the demand was received.
    async fn send_organizer_confirmation(
        &self,
        organizer: &OrganizerModel,
        demand: &DemandModel,
        budgets: &[BudgetLine],
    ) -> Result<()>;

    /// Summarizes a new demand for the platform administrators.
    async fn send_admin_notification(
        &self,
        demand: &DemandModel,
        organizer: &OrganizerModel,
        providers: &[ProviderModel],
        budgets: &[BudgetLine],
    ) -> Result<()>;

    /// Tells a provider that the organizer confirmed the mission.
    async fn send_mission_confirmed_email(
        &self,
        provider: &ProviderModel,
        demand: &DemandModel,
        organizer: &OrganizerModel,
    ) -> Result<()>;
}

/// Outgoing instant messages.
///
/// `Ok(false)` means the message was skipped (channel disabled or no number), not that it
/// failed.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Whether the channel has the credentials it needs.
    fn is_enabled(&self) -> bool;

    /// Announces a demand to one provider.
    async fn send_demand_notification(
        &self,
        provider: &ProviderModel,
        demand: &DemandModel,
    ) -> Result<bool>;

    /// Announces a demand to several providers. Skipped sends, including providers without a
    /// phone number, are left out of the report.
    async fn send_demand_notification_batch(
        &self,
        providers: &[ProviderModel],
        demand: &DemandModel,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for provider in providers {
            let Some(phone) = provider.phone.clone() else {
                continue;
            };
            match self.send_demand_notification(provider, demand).await {
                Ok(true) => report.success.push(phone),
                Ok(false) => {}
                Err(err) => {
                    warn!(provider_id = provider.id, error = %err, "Demand message not sent");
                    report.failed.push(phone);
                }
            }
        }
        report
    }

    /// Summarizes a new demand for the admin number.
    async fn send_admin_notification(
        &self,
        demand: &DemandModel,
        organizer: &OrganizerModel,
        providers: &[ProviderModel],
    ) -> Result<bool>;
}

/// Live broadcast to connected admin sessions.
pub trait RealtimeBroadcaster: Send + Sync {
    /// Emits an event to every connected admin, returning how many received it.
    fn emit_to_admin_room(&self, event: &str, payload: serde_json::Value) -> Result<usize>;
}

/// Persisted in-app notifications.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Admin accounts that should receive in-app notifications.
    async fn active_admins(&self) -> Result<Vec<AdminModel>>;

    /// Persists one notification.
    async fn create_notification(&self, notification: NewNotification)
    -> Result<NotificationModel>;
}
