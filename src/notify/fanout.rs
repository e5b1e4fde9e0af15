//! Notification fan-out.
//!
//! A new demand is announced on several channels at once: provider emails and WhatsApp
//! messages, the organizer's confirmation, the admin email and WhatsApp summary, a realtime
//! event for connected admins and one persisted in-app notification per active admin. Each
//! channel and recipient is an independent unit with its own timeout and panic boundary; a
//! unit that fails is logged and reported, and the remaining units carry on.

use super::{DeliveryReport, Mailer, Messenger, NotificationStore, RealtimeBroadcaster};
use crate::{
    core::{
        demand::{BudgetLine, DemandDetails},
        notification::{NewNotification, RecipientType},
    },
    entities::{
        AdminModel, DemandModel, DemandProviderModel, DemandStatus, NotificationChannel,
        NotificationType, OrganizerModel, ProviderModel,
    },
    errors::{Error, Result},
};
use futures::future::{BoxFuture, join, join_all};
use futures::FutureExt;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// Realtime event emitted when a demand is created
pub const DEMAND_CREATED_EVENT: &str = "demand_created";
/// Realtime event emitted when a pairing changes status
pub const STATUS_CHANGED_EVENT: &str = "demand_status_changed";

/// Channel and audience of one fan-out unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FanoutChannel {
    /// Demand announcement emailed to the paired providers
    ProviderEmail,
    /// Demand announcement sent to the paired providers over WhatsApp
    ProviderWhatsApp,
    /// Receipt emailed to the organizer
    OrganizerEmail,
    /// Summary emailed to the platform administrators
    AdminEmail,
    /// Summary sent to the admin WhatsApp number
    AdminWhatsApp,
    /// Live event for connected admin sessions
    AdminRealtime,
    /// Persisted notification for one admin
    AdminInApp,
    /// Mission confirmation emailed to a provider
    MissionConfirmedEmail,
}

impl FanoutChannel {
    /// Tag used in logs and reports.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::ProviderEmail => "provider_email",
            Self::ProviderWhatsApp => "provider_whatsapp",
            Self::OrganizerEmail => "organizer_email",
            Self::AdminEmail => "admin_email",
            Self::AdminWhatsApp => "admin_whatsapp",
            Self::AdminRealtime => "admin_realtime",
            Self::AdminInApp => "admin_in_app",
            Self::MissionConfirmedEmail => "mission_confirmed_email",
        }
    }
}

impl fmt::Display for FanoutChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// How a unit ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UnitStatus {
    /// The channel accepted the message
    Delivered,
    /// Nothing to send (no address, channel disabled)
    Skipped,
    /// The channel failed or the unit panicked
    Failed(String),
    /// The unit did not settle within the timeout
    TimedOut,
}

/// Result of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitOutcome {
    /// Channel of the unit
    pub channel: FanoutChannel,
    /// Who the unit addressed, e.g. `organizer:3`
    pub recipient: String,
    /// How it ended
    pub status: UnitStatus,
}

impl UnitOutcome {
    /// Failed or timed out.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self.status, UnitStatus::Failed(_) | UnitStatus::TimedOut)
    }

    /// The failure as an [`Error::Notification`], `None` if the unit did not fail.
    #[must_use]
    pub fn error(&self) -> Option<Error> {
        let message = match &self.status {
            UnitStatus::Failed(message) => message.clone(),
            UnitStatus::TimedOut => "timed out".to_string(),
            UnitStatus::Delivered | UnitStatus::Skipped => return None,
        };
        Some(Error::Notification {
            channel: self.channel.tag().to_string(),
            message,
        })
    }
}

/// Outcomes of every unit of one fan-out, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    /// One entry per unit
    pub outcomes: Vec<UnitOutcome>,
}

impl FanoutReport {
    /// Units that failed or timed out.
    pub fn failures(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_failure())
    }

    /// Number of delivered units.
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == UnitStatus::Delivered)
            .count()
    }

    /// Outcomes of one channel.
    pub fn for_channel(&self, channel: FanoutChannel) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes
            .iter()
            .filter(move |outcome| outcome.channel == channel)
    }

    fn log_summary(&self, what: &str) {
        let failed = self.failures().count();
        if failed == 0 {
            info!(
                units = self.outcomes.len(),
                delivered = self.delivered(),
                "{what} notifications settled"
            );
        } else {
            warn!(
                units = self.outcomes.len(),
                delivered = self.delivered(),
                failed,
                "{what} notifications settled with failures"
            );
        }
    }
}

/// Everything needed to announce a freshly created demand.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandAnnouncement {
    /// The created demand
    pub demand: DemandModel,
    /// Its organizer
    pub organizer: OrganizerModel,
    /// Providers paired at creation
    pub providers: Vec<ProviderModel>,
    /// Budget lines with their categories
    pub budgets: Vec<BudgetLine>,
    /// Declared categories of each provider
    pub provider_categories: HashMap<i64, Vec<i64>>,
}

impl DemandAnnouncement {
    /// Builds an announcement from a hydrated demand.
    #[must_use]
    pub fn from_details(
        details: &DemandDetails,
        provider_categories: HashMap<i64, Vec<i64>>,
    ) -> Self {
        Self {
            demand: details.demand.clone(),
            organizer: details.organizer.clone(),
            providers: details.provider_models(),
            budgets: details.budgets.clone(),
            provider_categories,
        }
    }
}

/// A pairing that moved from one status to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    /// The pairing after the update
    pub engagement: DemandProviderModel,
    /// Status before the update
    pub previous: DemandStatus,
}

fn batch_status(report: &DeliveryReport) -> UnitStatus {
    if !report.failed.is_empty() {
        UnitStatus::Failed(format!("rejected: {}", report.failed.join(", ")))
    } else if report.success.is_empty() {
        UnitStatus::Skipped
    } else {
        UnitStatus::Delivered
    }
}

const fn sent_or_skipped(sent: bool) -> UnitStatus {
    if sent {
        UnitStatus::Delivered
    } else {
        UnitStatus::Skipped
    }
}

fn provider_recipients(providers: &[ProviderModel]) -> String {
    let ids: Vec<String> = providers.iter().map(|p| p.id.to_string()).collect();
    format!("providers:{}", ids.join(","))
}

/// Drives the notification collaborators for demand events.
pub struct NotificationFanout {
    mailer: Arc<dyn Mailer>,
    messenger: Arc<dyn Messenger>,
    realtime: Arc<dyn RealtimeBroadcaster>,
    store: Arc<dyn NotificationStore>,
    unit_timeout: Duration,
}

impl fmt::Debug for NotificationFanout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationFanout")
            .field("whatsapp_enabled", &self.messenger.is_enabled())
            .field("unit_timeout", &self.unit_timeout)
            .finish_non_exhaustive()
    }
}

impl NotificationFanout {
    /// Wires the collaborators. `unit_timeout` bounds every unit separately.
    #[must_use]
    pub fn new(
        mailer: Arc<dyn Mailer>,
        messenger: Arc<dyn Messenger>,
        realtime: Arc<dyn RealtimeBroadcaster>,
        store: Arc<dyn NotificationStore>,
        unit_timeout: Duration,
    ) -> Self {
        Self {
            mailer,
            messenger,
            realtime,
            store,
            unit_timeout,
        }
    }

    /// Runs one unit under the timeout and a panic boundary, logging how it ended.
    async fn run_unit<F>(&self, channel: FanoutChannel, recipient: String, unit: F) -> UnitOutcome
    where
        F: Future<Output = Result<UnitStatus>> + Send,
    {
        let status = match timeout(self.unit_timeout, AssertUnwindSafe(unit).catch_unwind()).await
        {
            Ok(Ok(Ok(status))) => status,
            Ok(Ok(Err(err))) => UnitStatus::Failed(err.to_string()),
            Ok(Err(_)) => UnitStatus::Failed("unit panicked".to_string()),
            Err(_) => UnitStatus::TimedOut,
        };

        match &status {
            UnitStatus::Delivered => debug!(%channel, %recipient, "Notification delivered"),
            UnitStatus::Skipped => debug!(%channel, %recipient, "Notification skipped"),
            UnitStatus::Failed(reason) => {
                error!(%channel, %recipient, error = %reason, "Notification failed");
            }
            UnitStatus::TimedOut => warn!(
                %channel,
                %recipient,
                timeout_ms = u64::try_from(self.unit_timeout.as_millis()).unwrap_or(u64::MAX),
                "Notification timed out"
            ),
        }

        UnitOutcome {
            channel,
            recipient,
            status,
        }
    }

    /// Loads the active admins, or the failed in-app outcome if that is impossible.
    async fn load_admins(&self) -> std::result::Result<Vec<AdminModel>, UnitOutcome> {
        let failure = |status| UnitOutcome {
            channel: FanoutChannel::AdminInApp,
            recipient: "admins".to_string(),
            status,
        };
        match timeout(self.unit_timeout, self.store.active_admins()).await {
            Ok(Ok(admins)) => Ok(admins),
            Ok(Err(err)) => {
                error!(error = %err, "Could not load admins for in-app notifications");
                Err(failure(UnitStatus::Failed(err.to_string())))
            }
            Err(_) => {
                warn!("Loading admins for in-app notifications timed out");
                Err(failure(UnitStatus::TimedOut))
            }
        }
    }

    /// Loads the active admins, then persists one in-app notification for each.
    ///
    /// Runs alongside the other units, so a slow admin lookup only holds back in-app delivery.
    async fn notify_admins_in_app(
        &self,
        notification_type: NotificationType,
        content: serde_json::Value,
    ) -> Vec<UnitOutcome> {
        match self.load_admins().await {
            Ok(admins) => join_all(self.in_app_units(&admins, notification_type, &content)).await,
            Err(outcome) => vec![outcome],
        }
    }

    /// One in-app unit per admin, all carrying the same content.
    fn in_app_units<'a>(
        &'a self,
        admins: &[AdminModel],
        notification_type: NotificationType,
        content: &serde_json::Value,
    ) -> Vec<BoxFuture<'a, UnitOutcome>> {
        admins
            .iter()
            .map(|admin| {
                let notification = NewNotification {
                    recipient_id: admin.id,
                    recipient_type: RecipientType::Admin,
                    notification_type,
                    channel: NotificationChannel::InApp,
                    content: content.clone(),
                };
                self.run_unit(
                    FanoutChannel::AdminInApp,
                    format!("admin:{}", admin.id),
                    async move {
                        self.store.create_notification(notification).await?;
                        Ok(UnitStatus::Delivered)
                    },
                )
                .boxed()
            })
            .collect()
    }

    /// Announces a new demand on every channel and waits until all units settle.
    #[instrument(skip_all, fields(demand_id = announcement.demand.id))]
    pub async fn announce(&self, announcement: &DemandAnnouncement) -> FanoutReport {
        let DemandAnnouncement {
            demand,
            organizer,
            providers,
            budgets,
            provider_categories,
        } = announcement;
        let mut units: Vec<BoxFuture<'_, UnitOutcome>> = Vec::new();

        if providers.is_empty() {
            debug!("No provider paired, skipping provider notifications");
        } else {
            units.push(
                self.run_unit(
                    FanoutChannel::ProviderEmail,
                    provider_recipients(providers),
                    async move {
                        let sent = self
                            .mailer
                            .send_demand_notification_batch(
                                providers,
                                demand,
                                budgets,
                                provider_categories,
                            )
                            .await;
                        Ok(batch_status(&sent))
                    },
                )
                .boxed(),
            );
            if self.messenger.is_enabled() {
                units.push(
                    self.run_unit(
                        FanoutChannel::ProviderWhatsApp,
                        provider_recipients(providers),
                        async move {
                            let sent = self
                                .messenger
                                .send_demand_notification_batch(providers, demand)
                                .await;
                            Ok(batch_status(&sent))
                        },
                    )
                    .boxed(),
                );
            }
        }

        units.push(
            self.run_unit(
                FanoutChannel::OrganizerEmail,
                format!("organizer:{}", organizer.id),
                async move {
                    if organizer.email.is_none() {
                        return Ok(UnitStatus::Skipped);
                    }
                    self.mailer
                        .send_organizer_confirmation(organizer, demand, budgets)
                        .await?;
                    Ok(UnitStatus::Delivered)
                },
            )
            .boxed(),
        );

        units.push(
            self.run_unit(FanoutChannel::AdminEmail, "admin".to_string(), async move {
                self.mailer
                    .send_admin_notification(demand, organizer, providers, budgets)
                    .await?;
                Ok(UnitStatus::Delivered)
            })
            .boxed(),
        );

        if self.messenger.is_enabled() {
            units.push(
                self.run_unit(FanoutChannel::AdminWhatsApp, "admin".to_string(), async move {
                    let sent = self
                        .messenger
                        .send_admin_notification(demand, organizer, providers)
                        .await?;
                    Ok(sent_or_skipped(sent))
                })
                .boxed(),
            );
        }

        let realtime_payload = json!({
            "demand": demand,
            "organizer": {
                "id": organizer.id,
                "name": organizer.display_name(),
            },
            "providers_count": providers.len(),
        });
        units.push(
            self.run_unit(
                FanoutChannel::AdminRealtime,
                "admin_room".to_string(),
                async move {
                    let received = self
                        .realtime
                        .emit_to_admin_room(DEMAND_CREATED_EVENT, realtime_payload)?;
                    debug!(received, "Admin room notified");
                    Ok(UnitStatus::Delivered)
                },
            )
            .boxed(),
        );

        let content = json!({
            "message": format!(
                "New demand from {}: {} on {}",
                organizer.display_name(),
                demand.event_nature,
                demand.event_date
            ),
            "demand_id": demand.id,
            "organizer_id": organizer.id,
            "providers_count": providers.len(),
        });
        let (mut outcomes, in_app) = join(
            join_all(units),
            self.notify_admins_in_app(NotificationType::NewDemand, content),
        )
        .await;
        outcomes.extend(in_app);

        let report = FanoutReport { outcomes };
        report.log_summary("Demand");
        report
    }

    /// Tells the admins that a pairing changed status.
    #[instrument(skip_all, fields(demand_provider_id = change.engagement.id))]
    pub async fn announce_status_change(&self, change: &StatusChange) -> FanoutReport {
        let engagement = &change.engagement;

        let payload = json!({
            "demand_provider_id": engagement.id,
            "demand_id": engagement.demand_id,
            "provider_id": engagement.provider_id,
            "previous_status": change.previous,
            "status": engagement.status,
        });
        let realtime = self.run_unit(
            FanoutChannel::AdminRealtime,
            "admin_room".to_string(),
            async move {
                self.realtime
                    .emit_to_admin_room(STATUS_CHANGED_EVENT, payload)?;
                Ok(UnitStatus::Delivered)
            },
        );

        let content = json!({
            "message": format!(
                "Demand #{}: provider #{} moved from \"{}\" to \"{}\"",
                engagement.demand_id,
                engagement.provider_id,
                change.previous.label(),
                engagement.status.label()
            ),
            "demand_id": engagement.demand_id,
            "demand_provider_id": engagement.id,
            "status": engagement.status,
        });
        let (realtime, in_app) = join(
            realtime,
            self.notify_admins_in_app(NotificationType::DemandStatusChanged, content),
        )
        .await;

        let mut outcomes = vec![realtime];
        outcomes.extend(in_app);
        let report = FanoutReport { outcomes };
        report.log_summary("Status change");
        report
    }

    /// Emails the provider that the organizer confirmed the mission.
    #[instrument(skip_all, fields(provider_id = provider.id, demand_id = demand.id))]
    pub async fn confirm_mission(
        &self,
        provider: &ProviderModel,
        demand: &DemandModel,
        organizer: &OrganizerModel,
    ) -> FanoutReport {
        let outcome = self
            .run_unit(
                FanoutChannel::MissionConfirmedEmail,
                format!("provider:{}", provider.id),
                async move {
                    if provider.email.is_none() {
                        return Ok(UnitStatus::Skipped);
                    }
                    self.mailer
                        .send_mission_confirmed_email(provider, demand, organizer)
                        .await?;
                    Ok(UnitStatus::Delivered)
                },
            )
            .await;

        let report = FanoutReport {
            outcomes: vec![outcome],
        };
        report.log_summary("Mission confirmation");
        report
    }
}
