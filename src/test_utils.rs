//! Shared test utilities for `DemandBroker`.
//!
//! This module provides helpers for setting up test databases, creating test entities with
//! sensible defaults, building unsaved sample models, and recording or failing doubles for
//! the notification collaborators.

#![allow(clippy::unwrap_used, clippy::clone_on_ref_ptr)]

use crate::{
    core::{
        budget::CategoryBudget,
        demand::{BudgetLine, NewDemand},
        notification::NewNotification,
        orchestrator::DemandOrchestrator,
    },
    entities::{
        AdminModel, CategoryModel, DemandModel, DemandProviderModel, DemandStatus,
        NotificationModel, NotificationStatus, OrganizerModel, ProviderModel, admin, category,
        demand, demand_budget, organizer, provider, provider_category,
    },
    errors::{Error, Result},
    notify::{
        DeliveryReport, Mailer, Messenger, NotificationStore, RealtimeBroadcaster,
        dispatcher::NotificationDispatcher, fanout::NotificationFanout,
    },
};
use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// A date comfortably in the future, valid as an event date.
pub fn future_date() -> NaiveDate {
    Utc::now().date_naive() + Days::new(30)
}

/// Creates an active category whose slug is the lowercased name.
pub async fn create_test_category(db: &DatabaseConnection, name: &str) -> Result<CategoryModel> {
    category::ActiveModel {
        name: Set(name.to_string()),
        slug: Set(name.to_lowercase().replace(' ', "-")),
        description: Set(None),
        display_order: Set(0),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Creates an organizer with an email address.
///
/// # Defaults
/// * name: "Fatou Sow"
/// * commune / department: "Plateau" / "Dakar"
pub async fn create_test_organizer(db: &DatabaseConnection) -> Result<OrganizerModel> {
    organizer::ActiveModel {
        first_name: Set("Fatou".to_string()),
        last_name: Set("Sow".to_string()),
        phone: Set("77 555 44 33".to_string()),
        email: Set(Some("fatou.sow@example.com".to_string())),
        commune: Set("Plateau".to_string()),
        department: Set("Dakar".to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Creates an active provider declaring the given categories.
///
/// The email is derived from the names and the phone number is a local Senegal number, so
/// every channel has an address.
pub async fn create_test_provider(
    db: &DatabaseConnection,
    first_name: &str,
    last_name: &str,
    category_ids: &[i64],
) -> Result<ProviderModel> {
    let provider = provider::ActiveModel {
        first_name: Set(first_name.to_string()),
        last_name: Set(last_name.to_string()),
        company_name: Set(format!("{last_name} Services")),
        email: Set(Some(format!(
            "{}.{}@example.com",
            first_name.to_lowercase(),
            last_name.to_lowercase()
        ))),
        phone: Set(Some("77 123 45 67".to_string())),
        activity: Set(None),
        is_active: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    for &category_id in category_ids {
        provider_category::ActiveModel {
            provider_id: Set(provider.id),
            category_id: Set(category_id),
            sub_category_id: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    Ok(provider)
}

/// Creates an active admin.
pub async fn create_test_admin(db: &DatabaseConnection, email: &str) -> Result<AdminModel> {
    admin::ActiveModel {
        first_name: Set(Some("Ops".to_string())),
        last_name: Set(None),
        email: Set(email.to_string()),
        is_active: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Inserts a demand with budget lines directly, without pairings or notifications.
///
/// # Defaults
/// * event: "Wedding" in 30 days, 120 guests
/// * status: `NewRequest`
pub async fn insert_test_demand(
    db: &DatabaseConnection,
    organizer_id: i64,
    budgets: &[(i64, f64)],
) -> Result<DemandModel> {
    let now = Utc::now();
    let created = demand::ActiveModel {
        organizer_id: Set(organizer_id),
        contact_name: Set("Fatou Sow".to_string()),
        event_nature: Set("Wedding".to_string()),
        event_date: Set(future_date()),
        approximate_guests: Set(Some(120)),
        location: Set(Some("Dakar".to_string())),
        geographic_zone: Set(None),
        budget: Set(None),
        additional_info: Set(None),
        status: Set(DemandStatus::INITIAL),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    for &(category_id, amount) in budgets {
        demand_budget::ActiveModel {
            demand_id: Set(created.id),
            category_id: Set(category_id),
            amount: Set(amount),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    Ok(created)
}

/// Valid creation input for an event in 30 days.
pub fn new_demand_input(
    organizer_id: i64,
    budgets: &[(i64, f64)],
    provider_ids: &[i64],
) -> NewDemand {
    NewDemand {
        organizer_id,
        contact_name: "Fatou Sow".to_string(),
        event_nature: "Wedding".to_string(),
        event_date: future_date(),
        approximate_guests: Some(150),
        location: Some("Saly".to_string()),
        category_budgets: budgets
            .iter()
            .map(|&(category_id, amount)| CategoryBudget {
                category_id,
                amount,
            })
            .collect(),
        provider_ids: provider_ids.to_vec(),
        ..Default::default()
    }
}

// Unsaved sample models for tests that never touch the database

/// Demand 3 of organizer 1.
pub fn sample_demand() -> DemandModel {
    DemandModel {
        id: 3,
        organizer_id: 1,
        contact_name: "Fatou Sow".to_string(),
        event_nature: "Wedding".to_string(),
        event_date: future_date(),
        approximate_guests: Some(150),
        location: Some("Saly".to_string()),
        geographic_zone: None,
        budget: Some(2_500_000.0),
        additional_info: None,
        status: DemandStatus::NewRequest,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Organizer 1, with an email address.
pub fn sample_organizer() -> OrganizerModel {
    OrganizerModel {
        id: 1,
        first_name: "Fatou".to_string(),
        last_name: "Sow".to_string(),
        phone: "77 555 44 33".to_string(),
        email: Some("fatou.sow@example.com".to_string()),
        commune: "Plateau".to_string(),
        department: "Dakar".to_string(),
        created_at: Utc::now(),
    }
}

/// Provider with both an email address and a phone number.
pub fn sample_provider(id: i64) -> ProviderModel {
    ProviderModel {
        id,
        first_name: "Awa".to_string(),
        last_name: format!("Diop{id}"),
        company_name: "Diop Traiteur".to_string(),
        email: Some(format!("provider{id}@example.com")),
        phone: Some(format!("77 000 00 {id:02}")),
        activity: None,
        is_active: true,
        created_at: Utc::now(),
    }
}

/// Active admin.
pub fn sample_admin(id: i64) -> AdminModel {
    AdminModel {
        id,
        first_name: None,
        last_name: None,
        email: format!("admin{id}@example.com"),
        is_active: true,
        created_at: Utc::now(),
    }
}

/// Pairing in the initial status.
pub fn sample_engagement(demand_id: i64, provider_id: i64) -> DemandProviderModel {
    DemandProviderModel {
        id: 1,
        demand_id,
        provider_id,
        status: DemandStatus::INITIAL,
        provider_response: None,
        converted_to_mission: false,
        non_conversion_reason: None,
        non_conversion_comment: None,
        contact_unlocked_at: None,
        payment_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn joined_ids(providers: &[ProviderModel]) -> String {
    providers
        .iter()
        .map(|p| p.id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn channel_error(channel: &str) -> Error {
    Error::Notification {
        channel: channel.to_string(),
        message: format!("{channel} unavailable"),
    }
}

/// Mailer that records every call as `kind:id`.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    calls: Mutex<Vec<String>>,
}

impl RecordingMailer {
    /// Calls recorded so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_demand_notification(
        &self,
        provider: &ProviderModel,
        _demand: &DemandModel,
    ) -> Result<()> {
        self.record(format!("demand:{}", provider.id));
        Ok(())
    }

    async fn send_demand_notification_batch(
        &self,
        providers: &[ProviderModel],
        _demand: &DemandModel,
        _budgets: &[BudgetLine],
        _provider_categories: &HashMap<i64, Vec<i64>>,
    ) -> DeliveryReport {
        self.record(format!("demand_batch:{}", joined_ids(providers)));
        DeliveryReport {
            success: providers.iter().filter_map(|p| p.email.clone()).collect(),
            failed: Vec::new(),
        }
    }

    async fn send_organizer_confirmation(
        &self,
        organizer: &OrganizerModel,
        _demand: &DemandModel,
        _budgets: &[BudgetLine],
    ) -> Result<()> {
        self.record(format!("organizer:{}", organizer.id));
        Ok(())
    }

    async fn send_admin_notification(
        &self,
        demand: &DemandModel,
        _organizer: &OrganizerModel,
        _providers: &[ProviderModel],
        _budgets: &[BudgetLine],
    ) -> Result<()> {
        self.record(format!("admin:{}", demand.id));
        Ok(())
    }

    async fn send_mission_confirmed_email(
        &self,
        provider: &ProviderModel,
        _demand: &DemandModel,
        _organizer: &OrganizerModel,
    ) -> Result<()> {
        self.record(format!("mission:{}", provider.id));
        Ok(())
    }
}

/// Mailer whose every send fails.
#[derive(Debug, Default)]
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send_demand_notification(
        &self,
        _provider: &ProviderModel,
        _demand: &DemandModel,
    ) -> Result<()> {
        Err(channel_error("email"))
    }

    async fn send_organizer_confirmation(
        &self,
        _organizer: &OrganizerModel,
        _demand: &DemandModel,
        _budgets: &[BudgetLine],
    ) -> Result<()> {
        Err(channel_error("email"))
    }

    async fn send_admin_notification(
        &self,
        _demand: &DemandModel,
        _organizer: &OrganizerModel,
        _providers: &[ProviderModel],
        _budgets: &[BudgetLine],
    ) -> Result<()> {
        Err(channel_error("email"))
    }

    async fn send_mission_confirmed_email(
        &self,
        _provider: &ProviderModel,
        _demand: &DemandModel,
        _organizer: &OrganizerModel,
    ) -> Result<()> {
        Err(channel_error("email"))
    }
}

/// Mailer that waits before every send.
#[derive(Debug)]
pub struct SlowMailer {
    delay: Duration,
}

impl SlowMailer {
    /// Waits `delay` on each call.
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Mailer for SlowMailer {
    async fn send_demand_notification(
        &self,
        _provider: &ProviderModel,
        _demand: &DemandModel,
    ) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn send_organizer_confirmation(
        &self,
        _organizer: &OrganizerModel,
        _demand: &DemandModel,
        _budgets: &[BudgetLine],
    ) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn send_admin_notification(
        &self,
        _demand: &DemandModel,
        _organizer: &OrganizerModel,
        _providers: &[ProviderModel],
        _budgets: &[BudgetLine],
    ) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn send_mission_confirmed_email(
        &self,
        _provider: &ProviderModel,
        _demand: &DemandModel,
        _organizer: &OrganizerModel,
    ) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// Messenger that records every call, enabled or not.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    enabled: bool,
    calls: Mutex<Vec<String>>,
}

impl RecordingMessenger {
    /// Creates a messenger reporting `enabled`.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            calls: Mutex::default(),
        }
    }

    /// Calls recorded so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn send_demand_notification(
        &self,
        provider: &ProviderModel,
        _demand: &DemandModel,
    ) -> Result<bool> {
        self.record(format!("demand:{}", provider.id));
        Ok(true)
    }

    async fn send_demand_notification_batch(
        &self,
        providers: &[ProviderModel],
        _demand: &DemandModel,
    ) -> DeliveryReport {
        self.record(format!("demand_batch:{}", joined_ids(providers)));
        DeliveryReport {
            success: providers.iter().filter_map(|p| p.phone.clone()).collect(),
            failed: Vec::new(),
        }
    }

    async fn send_admin_notification(
        &self,
        demand: &DemandModel,
        _organizer: &OrganizerModel,
        _providers: &[ProviderModel],
    ) -> Result<bool> {
        self.record(format!("admin:{}", demand.id));
        Ok(true)
    }
}

/// Realtime broadcaster that keeps every emitted event.
#[derive(Debug, Default)]
pub struct RecordingRealtime {
    events: Mutex<Vec<(String, Value)>>,
}

impl RecordingRealtime {
    /// Names of the emitted events, in order.
    pub fn event_names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl RealtimeBroadcaster for RecordingRealtime {
    fn emit_to_admin_room(&self, event: &str, payload: Value) -> Result<usize> {
        self.events.lock().unwrap().push((event.to_string(), payload));
        Ok(1)
    }
}

/// In-memory notification store with a fixed admin list.
#[derive(Debug, Default)]
pub struct MemoryStore {
    admins: Vec<AdminModel>,
    created: Mutex<Vec<NewNotification>>,
}

impl MemoryStore {
    /// Store listing `admins` as active.
    pub fn new(admins: Vec<AdminModel>) -> Self {
        Self {
            admins,
            created: Mutex::default(),
        }
    }

    /// Notifications persisted so far.
    pub fn created(&self) -> Vec<NewNotification> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn active_admins(&self) -> Result<Vec<AdminModel>> {
        Ok(self.admins.clone())
    }

    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<NotificationModel> {
        let mut created = self.created.lock().unwrap();
        created.push(notification.clone());
        let now = Utc::now();
        Ok(NotificationModel {
            id: i64::try_from(created.len()).unwrap(),
            recipient_id: notification.recipient_id,
            recipient_type: notification.recipient_type.as_str().to_string(),
            notification_type: notification.notification_type,
            channel: notification.channel,
            content: notification.content,
            sent_at: Some(now),
            read_at: None,
            status: NotificationStatus::Sent,
            error_message: None,
            created_at: now,
        })
    }
}

/// In-memory store whose admin lookup takes `delay` to answer.
#[derive(Debug)]
pub struct SlowStore {
    delay: Duration,
    inner: MemoryStore,
}

impl SlowStore {
    /// Store listing `admins` as active after waiting `delay`.
    pub fn new(delay: Duration, admins: Vec<AdminModel>) -> Self {
        Self {
            delay,
            inner: MemoryStore::new(admins),
        }
    }

    /// Notifications persisted so far.
    pub fn created(&self) -> Vec<NewNotification> {
        self.inner.created()
    }
}

#[async_trait]
impl NotificationStore for SlowStore {
    async fn active_admins(&self) -> Result<Vec<AdminModel>> {
        tokio::time::sleep(self.delay).await;
        self.inner.active_admins().await
    }

    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<NotificationModel> {
        self.inner.create_notification(notification).await
    }
}

/// Store that cannot be reached.
#[derive(Debug, Default)]
pub struct FailingStore;

#[async_trait]
impl NotificationStore for FailingStore {
    async fn active_admins(&self) -> Result<Vec<AdminModel>> {
        Err(channel_error("in_app"))
    }

    async fn create_notification(
        &self,
        _notification: NewNotification,
    ) -> Result<NotificationModel> {
        Err(channel_error("in_app"))
    }
}

/// The recording doubles behind one fan-out, kept so tests can inspect them.
#[derive(Debug, Clone)]
pub struct FanoutDoubles {
    /// Recording mailer
    pub mailer: Arc<RecordingMailer>,
    /// Recording messenger
    pub messenger: Arc<RecordingMessenger>,
    /// Recording realtime room
    pub realtime: Arc<RecordingRealtime>,
    /// In-memory store
    pub store: Arc<MemoryStore>,
}

impl FanoutDoubles {
    /// Fresh doubles; `whatsapp_enabled` controls the messenger, `admins` the store.
    pub fn new(whatsapp_enabled: bool, admins: Vec<AdminModel>) -> Self {
        Self {
            mailer: Arc::new(RecordingMailer::default()),
            messenger: Arc::new(RecordingMessenger::new(whatsapp_enabled)),
            realtime: Arc::new(RecordingRealtime::default()),
            store: Arc::new(MemoryStore::new(admins)),
        }
    }

    /// A fan-out wired to these doubles.
    pub fn fanout(&self, unit_timeout: Duration) -> NotificationFanout {
        NotificationFanout::new(
            self.mailer.clone(),
            self.messenger.clone(),
            self.realtime.clone(),
            self.store.clone(),
            unit_timeout,
        )
    }
}

/// An orchestrator over `db` whose notifications go to fresh recording doubles.
pub fn test_orchestrator(
    db: DatabaseConnection,
    whatsapp_enabled: bool,
    admins: Vec<AdminModel>,
) -> (DemandOrchestrator, FanoutDoubles) {
    let doubles = FanoutDoubles::new(whatsapp_enabled, admins);
    let orchestrator = DemandOrchestrator::new(
        db,
        Arc::new(doubles.fanout(Duration::from_secs(5))),
        NotificationDispatcher::new(),
    );
    (orchestrator, doubles)
}
