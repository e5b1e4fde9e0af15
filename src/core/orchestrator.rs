//! Demand orchestration - Creating demands and driving pairings through their lifecycle.
//!
//! Writes happen synchronously and atomically: a demand, its budget lines and its pairings are
//! committed together or not at all. Notifications happen afterwards on the background
//! dispatcher, so a channel failure can never undo or delay a committed write.

use crate::{
    config::notifications::NotificationConfig,
    core::{
        assignment::{self, new_assignment},
        budget,
        demand::{self, DemandDetails, NewDemand},
        status,
    },
    entities::{
        Demand, DemandBudget, DemandModel, DemandProvider, DemandProviderModel, DemandStatus,
        NonConversionReason, Organizer, OrganizerModel, Provider, ProviderModel, demand_budget,
        demand_provider,
    },
    errors::{Error, Result},
    notify::{
        dispatcher::NotificationDispatcher,
        fanout::{DemandAnnouncement, NotificationFanout, StatusChange},
        mail::mailer_from_config,
        realtime::AdminRoom,
        store::SqlNotificationStore,
        whatsapp::WhatsAppClient,
    },
};
use chrono::{NaiveDate, Utc};
use sea_orm::{DatabaseConnection, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Partial update of a pairing. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandProviderUpdate {
    /// New status, checked against the transition table
    pub status: Option<DemandStatus>,
    /// Free-text answer from the provider
    pub provider_response: Option<String>,
    /// Whether the engagement became a paid mission
    pub converted_to_mission: Option<bool>,
    /// Why the engagement did not convert
    pub non_conversion_reason: Option<NonConversionReason>,
    /// Additional explanation for the non-conversion
    pub non_conversion_comment: Option<String>,
}

/// Entry point for demand creation and pairing updates.
#[derive(Debug, Clone)]
pub struct DemandOrchestrator {
    db: DatabaseConnection,
    fanout: Arc<NotificationFanout>,
    dispatcher: NotificationDispatcher,
}

impl DemandOrchestrator {
    /// Wires an orchestrator from its parts.
    #[must_use]
    pub const fn new(
        db: DatabaseConnection,
        fanout: Arc<NotificationFanout>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            db,
            fanout,
            dispatcher,
        }
    }

    /// Wires the shipped channels: SMTP mailer (log transport without credentials), WhatsApp
    /// client, the given admin room and the database notification store.
    ///
    /// # Errors
    /// Returns [`Error::Config`] when the SMTP settings are unusable, or [`Error::Http`] when
    /// the WhatsApp client cannot be built.
    pub fn with_default_channels(
        db: DatabaseConnection,
        config: &NotificationConfig,
        room: AdminRoom,
    ) -> Result<Self> {
        let whatsapp = WhatsAppClient::new(config.whatsapp.clone(), config.unit_timeout)?;
        let fanout = NotificationFanout::new(
            mailer_from_config(config)?,
            Arc::new(whatsapp),
            Arc::new(room),
            Arc::new(SqlNotificationStore::new(db.clone())),
            config.unit_timeout,
        );
        Ok(Self::new(db, Arc::new(fanout), NotificationDispatcher::new()))
    }

    /// The connection writes go through.
    #[must_use]
    pub const fn database(&self) -> &DatabaseConnection {
        &self.db
    }

    /// The dispatcher running notification jobs.
    #[must_use]
    pub const fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Creates a demand with its budget lines and provider pairings, then announces it.
    ///
    /// Every check runs before the first write and the writes share one transaction, so a
    /// rejected demand leaves nothing behind. The announcement runs in the background and its
    /// outcome never reaches the caller.
    ///
    /// # Errors
    /// * any validation error from [`NewDemand::validate`]
    /// * [`Error::OrganizerNotFound`] for an unknown organizer
    /// * [`Error::Validation`] for a budget line naming an unknown category
    /// * [`Error::ProviderNotFound`] or [`Error::ProviderIneligible`] for a requested provider
    /// * [`Error::Database`] if a write fails, in which case nothing is persisted
    #[instrument(skip_all, fields(organizer_id = input.organizer_id))]
    pub async fn create_demand(&self, input: NewDemand) -> Result<DemandDetails> {
        self.create_demand_on(input, Utc::now().date_naive()).await
    }

    async fn create_demand_on(&self, input: NewDemand, today: NaiveDate) -> Result<DemandDetails> {
        input.validate(today)?;

        Organizer::find_by_id(input.organizer_id)
            .one(&self.db)
            .await?
            .ok_or(Error::OrganizerNotFound {
                id: input.organizer_id,
            })?;
        budget::validate_budget_categories(&self.db, &input.category_budgets).await?;

        let provider_ids = input.distinct_provider_ids();
        if !provider_ids.is_empty() {
            budget::validate_providers_have_budget(
                &self.db,
                &provider_ids,
                &input.budget_category_ids(),
            )
            .await?;
        }

        let details = self.persist_demand(input, &provider_ids).await?;
        info!(
            demand_id = details.demand.id,
            providers = details.providers.len(),
            budgets = details.budgets.len(),
            "Demand created"
        );

        self.dispatch_announcement(DemandAnnouncement::from_details(
            &details,
            HashMap::new(),
        ));
        Ok(details)
    }

    async fn persist_demand(
        &self,
        input: NewDemand,
        provider_ids: &[i64],
    ) -> Result<DemandDetails> {
        let txn = self.db.begin().await?;
        let now = Utc::now();

        let created = crate::entities::demand::ActiveModel {
            organizer_id: Set(input.organizer_id),
            contact_name: Set(input.contact_name),
            event_nature: Set(input.event_nature),
            event_date: Set(input.event_date),
            approximate_guests: Set(input.approximate_guests),
            location: Set(input.location),
            geographic_zone: Set(input.geographic_zone),
            budget: Set(input.budget),
            additional_info: Set(input.additional_info),
            status: Set(DemandStatus::INITIAL),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        if !input.category_budgets.is_empty() {
            DemandBudget::insert_many(input.category_budgets.iter().map(|line| {
                demand_budget::ActiveModel {
                    demand_id: Set(created.id),
                    category_id: Set(line.category_id),
                    amount: Set(line.amount),
                    created_at: Set(now),
                    ..Default::default()
                }
            }))
            .exec(&txn)
            .await?;
        }

        if !provider_ids.is_empty() {
            DemandProvider::insert_many(
                provider_ids
                    .iter()
                    .map(|&provider_id| new_assignment(created.id, provider_id, now)),
            )
            .exec(&txn)
            .await?;
        }

        let details = demand::get_demand_details(&txn, created.id).await?;
        txn.commit().await?;
        Ok(details)
    }

    fn dispatch_announcement(&self, mut announcement: DemandAnnouncement) {
        let db = self.db.clone();
        let fanout = Arc::clone(&self.fanout);

        self.dispatcher.submit("demand_announcement", async move {
            let provider_ids: Vec<i64> = announcement.providers.iter().map(|p| p.id).collect();
            match budget::categories_by_provider(&db, &provider_ids).await {
                Ok(categories) => announcement.provider_categories = categories,
                Err(err) => warn!(
                    demand_id = announcement.demand.id,
                    error = %err,
                    "Could not load provider categories, emails will list no budget lines"
                ),
            }
            fanout.announce(&announcement).await;
        });
    }

    /// Attaches one more provider to an existing demand.
    ///
    /// # Errors
    /// See [`assignment::assign_provider`].
    pub async fn assign_provider(
        &self,
        demand_id: i64,
        provider_id: i64,
    ) -> Result<DemandProviderModel> {
        assignment::assign_provider(&self.db, demand_id, provider_id).await
    }

    /// Updates a pairing.
    ///
    /// A status change is checked against the pairing's own current status; asking for the
    /// current status again changes nothing. When the status does change, admins are told in
    /// the background, and entering `MissionConfirmed` also emails the provider.
    ///
    /// # Errors
    /// * [`Error::DemandProviderNotFound`] for an unknown pairing
    /// * [`Error::IllegalTransition`] when the table does not allow the move
    #[instrument(skip(self, update))]
    pub async fn update_demand_provider(
        &self,
        id: i64,
        update: DemandProviderUpdate,
    ) -> Result<DemandProviderModel> {
        let current = assignment::get_demand_provider_by_id(&self.db, id).await?;
        let previous = current.status;

        let next = match update.status {
            Some(next) if next != previous => {
                status::ensure_transition(previous, next)?;
                Some(next)
            }
            _ => None,
        };

        let mut active: demand_provider::ActiveModel = current.into();
        if let Some(next) = next {
            active.status = Set(next);
        }
        if let Some(response) = update.provider_response {
            active.provider_response = Set(Some(response));
        }
        if let Some(converted) = update.converted_to_mission {
            active.converted_to_mission = Set(converted);
        }
        if let Some(reason) = update.non_conversion_reason {
            active.non_conversion_reason = Set(Some(reason));
        }
        if let Some(comment) = update.non_conversion_comment {
            active.non_conversion_comment = Set(Some(comment));
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&self.db).await?;

        if let Some(next) = next {
            info!(from = %previous, to = %next, "Demand provider status changed");
            self.dispatch_status_change(StatusChange {
                engagement: updated.clone(),
                previous,
            });
            if next == DemandStatus::MissionConfirmed {
                self.dispatch_mission_confirmation(&updated);
            }
        }

        Ok(updated)
    }

    /// Moves a pairing to a new status.
    ///
    /// # Errors
    /// See [`Self::update_demand_provider`].
    pub async fn update_demand_provider_status(
        &self,
        id: i64,
        new_status: DemandStatus,
    ) -> Result<DemandProviderModel> {
        self.update_demand_provider(
            id,
            DemandProviderUpdate {
                status: Some(new_status),
                ..Default::default()
            },
        )
        .await
    }

    fn dispatch_status_change(&self, change: StatusChange) {
        let fanout = Arc::clone(&self.fanout);
        self.dispatcher.submit("status_change", async move {
            fanout.announce_status_change(&change).await;
        });
    }

    fn dispatch_mission_confirmation(&self, engagement: &DemandProviderModel) {
        let db = self.db.clone();
        let fanout = Arc::clone(&self.fanout);
        let (provider_id, demand_id) = (engagement.provider_id, engagement.demand_id);

        self.dispatcher.submit("mission_confirmation", async move {
            match load_mission_parties(&db, provider_id, demand_id).await {
                Ok((provider, demand, organizer)) => {
                    fanout.confirm_mission(&provider, &demand, &organizer).await;
                }
                Err(err) => error!(
                    provider_id,
                    demand_id,
                    error = %err,
                    "Could not load mission confirmation recipients"
                ),
            }
        });
    }

    /// Reveals contact details on a pairing by stamping `contact_unlocked_at` with the
    /// current time. Unlocking again moves the stamp forward.
    ///
    /// # Errors
    /// Returns [`Error::DemandProviderNotFound`] for an unknown pairing.
    #[instrument(skip(self))]
    pub async fn unlock_contact(&self, demand_provider_id: i64) -> Result<DemandProviderModel> {
        let current = assignment::get_demand_provider_by_id(&self.db, demand_provider_id).await?;

        let now = Utc::now();
        let mut active: demand_provider::ActiveModel = current.into();
        active.contact_unlocked_at = Set(Some(now));
        active.updated_at = Set(now);
        let updated = active.update(&self.db).await?;

        info!("Contact unlocked");
        Ok(updated)
    }
}

async fn load_mission_parties(
    db: &DatabaseConnection,
    provider_id: i64,
    demand_id: i64,
) -> Result<(ProviderModel, DemandModel, OrganizerModel)> {
    let provider = Provider::find_by_id(provider_id)
        .one(db)
        .await?
        .ok_or(Error::ProviderNotFound { id: provider_id })?;
    let (demand, organizer) = Demand::find_by_id(demand_id)
        .find_also_related(Organizer)
        .one(db)
        .await?
        .ok_or(Error::DemandNotFound { id: demand_id })?;
    let organizer = organizer.ok_or(Error::OrganizerNotFound {
        id: demand.organizer_id,
    })?;
    Ok((provider, demand, organizer))
}
