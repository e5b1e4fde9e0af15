//! Demand business logic - Reading, filtering, updating and deleting demands.
//!
//! Creation lives in the orchestrator because it spans budgets, pairings and notifications.
//! This module owns the input types, their validation rules and the hydrated
//! [`DemandDetails`] view returned to callers.

use crate::{
    core::{assignment::MAX_PROVIDERS_PER_DEMAND, budget::CategoryBudget, status},
    entities::{
        Category, CategoryModel, Demand, DemandBudget, DemandBudgetColumn, DemandBudgetModel,
        DemandColumn, DemandModel, DemandProvider, DemandProviderColumn, DemandProviderModel,
        DemandStatus, Organizer, OrganizerModel, Provider, ProviderModel, demand,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{ConnectionTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, instrument};

/// Input for creating a demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDemand {
    /// Organizer placing the demand
    pub organizer_id: i64,
    /// Person to contact about the event
    pub contact_name: String,
    /// Kind of event
    pub event_nature: String,
    /// Day of the event, today or later
    pub event_date: NaiveDate,
    /// Expected head count, at least 1
    pub approximate_guests: Option<i32>,
    /// Venue or address
    pub location: Option<String>,
    /// Broader area used to match local providers
    pub geographic_zone: Option<String>,
    /// Optional overall budget in XOF
    pub budget: Option<f64>,
    /// Free-text notes for providers
    pub additional_info: Option<String>,
    /// Category budget lines, at most one per category
    #[serde(default)]
    pub category_budgets: Vec<CategoryBudget>,
    /// Providers to attach immediately
    #[serde(default)]
    pub provider_ids: Vec<i64>,
}

impl NewDemand {
    /// Requested providers without duplicates, in request order.
    #[must_use]
    pub fn distinct_provider_ids(&self) -> Vec<i64> {
        let mut seen = HashSet::new();
        self.provider_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Category ids that carry a budget line.
    #[must_use]
    pub fn budget_category_ids(&self) -> HashSet<i64> {
        self.category_budgets
            .iter()
            .map(|line| line.category_id)
            .collect()
    }

    /// Checks everything that can be checked without touching the database.
    ///
    /// # Errors
    /// * [`Error::Validation`] for empty text fields, bad counts or amounts, duplicate
    ///   budget categories
    /// * [`Error::EventDateInPast`] when `event_date` is before `today`
    /// * [`Error::CapacityExceeded`] when more distinct providers are requested than allowed
    pub fn validate(&self, today: NaiveDate) -> Result<()> {
        require_text("contact name", &self.contact_name)?;
        require_text("event nature", &self.event_nature)?;
        validate_event_date(self.event_date, today)?;
        validate_guests(self.approximate_guests)?;
        if let Some(budget) = self.budget {
            validate_amount("budget", budget)?;
        }

        let mut categories = HashSet::new();
        for line in &self.category_budgets {
            validate_amount("category budget", line.amount)?;
            if !categories.insert(line.category_id) {
                return Err(Error::validation(format!(
                    "Category {} has more than one budget line",
                    line.category_id
                )));
            }
        }

        if self.distinct_provider_ids().len() as u64 > MAX_PROVIDERS_PER_DEMAND {
            return Err(Error::CapacityExceeded {
                limit: MAX_PROVIDERS_PER_DEMAND,
            });
        }

        Ok(())
    }
}

/// Partial update of a demand. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemandUpdate {
    /// New contact name, must not be blank
    pub contact_name: Option<String>,
    /// New kind of event, must not be blank
    pub event_nature: Option<String>,
    /// New event day, today or later
    pub event_date: Option<NaiveDate>,
    /// New head count
    pub approximate_guests: Option<i32>,
    /// New venue
    pub location: Option<String>,
    /// New area
    pub geographic_zone: Option<String>,
    /// New overall budget in XOF
    pub budget: Option<f64>,
    /// New notes
    pub additional_info: Option<String>,
    /// Checked against the transition table
    pub status: Option<DemandStatus>,
}

/// Filter for [`list_demands`]. Empty filter lists everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemandFilter {
    /// Only demands placed by this organizer
    pub organizer_id: Option<i64>,
    /// Only demands in this status
    pub status: Option<DemandStatus>,
    /// Earliest event date, inclusive
    pub from_date: Option<NaiveDate>,
    /// Latest event date, inclusive
    pub to_date: Option<NaiveDate>,
}

/// A budget line with its category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetLine {
    /// The stored line
    pub budget: DemandBudgetModel,
    /// `None` if the category row was deleted after the line was written.
    pub category: Option<CategoryModel>,
}

/// A pairing with its provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignedProvider {
    /// The pairing row
    pub engagement: DemandProviderModel,
    /// `None` if the provider row is gone.
    pub provider: Option<ProviderModel>,
}

/// A demand with its organizer, budget lines and pairings loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandDetails {
    /// The demand row
    pub demand: DemandModel,
    /// Organizer who placed it
    pub organizer: OrganizerModel,
    /// Ordered by budget line id
    pub budgets: Vec<BudgetLine>,
    /// Ordered by pairing id
    pub providers: Vec<AssignedProvider>,
}

impl DemandDetails {
    /// The paired providers whose rows could be loaded.
    #[must_use]
    pub fn provider_models(&self) -> Vec<ProviderModel> {
        self.providers
            .iter()
            .filter_map(|assigned| assigned.provider.clone())
            .collect()
    }

    /// Budget lines as plain category/amount pairs.
    #[must_use]
    pub fn category_budgets(&self) -> Vec<CategoryBudget> {
        self.budgets
            .iter()
            .map(|line| CategoryBudget {
                category_id: line.budget.category_id,
                amount: line.budget.amount,
            })
            .collect()
    }
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("The {field} cannot be empty")));
    }
    Ok(())
}

fn validate_event_date(date: NaiveDate, today: NaiveDate) -> Result<()> {
    if date < today {
        return Err(Error::EventDateInPast { date });
    }
    Ok(())
}

fn validate_guests(guests: Option<i32>) -> Result<()> {
    match guests {
        Some(count) if count < 1 => Err(Error::validation(format!(
            "Approximate guests must be at least 1, got {count}"
        ))),
        _ => Ok(()),
    }
}

fn validate_amount(field: &str, amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::validation(format!(
            "The {field} must be a non-negative amount, got {amount}"
        )));
    }
    Ok(())
}

/// Retrieves a demand by id, `None` if it does not exist.
pub async fn get_demand_by_id(db: &DatabaseConnection, id: i64) -> Result<Option<DemandModel>> {
    Demand::find_by_id(id).one(db).await.map_err(Into::into)
}

/// Loads a demand with its organizer, budget lines (with categories) and pairings (with
/// providers).
///
/// # Errors
/// Returns [`Error::DemandNotFound`] for an unknown id.
pub async fn get_demand_details<C>(db: &C, id: i64) -> Result<DemandDetails>
where
    C: ConnectionTrait,
{
    let (demand, organizer) = Demand::find_by_id(id)
        .find_also_related(Organizer)
        .one(db)
        .await?
        .ok_or(Error::DemandNotFound { id })?;
    let organizer = organizer.ok_or(Error::OrganizerNotFound {
        id: demand.organizer_id,
    })?;

    let budgets = DemandBudget::find()
        .filter(DemandBudgetColumn::DemandId.eq(id))
        .find_also_related(Category)
        .order_by_asc(DemandBudgetColumn::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|(budget, category)| BudgetLine { budget, category })
        .collect();

    let providers = DemandProvider::find()
        .filter(DemandProviderColumn::DemandId.eq(id))
        .find_also_related(Provider)
        .order_by_asc(DemandProviderColumn::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|(engagement, provider)| AssignedProvider {
            engagement,
            provider,
        })
        .collect();

    Ok(DemandDetails {
        demand,
        organizer,
        budgets,
        providers,
    })
}

/// Lists demands matching the filter, newest first.
pub async fn list_demands(
    db: &DatabaseConnection,
    filter: &DemandFilter,
) -> Result<Vec<DemandModel>> {
    let mut query = Demand::find();
    if let Some(organizer_id) = filter.organizer_id {
        query = query.filter(DemandColumn::OrganizerId.eq(organizer_id));
    }
    if let Some(status) = filter.status {
        query = query.filter(DemandColumn::Status.eq(status));
    }
    if let Some(from) = filter.from_date {
        query = query.filter(DemandColumn::EventDate.gte(from));
    }
    if let Some(to) = filter.to_date {
        query = query.filter(DemandColumn::EventDate.lte(to));
    }

    query
        .order_by_desc(DemandColumn::CreatedAt)
        .order_by_desc(DemandColumn::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Applies a partial update to a demand.
///
/// A new event date must not be before `today`; a new status must be reachable from the
/// current one. Setting the current status again is accepted and changes nothing.
///
/// # Errors
/// * [`Error::DemandNotFound`] for an unknown id
/// * [`Error::IllegalTransition`], [`Error::EventDateInPast`] or [`Error::Validation`] for
///   rejected values
#[instrument(skip(db, update))]
pub async fn update_demand(
    db: &DatabaseConnection,
    id: i64,
    update: DemandUpdate,
    today: NaiveDate,
) -> Result<DemandModel> {
    let demand = Demand::find_by_id(id)
        .one(db)
        .await?
        .ok_or(Error::DemandNotFound { id })?;

    if let Some(name) = &update.contact_name {
        require_text("contact name", name)?;
    }
    if let Some(nature) = &update.event_nature {
        require_text("event nature", nature)?;
    }
    if let Some(date) = update.event_date {
        validate_event_date(date, today)?;
    }
    validate_guests(update.approximate_guests)?;
    if let Some(budget) = update.budget {
        validate_amount("budget", budget)?;
    }
    let new_status = match update.status {
        Some(next) if next != demand.status => {
            status::ensure_transition(demand.status, next)?;
            Some(next)
        }
        _ => None,
    };

    let mut active: demand::ActiveModel = demand.into();
    if let Some(name) = update.contact_name {
        active.contact_name = Set(name);
    }
    if let Some(nature) = update.event_nature {
        active.event_nature = Set(nature);
    }
    if let Some(date) = update.event_date {
        active.event_date = Set(date);
    }
    if let Some(guests) = update.approximate_guests {
        active.approximate_guests = Set(Some(guests));
    }
    if let Some(location) = update.location {
        active.location = Set(Some(location));
    }
    if let Some(zone) = update.geographic_zone {
        active.geographic_zone = Set(Some(zone));
    }
    if let Some(budget) = update.budget {
        active.budget = Set(Some(budget));
    }
    if let Some(info) = update.additional_info {
        active.additional_info = Set(Some(info));
    }
    if let Some(next) = new_status {
        active.status = Set(next);
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(db).await?;
    info!(status = %updated.status, "Demand updated");
    Ok(updated)
}

/// Moves a demand to a new overall status.
///
/// # Errors
/// * [`Error::DemandNotFound`] for an unknown id
/// * [`Error::IllegalTransition`] when the table does not allow the move
pub async fn update_demand_status(
    db: &DatabaseConnection,
    id: i64,
    new_status: DemandStatus,
) -> Result<DemandModel> {
    let demand = Demand::find_by_id(id)
        .one(db)
        .await?
        .ok_or(Error::DemandNotFound { id })?;

    if demand.status == new_status {
        return Ok(demand);
    }
    status::ensure_transition(demand.status, new_status)?;

    let mut active: demand::ActiveModel = demand.into();
    active.status = Set(new_status);
    active.updated_at = Set(Utc::now());
    active.update(db).await.map_err(Into::into)
}

/// Deletes a demand together with its pairings and budget lines.
///
/// # Errors
/// Returns [`Error::DemandNotFound`] for an unknown id.
#[instrument(skip(db))]
pub async fn delete_demand(db: &DatabaseConnection, id: i64) -> Result<()> {
    let txn = db.begin().await?;

    Demand::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(Error::DemandNotFound { id })?;

    DemandProvider::delete_many()
        .filter(DemandProviderColumn::DemandId.eq(id))
        .exec(&txn)
        .await?;
    DemandBudget::delete_many()
        .filter(DemandBudgetColumn::DemandId.eq(id))
        .exec(&txn)
        .await?;
    Demand::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;
    info!("Demand deleted");
    Ok(())
}
