//! Provider assignment - Attaches providers to demands under a fixed cap.
//!
//! Every pairing row is built by [`new_assignment`], whether it comes from demand creation or
//! from adding one more provider later, and both paths check [`MAX_PROVIDERS_PER_DEMAND`].
//! Uniqueness of `(demand_id, provider_id)` is enforced by a unique index; losing an insert
//! race returns the row the winner wrote.

use crate::{
    core::budget,
    entities::{
        Demand, DemandColumn, DemandModel, DemandProvider, DemandProviderColumn,
        DemandProviderModel, DemandStatus, demand_provider,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, PaginatorTrait, QueryOrder, Set, SqlErr, prelude::*};
use tracing::{debug, info, instrument};

/// Maximum number of providers that may be paired with one demand.
pub const MAX_PROVIDERS_PER_DEMAND: u64 = 5;

/// A provider's engagement together with the demand it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderAssignment {
    /// The pairing row
    pub engagement: DemandProviderModel,
    /// Demand the pairing belongs to
    pub demand: DemandModel,
}

/// Builds an unsaved pairing row in the initial status.
#[must_use]
pub fn new_assignment(
    demand_id: i64,
    provider_id: i64,
    now: DateTime<Utc>,
) -> demand_provider::ActiveModel {
    demand_provider::ActiveModel {
        demand_id: Set(demand_id),
        provider_id: Set(provider_id),
        status: Set(DemandStatus::INITIAL),
        converted_to_mission: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
}

/// Counts the pairing rows of a demand.
pub async fn count_assignments<C>(db: &C, demand_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    DemandProvider::find()
        .filter(DemandProviderColumn::DemandId.eq(demand_id))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Looks up the pairing of a demand and a provider.
pub async fn get_demand_provider<C>(
    db: &C,
    demand_id: i64,
    provider_id: i64,
) -> Result<Option<DemandProviderModel>>
where
    C: ConnectionTrait,
{
    DemandProvider::find()
        .filter(DemandProviderColumn::DemandId.eq(demand_id))
        .filter(DemandProviderColumn::ProviderId.eq(provider_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Looks up a pairing by its own id.
///
/// # Errors
/// Returns [`Error::DemandProviderNotFound`] if no such pairing exists.
pub async fn get_demand_provider_by_id<C>(db: &C, id: i64) -> Result<DemandProviderModel>
where
    C: ConnectionTrait,
{
    DemandProvider::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| Error::DemandProviderNotFound {
            reference: id.to_string(),
        })
}

/// Attaches a provider to an existing demand.
///
/// Re-assigning a provider that is already paired returns the existing row unchanged.
/// Otherwise the cap is checked first, then budget eligibility, then the row is inserted.
///
/// # Errors
/// * [`Error::DemandNotFound`] for an unknown demand
/// * [`Error::CapacityExceeded`] when the demand already has the maximum number of providers
/// * any eligibility error from [`budget::validate_provider_for_demand`]
#[instrument(skip(db))]
pub async fn assign_provider<C>(
    db: &C,
    demand_id: i64,
    provider_id: i64,
) -> Result<DemandProviderModel>
where
    C: ConnectionTrait,
{
    Demand::find_by_id(demand_id)
        .one(db)
        .await?
        .ok_or(Error::DemandNotFound { id: demand_id })?;

    if let Some(existing) = get_demand_provider(db, demand_id, provider_id).await? {
        debug!(id = existing.id, "Provider already assigned, returning existing pairing");
        return Ok(existing);
    }

    let assigned = count_assignments(db, demand_id).await?;
    if assigned >= MAX_PROVIDERS_PER_DEMAND {
        return Err(Error::CapacityExceeded {
            limit: MAX_PROVIDERS_PER_DEMAND,
        });
    }

    budget::validate_provider_for_demand(db, provider_id, demand_id).await?;

    let engagement = insert_assignment(db, demand_id, provider_id).await?;
    info!(id = engagement.id, "Provider assigned to demand");
    Ok(engagement)
}

/// Inserts a pairing, returning the already stored row if the unique index rejects it.
pub(crate) async fn insert_assignment<C>(
    db: &C,
    demand_id: i64,
    provider_id: i64,
) -> Result<DemandProviderModel>
where
    C: ConnectionTrait,
{
    match new_assignment(demand_id, provider_id, Utc::now())
        .insert(db)
        .await
    {
        Ok(model) => Ok(model),
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            debug!(demand_id, provider_id, "Concurrent assignment won the insert");
            get_demand_provider(db, demand_id, provider_id)
                .await?
                .ok_or_else(|| Error::Database(err))
        }
        Err(err) => Err(err.into()),
    }
}

/// Detaches a provider from a demand.
///
/// # Errors
/// Returns [`Error::DemandProviderNotFound`] if the provider was not paired with the demand.
#[instrument(skip(db))]
pub async fn remove_provider(
    db: &DatabaseConnection,
    demand_id: i64,
    provider_id: i64,
) -> Result<()> {
    let result = DemandProvider::delete_many()
        .filter(DemandProviderColumn::DemandId.eq(demand_id))
        .filter(DemandProviderColumn::ProviderId.eq(provider_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::DemandProviderNotFound {
            reference: format!("demand {demand_id} / provider {provider_id}"),
        });
    }

    info!("Provider removed from demand");
    Ok(())
}

/// Lists a provider's engagements with their demands, most recent demand first.
pub async fn list_assignments_for_provider(
    db: &DatabaseConnection,
    provider_id: i64,
    status: Option<DemandStatus>,
) -> Result<Vec<ProviderAssignment>> {
    let mut query = DemandProvider::find().filter(DemandProviderColumn::ProviderId.eq(provider_id));
    if let Some(status) = status {
        query = query.filter(DemandProviderColumn::Status.eq(status));
    }

    let rows = query
        .find_also_related(Demand)
        .order_by_desc(DemandColumn::CreatedAt)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(engagement, demand)| {
            demand.map(|demand| ProviderAssignment { engagement, demand })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_assign_provider_creates_initial_pairing() -> Result<()> {
        let db = setup_test_db().await?;
        let catering = create_test_category(&db, "Catering").await?;
        let organizer = create_test_organizer(&db).await?;
        let demand = insert_test_demand(&db, organizer.id, &[(catering.id, 100_000.0)]).await?;
        let provider = create_test_provider(&db, "Awa", "Diop", &[catering.id]).await?;

        let engagement = assign_provider(&db, demand.id, provider.id).await?;

        assert_eq!(engagement.status, DemandStatus::NewRequest);
        assert!(!engagement.converted_to_mission);
        assert!(engagement.contact_unlocked_at.is_none());
        assert_eq!(count_assignments(&db, demand.id).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_reassign_returns_existing_row() -> Result<()> {
        let db = setup_test_db().await?;
        let catering = create_test_category(&db, "Catering").await?;
        let organizer = create_test_organizer(&db).await?;
        let demand = insert_test_demand(&db, organizer.id, &[(catering.id, 100_000.0)]).await?;
        let provider = create_test_provider(&db, "Awa", "Diop", &[catering.id]).await?;

        let first = assign_provider(&db, demand.id, provider.id).await?;
        let second = assign_provider(&db, demand.id, provider.id).await?;

        assert_eq!(first, second);
        assert_eq!(count_assignments(&db, demand.id).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_sixth_provider_exceeds_capacity() -> Result<()> {
        let db = setup_test_db().await?;
        let catering = create_test_category(&db, "Catering").await?;
        let organizer = create_test_organizer(&db).await?;
        let demand = insert_test_demand(&db, organizer.id, &[(catering.id, 100_000.0)]).await?;

        for i in 0..5 {
            let provider =
                create_test_provider(&db, &format!("Provider{i}"), "Test", &[catering.id]).await?;
            assign_provider(&db, demand.id, provider.id).await?;
        }

        let sixth = create_test_provider(&db, "Sixth", "Test", &[catering.id]).await?;
        let result = assign_provider(&db, demand.id, sixth.id).await;

        match result {
            Err(err @ Error::CapacityExceeded { limit: 5 }) => {
                assert!(err.to_string().contains('5'));
            }
            other => panic!("expected CapacityExceeded, got {other:?}"),
        }
        assert_eq!(count_assignments(&db, demand.id).await?, 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_reassign_at_capacity_is_not_an_error() -> Result<()> {
        let db = setup_test_db().await?;
        let catering = create_test_category(&db, "Catering").await?;
        let organizer = create_test_organizer(&db).await?;
        let demand = insert_test_demand(&db, organizer.id, &[(catering.id, 100_000.0)]).await?;

        let mut last = None;
        for i in 0..5 {
            let provider =
                create_test_provider(&db, &format!("Provider{i}"), "Test", &[catering.id]).await?;
            last = Some(assign_provider(&db, demand.id, provider.id).await?);
        }
        let last = last.unwrap();

        let again = assign_provider(&db, demand.id, last.provider_id).await?;
        assert_eq!(again.id, last.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_ineligible_provider_is_not_assigned() -> Result<()> {
        let db = setup_test_db().await?;
        let catering = create_test_category(&db, "Catering").await?;
        let music = create_test_category(&db, "Music").await?;
        let organizer = create_test_organizer(&db).await?;
        let demand = insert_test_demand(&db, organizer.id, &[(catering.id, 100_000.0)]).await?;
        let provider = create_test_provider(&db, "Ibou", "Fall", &[music.id]).await?;

        let result = assign_provider(&db, demand.id, provider.id).await;

        assert!(matches!(result, Err(Error::ProviderIneligible { .. })));
        assert_eq!(count_assignments(&db, demand.id).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_assign_to_unknown_demand() -> Result<()> {
        let db = setup_test_db().await?;
        let catering = create_test_category(&db, "Catering").await?;
        let provider = create_test_provider(&db, "Awa", "Diop", &[catering.id]).await?;

        let result = assign_provider(&db, 42, provider.id).await;
        assert!(matches!(result, Err(Error::DemandNotFound { id: 42 })));
        Ok(())
    }

    #[tokio::test]
    async fn test_conflicting_insert_returns_stored_row() -> Result<()> {
        let db = setup_test_db().await?;
        let catering = create_test_category(&db, "Catering").await?;
        let organizer = create_test_organizer(&db).await?;
        let demand = insert_test_demand(&db, organizer.id, &[(catering.id, 100_000.0)]).await?;
        let provider = create_test_provider(&db, "Awa", "Diop", &[catering.id]).await?;

        // Simulates the other request of a race having inserted first
        let winner = new_assignment(demand.id, provider.id, Utc::now())
            .insert(&db)
            .await?;
        let loser = insert_assignment(&db, demand.id, provider.id).await?;

        assert_eq!(loser.id, winner.id);
        assert_eq!(count_assignments(&db, demand.id).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_provider() -> Result<()> {
        let db = setup_test_db().await?;
        let catering = create_test_category(&db, "Catering").await?;
        let organizer = create_test_organizer(&db).await?;
        let demand = insert_test_demand(&db, organizer.id, &[(catering.id, 100_000.0)]).await?;
        let provider = create_test_provider(&db, "Awa", "Diop", &[catering.id]).await?;
        assign_provider(&db, demand.id, provider.id).await?;

        remove_provider(&db, demand.id, provider.id).await?;
        assert!(get_demand_provider(&db, demand.id, provider.id).await?.is_none());

        let result = remove_provider(&db, demand.id, provider.id).await;
        assert!(matches!(result, Err(Error::DemandProviderNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_assignments_for_provider_filters_status() -> Result<()> {
        let db = setup_test_db().await?;
        let catering = create_test_category(&db, "Catering").await?;
        let organizer = create_test_organizer(&db).await?;
        let provider = create_test_provider(&db, "Awa", "Diop", &[catering.id]).await?;

        let first = insert_test_demand(&db, organizer.id, &[(catering.id, 100_000.0)]).await?;
        let second = insert_test_demand(&db, organizer.id, &[(catering.id, 200_000.0)]).await?;
        assign_provider(&db, first.id, provider.id).await?;
        let engagement = assign_provider(&db, second.id, provider.id).await?;

        let mut active: demand_provider::ActiveModel = engagement.into();
        active.status = Set(DemandStatus::UnderStudy);
        active.update(&db).await?;

        let all = list_assignments_for_provider(&db, provider.id, None).await?;
        assert_eq!(all.len(), 2);

        let studied =
            list_assignments_for_provider(&db, provider.id, Some(DemandStatus::UnderStudy)).await?;
        assert_eq!(studied.len(), 1);
        assert_eq!(studied[0].demand.id, second.id);
        Ok(())
    }
}
