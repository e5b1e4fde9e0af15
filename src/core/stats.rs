//! Per-provider engagement statistics.

use crate::{
    entities::{DemandProvider, DemandProviderColumn, DemandStatus},
    errors::Result,
};
use sea_orm::{PaginatorTrait, prelude::*};
use serde::Serialize;

/// Engagement counts for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProviderStats {
    /// All pairings the provider has
    pub total: u64,
    /// Pairings that became a mission
    pub completed: u64,
    /// Pairings still in the initial status
    pub pending: u64,
}

/// Counts a provider's pairings, converted missions and untouched requests.
pub async fn provider_stats(db: &DatabaseConnection, provider_id: i64) -> Result<ProviderStats> {
    let base = || DemandProvider::find().filter(DemandProviderColumn::ProviderId.eq(provider_id));

    let total = base().count(db).await?;
    let completed = base()
        .filter(DemandProviderColumn::ConvertedToMission.eq(true))
        .count(db)
        .await?;
    let pending = base()
        .filter(DemandProviderColumn::Status.eq(DemandStatus::INITIAL))
        .count(db)
        .await?;

    Ok(ProviderStats {
        total,
        completed,
        pending,
    })
}
