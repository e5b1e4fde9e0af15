//! Budget eligibility - Decides which providers may be attached to a demand.
//!
//! A provider is eligible when at least one of its declared categories has a budget line on
//! the demand. Providers without any declared category are never eligible. The batch check runs
//! against the budgets of a demand that is about to be created; the single check loads the
//! budget lines already persisted for an existing demand.

use crate::{
    entities::{
        Category, CategoryColumn, DemandBudget, DemandBudgetColumn, Provider, ProviderCategory,
        ProviderCategoryColumn, ProviderColumn, ProviderModel,
    },
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// One category budget line as supplied by an organizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryBudget {
    /// Category the money is earmarked for
    pub category_id: i64,
    /// Amount in XOF
    pub amount: f64,
}

/// Returns true when the two category sets share at least one id.
#[must_use]
pub fn has_budget_for_any_category(
    provider_categories: &[i64],
    budget_categories: &HashSet<i64>,
) -> bool {
    provider_categories
        .iter()
        .any(|category_id| budget_categories.contains(category_id))
}

/// Loads the declared category ids of each provider.
///
/// Providers without any category are absent from the map. Duplicate memberships (same
/// category with different sub-categories) collapse to one entry.
pub async fn categories_by_provider<C>(
    db: &C,
    provider_ids: &[i64],
) -> Result<HashMap<i64, Vec<i64>>>
where
    C: ConnectionTrait,
{
    if provider_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let memberships = ProviderCategory::find()
        .filter(ProviderCategoryColumn::ProviderId.is_in(provider_ids.iter().copied()))
        .all(db)
        .await?;

    let mut categories: HashMap<i64, Vec<i64>> = HashMap::new();
    for membership in memberships {
        let entry = categories.entry(membership.provider_id).or_default();
        if !entry.contains(&membership.category_id) {
            entry.push(membership.category_id);
        }
    }
    Ok(categories)
}

/// Checks that every budget line points at an existing category.
///
/// # Errors
/// Returns [`Error::Validation`] naming the first unknown category, in request order.
pub async fn validate_budget_categories<C>(db: &C, lines: &[CategoryBudget]) -> Result<()>
where
    C: ConnectionTrait,
{
    if lines.is_empty() {
        return Ok(());
    }

    let known: HashSet<i64> = Category::find()
        .filter(CategoryColumn::Id.is_in(lines.iter().map(|line| line.category_id)))
        .all(db)
        .await?
        .into_iter()
        .map(|category| category.id)
        .collect();

    match lines.iter().find(|line| !known.contains(&line.category_id)) {
        Some(line) => Err(Error::validation(format!(
            "Category {} does not exist",
            line.category_id
        ))),
        None => Ok(()),
    }
}

/// Category ids that have a budget line on the given demand.
pub async fn budget_categories_for_demand<C>(db: &C, demand_id: i64) -> Result<HashSet<i64>>
where
    C: ConnectionTrait,
{
    let lines = DemandBudget::find()
        .filter(DemandBudgetColumn::DemandId.eq(demand_id))
        .all(db)
        .await?;
    Ok(lines.into_iter().map(|line| line.category_id).collect())
}

/// Validates a batch of providers against the categories of a demand about to be created.
///
/// Returns the provider rows in the order they were requested so the caller can reuse them.
///
/// # Errors
/// * [`Error::ProviderNotFound`] for an unknown id
/// * [`Error::ProviderIneligible`] naming the first provider whose categories miss every
///   budget line (this includes providers without any category)
pub async fn validate_providers_have_budget<C>(
    db: &C,
    provider_ids: &[i64],
    budget_categories: &HashSet<i64>,
) -> Result<Vec<ProviderModel>>
where
    C: ConnectionTrait,
{
    if provider_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut providers: HashMap<i64, ProviderModel> = Provider::find()
        .filter(ProviderColumn::Id.is_in(provider_ids.iter().copied()))
        .all(db)
        .await?
        .into_iter()
        .map(|provider| (provider.id, provider))
        .collect();

    let categories = categories_by_provider(db, provider_ids).await?;

    let mut validated = Vec::with_capacity(provider_ids.len());
    for provider_id in provider_ids {
        let provider = providers
            .remove(provider_id)
            .ok_or(Error::ProviderNotFound { id: *provider_id })?;

        let declared = categories.get(provider_id).map_or(&[][..], Vec::as_slice);
        if !has_budget_for_any_category(declared, budget_categories) {
            debug!(
                provider_id,
                declared = ?declared,
                "Provider has no budget line for its categories"
            );
            return Err(Error::ProviderIneligible {
                provider: provider.display_name(),
            });
        }
        validated.push(provider);
    }

    Ok(validated)
}

/// Validates one provider against the persisted budget lines of an existing demand.
///
/// # Errors
/// * [`Error::ProviderNotFound`] for an unknown provider
/// * [`Error::ProviderHasNoCategories`] when the provider never declared a category
/// * [`Error::ProviderIneligible`] when none of its categories has a budget line
pub async fn validate_provider_for_demand<C>(
    db: &C,
    provider_id: i64,
    demand_id: i64,
) -> Result<ProviderModel>
where
    C: ConnectionTrait,
{
    let provider = Provider::find_by_id(provider_id)
        .one(db)
        .await?
        .ok_or(Error::ProviderNotFound { id: provider_id })?;

    let categories = categories_by_provider(db, &[provider_id]).await?;
    let declared = categories.get(&provider_id).map_or(&[][..], Vec::as_slice);
    if declared.is_empty() {
        return Err(Error::ProviderHasNoCategories {
            provider: provider.display_name(),
        });
    }

    let budget_categories = budget_categories_for_demand(db, demand_id).await?;
    if !has_budget_for_any_category(declared, &budget_categories) {
        return Err(Error::ProviderIneligible {
            provider: provider.display_name(),
        });
    }

    Ok(provider)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_has_budget_for_any_category() {
        let budgets = HashSet::from([1, 2]);
        assert!(has_budget_for_any_category(&[2], &budgets));
        assert!(has_budget_for_any_category(&[5, 1], &budgets));
        assert!(!has_budget_for_any_category(&[3], &budgets));
        assert!(!has_budget_for_any_category(&[], &budgets));
        assert!(!has_budget_for_any_category(&[1], &HashSet::new()));
    }

    #[tokio::test]
    async fn test_provider_matching_one_of_two_budget_lines_is_eligible() -> Result<()> {
        let db = setup_test_db().await?;
        let catering = create_test_category(&db, "Catering").await?;
        let music = create_test_category(&db, "Music").await?;
        let provider = create_test_provider(&db, "Awa", "Diop", &[catering.id]).await?;

        let budgets = HashSet::from([catering.id, music.id]);
        let validated = validate_providers_have_budget(&db, &[provider.id], &budgets).await?;

        assert_eq!(validated.len(), 1);
        assert_eq!(validated[0].id, provider.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_provider_without_matching_budget_is_named() -> Result<()> {
        let db = setup_test_db().await?;
        let catering = create_test_category(&db, "Catering").await?;
        let music = create_test_category(&db, "Music").await?;
        let provider = create_test_provider(&db, "Awa", "Diop", &[catering.id]).await?;

        let budgets = HashSet::from([music.id]);
        let result = validate_providers_have_budget(&db, &[provider.id], &budgets).await;

        match result {
            Err(Error::ProviderIneligible { provider }) => assert_eq!(provider, "Awa Diop"),
            other => panic!("expected ProviderIneligible, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_provider_without_categories_always_fails() -> Result<()> {
        let db = setup_test_db().await?;
        let catering = create_test_category(&db, "Catering").await?;
        let provider = create_test_provider(&db, "Moussa", "Ndiaye", &[]).await?;

        let budgets = HashSet::from([catering.id]);
        let result = validate_providers_have_budget(&db, &[provider.id], &budgets).await;
        assert!(matches!(result, Err(Error::ProviderIneligible { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_batch_rejects_whole_list_on_one_bad_provider() -> Result<()> {
        let db = setup_test_db().await?;
        let catering = create_test_category(&db, "Catering").await?;
        let music = create_test_category(&db, "Music").await?;
        let good = create_test_provider(&db, "Awa", "Diop", &[catering.id]).await?;
        let bad = create_test_provider(&db, "Ibou", "Fall", &[music.id]).await?;

        let budgets = HashSet::from([catering.id]);
        let result = validate_providers_have_budget(&db, &[good.id, bad.id], &budgets).await;

        match result {
            Err(Error::ProviderIneligible { provider }) => assert_eq!(provider, "Ibou Fall"),
            other => panic!("expected ProviderIneligible, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_provider_in_batch() -> Result<()> {
        let db = setup_test_db().await?;
        let catering = create_test_category(&db, "Catering").await?;

        let budgets = HashSet::from([catering.id]);
        let result = validate_providers_have_budget(&db, &[999], &budgets).await;
        assert!(matches!(result, Err(Error::ProviderNotFound { id: 999 })));
        Ok(())
    }

    #[tokio::test]
    async fn test_single_validation_uses_persisted_budget_lines() -> Result<()> {
        let db = setup_test_db().await?;
        let catering = create_test_category(&db, "Catering").await?;
        let music = create_test_category(&db, "Music").await?;
        let organizer = create_test_organizer(&db).await?;
        let demand = insert_test_demand(&db, organizer.id, &[(catering.id, 150_000.0)]).await?;

        let eligible = create_test_provider(&db, "Awa", "Diop", &[music.id, catering.id]).await?;
        let ineligible = create_test_provider(&db, "Ibou", "Fall", &[music.id]).await?;
        let uncategorized = create_test_provider(&db, "Moussa", "Ndiaye", &[]).await?;

        let provider = validate_provider_for_demand(&db, eligible.id, demand.id).await?;
        assert_eq!(provider.id, eligible.id);

        let result = validate_provider_for_demand(&db, ineligible.id, demand.id).await;
        assert!(matches!(result, Err(Error::ProviderIneligible { .. })));

        let result = validate_provider_for_demand(&db, uncategorized.id, demand.id).await;
        assert!(matches!(result, Err(Error::ProviderHasNoCategories { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_budget_lines_must_name_existing_categories() -> Result<()> {
        let db = setup_test_db().await?;
        let catering = create_test_category(&db, "Catering").await?;
        let line = |category_id| CategoryBudget {
            category_id,
            amount: 1.0,
        };

        validate_budget_categories(&db, &[]).await?;
        validate_budget_categories(&db, &[line(catering.id)]).await?;

        let result =
            validate_budget_categories(&db, &[line(catering.id), line(catering.id + 100)]).await;
        match result {
            Err(Error::Validation { message }) => {
                assert!(message.contains(&(catering.id + 100).to_string()));
            }
            other => panic!("expected Validation, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_categories_by_provider_groups_memberships() -> Result<()> {
        let db = setup_test_db().await?;
        let catering = create_test_category(&db, "Catering").await?;
        let music = create_test_category(&db, "Music").await?;
        let first = create_test_provider(&db, "Awa", "Diop", &[catering.id, music.id]).await?;
        let second = create_test_provider(&db, "Ibou", "Fall", &[music.id]).await?;
        let empty = create_test_provider(&db, "Moussa", "Ndiaye", &[]).await?;

        let map = categories_by_provider(&db, &[first.id, second.id, empty.id]).await?;

        let mut first_categories = map.get(&first.id).cloned().unwrap();
        first_categories.sort_unstable();
        let mut expected = vec![catering.id, music.id];
        expected.sort_unstable();
        assert_eq!(first_categories, expected);
        assert_eq!(map.get(&second.id).unwrap(), &vec![music.id]);
        assert!(!map.contains_key(&empty.id));
        Ok(())
    }
}
