//! Service category catalog operations.

use crate::{
    config::catalog::CategoryConfig,
    entities::{Category, CategoryColumn, CategoryModel, category},
    errors::Result,
};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::info;

/// Inserts every configured category whose slug is not stored yet.
///
/// Returns the number of categories created. Existing categories are not modified, so the
/// seeding can run on every start.
pub async fn seed_categories(
    db: &DatabaseConnection,
    categories: &[CategoryConfig],
) -> Result<usize> {
    let mut created = 0;

    for config in categories {
        let existing = Category::find()
            .filter(CategoryColumn::Slug.eq(config.slug.as_str()))
            .one(db)
            .await?;
        if existing.is_some() {
            continue;
        }

        category::ActiveModel {
            name: Set(config.name.clone()),
            slug: Set(config.slug.clone()),
            description: Set(config.description.clone()),
            display_order: Set(config.display_order),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(slug = %config.slug, "Seeded category");
        created += 1;
    }

    Ok(created)
}

/// Active categories in display order.
pub async fn list_active_categories(db: &DatabaseConnection) -> Result<Vec<CategoryModel>> {
    Category::find()
        .filter(CategoryColumn::IsActive.eq(true))
        .order_by_asc(CategoryColumn::DisplayOrder)
        .order_by_asc(CategoryColumn::Name)
        .all(db)
        .await
        .map_err(Into::into)
}
