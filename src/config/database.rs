//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! parents before children. The composite uniqueness rules the engine relies on
//! (one budget line per category, one pairing per provider, one membership per category and
//! sub-category) are added as unique indexes afterwards.

use crate::entities::{
    Admin, Category, Demand, DemandBudget, DemandBudgetColumn, DemandProvider,
    DemandProviderColumn, Notification, Organizer, Provider, ProviderCategory,
    ProviderCategoryColumn,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema, sea_query::Index};
use tracing::debug;

/// Default location of the `SQLite` database file
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/demand_broker.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by `DATABASE_URL`.
///
/// Falls back to a local `SQLite` file if no environment variable is set.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!(%database_url, "Connecting to database");
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates all tables and unique indexes.
///
/// Existing tables and indexes are left in place, so this is safe to run on every start.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut tables = [
        schema.create_table_from_entity(Category),
        schema.create_table_from_entity(Organizer),
        schema.create_table_from_entity(Provider),
        schema.create_table_from_entity(ProviderCategory),
        schema.create_table_from_entity(Admin),
        schema.create_table_from_entity(Demand),
        schema.create_table_from_entity(DemandBudget),
        schema.create_table_from_entity(DemandProvider),
        schema.create_table_from_entity(Notification),
    ];
    for table in &mut tables {
        table.if_not_exists();
        db.execute(builder.build(&*table)).await?;
    }

    let indexes = [
        Index::create()
            .name("idx_demand_budgets_demand_category")
            .table(DemandBudget)
            .col(DemandBudgetColumn::DemandId)
            .col(DemandBudgetColumn::CategoryId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_demand_providers_demand_provider")
            .table(DemandProvider)
            .col(DemandProviderColumn::DemandId)
            .col(DemandProviderColumn::ProviderId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_provider_categories_membership")
            .table(ProviderCategory)
            .col(ProviderCategoryColumn::ProviderId)
            .col(ProviderCategoryColumn::CategoryId)
            .col(ProviderCategoryColumn::SubCategoryId)
            .unique()
            .if_not_exists()
            .to_owned(),
    ];
    for index in &indexes {
        db.execute(builder.build(index)).await?;
    }

    Ok(())
}
