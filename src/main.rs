#![allow(clippy::result_large_err)]

use demand_broker::{
    config::{
        catalog,
        database::{self, DEFAULT_DATABASE_URL},
        notifications::NotificationConfig,
    },
    core::{catalog::seed_categories, orchestrator::DemandOrchestrator},
    errors::Result,
    notify::realtime::AdminRoom,
};
use dotenvy::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal since env vars can be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Read notification channel settings
    let notification_config = NotificationConfig::from_env()
        .inspect_err(|e| error!("Invalid notification configuration: {}", e))?;

    // 4. Connect and create the schema
    if database::get_database_url() == DEFAULT_DATABASE_URL {
        std::fs::create_dir_all("data")?;
    }
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database schema ready."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Seed the category catalog from config.toml
    match catalog::load_default_config() {
        Ok(catalog) => {
            let created = seed_categories(&db, &catalog.categories).await?;
            info!(
                created,
                configured = catalog.categories.len(),
                "Category catalog seeded."
            );
        }
        Err(e) => warn!("No category catalog loaded: {}", e),
    }

    // 6. Wire the notification channels to check they can be built
    let orchestrator =
        DemandOrchestrator::with_default_channels(db, &notification_config, AdminRoom::default())?;
    info!(
        admin_email = %notification_config.admin_email,
        platform_url = %notification_config.platform_url,
        smtp_enabled = notification_config.email.is_enabled(),
        whatsapp_enabled = notification_config.whatsapp.is_enabled(),
        admin_whatsapp = notification_config.whatsapp.admin_phone.is_some(),
        unit_timeout_secs = notification_config.unit_timeout.as_secs(),
        "Notification channels configured."
    );

    orchestrator.dispatcher().drain().await;
    info!("Provisioning complete.");
    Ok(())
}
