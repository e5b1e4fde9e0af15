/// Service category catalog loading from config.toml
pub mod catalog;

/// Database configuration and connection management
pub mod database;

/// Notification channel settings from environment variables
pub mod notifications;
