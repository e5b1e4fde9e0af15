/// Attaching providers to demands under the provider cap
pub mod assignment;

/// Budget-based provider eligibility
pub mod budget;

/// Service category catalog seeding and listing
pub mod catalog;

/// Demand input types, validation, queries and updates
pub mod demand;

/// Persisted in-app notifications
pub mod notification;

/// Demand creation and pairing lifecycle entry point
pub mod orchestrator;

/// Per-provider engagement statistics
pub mod stats;

/// Status transition table
pub mod status;
