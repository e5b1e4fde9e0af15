//! Unified error type for the demand engine.
//!
//! Variants fall into four groups: input and eligibility rejections, capacity, missing
//! records, and infrastructure failures. Notification failures only ever travel inside the
//! fan-out, where they are logged per unit.

use crate::entities::DemandStatus;
use chrono::NaiveDate;
use thiserror::Error;

/// All errors produced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration value or unreadable configuration file
    #[error("Configuration error: {message}")]
    Config {
        /// Human readable description
        message: String,
    },

    /// Malformed input rejected before any write
    #[error("Validation error: {message}")]
    Validation {
        /// Human readable description
        message: String,
    },

    /// The event date lies before today
    #[error("Event date {date} is in the past")]
    EventDateInPast {
        /// Rejected date
        date: NaiveDate,
    },

    /// None of the provider's categories has a budget line on the demand
    #[error(
        "Provider \"{provider}\" has no budget defined for any of their categories. \
         Add a budget for at least one of their categories."
    )]
    ProviderIneligible {
        /// Display name of the provider
        provider: String,
    },

    /// The provider never declared a category, so no budget can ever match
    #[error("Provider \"{provider}\" has no category assigned")]
    ProviderHasNoCategories {
        /// Display name of the provider
        provider: String,
    },

    /// The demand already has the maximum number of providers
    #[error("This demand has already reached the limit of {limit} providers")]
    CapacityExceeded {
        /// The fixed cap
        limit: u64,
    },

    /// The requested status change is not in the transition table
    #[error("Illegal status transition from {from} to {to}")]
    IllegalTransition {
        /// Current status
        from: DemandStatus,
        /// Requested status
        to: DemandStatus,
    },

    /// Unknown demand id
    #[error("Demand with ID {id} not found")]
    DemandNotFound {
        /// Requested id
        id: i64,
    },

    /// Unknown demand-provider pairing
    #[error("Demand provider not found: {reference}")]
    DemandProviderNotFound {
        /// Id or (demand, provider) pair that was looked up
        reference: String,
    },

    /// Unknown provider id
    #[error("Provider with ID {id} not found")]
    ProviderNotFound {
        /// Requested id
        id: i64,
    },

    /// Unknown organizer id
    #[error("Organizer with ID {id} not found")]
    OrganizerNotFound {
        /// Requested id
        id: i64,
    },

    /// Unknown notification id for the given recipient
    #[error("Notification with ID {id} not found")]
    NotificationNotFound {
        /// Requested id
        id: i64,
    },

    /// A notification channel rejected or failed a send
    #[error("Notification channel {channel} failed: {message}")]
    Notification {
        /// Channel tag
        channel: String,
        /// Failure description
        message: String,
    },

    /// Database error from `SeaORM`
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Outbound HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding or decoding failure
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Whether the error should be reported back to the caller as a client error
    /// (bad input, ineligible provider, cap reached, unknown id).
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::EventDateInPast { .. }
                | Self::ProviderIneligible { .. }
                | Self::ProviderHasNoCategories { .. }
                | Self::CapacityExceeded { .. }
                | Self::IllegalTransition { .. }
                | Self::DemandNotFound { .. }
                | Self::DemandProviderNotFound { .. }
                | Self::ProviderNotFound { .. }
                | Self::OrganizerNotFound { .. }
                | Self::NotificationNotFound { .. }
        )
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
