//! Enumerations stored as snake_case string columns.
//!
//! The transition rules for [`DemandStatus`] live in `core::status`; this module only
//! defines the closed sets of values and their database representation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a demand or of a single demand-provider pairing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum DemandStatus {
    /// Freshly created, nobody has looked at it yet
    #[sea_orm(string_value = "new_request")]
    NewRequest,
    /// The provider is studying the request
    #[sea_orm(string_value = "under_study")]
    UnderStudy,
    /// The provider sent a proposal to the organizer
    #[sea_orm(string_value = "proposal_sent")]
    ProposalSent,
    /// The provider declined
    #[sea_orm(string_value = "refused_by_provider")]
    RefusedByProvider,
    /// The organizer accepted the proposal
    #[sea_orm(string_value = "accepted_by_client")]
    AcceptedByClient,
    /// The organizer declined the proposal
    #[sea_orm(string_value = "refused_by_client")]
    RefusedByClient,
    /// Both parties committed to the mission
    #[sea_orm(string_value = "mission_confirmed")]
    MissionConfirmed,
    /// The provider is preparing the event
    #[sea_orm(string_value = "in_preparation")]
    InPreparation,
    /// The event took place
    #[sea_orm(string_value = "event_completed")]
    EventCompleted,
    /// Closed, with or without a review
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Cancelled by the organizer
    #[sea_orm(string_value = "cancelled_by_client")]
    CancelledByClient,
    /// Cancelled by the provider
    #[sea_orm(string_value = "cancelled_by_provider")]
    CancelledByProvider,
}

/// Why a pairing did not turn into a mission.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum NonConversionReason {
    #[sea_orm(string_value = "inadequate_budget")]
    InadequateBudget,
    #[sea_orm(string_value = "unsuitable_service")]
    UnsuitableService,
    #[sea_orm(string_value = "event_postponed")]
    EventPostponed,
    #[sea_orm(string_value = "location_out_of_area")]
    LocationOutOfArea,
    #[sea_orm(string_value = "unavailable_on_date")]
    UnavailableOnDate,
    #[sea_orm(string_value = "client_not_responsive")]
    ClientNotResponsive,
    #[sea_orm(string_value = "client_chose_another")]
    ClientChoseAnother,
    #[sea_orm(string_value = "other")]
    Other,
}

/// Kind of persisted notification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    #[sea_orm(string_value = "new_demand")]
    NewDemand,
    #[sea_orm(string_value = "payment_confirmation")]
    PaymentConfirmation,
    #[sea_orm(string_value = "contact_unlocked")]
    ContactUnlocked,
    #[sea_orm(string_value = "subscription_expiring")]
    SubscriptionExpiring,
    #[sea_orm(string_value = "demand_status_changed")]
    DemandStatusChanged,
    #[sea_orm(string_value = "new_review")]
    NewReview,
}

/// Delivery channel recorded on a persisted notification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    #[sea_orm(string_value = "whatsapp")]
    WhatsApp,
    #[sea_orm(string_value = "email")]
    Email,
    #[sea_orm(string_value = "sms")]
    Sms,
    #[sea_orm(string_value = "in_app")]
    InApp,
}

/// Delivery state of a persisted notification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "failed")]
    Failed,
}
