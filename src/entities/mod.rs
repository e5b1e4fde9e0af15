//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod admin;
pub mod category;
pub mod demand;
pub mod demand_budget;
pub mod demand_provider;
pub mod enums;
pub mod notification;
pub mod organizer;
pub mod provider;
pub mod provider_category;

// Re-export specific types to avoid conflicts
pub use admin::{Column as AdminColumn, Entity as Admin, Model as AdminModel};
pub use category::{Column as CategoryColumn, Entity as Category, Model as CategoryModel};
pub use demand::{Column as DemandColumn, Entity as Demand, Model as DemandModel};
pub use demand_budget::{
    Column as DemandBudgetColumn, Entity as DemandBudget, Model as DemandBudgetModel,
};
pub use demand_provider::{
    Column as DemandProviderColumn, Entity as DemandProvider, Model as DemandProviderModel,
};
pub use enums::{
    DemandStatus, NonConversionReason, NotificationChannel, NotificationStatus, NotificationType,
};
pub use notification::{
    Column as NotificationColumn, Entity as Notification, Model as NotificationModel,
};
pub use organizer::{Column as OrganizerColumn, Entity as Organizer, Model as OrganizerModel};
pub use provider::{Column as ProviderColumn, Entity as Provider, Model as ProviderModel};
pub use provider_category::{
    Column as ProviderCategoryColumn, Entity as ProviderCategory, Model as ProviderCategoryModel,
};
