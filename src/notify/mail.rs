//! Email composition and delivery.
//!
//! [`MailComposer`] turns engine data into subject and plain-text body. [`ComposingMailer`]
//! is the shipped [`Mailer`]: it composes every message and hands it to a [`MailTransport`],
//! either SMTP or, when no credentials are configured, the log.

use super::{DeliveryReport, Mailer, smtp::SmtpTransport};
use crate::{
    config::notifications::NotificationConfig,
    core::demand::BudgetLine,
    entities::{DemandModel, OrganizerModel, ProviderModel},
    errors::Result,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

const NOT_SPECIFIED: &str = "Not specified";

/// A composed email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub body: String,
}

/// Formats an amount in West African CFA francs with space-separated thousands.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn format_currency(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    let sign = if rounded < 0 { "-" } else { "" };
    format!("{sign}{grouped} F CFA")
}

fn format_date(date: NaiveDate) -> String {
    date.format("%A %-d %B %Y").to_string()
}

fn or_not_specified(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or(NOT_SPECIFIED)
}

fn budget_label(line: &BudgetLine) -> String {
    let category = line
        .category
        .as_ref()
        .map_or_else(|| format!("Category {}", line.budget.category_id), |c| c.name.clone());
    format!("{category}: {}", format_currency(line.budget.amount))
}

/// Builds the messages sent by the engine.
#[derive(Debug, Clone)]
pub struct MailComposer {
    admin_email: String,
    platform_url: String,
}

impl MailComposer {
    /// Creates a composer addressing admins at `admin_email` and linking to `platform_url`.
    pub fn new(admin_email: impl Into<String>, platform_url: impl Into<String>) -> Self {
        Self {
            admin_email: admin_email.into(),
            platform_url: platform_url.into(),
        }
    }

    /// Creates a composer from the notification settings.
    #[must_use]
    pub fn from_config(config: &NotificationConfig) -> Self {
        Self::new(config.admin_email.clone(), config.platform_url.clone())
    }

    fn event_block(demand: &DemandModel) -> String {
        let mut block = String::new();
        let _ = writeln!(block, "Event: {}", demand.event_nature);
        let _ = writeln!(block, "Date: {}", format_date(demand.event_date));
        let _ = writeln!(block, "Location: {}", or_not_specified(demand.location.as_deref()));
        let _ = writeln!(
            block,
            "Zone: {}",
            or_not_specified(demand.geographic_zone.as_deref())
        );
        let guests = demand
            .approximate_guests
            .map_or_else(|| NOT_SPECIFIED.to_string(), |g| g.to_string());
        let _ = writeln!(block, "Guests: {guests}");
        let budget = demand
            .budget
            .map_or_else(|| NOT_SPECIFIED.to_string(), format_currency);
        let _ = writeln!(block, "Overall budget: {budget}");
        let _ = writeln!(block, "Contact: {}", demand.contact_name);
        block
    }

    /// New-demand announcement for a provider, `None` without an email address.
    ///
    /// `budgets` should hold the lines matching the provider's categories.
    #[must_use]
    pub fn demand_notification(
        &self,
        provider: &ProviderModel,
        demand: &DemandModel,
        budgets: &[&BudgetLine],
    ) -> Option<MailMessage> {
        let to = provider.email.clone()?;

        let mut body = format!(
            "Hello {},\n\nYou have received a new service request for {}.\n\n",
            provider.display_name(),
            provider.company_name
        );
        body.push_str(&Self::event_block(demand));
        if !budgets.is_empty() {
            body.push_str("\nBudget for your services:\n");
            for line in budgets {
                let _ = writeln!(body, "  - {}", budget_label(line));
            }
        }
        let _ = write!(
            body,
            "\nAdditional information: {}\n\nSign in at {} to review and answer this request.\n",
            or_not_specified(demand.additional_info.as_deref()),
            self.platform_url
        );

        Some(MailMessage {
            to,
            subject: format!("New service request - {}", demand.event_nature),
            body,
        })
    }

    /// Receipt for the organizer, `None` without an email address.
    #[must_use]
    pub fn organizer_confirmation(
        &self,
        organizer: &OrganizerModel,
        demand: &DemandModel,
        budgets: &[BudgetLine],
    ) -> Option<MailMessage> {
        let to = organizer.email.clone()?;

        let mut body = format!(
            "Hello {},\n\nWe have received your request. The selected providers have been notified \
             and will get back to you.\n\n",
            organizer.display_name()
        );
        body.push_str(&Self::event_block(demand));
        if !budgets.is_empty() {
            body.push_str("\nYour budget by category:\n");
            for line in budgets {
                let _ = writeln!(body, "  - {}", budget_label(line));
            }
        }
        let _ = write!(body, "\nFollow your request at {}.\n", self.platform_url);

        Some(MailMessage {
            to,
            subject: format!("Your request has been received - {}", demand.event_nature),
            body,
        })
    }

    /// Full summary of a new demand for the admin mailbox.
    #[must_use]
    pub fn admin_notification(
        &self,
        demand: &DemandModel,
        organizer: &OrganizerModel,
        providers: &[ProviderModel],
        budgets: &[BudgetLine],
    ) -> MailMessage {
        let mut body = String::from("A new demand was submitted.\n\nOrganizer:\n");
        let _ = writeln!(body, "  Name: {}", organizer.display_name());
        let _ = writeln!(body, "  Phone: {}", organizer.phone);
        let _ = writeln!(
            body,
            "  Email: {}",
            or_not_specified(organizer.email.as_deref())
        );
        let _ = writeln!(
            body,
            "  Location: {}, {}",
            organizer.commune, organizer.department
        );

        body.push_str("\nEvent:\n");
        for line in Self::event_block(demand).lines() {
            let _ = writeln!(body, "  {line}");
        }

        if !budgets.is_empty() {
            body.push_str("\nBudget lines:\n");
            for line in budgets {
                let _ = writeln!(body, "  - {}", budget_label(line));
            }
        }

        let _ = writeln!(body, "\nProviders notified ({}):", providers.len());
        if providers.is_empty() {
            body.push_str("  No provider assigned\n");
        }
        for provider in providers {
            let _ = writeln!(
                body,
                "  - {} ({}) email: {} phone: {} activity: {}",
                provider.company_name,
                provider.display_name(),
                or_not_specified(provider.email.as_deref()),
                or_not_specified(provider.phone.as_deref()),
                or_not_specified(provider.activity.as_deref()),
            );
        }
        if let Some(info) = demand.additional_info.as_deref() {
            let _ = write!(body, "\nAdditional information:\n{info}\n");
        }

        MailMessage {
            to: self.admin_email.clone(),
            subject: format!(
                "[Admin] New demand - {} - {}",
                demand.event_nature,
                organizer.display_name()
            ),
            body,
        }
    }

    /// Mission confirmation for the provider, with the organizer's contact details.
    #[must_use]
    pub fn mission_confirmed(
        &self,
        provider: &ProviderModel,
        demand: &DemandModel,
        organizer: &OrganizerModel,
    ) -> Option<MailMessage> {
        let to = provider.email.clone()?;

        let mut body = format!(
            "Hello {},\n\nThe organizer confirmed the mission. Here are the event details.\n\n",
            provider.display_name()
        );
        body.push_str(&Self::event_block(demand));
        let _ = write!(
            body,
            "\nOrganizer: {}\nPhone: {}\nEmail: {}\n\nManage the mission at {}.\n",
            organizer.display_name(),
            organizer.phone,
            or_not_specified(organizer.email.as_deref()),
            self.platform_url
        );

        Some(MailMessage {
            to,
            subject: format!("Mission confirmed - {}", demand.event_nature),
            body,
        })
    }
}

/// Hands a composed message to the outside world.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Delivers one message.
    async fn deliver(&self, message: &MailMessage) -> Result<()>;
}

/// Transport that writes each message to the log. Used when SMTP is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn deliver(&self, message: &MailMessage) -> Result<()> {
        info!(to = %message.to, subject = %message.subject, "Email logged, SMTP not configured");
        debug!(to = %message.to, body = %message.body, "Email body");
        Ok(())
    }
}

/// [`Mailer`] that composes every message and sends it through a [`MailTransport`].
#[derive(Debug, Clone)]
pub struct ComposingMailer<T> {
    composer: MailComposer,
    transport: T,
}

impl<T> ComposingMailer<T> {
    /// Creates a mailer around a composer and a transport.
    #[must_use]
    pub const fn new(composer: MailComposer, transport: T) -> Self {
        Self {
            composer,
            transport,
        }
    }

    /// The transport messages go through.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }
}

/// Picks the mailer for the given settings: SMTP when credentials are present, the log
/// otherwise.
///
/// # Errors
/// Returns [`crate::errors::Error::Config`] when the SMTP settings cannot be used.
pub fn mailer_from_config(config: &NotificationConfig) -> Result<Arc<dyn Mailer>> {
    let composer = MailComposer::from_config(config);
    if config.email.is_enabled() {
        let transport = SmtpTransport::from_config(&config.email, config.unit_timeout)?;
        info!(host = %config.email.host, port = config.email.port, "SMTP mailer configured");
        Ok(Arc::new(ComposingMailer::new(composer, transport)))
    } else {
        warn!("EMAIL_USER or EMAIL_PASSWORD missing, emails will only be logged");
        Ok(Arc::new(ComposingMailer::new(composer, LogTransport)))
    }
}

#[async_trait]
impl<T: MailTransport> Mailer for ComposingMailer<T> {
    async fn send_demand_notification(
        &self,
        provider: &ProviderModel,
        demand: &DemandModel,
    ) -> Result<()> {
        match self.composer.demand_notification(provider, demand, &[]) {
            Some(message) => self.transport.deliver(&message).await,
            None => {
                warn!(provider_id = provider.id, "Provider has no email address, skipping");
                Ok(())
            }
        }
    }

    async fn send_demand_notification_batch(
        &self,
        providers: &[ProviderModel],
        demand: &DemandModel,
        budgets: &[BudgetLine],
        provider_categories: &HashMap<i64, Vec<i64>>,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for provider in providers {
            let categories = provider_categories
                .get(&provider.id)
                .map_or(&[][..], Vec::as_slice);
            let relevant: Vec<&BudgetLine> = budgets
                .iter()
                .filter(|line| categories.contains(&line.budget.category_id))
                .collect();

            let Some(message) = self.composer.demand_notification(provider, demand, &relevant)
            else {
                warn!(provider_id = provider.id, "Provider has no email address, skipping");
                continue;
            };
            match self.transport.deliver(&message).await {
                Ok(()) => report.success.push(message.to),
                Err(err) => {
                    warn!(provider_id = provider.id, error = %err, "Demand email not sent");
                    report.failed.push(message.to);
                }
            }
        }
        report
    }

    async fn send_organizer_confirmation(
        &self,
        organizer: &OrganizerModel,
        demand: &DemandModel,
        budgets: &[BudgetLine],
    ) -> Result<()> {
        match self
            .composer
            .organizer_confirmation(organizer, demand, budgets)
        {
            Some(message) => self.transport.deliver(&message).await,
            None => {
                debug!(
                    organizer_id = organizer.id,
                    "Organizer has no email address, skipping"
                );
                Ok(())
            }
        }
    }

    async fn send_admin_notification(
        &self,
        demand: &DemandModel,
        organizer: &OrganizerModel,
        providers: &[ProviderModel],
        budgets: &[BudgetLine],
    ) -> Result<()> {
        let message = self
            .composer
            .admin_notification(demand, organizer, providers, budgets);
        self.transport.deliver(&message).await
    }

    async fn send_mission_confirmed_email(
        &self,
        provider: &ProviderModel,
        demand: &DemandModel,
        organizer: &OrganizerModel,
    ) -> Result<()> {
        match self.composer.mission_confirmed(provider, demand, organizer) {
            Some(message) => self.transport.deliver(&message).await,
            None => {
                warn!(provider_id = provider.id, "Provider has no email address, skipping");
                Ok(())
            }
        }
    }
}
