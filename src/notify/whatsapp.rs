//! WhatsApp Cloud API client.
//!
//! Messages go to `POST {api_url}/{phone_number_id}/messages` with a bearer token. When an
//! approved template name is configured the message is sent as a template (required for
//! business-initiated conversations); otherwise a plain text message is sent, which only
//! reaches recipients with an open conversation window.

use super::Messenger;
use crate::{
    config::notifications::WhatsAppConfig,
    entities::{DemandModel, OrganizerModel, ProviderModel},
    errors::{Error, Result},
    notify::mail::format_currency,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const CHANNEL: &str = "whatsapp";
const TEMPLATE_LANGUAGE: &str = "fr";
const COUNTRY_CODE: &str = "221";
const NOT_SPECIFIED: &str = "Not specified";

/// Body of an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    /// Approved template with positional body parameters
    Template {
        /// Template name as approved in Meta Business
        name: String,
        /// Values for the template variables, in order
        parameters: Vec<String>,
    },
    /// Free text
    Text(String),
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    messages: Vec<ApiMessage>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    id: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct ApiError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Normalizes a phone number for the API: no spaces, no leading `+`, and the Senegal country
/// code prepended to 9-digit local numbers.
#[must_use]
pub fn format_phone_number(phone: &str) -> String {
    let compact: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
    let formatted = compact.strip_prefix('+').unwrap_or(&compact);

    if !formatted.starts_with(COUNTRY_CODE) && formatted.len() == 9 {
        format!("{COUNTRY_CODE}{formatted}")
    } else {
        formatted.to_string()
    }
}

/// Builds the JSON request body for the messages endpoint.
#[must_use]
pub fn build_payload(to: &str, content: &MessageContent) -> Value {
    match content {
        MessageContent::Template { name, parameters } => {
            let parameters: Vec<Value> = parameters
                .iter()
                .map(|text| json!({ "type": "text", "text": text }))
                .collect();
            json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": to,
                "type": "template",
                "template": {
                    "name": name,
                    "language": { "code": TEMPLATE_LANGUAGE },
                    "components": [{ "type": "body", "parameters": parameters }],
                },
            })
        }
        MessageContent::Text(body) => json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "text",
            "text": { "body": body },
        }),
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%A %-d %B %Y").to_string()
}

fn log_api_error(to: &str, api_error: &ApiError) {
    error!(
        to,
        code = api_error.code,
        message = %api_error.message,
        "WhatsApp API rejected the message"
    );
    match api_error.code {
        131_030 => error!(
            to,
            "Recipient must first message the business number (24-hour window)"
        ),
        131_047 => error!(to, "Number is not registered on WhatsApp"),
        131_026 => error!(to, "Message could not be delivered, check the number"),
        _ => {}
    }
}

/// WhatsApp implementation of [`Messenger`].
#[derive(Debug, Clone)]
pub struct WhatsAppClient {
    config: WhatsAppConfig,
    http: Client,
}

impl WhatsAppClient {
    /// Creates a client whose requests give up after `timeout`.
    pub fn new(config: WhatsAppConfig, timeout: Duration) -> Result<Self> {
        if !config.is_enabled() {
            warn!("WhatsApp service is disabled, missing credentials");
        }
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { config, http })
    }

    /// Provider announcement: template when configured, text otherwise.
    #[must_use]
    pub fn provider_message(
        &self,
        provider: &ProviderModel,
        demand: &DemandModel,
    ) -> MessageContent {
        if let Some(name) = &self.config.template_new_demand {
            return MessageContent::Template {
                name: name.clone(),
                parameters: vec![
                    provider.display_name(),
                    demand.event_nature.clone(),
                    format_date(demand.event_date),
                    demand
                        .location
                        .clone()
                        .unwrap_or_else(|| NOT_SPECIFIED.to_string()),
                ],
            };
        }

        let guests = demand
            .approximate_guests
            .map_or_else(|| NOT_SPECIFIED.to_string(), |g| g.to_string());
        let budget = demand
            .budget
            .map_or_else(|| NOT_SPECIFIED.to_string(), format_currency);
        MessageContent::Text(format!(
            "*New service request!*\n\n\
             Hello {},\n\n\
             You have received a new request:\n\n\
             *Event:* {}\n\
             *Date:* {}\n\
             *Location:* {}\n\
             *Guests:* {guests}\n\
             *Budget:* {budget}\n\n\
             *Contact:* {}\n\n\
             Sign in to your space to review and answer this request.",
            provider.display_name(),
            demand.event_nature,
            format_date(demand.event_date),
            demand.location.as_deref().unwrap_or(NOT_SPECIFIED),
            demand.contact_name,
        ))
    }

    /// Admin summary: template when configured, text otherwise.
    #[must_use]
    pub fn admin_message(
        &self,
        demand: &DemandModel,
        organizer: &OrganizerModel,
        providers: &[ProviderModel],
    ) -> MessageContent {
        if let Some(name) = &self.config.template_admin_demand {
            return MessageContent::Template {
                name: name.clone(),
                parameters: vec![
                    organizer.display_name(),
                    demand.event_nature.clone(),
                    format_date(demand.event_date),
                    providers.len().to_string(),
                ],
            };
        }

        let mut body = format!(
            "[ADMIN] New demand received\n\n\
             Organizer:\n  - Name: {}\n  - Phone: {}\n  - Email: {}\n  - Location: {}, {}\n\n\
             Event:\n  - Type: {}\n  - Date: {}\n  - Location: {}\n  - Zone: {}\n\
             \x20 - Contact: {}\n\n\
             Providers notified ({}):\n",
            organizer.display_name(),
            organizer.phone,
            organizer.email.as_deref().unwrap_or(NOT_SPECIFIED),
            organizer.commune,
            organizer.department,
            demand.event_nature,
            format_date(demand.event_date),
            demand.location.as_deref().unwrap_or(NOT_SPECIFIED),
            demand.geographic_zone.as_deref().unwrap_or(NOT_SPECIFIED),
            demand.contact_name,
            providers.len(),
        );
        if providers.is_empty() {
            body.push_str("  No provider assigned\n");
        }
        for provider in providers {
            let _ = writeln!(
                body,
                "  - {} ({})",
                provider.company_name,
                provider.display_name()
            );
        }
        if let Some(info) = demand.additional_info.as_deref() {
            let _ = write!(body, "\nAdditional information:\n{info}");
        }
        MessageContent::Text(body)
    }

    /// Sends one message, returning the id the API assigned to it.
    ///
    /// # Errors
    /// * [`Error::Notification`] when the channel is disabled, the API reports an error, or the
    ///   response carries no message id
    /// * [`Error::Http`] when the request itself fails or times out
    pub async fn send_message(&self, to: &str, content: &MessageContent) -> Result<String> {
        let (Some(phone_number_id), Some(access_token)) =
            (&self.config.phone_number_id, &self.config.access_token)
        else {
            return Err(Error::Notification {
                channel: CHANNEL.to_string(),
                message: "WhatsApp is not configured".to_string(),
            });
        };

        let url = format!(
            "{}/{phone_number_id}/messages",
            self.config.api_url.trim_end_matches('/')
        );
        debug!(to, "Sending WhatsApp message");

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&build_payload(to, content))
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        let body: ApiResponse = serde_json::from_str(&text).unwrap_or_default();

        if let Some(api_error) = &body.error {
            log_api_error(to, api_error);
            return Err(Error::Notification {
                channel: CHANNEL.to_string(),
                message: format!("API error {}: {}", api_error.code, api_error.message),
            });
        }
        if !status.is_success() {
            error!(to, %status, body = %text, "WhatsApp API returned an error status");
            return Err(Error::Notification {
                channel: CHANNEL.to_string(),
                message: format!("API returned status {status}"),
            });
        }

        match body.messages.into_iter().next() {
            Some(message) => {
                info!(to, message_id = %message.id, "WhatsApp message sent");
                Ok(message.id)
            }
            None => {
                warn!(to, body = %text, "WhatsApp API response carries no message id");
                Err(Error::Notification {
                    channel: CHANNEL.to_string(),
                    message: "Unexpected API response".to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl Messenger for WhatsAppClient {
    fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }

    async fn send_demand_notification(
        &self,
        provider: &ProviderModel,
        demand: &DemandModel,
    ) -> Result<bool> {
        if !self.is_enabled() {
            debug!("WhatsApp disabled, skipping message");
            return Ok(false);
        }
        let Some(phone) = provider.phone.as_deref() else {
            warn!(provider_id = provider.id, "Provider has no phone number");
            return Ok(false);
        };

        let content = self.provider_message(provider, demand);
        self.send_message(&format_phone_number(phone), &content)
            .await
            .map(|_| true)
    }

    async fn send_admin_notification(
        &self,
        demand: &DemandModel,
        organizer: &OrganizerModel,
        providers: &[ProviderModel],
    ) -> Result<bool> {
        if !self.is_enabled() {
            debug!("WhatsApp disabled, skipping admin message");
            return Ok(false);
        }
        let Some(admin_phone) = self.config.admin_phone.as_deref() else {
            warn!("Admin phone not configured, skipping admin WhatsApp notification");
            return Ok(false);
        };

        let content = self.admin_message(demand, organizer, providers);
        self.send_message(&format_phone_number(admin_phone), &content)
            .await
            .map(|_| true)
    }
}
