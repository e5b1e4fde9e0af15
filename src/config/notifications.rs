//! Notification channel configuration from environment variables.
//!
//! Every value is optional. A missing WhatsApp phone number id or access token disables the
//! WhatsApp channel instead of failing startup; a missing admin phone only disables the admin
//! WhatsApp message. Missing SMTP credentials leave email on the log transport.

use crate::errors::{Error, Result};
use std::fmt;
use std::time::Duration;

/// Default Graph API base URL
pub const DEFAULT_WHATSAPP_API_URL: &str = "https://graph.facebook.com/v18.0";
/// Default recipient of admin emails
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@hgpd.com";
/// Default link placed in outgoing messages
pub const DEFAULT_PLATFORM_URL: &str = "https://hgpd.com";
/// Default bound on a single notification unit, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Default SMTP relay
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
/// Default SMTP submission port (STARTTLS)
pub const DEFAULT_SMTP_PORT: u16 = 587;
/// Default sender mailbox
pub const DEFAULT_EMAIL_FROM: &str = "HGPD <noreply@hgpd.com>";

/// SMTP relay settings.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    /// Relay host name
    pub host: String,
    /// Relay port; 465 means implicit TLS, anything else STARTTLS
    pub port: u16,
    /// Login
    pub user: Option<String>,
    /// Password
    pub password: Option<String>,
    /// Sender mailbox, `Name <address>` or a bare address
    pub from: String,
}

impl SmtpConfig {
    /// Both credentials are present.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.user.is_some() && self.password.is_some()
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SMTP_HOST.to_string(),
            port: DEFAULT_SMTP_PORT,
            user: None,
            password: None,
            from: DEFAULT_EMAIL_FROM.to_string(),
        }
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("from", &self.from)
            .finish()
    }
}

/// WhatsApp Cloud API settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhatsAppConfig {
    /// Graph API base URL
    pub api_url: String,
    /// Business phone number id used in the messages endpoint
    pub phone_number_id: Option<String>,
    /// Bearer token
    pub access_token: Option<String>,
    /// Admin number receiving the admin summary
    pub admin_phone: Option<String>,
    /// Approved template for provider announcements, text message when absent
    pub template_new_demand: Option<String>,
    /// Approved template for the admin summary, text message when absent
    pub template_admin_demand: Option<String>,
}

impl WhatsAppConfig {
    /// Both credentials are present.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.phone_number_id.is_some() && self.access_token.is_some()
    }
}

/// Settings shared by the notification channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    /// Address receiving admin emails
    pub admin_email: String,
    /// Platform link used in messages
    pub platform_url: String,
    /// SMTP relay settings
    pub email: SmtpConfig,
    /// WhatsApp Cloud API settings
    pub whatsapp: WhatsAppConfig,
    /// Upper bound for each fan-out unit
    pub unit_timeout: Duration,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            admin_email: DEFAULT_ADMIN_EMAIL.to_string(),
            platform_url: DEFAULT_PLATFORM_URL.to_string(),
            email: SmtpConfig::default(),
            whatsapp: WhatsAppConfig {
                api_url: DEFAULT_WHATSAPP_API_URL.to_string(),
                ..Default::default()
            },
            unit_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl NotificationConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Blank values count as missing.
    ///
    /// # Errors
    /// Returns [`Error::Config`] when `NOTIFICATION_TIMEOUT_SECS` is not a positive integer or
    /// `EMAIL_PORT` is not a port number.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let unit_timeout = match get("NOTIFICATION_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|e| Error::Config {
                    message: format!("NOTIFICATION_TIMEOUT_SECS must be an integer: {e}"),
                })?;
                if secs == 0 {
                    return Err(Error::Config {
                        message: "NOTIFICATION_TIMEOUT_SECS must be greater than zero".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let port = match get("EMAIL_PORT") {
            Some(raw) => raw.parse().map_err(|e| Error::Config {
                message: format!("EMAIL_PORT must be a port number: {e}"),
            })?,
            None => DEFAULT_SMTP_PORT,
        };

        Ok(Self {
            admin_email: get("ADMIN_EMAIL").unwrap_or_else(|| DEFAULT_ADMIN_EMAIL.to_string()),
            platform_url: get("PLATFORM_URL").unwrap_or_else(|| DEFAULT_PLATFORM_URL.to_string()),
            email: SmtpConfig {
                host: get("EMAIL_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
                port,
                user: get("EMAIL_USER"),
                password: get("EMAIL_PASSWORD"),
                from: get("EMAIL_FROM").unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_string()),
            },
            whatsapp: WhatsAppConfig {
                api_url: get("WHATSAPP_API_URL")
                    .unwrap_or_else(|| DEFAULT_WHATSAPP_API_URL.to_string()),
                phone_number_id: get("WHATSAPP_PHONE_NUMBER_ID"),
                access_token: get("WHATSAPP_ACCESS_TOKEN"),
                admin_phone: get("WHATSAPP_ADMIN_PHONE"),
                template_new_demand: get("WHATSAPP_TEMPLATE_NEW_DEMAND"),
                template_admin_demand: get("WHATSAPP_TEMPLATE_ADMIN_DEMAND"),
            },
            unit_timeout,
        })
    }
}
