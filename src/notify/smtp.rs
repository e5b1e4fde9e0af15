//! SMTP delivery.
//!
//! Composed messages are sent as plain text through an authenticated relay. Port 465 uses
//! implicit TLS; every other port upgrades the connection with STARTTLS.

use super::mail::{MailMessage, MailTransport};
use crate::{
    config::notifications::SmtpConfig,
    errors::{Error, Result},
};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::fmt::Display;
use std::time::Duration;
use tracing::{debug, info};

const CHANNEL: &str = "email";
/// Port on which the relay expects TLS from the first byte
pub const IMPLICIT_TLS_PORT: u16 = 465;

fn send_error(err: impl Display) -> Error {
    Error::Notification {
        channel: CHANNEL.to_string(),
        message: err.to_string(),
    }
}

/// Parses the configured sender.
///
/// # Errors
/// Returns [`Error::Config`] when `from` is not a mailbox.
pub fn parse_sender(from: &str) -> Result<Mailbox> {
    from.parse().map_err(|e| Error::Config {
        message: format!("EMAIL_FROM is not a valid mailbox ({from}): {e}"),
    })
}

/// Builds the wire message for a composed email.
///
/// # Errors
/// Returns [`Error::Notification`] when the recipient is not a valid address.
pub fn build_message(from: &Mailbox, message: &MailMessage) -> Result<Message> {
    let to: Mailbox = message.to.parse().map_err(send_error)?;
    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(message.subject.clone())
        .header(ContentType::TEXT_PLAIN)
        .body(message.body.clone())
        .map_err(send_error)
}

/// [`MailTransport`] over any `lettre` async transport, an authenticated SMTP relay by default.
#[derive(Debug, Clone)]
pub struct SmtpTransport<T = AsyncSmtpTransport<Tokio1Executor>> {
    from: Mailbox,
    transport: T,
}

impl SmtpTransport {
    /// Connects lazily to the configured relay. `timeout` bounds each SMTP command.
    ///
    /// # Errors
    /// Returns [`Error::Config`] when credentials are missing, the host is unusable or the
    /// sender is not a mailbox.
    pub fn from_config(config: &SmtpConfig, timeout: Duration) -> Result<Self> {
        let (Some(user), Some(password)) = (&config.user, &config.password) else {
            return Err(Error::Config {
                message: "SMTP needs EMAIL_USER and EMAIL_PASSWORD".to_string(),
            });
        };

        let builder = if config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| Error::Config {
            message: format!("Invalid SMTP host {}: {e}", config.host),
        })?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(user.clone(), password.clone()))
            .timeout(Some(timeout))
            .build();
        Ok(Self::with_transport(parse_sender(&config.from)?, transport))
    }
}

impl<T> SmtpTransport<T> {
    /// Wraps an existing `lettre` transport.
    #[must_use]
    pub const fn with_transport(from: Mailbox, transport: T) -> Self {
        Self { from, transport }
    }

    /// Sender placed on every message.
    #[must_use]
    pub const fn sender(&self) -> &Mailbox {
        &self.from
    }
}

#[async_trait]
impl<T> MailTransport for SmtpTransport<T>
where
    T: AsyncTransport + Send + Sync,
    T::Error: Display,
{
    async fn deliver(&self, message: &MailMessage) -> Result<()> {
        let email = build_message(&self.from, message)?;
        debug!(to = %message.to, "Sending email");
        self.transport.send(email).await.map_err(send_error)?;
        info!(to = %message.to, subject = %message.subject, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use lettre::transport::stub::AsyncStubTransport;

    fn message(to: &str) -> MailMessage {
        MailMessage {
            to: to.to_string(),
            subject: "Mission confirmed - Wedding".to_string(),
            body: "Hello Awa".to_string(),
        }
    }

    fn smtp_config(port: u16) -> SmtpConfig {
        SmtpConfig {
            host: "localhost".to_string(),
            port,
            user: Some("mailer".to_string()),
            password: Some("secret".to_string()),
            from: "Events <events@example.com>".to_string(),
        }
    }

    #[test]
    fn test_build_message_sets_headers() {
        let from = parse_sender("Events <events@example.com>").unwrap();
        let email = build_message(&from, &message("awa@example.com")).unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();

        assert!(raw.contains("From: Events <events@example.com>"));
        assert!(raw.contains("To: awa@example.com"));
        assert!(raw.contains("Subject: Mission confirmed - Wedding"));
        assert!(raw.contains("Hello Awa"));
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(matches!(
            parse_sender("not a mailbox"),
            Err(Error::Config { .. })
        ));

        let from = parse_sender("events@example.com").unwrap();
        let result = build_message(&from, &message("nobody"));
        assert!(matches!(result, Err(Error::Notification { .. })));
    }

    #[tokio::test]
    async fn test_from_config_requires_credentials() {
        let mut config = smtp_config(587);
        config.password = None;
        let result = SmtpTransport::from_config(&config, Duration::from_secs(1));
        assert!(matches!(result, Err(Error::Config { .. })));

        let transport = SmtpTransport::from_config(&smtp_config(465), Duration::from_secs(1))
            .unwrap();
        assert_eq!(transport.sender().email.to_string(), "events@example.com");
    }

    #[tokio::test]
    async fn test_deliver_maps_transport_results() {
        let from = parse_sender("events@example.com").unwrap();

        let ok = SmtpTransport::with_transport(from.clone(), AsyncStubTransport::new_ok());
        ok.deliver(&message("awa@example.com")).await.unwrap();

        let failing = SmtpTransport::with_transport(from, AsyncStubTransport::new_error());
        let result = failing.deliver(&message("awa@example.com")).await;
        assert!(matches!(
            result,
            Err(Error::Notification { ref channel, .. }) if channel == "email"
        ));
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_a_notification_error() {
        // nothing listens on port 1
        let transport =
            SmtpTransport::from_config(&smtp_config(1), Duration::from_secs(2)).unwrap();
        let result = transport.deliver(&message("awa@example.com")).await;
        assert!(matches!(result, Err(Error::Notification { .. })));
    }
}
