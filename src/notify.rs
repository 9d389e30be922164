//! Report delivery.
//!
//! The orchestrator only sees [`Notifier`]; [`SmtpNotifier`] is the production
//! implementation, built once at startup from [`MailConfig`].

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

const DEFAULT_FROM_NAME: &str = "Email Service";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Missing required MAIL environment variables: MAIL_HOST, MAIL_PORT, MAIL_USERNAME, MAIL_PASSWORD")]
    MissingConfig,

    #[error("invalid email address `{address}`: {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP delivery failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Delivers an HTML document to one recipient.
pub(crate) trait Notifier {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), NotifyError>;
}

/// SMTP settings as given on the command line or in the environment.
#[derive(Debug, Clone, Default)]
pub struct MailConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// `ssl` selects implicit TLS; anything else uses STARTTLS.
    pub encryption: Option<String>,
    pub from_name: Option<String>,
    pub timeout: Duration,
}

impl MailConfig {
    fn implicit_tls(&self) -> bool {
        self.encryption.as_deref() == Some("ssl")
    }
}

pub(crate) struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

fn parse_mailbox(name: Option<String>, address: &str) -> Result<Mailbox, NotifyError> {
    let email = address.parse().map_err(|source| NotifyError::Address {
        address: address.to_string(),
        source,
    })?;
    Ok(Mailbox::new(name, email))
}

impl SmtpNotifier {
    pub fn from_config(cfg: &MailConfig) -> Result<Self, NotifyError> {
        let (Some(host), Some(username), Some(password)) = (
            cfg.host.as_deref(),
            cfg.username.as_deref(),
            cfg.password.as_deref(),
        ) else {
            return Err(NotifyError::MissingConfig);
        };

        info!("SMTP configuration:");
        info!("  host: {}", host);
        info!("  port: {}", cfg.port);
        info!("  username: {}", username);
        info!("  encryption: {}", cfg.encryption.as_deref().unwrap_or("-"));
        info!("  from name: {}", cfg.from_name.as_deref().unwrap_or("-"));

        let builder = if cfg.implicit_tls() {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
        };
        let transport = builder
            .port(cfg.port)
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .timeout(Some(cfg.timeout))
            .build();

        let from_name = cfg
            .from_name
            .clone()
            .unwrap_or_else(|| DEFAULT_FROM_NAME.to_string());
        let from = parse_mailbox(Some(from_name), username)?;

        Ok(Self { transport, from })
    }
}

impl Notifier for SmtpNotifier {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(None, to)?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())?;

        match self.transport.send(message).await {
            Ok(response) => {
                info!("Message sent: {}", response.code());
                Ok(())
            }
            Err(e) => {
                error!("Error sending email: {}", e);
                Err(e.into())
            }
        }
    }
}

const TEST_SUBJECT: &str = "Test Email from certbot-renew-report";
const TEST_BODY: &str = "<h1>Hello World!</h1><p>This is a test email sent by certbot-renew-report to check the SMTP settings.</p>";

/// Send a fixed test message to the mail account itself.
///
/// Failures are logged; the caller always gets control back.
pub(crate) async fn send_test_email<N: Notifier>(notifier: &N, username: Option<&str>) {
    let Some(recipient) = username.filter(|u| !u.is_empty()) else {
        error!("MAIL_USERNAME is not set.");
        return;
    };

    info!("Sending test email to {}...", recipient);
    match notifier.send(recipient, TEST_SUBJECT, TEST_BODY).await {
        Ok(()) => info!("Test email sent successfully."),
        Err(e) => error!("Failed to send test email: {}", e),
    }
}
